use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::{
    cart_item, order, payment_method, payment_transaction, CartItem, Order, OrderModel,
    OrderStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

static EXPIRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0[1-9]|1[0-2])/\d{2}$").expect("valid expiry regex"));

/// Payment capture for pending orders.
///
/// Card processing is a deterministic simulation: once the card fields
/// pass shape validation the capture always succeeds. Only masked digits
/// are ever persisted.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Card fields as submitted at checkout. Validated for shape only.
#[derive(Debug, Clone)]
pub struct CardDetails {
    pub card_number: String,
    pub cvv: String,
    pub expiry: String,
}

impl CardDetails {
    /// Digits of the card number with spaces stripped.
    fn digits(&self) -> String {
        self.card_number.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn validate(&self) -> Result<String, ServiceError> {
        let digits = self.digits();
        if digits.len() < 13 || digits.len() > 19 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ServiceError::ValidationError(
                "Invalid card number".to_string(),
            ));
        }
        if self.cvv.len() < 3 || self.cvv.len() > 4 || !self.cvv.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ServiceError::ValidationError("Invalid CVV".to_string()));
        }
        if !EXPIRY_RE.is_match(&self.expiry) {
            return Err(ServiceError::ValidationError(
                "Invalid expiry date, expected MM/YY".to_string(),
            ));
        }
        Ok(digits)
    }

    /// `****1234` form stored on the order and payment method.
    fn masked(&self) -> String {
        let digits = self.digits();
        let last4 = &digits[digits.len().saturating_sub(4)..];
        format!("****{}", last4)
    }
}

impl PaymentService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Captures payment for the caller's pending order.
    ///
    /// Validation happens before any write. On success, one transaction
    /// records the masked payment method, writes a completed transaction
    /// row, moves the order to `paid` with masked `payment_info`, and
    /// clears the customer's remaining cart lines. An order in any other
    /// status is rejected with `Conflict` and nothing is written.
    #[instrument(skip(self, card))]
    pub async fn process_payment(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        card: CardDetails,
    ) -> Result<OrderModel, ServiceError> {
        card.validate()?;
        let masked = card.masked();

        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if order.status != OrderStatus::Pending {
            return Err(ServiceError::Conflict(
                "Order has already been processed".to_string(),
            ));
        }

        let now = Utc::now();
        let method = payment_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            method_name: Set("card".to_string()),
            account_details: Set(masked.clone()),
            created_at: Set(now),
        };
        let method = method.insert(&txn).await?;

        let transaction = payment_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            payment_method_id: Set(method.id),
            amount: Set(order.total_amount),
            status: Set(payment_transaction::TransactionStatus::Completed),
            transaction_date: Set(now),
        };
        transaction.insert(&txn).await?;

        let old_status = order.status;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Paid);
        active.payment_info = Set(Some(masked));
        active.updated_at = Set(now);
        let order = active.update(&txn).await?;

        // Cart lines were consumed at checkout; this sweep removes any
        // the customer added between checkout and payment.
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(order_id = %order.id, "Payment captured");
        self.event_sender
            .send_or_log(Event::PaymentCaptured(order.id))
            .await;
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id: order.id,
                old_status: old_status.to_string(),
                new_status: OrderStatus::Paid.to_string(),
            })
            .await;

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(number: &str, cvv: &str, expiry: &str) -> CardDetails {
        CardDetails {
            card_number: number.to_string(),
            cvv: cvv.to_string(),
            expiry: expiry.to_string(),
        }
    }

    #[test]
    fn accepts_spaced_card_number() {
        assert!(card("4111 1111 1111 1111", "123", "09/27").validate().is_ok());
    }

    #[test]
    fn rejects_short_and_non_numeric_cards() {
        assert!(card("4111", "123", "09/27").validate().is_err());
        assert!(card("4111 1111 1111 111a", "123", "09/27").validate().is_err());
    }

    #[test]
    fn rejects_bad_cvv_and_expiry() {
        assert!(card("4111111111111111", "12", "09/27").validate().is_err());
        assert!(card("4111111111111111", "12345", "09/27").validate().is_err());
        assert!(card("4111111111111111", "123", "13/27").validate().is_err());
        assert!(card("4111111111111111", "123", "9/27").validate().is_err());
        assert!(card("4111111111111111", "123", "09-27").validate().is_err());
    }

    #[test]
    fn masks_down_to_last_four() {
        assert_eq!(card("4111 1111 1111 1111", "123", "09/27").masked(), "****1111");
    }
}
