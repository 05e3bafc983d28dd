use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// An order snapshot created from a cart.
///
/// Immutable after creation except for `status`, `payment_info`, and
/// `updated_at`. The line items live in `order_products` with prices frozen
/// at creation time.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub store_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub shipping_info: String,
    /// Masked card summary, set when payment is captured. Never holds a
    /// full card number.
    #[sea_orm(nullable)]
    pub payment_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_product::Entity")]
    OrderProducts,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id"
    )]
    Store,
}

impl Related<super::order_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderProducts.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order lifecycle: `pending → paid → shipped → completed`, where a
/// `pending` order may also be superseded (deleted) by a new checkout.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl OrderStatus {
    /// Position in the forward lifecycle, used when strict ordering is
    /// enabled.
    fn rank(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Paid => 1,
            OrderStatus::Shipped => 2,
            OrderStatus::Completed => 3,
        }
    }

    /// Whether an owner-driven transition to `next` is allowed.
    ///
    /// Permissive mode lets an owner set any status from any status;
    /// strict mode only allows moving one or more steps forward, never
    /// backwards or in place.
    pub fn can_transition(self, next: OrderStatus, strict: bool) -> bool {
        if !strict {
            return true;
        }
        next.rank() > self.rank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Completed,
        ] {
            let text = status.to_string();
            assert_eq!(OrderStatus::from_str(&text).unwrap(), status);
        }
    }

    #[test]
    fn permissive_mode_allows_any_transition() {
        assert!(OrderStatus::Completed.can_transition(OrderStatus::Pending, false));
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Completed, false));
    }

    #[test]
    fn strict_mode_only_moves_forward() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Paid, true));
        assert!(OrderStatus::Paid.can_transition(OrderStatus::Completed, true));
        assert!(!OrderStatus::Shipped.can_transition(OrderStatus::Paid, true));
        assert!(!OrderStatus::Paid.can_transition(OrderStatus::Paid, true));
    }
}
