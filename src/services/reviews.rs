use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::{
    order, order_product, review, Order, OrderModel, OrderProduct, OrderStatus, Product, Review,
    ReviewModel, User,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Review gate: a review must be earned by a fulfilled purchase.
///
/// Eligibility means the customer has an order in `shipped` or
/// `completed` status that contains the product and has not already been
/// reviewed by them. The review binds to that specific order, so the same
/// purchase can never be reviewed twice, and a repeat purchase earns a
/// fresh review slot.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// A review joined with its author's display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewView {
    pub id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub reviewer_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// All reviews of a product plus aggregates computed from the same rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductReviews {
    pub reviews: Vec<ReviewView>,
    pub average_rating: f64,
    pub review_count: u64,
}

/// A fulfilled order listed for the "write a review" screen, with one
/// entry per purchased product and whether it was reviewed already.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewableOrder {
    pub order_id: Uuid,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub products: Vec<ReviewableProduct>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewableProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image: String,
    pub has_reviewed: bool,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a review for a product the customer has received.
    ///
    /// Fails with `InvalidOperation` when no eligible order exists, which
    /// covers three distinct cases identically: never purchased, purchase
    /// not yet shipped, or this purchase already reviewed.
    #[instrument(skip(self, comment))]
    pub async fn create_review(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        rating: i32,
        comment: &str,
    ) -> Result<ReviewModel, ServiceError> {
        if !(1..=5).contains(&rating) {
            return Err(ServiceError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let order = self
            .eligible_order(user_id, product_id)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidOperation(
                    "No eligible order found for this product".to_string(),
                )
            })?;

        let review = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            user_id: Set(user_id),
            order_id: Set(order.id),
            rating: Set(rating),
            comment: Set(comment.to_string()),
            created_at: Set(Utc::now()),
        };
        let review = review.insert(&*self.db).await?;

        info!(review_id = %review.id, order_id = %order.id, "Review created");
        self.event_sender
            .send_or_log(Event::ReviewCreated(review.id))
            .await;

        Ok(review)
    }

    /// Most recent order of this customer that contains the product, is
    /// `shipped` or `completed`, and has no review by them yet.
    #[instrument(skip(self))]
    pub async fn eligible_order(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<OrderModel>, ServiceError> {
        let candidates = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(
                order::Column::Status.is_in([OrderStatus::Shipped, OrderStatus::Completed]),
            )
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        for candidate in candidates {
            let contains_product = OrderProduct::find()
                .filter(order_product::Column::OrderId.eq(candidate.id))
                .filter(order_product::Column::ProductId.eq(product_id))
                .one(&*self.db)
                .await?
                .is_some();
            if !contains_product {
                continue;
            }

            let already_reviewed = Review::find()
                .filter(review::Column::OrderId.eq(candidate.id))
                .filter(review::Column::ProductId.eq(product_id))
                .filter(review::Column::UserId.eq(user_id))
                .one(&*self.db)
                .await?
                .is_some();
            if !already_reviewed {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    /// The customer's shipped and completed orders, newest first, each
    /// with its purchased products flagged reviewed or not. Feeds the
    /// storefront's review prompt.
    #[instrument(skip(self))]
    pub async fn reviewable_orders(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ReviewableOrder>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::Status.is_in([OrderStatus::Shipped, OrderStatus::Completed]))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let lines = OrderProduct::find()
                .filter(order_product::Column::OrderId.eq(order.id))
                .find_also_related(Product)
                .all(&*self.db)
                .await?;

            let mut products = Vec::with_capacity(lines.len());
            for (line, product) in lines {
                let has_reviewed = Review::find()
                    .filter(review::Column::OrderId.eq(order.id))
                    .filter(review::Column::ProductId.eq(line.product_id))
                    .filter(review::Column::UserId.eq(user_id))
                    .one(&*self.db)
                    .await?
                    .is_some();
                let (product_name, product_image) = match product {
                    Some(p) => (p.name, p.image),
                    None => ("(removed product)".to_string(), String::new()),
                };
                products.push(ReviewableProduct {
                    product_id: line.product_id,
                    product_name,
                    product_image,
                    has_reviewed,
                });
            }

            result.push(ReviewableOrder {
                order_id: order.id,
                total_amount: order.total_amount,
                status: order.status,
                created_at: order.created_at,
                products,
            });
        }

        Ok(result)
    }

    /// All reviews of a product with live aggregates. No denormalized
    /// rating cache exists; the average is always consistent with the
    /// rows returned.
    #[instrument(skip(self))]
    pub async fn get_product_reviews(
        &self,
        product_id: Uuid,
    ) -> Result<ProductReviews, ServiceError> {
        let rows = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::CreatedAt)
            .find_also_related(User)
            .all(&*self.db)
            .await?;

        let review_count = rows.len() as u64;
        let rating_sum: i64 = rows.iter().map(|(r, _)| r.rating as i64).sum();
        let average_rating = if review_count == 0 {
            0.0
        } else {
            rating_sum as f64 / review_count as f64
        };

        let reviews = rows
            .into_iter()
            .map(|(review, user)| ReviewView {
                id: review.id,
                rating: review.rating,
                comment: review.comment,
                reviewer_name: user
                    .map(|u| u.full_name())
                    .unwrap_or_else(|| "Anonymous".to_string()),
                created_at: review.created_at,
            })
            .collect();

        Ok(ProductReviews {
            reviews,
            average_rating,
            review_count,
        })
    }
}
