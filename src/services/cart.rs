use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::{cart_item, product, CartItem, Product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Cart engine: every cart line is a live stock reservation.
///
/// Adding a product to a cart decrements `products.quantity` immediately,
/// so availability seen by every other customer already excludes carted
/// stock. Removing a line (or shrinking it) restores stock; converting the
/// cart into an order does not touch stock at all, it only moves the
/// reservation into order bookkeeping.
///
/// Stock checks are never read-then-write: the decrement is a single
/// conditional `UPDATE .. SET quantity = quantity - N WHERE quantity >= N`,
/// and a zero row count means the reservation lost the race or the stock
/// was simply short.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// One cart line joined with its product, as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub image: String,
    pub price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

/// Store-scoped cart projection with totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub total_items: i32,
    pub total_amount: Decimal,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Reserves `quantity` units of a product into the customer's cart.
    ///
    /// If the product is already in the cart the line is merged
    /// (`existing + quantity`), but stock is only decremented by the
    /// newly requested amount.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        reserve_stock(&txn, product_id, Some(store_id), quantity).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        let now = Utc::now();
        let line = match existing {
            Some(line) => {
                let new_total = line.quantity + quantity;
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(new_total);
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
            None => {
                let line = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                line.insert(&txn).await?
            }
        };

        txn.commit().await?;

        info!(user_id = %user_id, product_id = %product_id, quantity, "Reserved stock into cart");
        self.event_sender
            .send_or_log(Event::CartItemAdded {
                user_id,
                product_id,
                quantity,
            })
            .await;

        Ok(line)
    }

    /// Sets a cart line to an absolute quantity, adjusting stock by the
    /// difference. Growing the line re-checks availability; shrinking it
    /// restores stock unconditionally.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: Uuid,
        cart_item_id: Uuid,
        new_quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        if new_quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let line = CartItem::find_by_id(cart_item_id)
            .filter(cart_item::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

        let delta = new_quantity - line.quantity;
        if delta > 0 {
            reserve_stock(&txn, line.product_id, None, delta).await?;
        } else if delta < 0 {
            restore_stock(&txn, line.product_id, -delta).await?;
        }

        let product_id = line.product_id;
        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(new_quantity);
        active.updated_at = Set(Utc::now());
        let line = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                user_id,
                product_id,
                quantity: new_quantity,
            })
            .await;

        Ok(line)
    }

    /// Removes a cart line, releasing its full reservation back to stock.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, cart_item_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let line = CartItem::find_by_id(cart_item_id)
            .filter(cart_item::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

        restore_stock(&txn, line.product_id, line.quantity).await?;

        let product_id = line.product_id;
        line.delete(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                user_id,
                product_id,
            })
            .await;

        Ok(())
    }

    /// Store-scoped cart projection. A customer's cart may hold lines from
    /// several stores; reads always filter to the requesting store so one
    /// tenant never sees another's lines.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid, store_id: Uuid) -> Result<CartView, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .find_also_related(Product)
            .filter(product::Column::StoreId.eq(store_id))
            .all(&*self.db)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        let mut total_items = 0;
        let mut total_amount = Decimal::ZERO;
        for (line, product) in rows {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError("Cart line references missing product".to_string())
            })?;
            let subtotal = product.price * Decimal::from(line.quantity);
            total_items += line.quantity;
            total_amount += subtotal;
            items.push(CartLineView {
                id: line.id,
                product_id: product.id,
                name: product.name,
                image: product.image,
                price: product.price,
                quantity: line.quantity,
                subtotal,
            });
        }

        Ok(CartView {
            items,
            total_items,
            total_amount,
        })
    }

    /// Deletes every cart line for a customer without restoring stock.
    /// Used after payment capture, when reservations have already moved
    /// into order bookkeeping.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}

/// Atomically decrements available stock, failing with `InsufficientStock`
/// when fewer than `quantity` units remain. The `WHERE quantity >= N`
/// guard makes two concurrent reservations serialize correctly without an
/// exclusive row lock.
pub(crate) async fn reserve_stock<C: sea_orm::ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    store_id: Option<Uuid>,
    quantity: i32,
) -> Result<(), ServiceError> {
    let mut update = Product::update_many()
        .col_expr(
            product::Column::Quantity,
            Expr::col(product::Column::Quantity).sub(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Quantity.gte(quantity));
    if let Some(store_id) = store_id {
        update = update.filter(product::Column::StoreId.eq(store_id));
    }

    let result = update.exec(conn).await?;
    if result.rows_affected == 0 {
        // Distinguish a missing product from a short reservation.
        let mut lookup = Product::find_by_id(product_id);
        if let Some(store_id) = store_id {
            lookup = lookup.filter(product::Column::StoreId.eq(store_id));
        }
        return match lookup.one(conn).await? {
            Some(_) => Err(ServiceError::InsufficientStock(
                "Not enough stock available".to_string(),
            )),
            None => Err(ServiceError::NotFound("Product not found".to_string())),
        };
    }
    Ok(())
}

/// Returns released units to available stock.
pub(crate) async fn restore_stock<C: sea_orm::ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    Product::update_many()
        .col_expr(
            product::Column::Quantity,
            Expr::col(product::Column::Quantity).add(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;
    Ok(())
}
