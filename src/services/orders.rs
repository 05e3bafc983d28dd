use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::{
    cart_item, order, order_product, product, store, CartItem, Order, OrderModel, OrderProduct,
    OrderStatus, Product, Store,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Order engine: converts a store-scoped cart into an immutable order
/// snapshot, and drives owner-side status updates.
///
/// Order creation never touches `products.quantity` — the stock was
/// already reserved line by line as the cart was built. The transaction
/// here only moves that reservation from cart bookkeeping into order
/// bookkeeping.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    /// When true, status updates must move forward through the lifecycle.
    enforce_status_order: bool,
}

/// One order line joined with its product, as returned to clients.
/// `price` is the snapshot taken at checkout, not the current catalog
/// price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub image: String,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        enforce_status_order: bool,
    ) -> Self {
        Self {
            db,
            event_sender,
            enforce_status_order,
        }
    }

    /// Creates a pending order from the customer's cart for one store.
    ///
    /// Atomically, in one transaction: deletes any still-pending orders
    /// this customer holds for the store (abandoned checkouts are
    /// superseded, not accumulated), inserts the order, snapshots every
    /// cart line into `order_products` at the current price, and deletes
    /// the cart lines. All four effects commit or roll back together.
    #[instrument(skip(self, shipping_info))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        shipping_info: &str,
    ) -> Result<OrderModel, ServiceError> {
        if shipping_info.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Shipping information is required".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let lines = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .find_also_related(Product)
            .filter(product::Column::StoreId.eq(store_id))
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
        }

        let mut total = Decimal::ZERO;
        for (line, product) in &lines {
            let product = product.as_ref().ok_or_else(|| {
                ServiceError::InternalError("Cart line references missing product".to_string())
            })?;
            total += product.price * Decimal::from(line.quantity);
        }

        // Supersede abandoned checkouts before inserting the new order.
        let superseded = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::StoreId.eq(store_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .all(&txn)
            .await?;
        let superseded_ids: Vec<Uuid> = superseded.iter().map(|o| o.id).collect();
        if !superseded_ids.is_empty() {
            OrderProduct::delete_many()
                .filter(order_product::Column::OrderId.is_in(superseded_ids.clone()))
                .exec(&txn)
                .await?;
            Order::delete_many()
                .filter(order::Column::Id.is_in(superseded_ids.clone()))
                .exec(&txn)
                .await?;
        }

        let now = Utc::now();
        let new_order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            store_id: Set(store_id),
            total_amount: Set(total),
            status: Set(OrderStatus::Pending),
            shipping_info: Set(shipping_info.to_string()),
            payment_info: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let new_order = new_order.insert(&txn).await?;

        let mut snapshots = Vec::with_capacity(lines.len());
        let mut line_ids = Vec::with_capacity(lines.len());
        for (line, product) in &lines {
            let product = product.as_ref().ok_or_else(|| {
                ServiceError::InternalError("Cart line references missing product".to_string())
            })?;
            line_ids.push(line.id);
            snapshots.push(order_product::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(new_order.id),
                product_id: Set(product.id),
                quantity: Set(line.quantity),
                price: Set(product.price),
            });
        }
        OrderProduct::insert_many(snapshots).exec(&txn).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::Id.is_in(line_ids))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(order_id = %new_order.id, total = %total, "Created order from cart");
        for id in superseded_ids {
            self.event_sender
                .send_or_log(Event::OrderSuperseded(id))
                .await;
        }
        self.event_sender
            .send_or_log(Event::OrderCreated(new_order.id))
            .await;
        // Order confirmation goes out off the request path.
        self.event_sender
            .send_or_log(Event::Notify {
                user_id,
                message: format!("Your order {} has been placed", new_order.id),
            })
            .await;

        Ok(new_order)
    }

    /// All of a customer's orders within one store, newest first.
    #[instrument(skip(self))]
    pub async fn get_orders(
        &self,
        user_id: Uuid,
        store_id: Uuid,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::StoreId.eq(store_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// The customer's current pending order for a store, if any. At most
    /// one exists because checkout supersedes prior pending orders.
    #[instrument(skip(self))]
    pub async fn get_pending_order(
        &self,
        user_id: Uuid,
        store_id: Uuid,
    ) -> Result<Option<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::StoreId.eq(store_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .order_by_desc(order::Column::CreatedAt)
            .one(&*self.db)
            .await?)
    }

    /// Snapshot lines of one order, joined with product names and images
    /// for display. The caller must already be authorized for the order.
    #[instrument(skip(self))]
    pub async fn get_order_products(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderLineView>, ServiceError> {
        let rows = OrderProduct::find()
            .filter(order_product::Column::OrderId.eq(order_id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for (line, product) in rows {
            let (name, image) = match product {
                Some(p) => (p.name, p.image),
                // Product deleted after purchase; the snapshot survives.
                None => ("(removed product)".to_string(), String::new()),
            };
            lines.push(OrderLineView {
                id: line.id,
                product_id: line.product_id,
                name,
                image,
                quantity: line.quantity,
                price: line.price,
                subtotal: line.price * Decimal::from(line.quantity),
            });
        }
        Ok(lines)
    }

    /// A customer's own order, by id.
    #[instrument(skip(self))]
    pub async fn get_customer_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    /// Every order placed against a store, for its owner. Ownership is
    /// verified against current state on every call, never cached.
    #[instrument(skip(self))]
    pub async fn get_store_orders(
        &self,
        owner_id: Uuid,
        store_id: Uuid,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        self.verify_store_owner(owner_id, store_id).await?;

        Ok(Order::find()
            .filter(order::Column::StoreId.eq(store_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Owner-driven status update (`paid → shipped`, `shipped →
    /// completed`, and in permissive mode any other move).
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        owner_id: Uuid,
        order_id: Uuid,
        store_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        self.verify_store_owner(owner_id, store_id).await?;

        let order = Order::find_by_id(order_id)
            .filter(order::Column::StoreId.eq(store_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        self.transition(order, new_status).await
    }

    /// Customer acknowledgement that a shipped order arrived. Only a
    /// `shipped` order can be confirmed; an unpaid or unshipped order must
    /// go through payment and fulfilment first, whatever the transition
    /// policy says about owner-side moves.
    #[instrument(skip(self))]
    pub async fn mark_completed(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let order = Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if order.status != OrderStatus::Shipped {
            return Err(ServiceError::Conflict(format!(
                "Only a shipped order can be confirmed, this one is {}",
                order.status
            )));
        }

        self.transition(order, OrderStatus::Completed).await
    }

    async fn transition(
        &self,
        order: OrderModel,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let old_status = order.status;
        if !old_status.can_transition(new_status, self.enforce_status_order) {
            return Err(ServiceError::Conflict(format!(
                "Cannot move order from {} to {}",
                old_status, new_status
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let order = active.update(&*self.db).await?;

        info!(order_id = %order.id, %old_status, %new_status, "Order status changed");
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id: order.id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;

        Ok(order)
    }

    async fn verify_store_owner(&self, owner_id: Uuid, store_id: Uuid) -> Result<(), ServiceError> {
        let owns = Store::find_by_id(store_id)
            .filter(store::Column::OwnerId.eq(owner_id))
            .one(&*self.db)
            .await?
            .is_some();
        if owns {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "You do not own this store".to_string(),
            ))
        }
    }
}
