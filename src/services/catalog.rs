use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::{product, store, Product, ProductModel, Store, StoreModel};
use crate::errors::ServiceError;

/// Store and product catalog.
///
/// Reads feed the cart and order engines; the one write the rest of the
/// system performs against products (`quantity`) happens in the cart
/// engine, not here. Owner-side writes all re-verify `store.owner_id`
/// against current state.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

/// Fields for creating or updating a product.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub quantity: i32,
    pub image: String,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Creates a store owned by the caller. Store names are tenant
    /// identifiers and must be unique platform-wide.
    #[instrument(skip(self, description))]
    pub async fn create_store(
        &self,
        owner_id: Uuid,
        name: &str,
        description: &str,
    ) -> Result<StoreModel, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Store name is required".to_string(),
            ));
        }

        let taken = Store::find()
            .filter(store::Column::Name.eq(name))
            .one(&*self.db)
            .await?
            .is_some();
        if taken {
            return Err(ServiceError::Conflict(
                "A store with this name already exists".to_string(),
            ));
        }

        let new_store = store::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(description.to_string()),
            owner_id: Set(owner_id),
            custom_domain: Set(None),
            created_at: Set(Utc::now()),
        };
        let new_store = new_store.insert(&*self.db).await?;

        info!(store_id = %new_store.id, name = %new_store.name, "Store created");
        Ok(new_store)
    }

    /// Stores owned by one platform user.
    #[instrument(skip(self))]
    pub async fn get_owner_stores(&self, owner_id: Uuid) -> Result<Vec<StoreModel>, ServiceError> {
        Ok(Store::find()
            .filter(store::Column::OwnerId.eq(owner_id))
            .order_by_asc(store::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_store(&self, store_id: Uuid) -> Result<StoreModel, ServiceError> {
        Store::find_by_id(store_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Store not found".to_string()))
    }

    /// One product within a store. Store scoping is part of the lookup so
    /// a product id from another tenant reads as absent.
    #[instrument(skip(self))]
    pub async fn get_product(
        &self,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .filter(product::Column::StoreId.eq(store_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    /// Storefront product listing for one store.
    #[instrument(skip(self))]
    pub async fn list_store_products(
        &self,
        store_id: Uuid,
    ) -> Result<Vec<ProductModel>, ServiceError> {
        Ok(Product::find()
            .filter(product::Column::StoreId.eq(store_id))
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Adds a product to a store the caller owns.
    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        owner_id: Uuid,
        store_id: Uuid,
        input: ProductInput,
    ) -> Result<ProductModel, ServiceError> {
        self.verify_store_owner(owner_id, store_id).await?;
        validate_product_input(&input)?;

        let now = Utc::now();
        let new_product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store_id),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            quantity: Set(input.quantity),
            image: Set(input.image),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(new_product.insert(&*self.db).await?)
    }

    /// Replaces a product's catalog fields. Does not touch reservations:
    /// price changes never affect existing order snapshots, and quantity
    /// here is the owner restating available stock.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        owner_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        input: ProductInput,
    ) -> Result<ProductModel, ServiceError> {
        self.verify_store_owner(owner_id, store_id).await?;
        validate_product_input(&input)?;

        let existing = self.get_product(store_id, product_id).await?;
        let mut active: product::ActiveModel = existing.into();
        active.name = Set(input.name);
        active.description = Set(input.description);
        active.price = Set(input.price);
        active.quantity = Set(input.quantity);
        active.image = Set(input.image);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Adjusts available stock by a signed delta. Negative adjustments use
    /// the same conditional-update guard as cart reservations, so stock
    /// never goes below zero even against concurrent carting.
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        owner_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        delta: i32,
    ) -> Result<ProductModel, ServiceError> {
        self.verify_store_owner(owner_id, store_id).await?;

        if delta != 0 {
            let mut update = Product::update_many()
                .col_expr(
                    product::Column::Quantity,
                    Expr::col(product::Column::Quantity).add(delta),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(product::Column::Id.eq(product_id))
                .filter(product::Column::StoreId.eq(store_id));
            if delta < 0 {
                update = update.filter(product::Column::Quantity.gte(-delta));
            }

            let result = update.exec(&*self.db).await?;
            if result.rows_affected == 0 {
                // The product exists but holds too few units, or is gone.
                self.get_product(store_id, product_id).await?;
                return Err(ServiceError::InsufficientStock(
                    "Not enough stock available to remove".to_string(),
                ));
            }
        }

        self.get_product(store_id, product_id).await
    }

    /// Removes a product from the catalog. Order snapshots referencing it
    /// keep their frozen name-independent line data.
    #[instrument(skip(self))]
    pub async fn delete_product(
        &self,
        owner_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.verify_store_owner(owner_id, store_id).await?;
        let existing = self.get_product(store_id, product_id).await?;
        existing.delete(&*self.db).await?;
        Ok(())
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

fn validate_product_input(input: &ProductInput) -> Result<(), ServiceError> {
    if input.name.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Product name is required".to_string(),
        ));
    }
    if input.price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Price cannot be negative".to_string(),
        ));
    }
    if input.quantity < 0 {
        return Err(ServiceError::ValidationError(
            "Quantity cannot be negative".to_string(),
        ));
    }
    Ok(())
}
