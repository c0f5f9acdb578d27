// stockpile/src/service/product.rs

use std::sync::Arc;

use tracing::{event, instrument, Level};

use super::require_id;
use crate::context::OpContext;
use crate::error::{Entity, StoreError, StoreResult};
use crate::model::Product;
use crate::storage::{settle, Storage};

#[derive(Clone)]
pub struct ProductService {
  storage: Arc<dyn Storage>,
}

impl ProductService {
  pub fn new(storage: Arc<dyn Storage>) -> Self {
    Self { storage }
  }

  #[instrument(
        name = "ProductService::create_product",
        skip_all,
        fields(name = %product.name, backend = self.storage.backend_name()),
        err(Display)
    )]
  pub async fn create_product(&self, ctx: &OpContext, product: Product) -> StoreResult<Product> {
    product.validate()?;
    let mut tx = self.storage.begin_tx(ctx).await?;
    let result = ctx.run(tx.create_product(product)).await;
    let created = settle(tx, result).await?;
    event!(Level::INFO, product_id = created.id, "Product created.");
    Ok(created)
  }

  #[instrument(name = "ProductService::get_product", skip(self, ctx), err(Display))]
  pub async fn get_product(&self, ctx: &OpContext, id: i64) -> StoreResult<Product> {
    require_id(Entity::Product, id)?;
    let mut tx = self.storage.begin_tx(ctx).await?;
    let result = ctx.run(tx.get_product(id)).await;
    settle(tx, result).await
  }

  #[instrument(name = "ProductService::list_products", skip_all, err(Display))]
  pub async fn list_products(&self, ctx: &OpContext) -> StoreResult<Vec<Product>> {
    let mut tx = self.storage.begin_tx(ctx).await?;
    let result = ctx.run(tx.list_products()).await;
    settle(tx, result).await
  }

  /// Replaces name, description, price and stock. The stored `created_at`
  /// is kept whatever the caller sends.
  #[instrument(name = "ProductService::update_product", skip_all, fields(product_id = product.id), err(Display))]
  pub async fn update_product(&self, ctx: &OpContext, mut product: Product) -> StoreResult<Product> {
    require_id(Entity::Product, product.id)?;
    product.validate()?;
    let mut tx = self.storage.begin_tx(ctx).await?;
    let result = ctx
      .run(async {
        let existing = tx.get_product(product.id).await?;
        product.created_at = existing.created_at;
        tx.update_product(product).await
      })
      .await;
    settle(tx, result).await
  }

  #[instrument(name = "ProductService::delete_product", skip(self, ctx), err(Display))]
  pub async fn delete_product(&self, ctx: &OpContext, id: i64) -> StoreResult<()> {
    require_id(Entity::Product, id)?;
    let mut tx = self.storage.begin_tx(ctx).await?;
    let result = ctx
      .run(async {
        tx.get_product(id).await?;
        if tx.product_in_use(id).await? {
          return Err(StoreError::Conflict(format!(
            "cannot delete product {}: it is referenced by existing orders",
            id
          )));
        }
        tx.delete_product(id).await
      })
      .await;
    settle(tx, result).await?;
    event!(Level::INFO, product_id = id, "Product deleted.");
    Ok(())
  }

  /// Overwrites the stock on hand and returns the updated product.
  #[instrument(name = "ProductService::set_product_stock", skip(self, ctx), err(Display))]
  pub async fn set_product_stock(&self, ctx: &OpContext, id: i64, quantity: i32) -> StoreResult<Product> {
    require_id(Entity::Product, id)?;
    if quantity < 0 {
      return Err(StoreError::validation("product quantity cannot be negative"));
    }
    let mut tx = self.storage.begin_tx(ctx).await?;
    let result = ctx
      .run(async {
        let before = tx.lock_product(id).await?;
        tx.set_product_quantity(id, quantity).await?;
        event!(Level::DEBUG, product_id = id, from = before.quantity, to = quantity, "Stock overwritten.");
        tx.get_product(id).await
      })
      .await;
    settle(tx, result).await
  }
}
