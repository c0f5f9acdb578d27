// stockpile/src/storage/mod.rs

//! The storage contract shared by every backend.
//!
//! A backend implements [`Storage`]; [`Storage::begin_tx`] hands out a
//! [`StorageTx`] through which all reads and writes of one business
//! operation go. `commit` and `rollback` consume the handle, so a handle is
//! finalized at most once, and a handle dropped without either is rolled
//! back by the backend.
//!
//! The auto-commit methods on [`Storage`] wrap a single [`StoreOps`] call in
//! its own transaction.

use async_trait::async_trait;
use tracing::{event, Level};

use crate::context::OpContext;
use crate::error::StoreResult;
use crate::model::{Order, Product};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{MemoryStorage, MemoryTx};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresStorage, PostgresTx};

/// CRUD surface of an open transaction.
///
/// Both backends list rows in ascending id order and return order lines in
/// the sequence they were written.
#[async_trait]
pub trait StoreOps: Send {
  /// Assigns id and timestamps and returns the stored copy.
  async fn create_product(&mut self, product: Product) -> StoreResult<Product>;
  async fn get_product(&mut self, id: i64) -> StoreResult<Product>;
  async fn list_products(&mut self) -> StoreResult<Vec<Product>>;
  /// Overwrites every mutable field. `created_at` is kept from the stored row.
  async fn update_product(&mut self, product: Product) -> StoreResult<Product>;
  /// Fails with `Conflict` while any order line references the product.
  async fn delete_product(&mut self, id: i64) -> StoreResult<()>;
  /// Read that keeps other transactions from changing the row until this
  /// one finishes. Used before any stock check.
  async fn lock_product(&mut self, id: i64) -> StoreResult<Product>;
  async fn set_product_quantity(&mut self, id: i64, quantity: i32) -> StoreResult<()>;
  async fn product_in_use(&mut self, id: i64) -> StoreResult<bool>;

  /// Snapshots each referenced product's price into its line, computes the
  /// total and stores order and lines. A missing product is `NotFound`.
  async fn create_order(&mut self, order: Order) -> StoreResult<Order>;
  async fn get_order(&mut self, id: i64) -> StoreResult<Order>;
  /// Like [`StoreOps::lock_product`]: the order and its lines cannot change
  /// under this transaction once read. Used before any stock is reserved or
  /// released for an existing order.
  async fn lock_order(&mut self, id: i64) -> StoreResult<Order>;
  async fn list_orders(&mut self) -> StoreResult<Vec<Order>>;
  /// Replaces the order's lines. Lines for products already on the stored
  /// order keep their stored price; new products get the current price.
  async fn update_order(&mut self, order: Order) -> StoreResult<Order>;
  async fn delete_order(&mut self, id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait StorageTx: StoreOps {
  async fn commit(self: Box<Self>) -> StoreResult<()>;
  async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Commits `tx` when `result` is `Ok`, rolls it back otherwise.
///
/// A failed rollback is logged and the original error returned.
pub async fn settle<T>(tx: Box<dyn StorageTx>, result: StoreResult<T>) -> StoreResult<T> {
  match result {
    Ok(value) => {
      tx.commit().await?;
      Ok(value)
    }
    Err(err) => {
      if let Err(rollback_err) = tx.rollback().await {
        event!(Level::WARN, error = %rollback_err, original_error = %err, "Rollback after failed operation also failed.");
      }
      Err(err)
    }
  }
}

#[async_trait]
pub trait Storage: Send + Sync {
  fn backend_name(&self) -> &'static str;

  async fn begin_tx(&self, ctx: &OpContext) -> StoreResult<Box<dyn StorageTx>>;

  async fn create_product(&self, ctx: &OpContext, product: Product) -> StoreResult<Product> {
    let mut tx = self.begin_tx(ctx).await?;
    let result = ctx.run(tx.create_product(product)).await;
    settle(tx, result).await
  }

  async fn get_product(&self, ctx: &OpContext, id: i64) -> StoreResult<Product> {
    let mut tx = self.begin_tx(ctx).await?;
    let result = ctx.run(tx.get_product(id)).await;
    settle(tx, result).await
  }

  async fn list_products(&self, ctx: &OpContext) -> StoreResult<Vec<Product>> {
    let mut tx = self.begin_tx(ctx).await?;
    let result = ctx.run(tx.list_products()).await;
    settle(tx, result).await
  }

  async fn update_product(&self, ctx: &OpContext, product: Product) -> StoreResult<Product> {
    let mut tx = self.begin_tx(ctx).await?;
    let result = ctx.run(tx.update_product(product)).await;
    settle(tx, result).await
  }

  async fn delete_product(&self, ctx: &OpContext, id: i64) -> StoreResult<()> {
    let mut tx = self.begin_tx(ctx).await?;
    let result = ctx.run(tx.delete_product(id)).await;
    settle(tx, result).await
  }

  async fn set_product_quantity(&self, ctx: &OpContext, id: i64, quantity: i32) -> StoreResult<()> {
    let mut tx = self.begin_tx(ctx).await?;
    let result = ctx.run(tx.set_product_quantity(id, quantity)).await;
    settle(tx, result).await
  }

  async fn product_in_use(&self, ctx: &OpContext, id: i64) -> StoreResult<bool> {
    let mut tx = self.begin_tx(ctx).await?;
    let result = ctx.run(tx.product_in_use(id)).await;
    settle(tx, result).await
  }

  async fn create_order(&self, ctx: &OpContext, order: Order) -> StoreResult<Order> {
    let mut tx = self.begin_tx(ctx).await?;
    let result = ctx.run(tx.create_order(order)).await;
    settle(tx, result).await
  }

  async fn get_order(&self, ctx: &OpContext, id: i64) -> StoreResult<Order> {
    let mut tx = self.begin_tx(ctx).await?;
    let result = ctx.run(tx.get_order(id)).await;
    settle(tx, result).await
  }

  async fn list_orders(&self, ctx: &OpContext) -> StoreResult<Vec<Order>> {
    let mut tx = self.begin_tx(ctx).await?;
    let result = ctx.run(tx.list_orders()).await;
    settle(tx, result).await
  }

  async fn update_order(&self, ctx: &OpContext, order: Order) -> StoreResult<Order> {
    let mut tx = self.begin_tx(ctx).await?;
    let result = ctx.run(tx.update_order(order)).await;
    settle(tx, result).await
  }

  async fn delete_order(&self, ctx: &OpContext, id: i64) -> StoreResult<()> {
    let mut tx = self.begin_tx(ctx).await?;
    let result = ctx.run(tx.delete_order(id)).await;
    settle(tx, result).await
  }
}
