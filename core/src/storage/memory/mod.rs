// stockpile/src/storage/memory/mod.rs

//! In-process backend.
//!
//! Both tables live behind one `tokio::sync::RwLock`. A transaction takes the
//! lock in write mode in [`Storage::begin_tx`] and keeps it until it is
//! committed, rolled back or dropped, so transactions run strictly one at a
//! time. Writes go to an overlay owned by the transaction and reach the
//! tables only on commit.

mod overlay;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{event, instrument, Level};

use self::overlay::{Staged, Table};
use crate::context::OpContext;
use crate::error::{Entity, StoreError, StoreResult};
use crate::model::{Order, Product};
use crate::storage::{Storage, StorageTx, StoreOps};

#[derive(Debug, Default)]
struct Tables {
  products: Table<Product>,
  orders: Table<Order>,
}

/// Cheap to clone; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
  tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Committed (products, orders) row counts. Waits for any running
  /// transaction to finish.
  pub async fn row_counts(&self) -> (usize, usize) {
    let tables = self.tables.read().await;
    (tables.products.len(), tables.orders.len())
  }
}

#[async_trait]
impl Storage for MemoryStorage {
  fn backend_name(&self) -> &'static str {
    "memory"
  }

  #[instrument(name = "MemoryStorage::begin_tx", skip_all)]
  async fn begin_tx(&self, ctx: &OpContext) -> StoreResult<Box<dyn StorageTx>> {
    let lock = Arc::clone(&self.tables);
    // Waiting for the lock is abortable; nothing is held until it is granted.
    let tables = ctx.run(async move { Ok(lock.write_owned().await) }).await?;
    event!(Level::TRACE, "Store lock acquired, transaction open.");

    let products = Staged::over(&tables.products);
    let orders = Staged::over(&tables.orders);
    Ok(Box::new(MemoryTx {
      tables,
      products,
      orders,
      ctx: ctx.clone(),
    }))
  }
}

/// Open in-memory transaction. Holds the store lock; dropping it discards
/// the staged writes and releases the lock.
pub struct MemoryTx {
  tables: OwnedRwLockWriteGuard<Tables>,
  products: Staged<Product>,
  orders: Staged<Order>,
  ctx: OpContext,
}

impl MemoryTx {
  fn product(&self, id: i64) -> StoreResult<&Product> {
    self
      .products
      .get(&self.tables.products, id)
      .ok_or_else(|| StoreError::not_found(Entity::Product, id))
  }

  fn order(&self, id: i64) -> StoreResult<&Order> {
    self
      .orders
      .get(&self.tables.orders, id)
      .ok_or_else(|| StoreError::not_found(Entity::Order, id))
  }

  fn in_use(&self, product_id: i64) -> bool {
    self
      .orders
      .visible(&self.tables.orders)
      .iter()
      .any(|order| order.references_product(product_id))
  }

  /// Fills every line's price: from `kept` when the product already had a
  /// snapshot on the stored order, from the product otherwise.
  fn snapshot_prices(&self, order: &mut Order, kept: &BTreeMap<i64, i64>) -> StoreResult<()> {
    for line in order.lines.iter_mut() {
      line.price = match kept.get(&line.product_id) {
        Some(price) => *price,
        None => self.product(line.product_id)?.price,
      };
    }
    order.total = order.line_total()?;
    Ok(())
  }
}

#[async_trait]
impl StoreOps for MemoryTx {
  async fn create_product(&mut self, mut product: Product) -> StoreResult<Product> {
    product.validate()?;
    let now = Utc::now();
    product.id = self.products.next_id();
    product.created_at = now;
    product.updated_at = now;
    self.products.put(product.id, product.clone());
    event!(Level::DEBUG, product_id = product.id, "Product staged.");
    Ok(product)
  }

  async fn get_product(&mut self, id: i64) -> StoreResult<Product> {
    self.product(id).cloned()
  }

  async fn list_products(&mut self) -> StoreResult<Vec<Product>> {
    Ok(
      self
        .products
        .visible(&self.tables.products)
        .into_iter()
        .cloned()
        .collect(),
    )
  }

  async fn update_product(&mut self, mut product: Product) -> StoreResult<Product> {
    product.validate()?;
    let created_at = self.product(product.id)?.created_at;
    product.created_at = created_at;
    product.updated_at = Utc::now();
    self.products.put(product.id, product.clone());
    Ok(product)
  }

  async fn delete_product(&mut self, id: i64) -> StoreResult<()> {
    if !self.products.contains(&self.tables.products, id) {
      return Err(StoreError::not_found(Entity::Product, id));
    }
    if self.in_use(id) {
      return Err(StoreError::Conflict(format!(
        "product {} is referenced by existing orders",
        id
      )));
    }
    self.products.remove(id);
    Ok(())
  }

  async fn lock_product(&mut self, id: i64) -> StoreResult<Product> {
    // The whole store is already exclusive to this transaction.
    self.product(id).cloned()
  }

  async fn set_product_quantity(&mut self, id: i64, quantity: i32) -> StoreResult<()> {
    if quantity < 0 {
      return Err(StoreError::validation("product quantity cannot be negative"));
    }
    let mut product = self.product(id)?.clone();
    product.quantity = quantity;
    product.updated_at = Utc::now();
    self.products.put(id, product);
    Ok(())
  }

  async fn product_in_use(&mut self, id: i64) -> StoreResult<bool> {
    Ok(self.in_use(id))
  }

  async fn create_order(&mut self, mut order: Order) -> StoreResult<Order> {
    order.validate()?;
    self.snapshot_prices(&mut order, &BTreeMap::new())?;
    let now = Utc::now();
    order.id = self.orders.next_id();
    order.created_at = now;
    order.updated_at = now;
    self.orders.put(order.id, order.clone());
    event!(Level::DEBUG, order_id = order.id, total = order.total, "Order staged.");
    Ok(order)
  }

  async fn get_order(&mut self, id: i64) -> StoreResult<Order> {
    self.order(id).cloned()
  }

  async fn lock_order(&mut self, id: i64) -> StoreResult<Order> {
    self.order(id).cloned()
  }

  async fn list_orders(&mut self) -> StoreResult<Vec<Order>> {
    Ok(
      self
        .orders
        .visible(&self.tables.orders)
        .into_iter()
        .cloned()
        .collect(),
    )
  }

  async fn update_order(&mut self, mut order: Order) -> StoreResult<Order> {
    order.validate()?;
    let (created_at, kept) = {
      let stored = self.order(order.id)?;
      let kept: BTreeMap<i64, i64> = stored
        .lines
        .iter()
        .map(|line| (line.product_id, line.price))
        .collect();
      (stored.created_at, kept)
    };
    self.snapshot_prices(&mut order, &kept)?;
    order.created_at = created_at;
    order.updated_at = Utc::now();
    self.orders.put(order.id, order.clone());
    Ok(order)
  }

  async fn delete_order(&mut self, id: i64) -> StoreResult<()> {
    if !self.orders.contains(&self.tables.orders, id) {
      return Err(StoreError::not_found(Entity::Order, id));
    }
    self.orders.remove(id);
    Ok(())
  }
}

#[async_trait]
impl StorageTx for MemoryTx {
  async fn commit(self: Box<Self>) -> StoreResult<()> {
    let MemoryTx {
      mut tables,
      products,
      orders,
      ctx,
    } = *self;
    // A finished context never commits; dropping the overlay is the rollback.
    ctx.check()?;

    event!(
      Level::DEBUG,
      staged_products = products.pending(),
      staged_orders = orders.pending(),
      "Committing in-memory transaction."
    );
    products.apply(&mut tables.products);
    orders.apply(&mut tables.orders);
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> StoreResult<()> {
    event!(
      Level::DEBUG,
      discarded_products = self.products.pending(),
      discarded_orders = self.orders.pending(),
      "Rolling back in-memory transaction."
    );
    Ok(())
  }
}
