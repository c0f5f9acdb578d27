// stockpile/src/service/order.rs

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{event, instrument, Level};

use super::{require_id, stock_after};
use crate::context::OpContext;
use crate::error::{Entity, StoreResult};
use crate::model::{Order, Product, DEFAULT_ORDER_STATUS};
use crate::storage::{settle, Storage, StorageTx};

/// Orders reserve stock: creating one takes the ordered units off the
/// products, updating one takes or gives back the difference, deleting one
/// gives everything back.
#[derive(Clone)]
pub struct OrderService {
  storage: Arc<dyn Storage>,
}

/// Locks every product with a non-zero delta, in ascending id order, and
/// checks that the positive deltas are on hand. Nothing is written.
async fn lock_stock(
  tx: &mut dyn StorageTx,
  deltas: impl IntoIterator<Item = (i64, i64)>,
) -> StoreResult<Vec<(Product, i64)>> {
  let mut locked = Vec::new();
  for (product_id, delta) in deltas {
    if delta == 0 {
      continue;
    }
    let product = tx.lock_product(product_id).await?;
    stock_after(&product, delta)?;
    locked.push((product, delta));
  }
  Ok(locked)
}

async fn apply_stock(tx: &mut dyn StorageTx, locked: Vec<(Product, i64)>) -> StoreResult<()> {
  for (product, delta) in locked {
    let quantity = stock_after(&product, delta)?;
    tx.set_product_quantity(product.id, quantity).await?;
    event!(Level::TRACE, product_id = product.id, delta, quantity, "Stock adjusted.");
  }
  Ok(())
}

impl OrderService {
  pub fn new(storage: Arc<dyn Storage>) -> Self {
    Self { storage }
  }

  #[instrument(
        name = "OrderService::create_order",
        skip_all,
        fields(user_id = order.user_id, lines = order.lines.len()),
        err(Display)
    )]
  pub async fn create_order(&self, ctx: &OpContext, mut order: Order) -> StoreResult<Order> {
    order.validate()?;
    if order.status.trim().is_empty() {
      order.status = DEFAULT_ORDER_STATUS.to_string();
    }

    let mut tx = self.storage.begin_tx(ctx).await?;
    let result = ctx
      .run(async {
        let locked = lock_stock(tx.as_mut(), order.quantities_by_product()).await?;
        let created = tx.create_order(order).await?;
        apply_stock(tx.as_mut(), locked).await?;
        Ok(created)
      })
      .await;
    let created = settle(tx, result).await?;
    event!(Level::INFO, order_id = created.id, total = created.total, "Order created.");
    Ok(created)
  }

  #[instrument(name = "OrderService::get_order", skip(self, ctx), err(Display))]
  pub async fn get_order(&self, ctx: &OpContext, id: i64) -> StoreResult<Order> {
    require_id(Entity::Order, id)?;
    let mut tx = self.storage.begin_tx(ctx).await?;
    let result = ctx.run(tx.get_order(id)).await;
    settle(tx, result).await
  }

  #[instrument(name = "OrderService::list_orders", skip_all, err(Display))]
  pub async fn list_orders(&self, ctx: &OpContext) -> StoreResult<Vec<Order>> {
    let mut tx = self.storage.begin_tx(ctx).await?;
    let result = ctx.run(tx.list_orders()).await;
    settle(tx, result).await
  }

  /// Replaces the order's user, status and lines. An empty status keeps the
  /// stored one.
  #[instrument(
        name = "OrderService::update_order",
        skip_all,
        fields(order_id = order.id, lines = order.lines.len()),
        err(Display)
    )]
  pub async fn update_order(&self, ctx: &OpContext, mut order: Order) -> StoreResult<Order> {
    require_id(Entity::Order, order.id)?;
    order.validate()?;

    let mut tx = self.storage.begin_tx(ctx).await?;
    let result = ctx
      .run(async {
        let stored = tx.lock_order(order.id).await?;
        if order.status.trim().is_empty() {
          order.status = stored.status.clone();
        }
        order.created_at = stored.created_at;

        let before = stored.quantities_by_product();
        let after = order.quantities_by_product();
        let product_ids: BTreeSet<i64> = before.keys().chain(after.keys()).copied().collect();
        let deltas = product_ids.into_iter().map(|product_id| {
          let wanted = after.get(&product_id).copied().unwrap_or(0);
          let held = before.get(&product_id).copied().unwrap_or(0);
          (product_id, wanted - held)
        });

        let locked = lock_stock(tx.as_mut(), deltas).await?;
        let updated = tx.update_order(order).await?;
        apply_stock(tx.as_mut(), locked).await?;
        Ok(updated)
      })
      .await;
    settle(tx, result).await
  }

  /// Deletes the order and returns its units to stock.
  #[instrument(name = "OrderService::delete_order", skip(self, ctx), err(Display))]
  pub async fn delete_order(&self, ctx: &OpContext, id: i64) -> StoreResult<()> {
    require_id(Entity::Order, id)?;
    let mut tx = self.storage.begin_tx(ctx).await?;
    let result = ctx
      .run(async {
        let stored = tx.lock_order(id).await?;
        let released = stored
          .quantities_by_product()
          .into_iter()
          .map(|(product_id, quantity)| (product_id, -quantity));
        let locked = lock_stock(tx.as_mut(), released).await?;
        apply_stock(tx.as_mut(), locked).await?;
        tx.delete_order(id).await
      })
      .await;
    settle(tx, result).await?;
    event!(Level::INFO, order_id = id, "Order deleted.");
    Ok(())
  }
}
