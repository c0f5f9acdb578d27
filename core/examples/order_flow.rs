// stockpile/examples/order_flow.rs

use std::sync::Arc;
use std::time::Duration;

use stockpile::{
  open_storage, OpContext, Order, OrderLine, OrderService, Product, ProductService, StorageConfig, StoreError,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), StoreError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Order Flow Example ---");

  // DATABASE_URL selects PostgreSQL; otherwise everything stays in memory.
  let config = StorageConfig::from_database_url(std::env::var("DATABASE_URL").ok());
  let storage = open_storage(&config).await?;
  let products = ProductService::new(Arc::clone(&storage));
  let orders = OrderService::new(storage);

  let ctx = OpContext::with_timeout(Duration::from_secs(5));

  let widget = products
    .create_product(&ctx, Product::new("Widget", 500, 10).with_description("Blue, medium"))
    .await?;
  let gadget = products.create_product(&ctx, Product::new("Gadget", 1250, 2)).await?;
  info!(widget_id = widget.id, gadget_id = gadget.id, "Catalog ready.");

  let order = orders
    .create_order(
      &ctx,
      Order::new(1, vec![OrderLine::new(widget.id, 3), OrderLine::new(gadget.id, 1)]),
    )
    .await?;
  info!(order_id = order.id, total = order.total, status = %order.status, "Order placed.");

  // A later price change does not touch the order's snapshot.
  let mut repriced = products.get_product(&ctx, widget.id).await?;
  repriced.price = 650;
  products.update_product(&ctx, repriced).await?;
  let unchanged = orders.get_order(&ctx, order.id).await?;
  info!(total = unchanged.total, "Order total after price change.");

  // Asking for more gadgets than are left fails as a whole.
  match orders
    .create_order(&ctx, Order::new(2, vec![OrderLine::new(gadget.id, 5)]))
    .await
  {
    Err(err @ StoreError::InsufficientStock { .. }) => info!(error = %err, "Rejected as expected."),
    other => info!(result = ?other.map(|o| o.id), "Unexpected outcome."),
  }

  orders.delete_order(&ctx, order.id).await?;
  let restocked = products.get_product(&ctx, widget.id).await?;
  info!(quantity = restocked.quantity, "Widget stock after the order was deleted.");

  Ok(())
}
