// tests/common/mod.rs
#![allow(dead_code)] // Not every test binary uses every helper.

pub mod scenarios;

use std::sync::Arc;

use once_cell::sync::Lazy;
use stockpile::{
  ErrorKind, MemoryStorage, OpContext, Order, OrderLine, OrderService, Product, ProductService, Storage, StoreResult,
};
use tracing::Level;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// Both services over one shared backend.
pub struct Fixture {
  pub storage: Arc<dyn Storage>,
  pub products: ProductService,
  pub orders: OrderService,
  pub ctx: OpContext,
}

impl Fixture {
  pub fn over(storage: Arc<dyn Storage>) -> Self {
    Self {
      products: ProductService::new(Arc::clone(&storage)),
      orders: OrderService::new(Arc::clone(&storage)),
      storage,
      ctx: OpContext::background(),
    }
  }

  pub fn memory() -> Self {
    setup_tracing();
    Self::over(Arc::new(MemoryStorage::new()))
  }

  pub async fn seed(&self, name: &str, price: i64, quantity: i32) -> Product {
    self
      .products
      .create_product(&self.ctx, Product::new(name, price, quantity))
      .await
      .expect("seeding a valid product")
  }

  pub async fn stock_of(&self, product_id: i64) -> i32 {
    self
      .products
      .get_product(&self.ctx, product_id)
      .await
      .expect("product exists")
      .quantity
  }

  pub async fn order_count(&self) -> usize {
    self.orders.list_orders(&self.ctx).await.expect("listing orders").len()
  }
}

pub fn widget() -> Product {
  Product::new("Widget", 500, 10).with_description("A very ordinary widget")
}

pub fn order_of(user_id: i64, lines: &[(i64, i32)]) -> Order {
  Order::new(
    user_id,
    lines.iter().map(|(product_id, quantity)| OrderLine::new(*product_id, *quantity)).collect(),
  )
}

#[track_caller]
pub fn assert_kind<T: std::fmt::Debug>(result: StoreResult<T>, expected: ErrorKind) {
  match result {
    Ok(value) => panic!("expected {:?}, got Ok({:?})", expected, value),
    Err(err) => assert_eq!(err.kind(), expected, "unexpected error: {}", err),
  }
}

/// Connects to `DATABASE_URL` and empties every table. `None` when the
/// variable is unset, in which case PostgreSQL tests are skipped.
#[cfg(feature = "postgres")]
pub async fn postgres_storage() -> Option<Arc<dyn Storage>> {
  setup_tracing();
  let url = std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())?;
  let mut config = stockpile::PostgresConfig::new(url);
  config.max_open_connections = 5;
  config.min_idle_connections = 0;

  let storage = stockpile::PostgresStorage::connect(&config)
    .await
    .expect("connecting to DATABASE_URL");
  storage.init_schema().await.expect("bootstrapping schema");
  sqlx::query("TRUNCATE order_lines, orders, products RESTART IDENTITY CASCADE")
    .execute(storage.pool())
    .await
    .expect("truncating tables");
  Some(Arc::new(storage))
}
