// stockpile/src/storage/postgres/mod.rs

//! PostgreSQL backend on a `sqlx` pool.
//!
//! Each [`PostgresTx`] owns one pooled connection with an open
//! `READ COMMITTED` transaction. Stock checks rely on row locks taken by
//! [`StoreOps::lock_product`] (`SELECT ... FOR UPDATE`). A handle dropped
//! without commit or rollback is rolled back when sqlx returns the
//! connection to the pool.

mod schema;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};
use tracing::{event, instrument, Level};

use crate::config::PostgresConfig;
use crate::context::OpContext;
use crate::error::{Entity, StoreError, StoreResult, TxStage};
use crate::model::{Order, OrderLine, Product};
use crate::storage::{Storage, StorageTx, StoreOps};

const PRODUCT_COLUMNS: &str = "id, name, description, price, quantity, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, status, total, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
  id: i64,
  user_id: i64,
  status: String,
  total: i64,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl OrderRow {
  fn into_order(self, lines: Vec<OrderLine>) -> Order {
    Order {
      id: self.id,
      user_id: self.user_id,
      status: self.status,
      total: self.total,
      lines,
      created_at: self.created_at,
      updated_at: self.updated_at,
    }
  }
}

#[derive(sqlx::FromRow)]
struct LineRow {
  order_id: i64,
  product_id: i64,
  quantity: i32,
  price: i64,
}

impl From<LineRow> for OrderLine {
  fn from(row: LineRow) -> Self {
    OrderLine {
      product_id: row.product_id,
      quantity: row.quantity,
      price: row.price,
    }
  }
}

/// Maps a driver error onto the store's error kinds.
///
/// Constraint violations carry the database's message; losing the
/// connection or the pool slot is a transaction failure.
fn classify(err: sqlx::Error) -> StoreError {
  if let sqlx::Error::Database(db_err) = &err {
    let code = db_err.code().map(|code| code.into_owned());
    let message = db_err.message().to_string();
    match code.as_deref() {
      // foreign_key_violation, unique_violation
      Some("23503") | Some("23505") => return StoreError::Conflict(message),
      // check_violation, string_data_right_truncation
      Some("23514") | Some("22001") => return StoreError::ValidationFailed(message),
      // serialization_failure, deadlock_detected
      Some("40001") | Some("40P01") => return StoreError::tx_failed(TxStage::Statement, err),
      _ => {}
    }
  }

  let transient = matches!(
    err,
    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_)
  );
  if transient {
    StoreError::tx_failed(TxStage::Statement, err)
  } else {
    StoreError::Unexpected { source: err.into() }
  }
}

#[derive(Debug, Clone)]
pub struct PostgresStorage {
  pool: PgPool,
}

impl PostgresStorage {
  /// Opens the pool. Fails when no connection can be established at all.
  #[instrument(name = "PostgresStorage::connect", skip_all, fields(max_connections = config.max_open_connections))]
  pub async fn connect(config: &PostgresConfig) -> StoreResult<Self> {
    config.validate()?;
    let pool = PgPoolOptions::new()
      .max_connections(config.max_open_connections)
      .min_connections(config.min_idle_connections)
      .max_lifetime(config.max_lifetime)
      .idle_timeout(config.idle_timeout)
      .acquire_timeout(config.acquire_timeout)
      .connect(&config.url)
      .await
      .map_err(|err| StoreError::Unexpected {
        source: anyhow::Error::new(err).context("failed to connect to PostgreSQL"),
      })?;
    event!(Level::INFO, "PostgreSQL pool established.");
    Ok(Self { pool })
  }

  pub fn from_pool(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  /// Creates the tables and indexes that are missing. Safe to run on every
  /// start.
  #[instrument(name = "PostgresStorage::init_schema", skip_all)]
  pub async fn init_schema(&self) -> StoreResult<()> {
    let mut tx = self
      .pool
      .begin()
      .await
      .map_err(|err| StoreError::tx_failed(TxStage::Begin, err))?;
    for statement in schema::STATEMENTS {
      sqlx::query(*statement).execute(&mut *tx).await.map_err(classify)?;
    }
    tx.commit()
      .await
      .map_err(|err| StoreError::tx_failed(TxStage::Commit, err))?;
    event!(Level::DEBUG, statements = schema::STATEMENTS.len(), "Schema ensured.");
    Ok(())
  }

  pub async fn close(&self) {
    self.pool.close().await;
  }
}

#[async_trait]
impl Storage for PostgresStorage {
  fn backend_name(&self) -> &'static str {
    "postgres"
  }

  #[instrument(name = "PostgresStorage::begin_tx", skip_all)]
  async fn begin_tx(&self, ctx: &OpContext) -> StoreResult<Box<dyn StorageTx>> {
    let pool = self.pool.clone();
    let tx = ctx
      .run(async move {
        let mut tx = pool
          .begin()
          .await
          .map_err(|err| StoreError::tx_failed(TxStage::Begin, err))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
          .execute(&mut *tx)
          .await
          .map_err(|err| StoreError::tx_failed(TxStage::Begin, err))?;
        Ok(tx)
      })
      .await?;
    Ok(Box::new(PostgresTx { tx, ctx: ctx.clone() }))
  }
}

pub struct PostgresTx {
  tx: Transaction<'static, Postgres>,
  ctx: OpContext,
}

impl PostgresTx {
  async fn fetch_product(&mut self, id: i64, for_update: bool) -> StoreResult<Product> {
    let sql = format!(
      "SELECT {} FROM products WHERE id = $1{}",
      PRODUCT_COLUMNS,
      if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, Product>(&sql)
      .bind(id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(classify)?
      .ok_or_else(|| StoreError::not_found(Entity::Product, id))
  }

  /// Lines are read after the order row, so with `for_update` they are the
  /// ones committed by whoever held the row lock last.
  async fn fetch_order(&mut self, id: i64, for_update: bool) -> StoreResult<Order> {
    let sql = format!(
      "SELECT {} FROM orders WHERE id = $1{}",
      ORDER_COLUMNS,
      if for_update { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(classify)?
      .ok_or_else(|| StoreError::not_found(Entity::Order, id))?;
    let lines = self.fetch_lines(id).await?;
    Ok(row.into_order(lines))
  }

  async fn fetch_lines(&mut self, order_id: i64) -> StoreResult<Vec<OrderLine>> {
    let rows = sqlx::query_as::<_, LineRow>(
      "SELECT order_id, product_id, quantity, price FROM order_lines WHERE order_id = $1 ORDER BY line_no",
    )
    .bind(order_id)
    .fetch_all(&mut *self.tx)
    .await
    .map_err(classify)?;
    Ok(rows.into_iter().map(OrderLine::from).collect())
  }

  async fn insert_lines(&mut self, order_id: i64, lines: &[OrderLine]) -> StoreResult<()> {
    let mut builder =
      QueryBuilder::<Postgres>::new("INSERT INTO order_lines (order_id, product_id, line_no, quantity, price) ");
    builder.push_values(lines.iter().enumerate(), |mut row, (line_no, line)| {
      row
        .push_bind(order_id)
        .push_bind(line.product_id)
        .push_bind(line_no as i32)
        .push_bind(line.quantity)
        .push_bind(line.price);
    });
    builder.build().execute(&mut *self.tx).await.map_err(classify)?;
    Ok(())
  }

  async fn snapshot_prices(&mut self, order: &mut Order, kept: &BTreeMap<i64, i64>) -> StoreResult<()> {
    for line in order.lines.iter_mut() {
      line.price = match kept.get(&line.product_id) {
        Some(price) => *price,
        None => sqlx::query_scalar::<_, i64>("SELECT price FROM products WHERE id = $1")
          .bind(line.product_id)
          .fetch_optional(&mut *self.tx)
          .await
          .map_err(classify)?
          .ok_or_else(|| StoreError::not_found(Entity::Product, line.product_id))?,
      };
    }
    order.total = order.line_total()?;
    Ok(())
  }
}

#[async_trait]
impl StoreOps for PostgresTx {
  async fn create_product(&mut self, product: Product) -> StoreResult<Product> {
    product.validate()?;
    let sql = format!(
      "INSERT INTO products (name, description, price, quantity) VALUES ($1, $2, $3, $4) RETURNING {}",
      PRODUCT_COLUMNS
    );
    let created = sqlx::query_as::<_, Product>(&sql)
      .bind(&product.name)
      .bind(&product.description)
      .bind(product.price)
      .bind(product.quantity)
      .fetch_one(&mut *self.tx)
      .await
      .map_err(classify)?;
    event!(Level::DEBUG, product_id = created.id, "Product inserted.");
    Ok(created)
  }

  async fn get_product(&mut self, id: i64) -> StoreResult<Product> {
    self.fetch_product(id, false).await
  }

  async fn list_products(&mut self) -> StoreResult<Vec<Product>> {
    let sql = format!("SELECT {} FROM products ORDER BY id", PRODUCT_COLUMNS);
    sqlx::query_as::<_, Product>(&sql)
      .fetch_all(&mut *self.tx)
      .await
      .map_err(classify)
  }

  async fn update_product(&mut self, product: Product) -> StoreResult<Product> {
    product.validate()?;
    let sql = format!(
      "UPDATE products SET name = $1, description = $2, price = $3, quantity = $4, updated_at = now() \
       WHERE id = $5 RETURNING {}",
      PRODUCT_COLUMNS
    );
    sqlx::query_as::<_, Product>(&sql)
      .bind(&product.name)
      .bind(&product.description)
      .bind(product.price)
      .bind(product.quantity)
      .bind(product.id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(classify)?
      .ok_or_else(|| StoreError::not_found(Entity::Product, product.id))
  }

  async fn delete_product(&mut self, id: i64) -> StoreResult<()> {
    let done = sqlx::query("DELETE FROM products WHERE id = $1")
      .bind(id)
      .execute(&mut *self.tx)
      .await
      .map_err(classify)?;
    if done.rows_affected() == 0 {
      return Err(StoreError::not_found(Entity::Product, id));
    }
    Ok(())
  }

  async fn lock_product(&mut self, id: i64) -> StoreResult<Product> {
    self.fetch_product(id, true).await
  }

  async fn set_product_quantity(&mut self, id: i64, quantity: i32) -> StoreResult<()> {
    if quantity < 0 {
      return Err(StoreError::validation("product quantity cannot be negative"));
    }
    let done = sqlx::query("UPDATE products SET quantity = $1, updated_at = now() WHERE id = $2")
      .bind(quantity)
      .bind(id)
      .execute(&mut *self.tx)
      .await
      .map_err(classify)?;
    if done.rows_affected() == 0 {
      return Err(StoreError::not_found(Entity::Product, id));
    }
    Ok(())
  }

  async fn product_in_use(&mut self, id: i64) -> StoreResult<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM order_lines WHERE product_id = $1)")
      .bind(id)
      .fetch_one(&mut *self.tx)
      .await
      .map_err(classify)
  }

  async fn create_order(&mut self, mut order: Order) -> StoreResult<Order> {
    order.validate()?;
    self.snapshot_prices(&mut order, &BTreeMap::new()).await?;
    let sql = format!(
      "INSERT INTO orders (user_id, status, total) VALUES ($1, $2, $3) RETURNING {}",
      ORDER_COLUMNS
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(order.user_id)
      .bind(&order.status)
      .bind(order.total)
      .fetch_one(&mut *self.tx)
      .await
      .map_err(classify)?;
    self.insert_lines(row.id, &order.lines).await?;
    event!(Level::DEBUG, order_id = row.id, total = row.total, "Order inserted.");
    Ok(row.into_order(order.lines))
  }

  async fn get_order(&mut self, id: i64) -> StoreResult<Order> {
    self.fetch_order(id, false).await
  }

  async fn lock_order(&mut self, id: i64) -> StoreResult<Order> {
    self.fetch_order(id, true).await
  }

  async fn list_orders(&mut self) -> StoreResult<Vec<Order>> {
    let sql = format!("SELECT {} FROM orders ORDER BY id", ORDER_COLUMNS);
    let rows = sqlx::query_as::<_, OrderRow>(&sql)
      .fetch_all(&mut *self.tx)
      .await
      .map_err(classify)?;
    let line_rows = sqlx::query_as::<_, LineRow>(
      "SELECT order_id, product_id, quantity, price FROM order_lines ORDER BY order_id, line_no",
    )
    .fetch_all(&mut *self.tx)
    .await
    .map_err(classify)?;

    let mut lines_by_order: BTreeMap<i64, Vec<OrderLine>> = BTreeMap::new();
    for line in line_rows {
      lines_by_order.entry(line.order_id).or_default().push(line.into());
    }
    Ok(
      rows
        .into_iter()
        .map(|row| {
          let lines = lines_by_order.remove(&row.id).unwrap_or_default();
          row.into_order(lines)
        })
        .collect(),
    )
  }

  async fn update_order(&mut self, mut order: Order) -> StoreResult<Order> {
    order.validate()?;
    sqlx::query_scalar::<_, i64>("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
      .bind(order.id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(classify)?
      .ok_or_else(|| StoreError::not_found(Entity::Order, order.id))?;

    let kept: BTreeMap<i64, i64> =
      sqlx::query_as::<_, (i64, i64)>("SELECT product_id, price FROM order_lines WHERE order_id = $1")
        .bind(order.id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(classify)?
        .into_iter()
        .collect();
    self.snapshot_prices(&mut order, &kept).await?;

    let sql = format!(
      "UPDATE orders SET user_id = $1, status = $2, total = $3, updated_at = now() WHERE id = $4 RETURNING {}",
      ORDER_COLUMNS
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(order.user_id)
      .bind(&order.status)
      .bind(order.total)
      .bind(order.id)
      .fetch_one(&mut *self.tx)
      .await
      .map_err(classify)?;
    sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
      .bind(order.id)
      .execute(&mut *self.tx)
      .await
      .map_err(classify)?;
    self.insert_lines(order.id, &order.lines).await?;
    Ok(row.into_order(order.lines))
  }

  async fn delete_order(&mut self, id: i64) -> StoreResult<()> {
    let done = sqlx::query("DELETE FROM orders WHERE id = $1")
      .bind(id)
      .execute(&mut *self.tx)
      .await
      .map_err(classify)?;
    if done.rows_affected() == 0 {
      return Err(StoreError::not_found(Entity::Order, id));
    }
    Ok(())
  }
}

#[async_trait]
impl StorageTx for PostgresTx {
  async fn commit(self: Box<Self>) -> StoreResult<()> {
    let PostgresTx { tx, ctx } = *self;
    if let Err(err) = ctx.check() {
      if let Err(rollback_err) = tx.rollback().await {
        event!(Level::WARN, error = %rollback_err, "Rollback of abandoned transaction failed.");
      }
      return Err(err);
    }
    tx.commit()
      .await
      .map_err(|err| StoreError::tx_failed(TxStage::Commit, err))
  }

  async fn rollback(self: Box<Self>) -> StoreResult<()> {
    self
      .tx
      .rollback()
      .await
      .map_err(|err| StoreError::tx_failed(TxStage::Rollback, err))
  }
}
