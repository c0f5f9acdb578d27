// stockpile/src/model/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{StoreError, StoreResult};

/// Status given to an order created without one.
pub const DEFAULT_ORDER_STATUS: &str = "pending";

/// Longest status, in characters, either backend stores.
pub const MAX_ORDER_STATUS_LEN: usize = 50;

/// Most lines a single order may carry.
pub const MAX_ORDER_LINES: usize = 1000;

/// One line of an order. `price` is a snapshot of the product's price taken
/// when the line was first written; backends never re-read it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
  pub product_id: i64,
  pub quantity: i32,
  #[serde(default)]
  pub price: i64,
}

impl OrderLine {
  pub fn new(product_id: i64, quantity: i32) -> Self {
    Self {
      product_id,
      quantity,
      price: 0,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
  #[serde(default)]
  pub id: i64,
  pub user_id: i64,
  /// Free-form. Empty means "not supplied".
  #[serde(default)]
  pub status: String,
  /// Computed by the backend from the line snapshots; whatever the caller
  /// sends here is overwritten.
  #[serde(default)]
  pub total: i64,
  pub lines: Vec<OrderLine>,
  #[serde(default)]
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub updated_at: DateTime<Utc>,
}

impl Order {
  pub fn new(user_id: i64, lines: Vec<OrderLine>) -> Self {
    Self {
      id: 0,
      user_id,
      status: String::new(),
      total: 0,
      lines,
      created_at: DateTime::<Utc>::default(),
      updated_at: DateTime::<Utc>::default(),
    }
  }

  pub fn with_status(mut self, status: impl Into<String>) -> Self {
    self.status = status.into();
    self
  }

  /// Shape checks that need no storage access.
  pub fn validate(&self) -> StoreResult<()> {
    if self.user_id <= 0 {
      return Err(StoreError::validation("order user id must be positive"));
    }
    if self.status.chars().count() > MAX_ORDER_STATUS_LEN {
      return Err(StoreError::validation(format!(
        "order status must be at most {} characters",
        MAX_ORDER_STATUS_LEN
      )));
    }
    if self.lines.is_empty() {
      return Err(StoreError::validation("order must contain at least one line"));
    }
    if self.lines.len() > MAX_ORDER_LINES {
      return Err(StoreError::validation(format!(
        "order must contain at most {} lines",
        MAX_ORDER_LINES
      )));
    }
    for (idx, line) in self.lines.iter().enumerate() {
      if line.product_id <= 0 {
        return Err(StoreError::validation(format!(
          "line {}: product id must be positive",
          idx + 1
        )));
      }
      if line.quantity <= 0 {
        return Err(StoreError::validation(format!(
          "line {}: quantity must be positive",
          idx + 1
        )));
      }
    }
    Ok(())
  }

  /// Σ(price × quantity) over the lines, failing instead of wrapping.
  pub fn line_total(&self) -> StoreResult<i64> {
    self.lines.iter().try_fold(0i64, |acc, line| {
      line
        .price
        .checked_mul(i64::from(line.quantity))
        .and_then(|amount| acc.checked_add(amount))
        .ok_or_else(|| StoreError::validation("order total overflows"))
    })
  }

  /// Requested units per product, summed across lines, in ascending
  /// product id order.
  pub fn quantities_by_product(&self) -> BTreeMap<i64, i64> {
    let mut requested = BTreeMap::new();
    for line in &self.lines {
      *requested.entry(line.product_id).or_insert(0i64) += i64::from(line.quantity);
    }
    requested
  }

  pub fn references_product(&self, product_id: i64) -> bool {
    self.lines.iter().any(|line| line.product_id == product_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validate_requires_lines_and_user() {
    assert!(Order::new(1, vec![OrderLine::new(1, 2)]).validate().is_ok());
    assert!(Order::new(1, vec![]).validate().is_err());
    assert!(Order::new(0, vec![OrderLine::new(1, 2)]).validate().is_err());
  }

  #[test]
  fn validate_rejects_bad_lines() {
    let zero_qty = Order::new(1, vec![OrderLine::new(1, 1), OrderLine::new(2, 0)]);
    match zero_qty.validate() {
      Err(StoreError::ValidationFailed(m)) => assert_eq!(m, "line 2: quantity must be positive"),
      other => panic!("unexpected {:?}", other),
    }
    assert!(Order::new(1, vec![OrderLine::new(-4, 1)]).validate().is_err());
  }

  #[test]
  fn validate_enforces_status_and_line_limits() {
    let line = || OrderLine::new(1, 1);
    let at_limit = Order::new(1, vec![line()]).with_status("é".repeat(MAX_ORDER_STATUS_LEN));
    assert!(at_limit.validate().is_ok());
    let too_long = Order::new(1, vec![line()]).with_status("x".repeat(MAX_ORDER_STATUS_LEN + 1));
    assert!(matches!(too_long.validate(), Err(StoreError::ValidationFailed(_))));

    assert!(Order::new(1, vec![line(); MAX_ORDER_LINES]).validate().is_ok());
    match Order::new(1, vec![line(); MAX_ORDER_LINES + 1]).validate() {
      Err(StoreError::ValidationFailed(m)) => assert_eq!(m, "order must contain at most 1000 lines"),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn line_total_sums_snapshots() {
    let mut order = Order::new(1, vec![OrderLine::new(1, 3), OrderLine::new(2, 2)]);
    order.lines[0].price = 500;
    order.lines[1].price = 250;
    assert_eq!(order.line_total().unwrap(), 2000);
  }

  #[test]
  fn line_total_reports_overflow() {
    let mut order = Order::new(1, vec![OrderLine::new(1, i32::MAX), OrderLine::new(2, i32::MAX)]);
    order.lines[0].price = i64::MAX / 2;
    order.lines[1].price = i64::MAX / 2;
    assert!(order.line_total().is_err());
  }

  #[test]
  fn quantities_are_summed_per_product() {
    let order = Order::new(
      1,
      vec![OrderLine::new(5, 1), OrderLine::new(2, 4), OrderLine::new(5, 2)],
    );
    let requested: Vec<_> = order.quantities_by_product().into_iter().collect();
    assert_eq!(requested, vec![(2, 4), (5, 3)]);
  }
}
