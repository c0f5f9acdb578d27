// stockpile/src/service/mod.rs

//! Business operations on top of any [`Storage`](crate::storage::Storage).
//!
//! Each service method is one transaction: it validates its input, opens a
//! transaction, does its reads, checks and writes through the handle and
//! finishes with [`settle`](crate::storage::settle). The body runs under the
//! caller's [`OpContext`](crate::context::OpContext); when the context is
//! done the body is dropped and the transaction rolls back.

mod order;
mod product;

pub use order::OrderService;
pub use product::ProductService;

use crate::error::{Entity, StoreError, StoreResult};
use crate::model::Product;

/// Ids in paths and payloads must be positive before any storage access.
pub(crate) fn require_id(entity: Entity, id: i64) -> StoreResult<()> {
  if id <= 0 {
    return Err(StoreError::validation(format!("invalid {} ID", entity)));
  }
  Ok(())
}

/// Stock left after taking `delta` units (negative `delta` gives units back).
pub(crate) fn stock_after(product: &Product, delta: i64) -> StoreResult<i32> {
  let remaining = i64::from(product.quantity) - delta;
  if remaining < 0 {
    return Err(StoreError::InsufficientStock {
      product_id: product.id,
      available: product.quantity,
      requested: i32::try_from(delta).unwrap_or(i32::MAX),
    });
  }
  i32::try_from(remaining).map_err(|_| StoreError::validation("product quantity overflows"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_non_positive_ids() {
    assert!(require_id(Entity::Order, 1).is_ok());
    let err = require_id(Entity::Product, 0).unwrap_err();
    assert_eq!(err.to_string(), "validation failed: invalid product ID");
  }

  #[test]
  fn stock_after_checks_both_directions() {
    let mut widget = Product::new("Widget", 500, 10);
    widget.id = 1;
    assert_eq!(stock_after(&widget, 3).unwrap(), 7);
    assert_eq!(stock_after(&widget, -5).unwrap(), 15);
    assert!(matches!(
      stock_after(&widget, 11),
      Err(StoreError::InsufficientStock {
        product_id: 1,
        available: 10,
        requested: 11
      })
    ));

    widget.quantity = i32::MAX;
    assert!(matches!(stock_after(&widget, -1), Err(StoreError::ValidationFailed(_))));
  }
}
