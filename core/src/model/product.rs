// stockpile/src/model/product.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

pub const MAX_PRODUCT_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Product {
  #[serde(default)]
  pub id: i64,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  /// Unit price in minor currency units.
  pub price: i64,
  /// Stock on hand.
  #[serde(default)]
  pub quantity: i32,
  #[serde(default)]
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub updated_at: DateTime<Utc>,
}

impl Product {
  /// A product that has not been stored yet. Id and timestamps are assigned
  /// by the backend on creation.
  pub fn new(name: impl Into<String>, price: i64, quantity: i32) -> Self {
    Self {
      id: 0,
      name: name.into(),
      description: None,
      price,
      quantity,
      created_at: DateTime::<Utc>::default(),
      updated_at: DateTime::<Utc>::default(),
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn validate(&self) -> StoreResult<()> {
    if self.name.trim().is_empty() {
      return Err(StoreError::validation("product name is required"));
    }
    if self.name.chars().count() > MAX_PRODUCT_NAME_LEN {
      return Err(StoreError::validation("product name is too long"));
    }
    if self.price <= 0 {
      return Err(StoreError::validation("product price must be positive"));
    }
    if self.quantity < 0 {
      return Err(StoreError::validation("product quantity cannot be negative"));
    }
    Ok(())
  }
}
