// stockpile/src/error.rs
use anyhow::Error as AnyhowError;
use std::fmt;
use thiserror::Error;

/// The entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
  Product,
  Order,
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Entity::Product => f.write_str("product"),
      Entity::Order => f.write_str("order"),
    }
  }
}

/// Which step of a transaction's lifecycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
  Begin,
  Commit,
  Rollback,
  /// A statement inside an open transaction lost its connection or pool slot.
  Statement,
}

impl fmt::Display for TxStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TxStage::Begin => f.write_str("begin"),
      TxStage::Commit => f.write_str("commit"),
      TxStage::Rollback => f.write_str("rollback"),
      TxStage::Statement => f.write_str("statement"),
    }
  }
}

/// Why an operation stopped before finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
  Cancelled,
  DeadlineExceeded,
}

impl fmt::Display for CancelReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CancelReason::Cancelled => f.write_str("cancelled by caller"),
      CancelReason::DeadlineExceeded => f.write_str("deadline exceeded"),
    }
  }
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("{entity} {id} not found")]
  NotFound { entity: Entity, id: i64 },

  #[error("validation failed: {0}")]
  ValidationFailed(String),

  #[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
  InsufficientStock {
    product_id: i64,
    available: i32,
    requested: i32,
  },

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("transaction {stage} failed. Source: {source}")]
  TransactionFailed {
    stage: TxStage,
    #[source]
    source: AnyhowError,
  },

  #[error("operation aborted: {0}")]
  Cancelled(CancelReason),

  #[error("invalid storage configuration: {0}")]
  InvalidConfig(String),

  #[error("unexpected storage failure. Source: {source}")]
  Unexpected {
    #[source]
    source: AnyhowError,
  },
}

/// Closed classification of [`StoreError`]. Boundary layers map these to
/// their own status codes instead of inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  NotFound,
  ValidationFailed,
  InsufficientStock,
  Conflict,
  TransactionFailed,
  Cancelled,
  Unexpected,
}

impl StoreError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      StoreError::NotFound { .. } => ErrorKind::NotFound,
      StoreError::ValidationFailed(_) => ErrorKind::ValidationFailed,
      StoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
      StoreError::Conflict(_) => ErrorKind::Conflict,
      StoreError::TransactionFailed { .. } => ErrorKind::TransactionFailed,
      StoreError::Cancelled(_) => ErrorKind::Cancelled,
      StoreError::InvalidConfig(_) | StoreError::Unexpected { .. } => ErrorKind::Unexpected,
    }
  }

  pub fn not_found(entity: Entity, id: i64) -> Self {
    StoreError::NotFound { entity, id }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    StoreError::ValidationFailed(message.into())
  }

  pub fn tx_failed(stage: TxStage, source: impl Into<AnyhowError>) -> Self {
    StoreError::TransactionFailed {
      stage,
      source: source.into(),
    }
  }
}

// Opaque failures from helpers that speak anyhow end up as Unexpected.
impl From<AnyhowError> for StoreError {
  fn from(err: AnyhowError) -> Self {
    StoreError::Unexpected { source: err }
  }
}

pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;
