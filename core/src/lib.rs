// src/lib.rs

//! Stockpile: a transactional catalog-and-order store.
//!
//! Products and orders live behind one storage contract with two
//! interchangeable backends:
//!  - [`MemoryStorage`], an in-process store whose transactions run one at a
//!    time and stage their writes until commit.
//!  - [`PostgresStorage`] (feature `postgres`, on by default), real
//!    `READ COMMITTED` transactions over a `sqlx` pool.
//!
//! [`ProductService`] and [`OrderService`] run each business operation as a
//! single transaction: stock checks, order writes and stock reservation
//! either all land or none do. Every call takes an [`OpContext`] carrying an
//! optional deadline and a cancellation token.

pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod service;
pub mod storage;

// --- Re-exports for the Public API ---

pub use crate::config::{open_storage, PostgresConfig, StorageConfig};
pub use crate::context::OpContext;
pub use crate::error::{CancelReason, Entity, ErrorKind, StoreError, StoreResult, TxStage};
pub use crate::model::{
  Order, OrderLine, Product, DEFAULT_ORDER_STATUS, MAX_ORDER_LINES, MAX_ORDER_STATUS_LEN, MAX_PRODUCT_NAME_LEN,
};
pub use crate::service::{OrderService, ProductService};
pub use crate::storage::{settle, MemoryStorage, Storage, StorageTx, StoreOps};

#[cfg(feature = "postgres")]
pub use crate::storage::PostgresStorage;
