// stockpile/src/model/mod.rs

//! Entity records handed across the storage boundary.
//!
//! These are plain owned values: a backend returns copies, never references
//! into its own tables.

pub mod order;
pub mod product;

pub use order::{Order, OrderLine, DEFAULT_ORDER_STATUS, MAX_ORDER_LINES, MAX_ORDER_STATUS_LEN};
pub use product::{Product, MAX_PRODUCT_NAME_LEN};
