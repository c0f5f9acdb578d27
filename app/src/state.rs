// stockpile_app/src/state.rs
use crate::config::AppConfig;
use std::sync::Arc;
use stockpile::{OpContext, OrderService, ProductService, Storage};

#[derive(Clone)]
pub struct AppState {
  pub products: ProductService,
  pub orders: OrderService,
  pub config: Arc<AppConfig>, // Share loaded config
}

impl AppState {
  pub fn new(storage: Arc<dyn Storage>, config: Arc<AppConfig>) -> Self {
    Self {
      products: ProductService::new(Arc::clone(&storage)),
      orders: OrderService::new(storage),
      config,
    }
  }

  /// Context for one request's store work, bounded by REQUEST_TIMEOUT_SECS.
  pub fn request_context(&self) -> OpContext {
    OpContext::with_timeout(self.config.request_timeout)
  }
}
