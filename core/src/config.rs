// stockpile/src/config.rs

//! Backend selection and connection-pool settings.

use std::sync::Arc;
use std::time::Duration;

use tracing::{event, Level};

use crate::error::{StoreError, StoreResult};
use crate::storage::{MemoryStorage, Storage};

pub const DEFAULT_MAX_OPEN_CONNECTIONS: u32 = 25;
pub const DEFAULT_MIN_IDLE_CONNECTIONS: u32 = 5;
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
  pub url: String,
  pub max_open_connections: u32,
  pub min_idle_connections: u32,
  pub max_lifetime: Duration,
  pub idle_timeout: Duration,
  /// How long a transaction may wait for a pooled connection before it
  /// fails with `TransactionFailed`.
  pub acquire_timeout: Duration,
}

impl PostgresConfig {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      max_open_connections: DEFAULT_MAX_OPEN_CONNECTIONS,
      min_idle_connections: DEFAULT_MIN_IDLE_CONNECTIONS,
      max_lifetime: DEFAULT_MAX_LIFETIME,
      idle_timeout: DEFAULT_IDLE_TIMEOUT,
      acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
    }
  }

  pub fn validate(&self) -> StoreResult<()> {
    if self.url.trim().is_empty() {
      return Err(StoreError::InvalidConfig("database url is empty".to_string()));
    }
    if self.max_open_connections == 0 {
      return Err(StoreError::InvalidConfig(
        "max open connections must be at least 1".to_string(),
      ));
    }
    if self.min_idle_connections > self.max_open_connections {
      return Err(StoreError::InvalidConfig(format!(
        "min idle connections ({}) exceeds max open connections ({})",
        self.min_idle_connections, self.max_open_connections
      )));
    }
    if self.acquire_timeout.is_zero() {
      return Err(StoreError::InvalidConfig("acquire timeout must be non-zero".to_string()));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
  Memory,
  Postgres(PostgresConfig),
}

impl StorageConfig {
  /// `Postgres` when a database url is given, `Memory` otherwise.
  pub fn from_database_url(url: Option<String>) -> Self {
    match url {
      Some(url) if !url.trim().is_empty() => StorageConfig::Postgres(PostgresConfig::new(url)),
      _ => StorageConfig::Memory,
    }
  }
}

/// Builds the configured backend. The relational backend has its schema
/// ensured before it is returned.
pub async fn open_storage(config: &StorageConfig) -> StoreResult<Arc<dyn Storage>> {
  match config {
    StorageConfig::Memory => {
      event!(Level::INFO, backend = "memory", "Opening storage.");
      Ok(Arc::new(MemoryStorage::new()))
    }
    #[cfg(feature = "postgres")]
    StorageConfig::Postgres(pg) => {
      event!(Level::INFO, backend = "postgres", "Opening storage.");
      let storage = crate::storage::PostgresStorage::connect(pg).await?;
      storage.init_schema().await?;
      Ok(Arc::new(storage))
    }
    #[cfg(not(feature = "postgres"))]
    StorageConfig::Postgres(_) => Err(StoreError::InvalidConfig(
      "built without the `postgres` feature".to_string(),
    )),
  }
}
