// stockpile_app/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use stockpile::{PostgresConfig, StorageConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  /// `Memory` when DATABASE_URL is unset.
  pub storage: StorageConfig,
  /// Deadline given to every request's store operations.
  pub request_timeout: Duration,
  pub shutdown_timeout: Duration,
  pub log_format: LogFormat,
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match lookup(name) {
    Some(raw) if !raw.trim().is_empty() => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
    _ => Ok(default),
  }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: Duration) -> Result<Duration> {
  parse_var(lookup, name, default.as_secs()).map(Duration::from_secs)
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name: &str| env::var(name).ok())
  }

  pub fn backend_name(&self) -> &'static str {
    match self.storage {
      StorageConfig::Memory => "memory",
      StorageConfig::Postgres(_) => "postgres",
    }
  }

  /// Builds the configuration from any variable source.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let server_host = lookup("SERVER_HOST")
      .filter(|host| !host.trim().is_empty())
      .unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = parse_var(&lookup, "SERVER_PORT", 8080u16)?;

    let storage = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
      None => StorageConfig::Memory,
      Some(url) => {
        let defaults = PostgresConfig::new(url);
        let pg = PostgresConfig {
          max_open_connections: parse_var(&lookup, "DB_MAX_OPEN_CONNS", defaults.max_open_connections)?,
          min_idle_connections: parse_var(&lookup, "DB_MIN_IDLE_CONNS", defaults.min_idle_connections)?,
          max_lifetime: parse_secs(&lookup, "DB_CONN_MAX_LIFETIME_SECS", defaults.max_lifetime)?,
          idle_timeout: parse_secs(&lookup, "DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout)?,
          acquire_timeout: parse_secs(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout)?,
          ..defaults
        };
        pg.validate().map_err(|e| AppError::Config(e.to_string()))?;
        StorageConfig::Postgres(pg)
      }
    };

    let request_timeout = parse_secs(&lookup, "REQUEST_TIMEOUT_SECS", Duration::from_secs(15))?;
    if request_timeout.is_zero() {
      return Err(AppError::Config("REQUEST_TIMEOUT_SECS must be positive".to_string()));
    }
    let shutdown_timeout = parse_secs(&lookup, "SHUTDOWN_TIMEOUT_SECS", Duration::from_secs(10))?;

    let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
      None | Some("") | Some("pretty") => LogFormat::Pretty,
      Some("json") => LogFormat::Json,
      Some(other) => return Err(AppError::Config(format!("Invalid LOG_FORMAT: {}", other))),
    };

    Ok(Self {
      server_host,
      server_port,
      storage,
      request_timeout,
      shutdown_timeout,
      log_format,
    })
  }
}
