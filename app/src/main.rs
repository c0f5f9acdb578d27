// stockpile_app/src/main.rs

mod config;
mod errors;
mod state;
mod web;

use crate::config::{AppConfig, LogFormat};
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  // RUST_LOG overrides the default level.
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let app_config = Arc::new(AppConfig::from_env().context("loading application configuration")?);
  init_tracing(app_config.log_format);

  tracing::info!("Starting stockpile server...");
  // The database url may carry credentials; only the backend kind is logged.
  tracing::info!(
    host = %app_config.server_host,
    port = app_config.server_port,
    backend = app_config.backend_name(),
    "Application configuration loaded successfully."
  );

  let storage = stockpile::open_storage(&app_config.storage)
    .await
    .context("opening storage backend")?;
  tracing::info!(backend = storage.backend_name(), "Storage ready.");

  let app_state = AppState::new(storage, Arc::clone(&app_config));

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default()) // Actix middleware for tracing requests
      .configure(web::configure_app_routes)
  })
  .shutdown_timeout(app_config.shutdown_timeout.as_secs())
  .bind(&server_address)
  .with_context(|| format!("binding {}", server_address))?
  .run()
  .await
  .context("running HTTP server")?;

  tracing::info!("Server stopped.");
  Ok(())
}
