// stockpile_app/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use stockpile::{CancelReason, ErrorKind, StoreError};

#[derive(Debug, Error)]
pub enum AppError {
  /// Malformed request input caught before the store is called.
  #[error("Bad Request: {0}")]
  BadRequest(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error(transparent)]
  Store(#[from] StoreError),
}

impl AppError {
  /// Text sent to the client. Internal causes stay in the logs.
  fn public_message(&self) -> String {
    match self {
      AppError::BadRequest(m) => m.clone(),
      AppError::Store(err) => match err.kind() {
        ErrorKind::TransactionFailed => "Storage temporarily unavailable".to_string(),
        ErrorKind::Unexpected => "An internal error occurred".to_string(),
        _ => err.to_string(),
      },
      AppError::Config(_) => "An internal error occurred".to_string(),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
      AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::Store(err) => match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorKind::InsufficientStock | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::TransactionFailed => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Cancelled => match err {
          StoreError::Cancelled(CancelReason::DeadlineExceeded) => StatusCode::GATEWAY_TIMEOUT,
          _ => StatusCode::SERVICE_UNAVAILABLE,
        },
        ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, source = ?std::error::Error::source(self), "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }
    HttpResponse::build(status).json(json!({ "error": self.public_message() }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
