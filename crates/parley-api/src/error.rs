//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use parley_engine::Error;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Engine(#[from] Error),
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

fn status_of(e: &Error) -> StatusCode {
  match e {
    Error::Validation(_) | Error::ConfigNotFound(_) => StatusCode::BAD_REQUEST,
    Error::ConversationNotFound(_) | Error::MessageNotFound(_) => StatusCode::NOT_FOUND,
    Error::Upstream(_) => StatusCode::BAD_GATEWAY,
    Error::InvalidVariant { .. } | Error::VariantSource { .. } | Error::Persistence(_) => {
      StatusCode::INTERNAL_SERVER_ERROR
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Engine(e) => status_of(e),
    };
    if status.is_server_error() {
      tracing::error!(status = status.as_u16(), error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
