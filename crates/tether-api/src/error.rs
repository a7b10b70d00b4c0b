//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The store could not finish in time; the request may be retried.
  #[error("unavailable: {0}")]
  Unavailable(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<tether_core::Error> for ApiError {
  fn from(e: tether_core::Error) -> Self {
    match e {
      tether_core::Error::MissingContactPoint => ApiError::BadRequest(e.to_string()),
      tether_core::Error::Timeout(_) => ApiError::Unavailable(e.to_string()),
      other => ApiError::Internal(Box::new(other)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, Json(json!({ "error": m }))).into_response(),
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response()
      }
      ApiError::Unavailable(m) => {
        let mut res =
          (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": m }))).into_response();
        res
          .headers_mut()
          .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        res
      }
      // Store details stay in the logs.
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          Json(json!({ "error": "internal server error" })),
        )
          .into_response()
      }
    }
  }
}
