//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use nudge_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Engine(#[from] CoreError),
}

impl From<JsonRejection> for ApiError {
  fn from(r: JsonRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(r: QueryRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(r: PathRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Engine(e) => match e {
        CoreError::InvalidPosition { .. } | CoreError::SelfSignal(_) => {
          StatusCode::BAD_REQUEST
        }
        CoreError::NotActive(_) => StatusCode::CONFLICT,
        CoreError::UnknownActor(_) => StatusCode::NOT_FOUND,
        CoreError::AffinityUpdateFailed { .. }
        | CoreError::InvalidConfig(_)
        | CoreError::Store(_)
        | CoreError::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let message = match &self {
      ApiError::NotFound(m) | ApiError::BadRequest(m) => m.clone(),
      ApiError::Engine(e) => e.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
