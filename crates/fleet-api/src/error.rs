//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use fleet_core::{OpError, StoreError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A domain rule refused the request.
  #[error("{message}")]
  Rejected {
    status:  StatusCode,
    reason:  &'static str,
    message: String,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Split a store error into a domain rejection or an internal failure.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    match e.as_core() {
      Some(core) => Self::from_core(core),
      None => Self::Store(Box::new(e)),
    }
  }

  pub fn from_core(e: &fleet_core::Error) -> Self {
    let reason = e.reason();
    let status = match reason {
      "not_found" => StatusCode::NOT_FOUND,
      "validation" => StatusCode::BAD_REQUEST,
      _ => StatusCode::CONFLICT,
    };
    Self::Rejected { status, reason, message: e.to_string() }
  }
}

impl From<fleet_core::Error> for ApiError {
  fn from(e: fleet_core::Error) -> Self { Self::from_core(&e) }
}

impl<E: StoreError> From<OpError<E>> for ApiError {
  fn from(e: OpError<E>) -> Self {
    match e {
      OpError::Domain(core) => Self::from_core(&core),
      OpError::Store(store) => Self::from_store(store),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::NotFound(m) => (
        StatusCode::NOT_FOUND,
        json!({ "error": m, "reason": "not_found" }),
      ),
      ApiError::BadRequest(m) => (
        StatusCode::BAD_REQUEST,
        json!({ "error": m, "reason": "validation" }),
      ),
      ApiError::Rejected { status, reason, message } => {
        (*status, json!({ "error": message, "reason": reason }))
      }
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() }))
      }
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use fleet_core::{
    Error, assignment::AssignmentState, driver::ShiftConflict,
  };
  use uuid::Uuid;

  use super::*;

  fn status_of(e: Error) -> StatusCode {
    match ApiError::from(e) {
      ApiError::Rejected { status, .. } => status,
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn domain_errors_map_to_status() {
    assert_eq!(status_of(Error::DriverNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(status_of(Error::Validation("x".into())), StatusCode::BAD_REQUEST);
    assert_eq!(status_of(ShiftConflict::EnRoute.into()), StatusCode::CONFLICT);
    assert_eq!(
      status_of(Error::InvalidTransition {
        from:   AssignmentState::Completed,
        action: "cancel",
      }),
      StatusCode::CONFLICT
    );
  }

  #[test]
  fn shift_conflict_keeps_reason() {
    match ApiError::from(Error::from(ShiftConflict::EnRoute)) {
      ApiError::Rejected { reason, message, .. } => {
        assert_eq!(reason, "en_route");
        assert_eq!(message, "cannot end shift while en route");
      }
      other => panic!("unexpected {other:?}"),
    }
  }
}
