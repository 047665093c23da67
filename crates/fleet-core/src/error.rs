//! Error types for `fleet-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{
  assignment::AssignmentState, driver::ShiftConflict, vehicle::VehicleState,
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("vehicle not found: {0}")]
  VehicleNotFound(Uuid),

  #[error("driver not found: {0}")]
  DriverNotFound(Uuid),

  #[error("assignment not found: {0}")]
  AssignmentNotFound(Uuid),

  #[error("{0}")]
  Shift(#[from] ShiftConflict),

  #[error("cannot {action} an assignment that is {from}")]
  InvalidTransition {
    from:   AssignmentState,
    action: &'static str,
  },

  /// The vehicle is held by an assignment (or otherwise not in a state that
  /// allows the requested change).
  #[error("vehicle {vehicle_id} is {state}")]
  VehicleBusy {
    vehicle_id: Uuid,
    state:      VehicleState,
  },

  #[error("{what} {value:?} already exists")]
  Duplicate {
    what:  &'static str,
    value: String,
  },

  /// A vehicle or driver was claimed by someone else between selection and
  /// commit.
  #[error("claim conflict: {0}")]
  ClaimConflict(String),

  #[error("invalid input: {0}")]
  Validation(String),
}

impl Error {
  /// Short machine-readable code for the error, used in API responses.
  pub fn reason(&self) -> &'static str {
    match self {
      Self::VehicleNotFound(_)
      | Self::DriverNotFound(_)
      | Self::AssignmentNotFound(_) => "not_found",
      Self::Shift(c) => c.reason(),
      Self::InvalidTransition { .. } => "invalid_transition",
      Self::VehicleBusy { .. } => "vehicle_busy",
      Self::Duplicate { .. } => "duplicate",
      Self::ClaimConflict(_) => "claim_conflict",
      Self::Validation(_) => "validation",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Implemented by every store backend error so that callers can recover the
/// domain error (not found, conflict, ...) without knowing the backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The domain error this failure wraps, if any. `None` means an
  /// infrastructure failure (I/O, corrupt row, ...).
  fn as_core(&self) -> Option<&Error>;
}

/// Failure of an operation that can be rejected by domain rules or fail in
/// the backing store.
#[derive(Debug, Error)]
pub enum OpError<E> {
  #[error(transparent)]
  Domain(#[from] Error),

  #[error(transparent)]
  Store(E),
}
