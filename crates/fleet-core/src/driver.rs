//! Drivers and the shift state machine.
//!
//! A driver's availability is driven from two directions: shift check-in and
//! check-out (operator actions), and claim/release by assignments. The shift
//! transitions are validated here so every store backend enforces the same
//! rules.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;
use uuid::Uuid;

use crate::{Error, Result};

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DriverState {
  /// On shift and free to be claimed.
  Available,
  /// On shift and bound to a scheduled or active assignment.
  EnRoute,
  /// Off shift.
  #[default]
  DayOff,
  Unavailable,
}

/// Why a shift transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShiftConflict {
  #[error("shift already started")]
  AlreadyStarted,
  #[error("no active shift")]
  NoActiveShift,
  #[error("cannot end shift while en route")]
  EnRoute,
}

impl ShiftConflict {
  pub fn reason(self) -> &'static str {
    match self {
      Self::AlreadyStarted => "shift_already_started",
      Self::NoActiveShift => "no_active_shift",
      Self::EnRoute => "en_route",
    }
  }
}

impl DriverState {
  /// The state after a shift check-in.
  pub fn check_in(self) -> Result<Self, ShiftConflict> {
    match self {
      Self::DayOff | Self::Unavailable => Ok(Self::Available),
      Self::Available | Self::EnRoute => Err(ShiftConflict::AlreadyStarted),
    }
  }

  /// The state after a shift check-out.
  pub fn check_out(self) -> Result<Self, ShiftConflict> {
    match self {
      Self::Available => Ok(Self::DayOff),
      Self::EnRoute => Err(ShiftConflict::EnRoute),
      Self::DayOff | Self::Unavailable => Err(ShiftConflict::NoActiveShift),
    }
  }

  /// The state after a shift event of `kind`.
  pub fn apply(self, kind: ShiftKind) -> Result<Self, ShiftConflict> {
    match kind {
      ShiftKind::CheckIn => self.check_in(),
      ShiftKind::CheckOut => self.check_out(),
    }
  }
}

// ─── Driver ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
  pub driver_id:        Uuid,
  /// National identity number; unique.
  pub national_id:      String,
  pub first_name:       String,
  pub last_name:        String,
  pub license_number:   String,
  pub license_expiry:   NaiveDate,
  pub state:            DriverState,
  /// When the driver was last claimed by an assignment. `None` if never.
  pub last_assigned_at: Option<DateTime<Utc>>,
  pub created_at:       DateTime<Utc>,
}

impl Driver {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }

  pub fn license_valid_on(&self, day: NaiveDate) -> bool {
    self.license_expiry >= day
  }
}

/// Input to [`crate::store::FleetStore::add_driver`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDriver {
  pub national_id:    String,
  pub first_name:     String,
  pub last_name:      String,
  pub license_number: String,
  pub license_expiry: NaiveDate,
  /// Initial state; defaults to off shift.
  #[serde(default)]
  pub state:          DriverState,
}

impl NewDriver {
  pub fn validate(&self) -> Result<()> {
    if self.national_id.trim().is_empty() {
      return Err(Error::Validation("national_id must not be empty".into()));
    }
    if self.license_number.trim().is_empty() {
      return Err(Error::Validation("license_number must not be empty".into()));
    }
    if self.state == DriverState::EnRoute {
      return Err(Error::Validation(
        "a new driver cannot start en route".into(),
      ));
    }
    Ok(())
  }
}

// ─── Shift log ───────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShiftKind {
  CheckIn,
  CheckOut,
}

/// Append-only log entry of a shift event. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftRecord {
  pub record_id:   Uuid,
  pub driver_id:   Uuid,
  pub recorded_at: DateTime<Utc>,
  pub kind:        ShiftKind,
  pub notes:       Option<String>,
}

/// Result of a successful check-in or check-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftChange {
  pub driver: Driver,
  pub record: ShiftRecord,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn check_in_from_off_states() {
    assert_eq!(DriverState::DayOff.check_in(), Ok(DriverState::Available));
    assert_eq!(DriverState::Unavailable.check_in(), Ok(DriverState::Available));
  }

  #[test]
  fn check_in_while_on_shift_conflicts() {
    assert_eq!(
      DriverState::Available.check_in(),
      Err(ShiftConflict::AlreadyStarted)
    );
    assert_eq!(
      DriverState::EnRoute.check_in(),
      Err(ShiftConflict::AlreadyStarted)
    );
  }

  #[test]
  fn check_out_only_from_available() {
    assert_eq!(DriverState::Available.check_out(), Ok(DriverState::DayOff));
    assert_eq!(DriverState::EnRoute.check_out(), Err(ShiftConflict::EnRoute));
    assert_eq!(
      DriverState::DayOff.check_out(),
      Err(ShiftConflict::NoActiveShift)
    );
    assert_eq!(
      DriverState::Unavailable.check_out(),
      Err(ShiftConflict::NoActiveShift)
    );
  }

  #[test]
  fn conflict_messages() {
    assert_eq!(
      ShiftConflict::EnRoute.to_string(),
      "cannot end shift while en route"
    );
    assert_eq!(ShiftConflict::AlreadyStarted.to_string(), "shift already started");
    assert_eq!(ShiftConflict::NoActiveShift.to_string(), "no active shift");
  }
}
