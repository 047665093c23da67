//! Assignments: requests for transportation and their lifecycle.
//!
//! ```text
//!                 auto / manual claim          start           complete
//!  pending_auto ───────────────────────▶ scheduled ───▶ active ───────▶ completed
//!     │    ▲  │                              │             │
//!     │    │  └─ no vehicle / no driver      │             │
//!     │    │          ▼                      │             │
//!     │    └──── failed_auto                 │             │
//!     │  requeue      │                      │             │
//!     └───────────────┴──────────────────────┴─────────────┴──▶ cancelled
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result, vehicle::VehicleCategory};

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
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssignmentState {
  /// Waiting for the auto-assignment batch.
  PendingAuto,
  Scheduled,
  Active,
  Completed,
  Cancelled,
  /// The last auto-assignment run found no vehicle or no driver.
  FailedAuto,
}

/// Operator-driven lifecycle actions (auto-assignment is handled by
/// [`crate::assign::AutoAssigner`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AssignmentAction {
  Start,
  Complete,
  Cancel,
  Requeue,
}

impl AssignmentState {
  /// Whether an assignment in this state must hold a vehicle and a driver.
  pub fn holds_resources(self) -> bool {
    matches!(self, Self::Scheduled | Self::Active)
  }

  /// The state reached by applying `action`, or
  /// [`Error::InvalidTransition`].
  pub fn after(self, action: AssignmentAction) -> Result<Self> {
    use AssignmentAction as A;
    use AssignmentState as S;

    let next = match (self, action) {
      (S::Scheduled, A::Start) => S::Active,
      (S::Active, A::Complete) => S::Completed,
      (S::PendingAuto | S::FailedAuto | S::Scheduled | S::Active, A::Cancel) => {
        S::Cancelled
      }
      (S::FailedAuto, A::Requeue) => S::PendingAuto,
      (from, action) => {
        return Err(Error::InvalidTransition { from, action: action.into() });
      }
    };
    Ok(next)
  }
}

// ─── Assignment ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub lat: f64,
  pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
  pub assignment_id:      Uuid,
  pub requested_start:    DateTime<Utc>,
  pub expected_end:       Option<DateTime<Utc>>,
  pub origin:             String,
  pub destination:        String,
  pub origin_coords:      Option<GeoPoint>,
  pub destination_coords: Option<GeoPoint>,
  /// Number of passengers that must fit in the vehicle.
  pub passengers:         u32,
  /// If set, only vehicles of this category qualify.
  pub preferred_category: Option<VehicleCategory>,
  pub requester_name:     String,
  pub requester_rank:     Option<String>,
  pub vehicle_id:         Option<Uuid>,
  pub driver_id:          Option<Uuid>,
  pub state:              AssignmentState,
  /// Set only when the assignment is completed.
  pub distance_km:        Option<f64>,
  pub notes:              Option<String>,
  pub created_at:         DateTime<Utc>,
}

/// Input to [`crate::store::FleetStore::add_assignment`]. New assignments
/// always start in [`AssignmentState::PendingAuto`] with no resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssignment {
  pub requested_start:    DateTime<Utc>,
  #[serde(default)]
  pub expected_end:       Option<DateTime<Utc>>,
  pub origin:             String,
  pub destination:        String,
  #[serde(default)]
  pub origin_coords:      Option<GeoPoint>,
  #[serde(default)]
  pub destination_coords: Option<GeoPoint>,
  pub passengers:         u32,
  #[serde(default)]
  pub preferred_category: Option<VehicleCategory>,
  pub requester_name:     String,
  #[serde(default)]
  pub requester_rank:     Option<String>,
  #[serde(default)]
  pub notes:              Option<String>,
}

impl NewAssignment {
  /// Convenience constructor with all optional fields unset.
  pub fn new(requested_start: DateTime<Utc>, passengers: u32) -> Self {
    Self {
      requested_start,
      expected_end: None,
      origin: String::new(),
      destination: String::new(),
      origin_coords: None,
      destination_coords: None,
      passengers,
      preferred_category: None,
      requester_name: String::new(),
      requester_rank: None,
      notes: None,
    }
  }

  pub fn with_category(mut self, category: VehicleCategory) -> Self {
    self.preferred_category = Some(category);
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.passengers == 0 {
      return Err(Error::Validation("passengers must be at least 1".into()));
    }
    if let Some(end) = self.expected_end
      && end <= self.requested_start
    {
      return Err(Error::Validation(
        "expected_end must be after requested_start".into(),
      ));
    }
    Ok(())
  }
}
