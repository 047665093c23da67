//! Read-side aggregates for the operations dashboard.
//!
//! Pure reporting: nothing here feeds back into assignment decisions.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  assignment::AssignmentState,
  driver::DriverState,
  vehicle::{VehicleCategory, VehicleState},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
  pub vehicles:           u64,
  pub drivers:            u64,
  pub assignments:        u64,
  pub vehicles_available: u64,
  pub drivers_available:  u64,
  pub assignments_active: u64,
}

/// A driver whose licence expires inside the alert window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringLicense {
  pub driver_id:      Uuid,
  pub first_name:     String,
  pub last_name:      String,
  pub license_number: String,
  pub license_expiry: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftActivity {
  pub total:      u64,
  pub check_ins:  u64,
  pub check_outs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alerts {
  pub licenses_expiring:    u64,
  pub vehicles_maintenance: u64,
  pub assignments_failed:   u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
  pub generated_at:          DateTime<Utc>,
  pub totals:                Totals,
  pub vehicles_by_state:     BTreeMap<VehicleState, u64>,
  pub vehicles_by_category:  BTreeMap<VehicleCategory, u64>,
  pub drivers_by_state:      BTreeMap<DriverState, u64>,
  pub assignments_by_state:  BTreeMap<AssignmentState, u64>,
  /// Sorted by expiry date, soonest first.
  pub expiring_licenses:     Vec<ExpiringLicense>,
  pub drivers_valid_license: u64,
  /// Shift events over the last seven days.
  pub shifts_last_7_days:    ShiftActivity,
  pub alerts:                Alerts,
}

impl DashboardStats {
  /// Fill in the derived sections (`totals` availability counters and
  /// `alerts`) from the per-state maps.
  pub fn derive_summary(&mut self) {
    let count = |n: Option<&u64>| n.copied().unwrap_or(0);

    self.totals.vehicles_available =
      count(self.vehicles_by_state.get(&VehicleState::Available));
    self.totals.drivers_available =
      count(self.drivers_by_state.get(&DriverState::Available));
    self.totals.assignments_active =
      count(self.assignments_by_state.get(&AssignmentState::Active));

    self.alerts = Alerts {
      licenses_expiring:    self.expiring_licenses.len() as u64,
      vehicles_maintenance: count(
        self.vehicles_by_state.get(&VehicleState::Maintenance),
      ),
      assignments_failed:   count(
        self.assignments_by_state.get(&AssignmentState::FailedAuto),
      ),
    };
  }
}
