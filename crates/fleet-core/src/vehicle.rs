//! Vehicles: the claimable transport resources of the fleet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Enumerations ────────────────────────────────────────────────────────────

/// The body type of a vehicle. Assignment requests may ask for one.
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
pub enum VehicleCategory {
  Car,
  Suv,
  Pickup,
  Van,
  Minibus,
  Bus,
}

/// Lifecycle state of a vehicle.
///
/// Only `Available` vehicles can be claimed. `Reserved` and `InUse` are owned
/// by an assignment; `Maintenance` is set by operators.
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
pub enum VehicleState {
  Available,
  InUse,
  Maintenance,
  Reserved,
}

impl VehicleState {
  /// Whether an assignment currently holds this vehicle.
  pub fn is_claimed(self) -> bool { matches!(self, Self::InUse | Self::Reserved) }
}

// ─── Vehicle ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
  pub vehicle_id:  Uuid,
  /// Licence plate; unique across the fleet.
  pub plate:       String,
  pub make:        String,
  pub model:       String,
  pub year:        Option<i32>,
  pub category:    VehicleCategory,
  /// Seats available to passengers (driver excluded).
  pub capacity:    u32,
  pub odometer_km: f64,
  pub state:       VehicleState,
  pub created_at:  DateTime<Utc>,
}

impl Vehicle {
  /// Whether this vehicle can carry `passengers` people.
  pub fn fits(&self, passengers: u32) -> bool { self.capacity >= passengers }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::FleetStore::add_vehicle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVehicle {
  pub plate:       String,
  pub make:        String,
  pub model:       String,
  #[serde(default)]
  pub year:        Option<i32>,
  pub category:    VehicleCategory,
  pub capacity:    u32,
  #[serde(default)]
  pub odometer_km: f64,
}

impl NewVehicle {
  pub fn new(
    plate: impl Into<String>,
    category: VehicleCategory,
    capacity: u32,
  ) -> Self {
    Self {
      plate: plate.into(),
      make: String::new(),
      model: String::new(),
      year: None,
      category,
      capacity,
      odometer_km: 0.0,
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.plate.trim().is_empty() {
      return Err(Error::Validation("plate must not be empty".into()));
    }
    if self.capacity == 0 {
      return Err(Error::Validation("capacity must be at least 1".into()));
    }
    validate_odometer(self.odometer_km)
  }
}

/// Partial update for descriptive vehicle fields. State is never changed
/// through this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleUpdate {
  pub make:        Option<String>,
  pub model:       Option<String>,
  pub year:        Option<i32>,
  pub category:    Option<VehicleCategory>,
  pub capacity:    Option<u32>,
  pub odometer_km: Option<f64>,
}

impl VehicleUpdate {
  pub fn validate(&self) -> Result<()> {
    if self.capacity == Some(0) {
      return Err(Error::Validation("capacity must be at least 1".into()));
    }
    self.odometer_km.map_or(Ok(()), validate_odometer)
  }
}

fn validate_odometer(km: f64) -> Result<()> {
  if !km.is_finite() || km < 0.0 {
    return Err(Error::Validation(
      "odometer_km must be a non-negative number".into(),
    ));
  }
  Ok(())
}
