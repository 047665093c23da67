//! The `FleetStore` and `AssignmentPool` traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g. `fleet-store-sqlite`).
//! Higher layers (`fleet-api`, `fleet-server`) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  assignment::{Assignment, AssignmentState, NewAssignment},
  driver::{Driver, DriverState, NewDriver, ShiftChange, ShiftRecord},
  error::StoreError,
  stats::DashboardStats,
  vehicle::{NewVehicle, Vehicle, VehicleCategory, VehicleState, VehicleUpdate},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`FleetStore::list_vehicles`].
#[derive(Debug, Clone, Default)]
pub struct VehicleQuery {
  pub state:        Option<VehicleState>,
  pub category:     Option<VehicleCategory>,
  pub min_capacity: Option<u32>,
  /// Case-insensitive substring over plate, make and model.
  pub search:       Option<String>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

/// Parameters for [`FleetStore::list_drivers`].
#[derive(Debug, Clone, Default)]
pub struct DriverQuery {
  pub state:  Option<DriverState>,
  /// Case-insensitive substring over national id, names and licence number.
  pub search: Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// Parameters for [`FleetStore::list_assignments`].
#[derive(Debug, Clone, Default)]
pub struct AssignmentQuery {
  pub state:         Option<AssignmentState>,
  pub vehicle_id:    Option<Uuid>,
  pub driver_id:     Option<Uuid>,
  /// Case-insensitive substring over the requester name.
  pub requester:     Option<String>,
  pub starts_after:  Option<DateTime<Utc>>,
  pub starts_before: Option<DateTime<Utc>>,
  pub limit:         Option<usize>,
  pub offset:        Option<usize>,
}

/// Parameters for [`FleetStore::list_shift_records`].
#[derive(Debug, Clone, Default)]
pub struct ShiftQuery {
  pub driver_id:       Option<Uuid>,
  pub recorded_after:  Option<DateTime<Utc>>,
  pub recorded_before: Option<DateTime<Utc>>,
  pub limit:           Option<usize>,
  pub offset:          Option<usize>,
}

/// One page of a listing plus the total number of matching rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub total: u64,
  pub items: Vec<T>,
}

// ─── Claims ──────────────────────────────────────────────────────────────────

/// An all-or-nothing binding of one vehicle and one driver to a pending
/// assignment.
#[derive(Debug, Clone)]
pub struct Claim {
  pub assignment_id: Uuid,
  pub vehicle_id:    Uuid,
  pub driver_id:     Uuid,
  /// `Reserved` or `InUse`.
  pub vehicle_state: VehicleState,
  /// Stamped as the driver's `last_assigned_at`.
  pub claimed_at:    DateTime<Utc>,
  /// The vehicle must still seat this many when the claim lands.
  pub passengers:    u32,
  /// When set, the vehicle must still be of this category.
  pub category:      Option<VehicleCategory>,
}

/// What happened to a [`Claim`]. Every variant other than `Claimed` means
/// nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimResult {
  Claimed,
  /// The vehicle was no longer `available`, or no longer fits the request.
  VehicleTaken,
  /// The driver was no longer `available`.
  DriverTaken,
  /// The assignment was no longer `pending_auto`.
  AssignmentResolved,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// The store operations the auto-assigner needs.
///
/// Implementations must make [`claim`](Self::claim) atomic: each of the three
/// rows is updated with a compare-and-set on its current state, and any miss
/// rolls the whole claim back. The vehicle's compare-and-set also re-checks
/// the claim's capacity and category, since both can be edited after the
/// pools were read.
pub trait AssignmentPool: Send + Sync {
  type Error: StoreError;

  /// All `pending_auto` assignments, ordered by `requested_start` and then by
  /// creation order.
  fn pending_assignments(
    &self,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  /// All `available` vehicles in creation order.
  fn available_vehicles(
    &self,
  ) -> impl Future<Output = Result<Vec<Vehicle>, Self::Error>> + Send + '_;

  /// All `available` drivers in creation order.
  fn available_drivers(
    &self,
  ) -> impl Future<Output = Result<Vec<Driver>, Self::Error>> + Send + '_;

  /// Atomically bind a vehicle and a driver to a pending assignment.
  fn claim<'a>(
    &'a self,
    claim: &'a Claim,
  ) -> impl Future<Output = Result<ClaimResult, Self::Error>> + Send + 'a;

  /// Move a `pending_auto` assignment to `failed_auto`. Returns `false`
  /// (without writing) if it was no longer pending.
  fn fail_assignment(
    &self,
    assignment_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

/// Abstraction over a fleet store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait FleetStore: AssignmentPool {
  // ── Vehicles ──────────────────────────────────────────────────────────

  /// Persist a new vehicle in state `available`.
  fn add_vehicle(
    &self,
    input: NewVehicle,
  ) -> impl Future<Output = Result<Vehicle, Self::Error>> + Send + '_;

  fn get_vehicle(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Vehicle>, Self::Error>> + Send + '_;

  fn list_vehicles<'a>(
    &'a self,
    query: &'a VehicleQuery,
  ) -> impl Future<Output = Result<Page<Vehicle>, Self::Error>> + Send + 'a;

  /// Apply a partial update to descriptive fields.
  fn update_vehicle(
    &self,
    id: Uuid,
    update: VehicleUpdate,
  ) -> impl Future<Output = Result<Vehicle, Self::Error>> + Send + '_;

  /// Toggle `available` ↔ `maintenance`. A claimed vehicle cannot be sent to
  /// maintenance.
  fn set_maintenance(
    &self,
    id: Uuid,
    maintenance: bool,
  ) -> impl Future<Output = Result<Vehicle, Self::Error>> + Send + '_;

  // ── Drivers ───────────────────────────────────────────────────────────

  fn add_driver(
    &self,
    input: NewDriver,
  ) -> impl Future<Output = Result<Driver, Self::Error>> + Send + '_;

  fn get_driver(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Driver>, Self::Error>> + Send + '_;

  fn list_drivers<'a>(
    &'a self,
    query: &'a DriverQuery,
  ) -> impl Future<Output = Result<Page<Driver>, Self::Error>> + Send + 'a;

  /// Start a shift: append a `check_in` record and set the driver
  /// `available`. Fails with a shift conflict and writes nothing if the
  /// driver is already on shift.
  fn check_in(
    &self,
    driver_id: Uuid,
    notes: Option<String>,
  ) -> impl Future<Output = Result<ShiftChange, Self::Error>> + Send + '_;

  /// End a shift: append a `check_out` record and set the driver `day_off`.
  fn check_out(
    &self,
    driver_id: Uuid,
    notes: Option<String>,
  ) -> impl Future<Output = Result<ShiftChange, Self::Error>> + Send + '_;

  /// Shift records, newest first.
  fn list_shift_records<'a>(
    &'a self,
    query: &'a ShiftQuery,
  ) -> impl Future<Output = Result<Page<ShiftRecord>, Self::Error>> + Send + 'a;

  // ── Assignments ───────────────────────────────────────────────────────

  /// Persist a new request in state `pending_auto`.
  fn add_assignment(
    &self,
    input: NewAssignment,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  fn get_assignment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Assignment>, Self::Error>> + Send + '_;

  /// Assignments, latest requested start first.
  fn list_assignments<'a>(
    &'a self,
    query: &'a AssignmentQuery,
  ) -> impl Future<Output = Result<Page<Assignment>, Self::Error>> + Send + 'a;

  /// `scheduled → active`; the vehicle becomes `in_use`.
  fn start_assignment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  /// `active → completed`; releases the vehicle (adding `distance_km` to its
  /// odometer) and the driver.
  fn complete_assignment(
    &self,
    id: Uuid,
    distance_km: Option<f64>,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  /// Cancel a non-terminal assignment, releasing whatever it holds.
  fn cancel_assignment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  /// `failed_auto → pending_auto`.
  fn requeue_assignment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  // ── Reporting ─────────────────────────────────────────────────────────

  /// Aggregate counters for the dashboard as of `today`.
  fn dashboard(
    &self,
    today: NaiveDate,
    license_alert_days: u32,
  ) -> impl Future<Output = Result<DashboardStats, Self::Error>> + Send + '_;
}
