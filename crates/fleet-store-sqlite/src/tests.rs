//! Integration tests for `SqliteStore` against an in-memory database.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use fleet_core::{
  Error as CoreError, OpError,
  assign::{
    AssignerConfig, AssignmentOutcome, AutoAssigner, select_driver,
    select_vehicle,
  },
  assignment::{AssignmentState, NewAssignment},
  driver::{DriverState, NewDriver, ShiftConflict, ShiftKind},
  store::{
    AssignmentPool, AssignmentQuery, Claim, ClaimResult, DriverQuery,
    FleetStore, ShiftQuery, VehicleQuery,
  },
  vehicle::{NewVehicle, VehicleCategory, VehicleState, VehicleUpdate},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap() }

fn new_driver(national_id: &str, state: DriverState) -> NewDriver {
  NewDriver {
    national_id:    national_id.into(),
    first_name:     "Ana".into(),
    last_name:      format!("Driver {national_id}"),
    license_number: format!("LIC-{national_id}"),
    license_expiry: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
    state,
  }
}

fn core_err(err: Error) -> CoreError {
  match err {
    Error::Core(e) => e,
    other => panic!("expected a domain error, got {other:?}"),
  }
}

fn assigner(s: &SqliteStore) -> AutoAssigner<SqliteStore> {
  AutoAssigner::new(Arc::new(s.clone()), AssignerConfig::default())
}

// ─── Vehicles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_vehicle() {
  let s = store().await;

  let mut input = NewVehicle::new("ABC-123", VehicleCategory::Van, 12);
  input.make = "Toyota".into();
  input.model = "Hiace".into();
  let vehicle = s.add_vehicle(input).await.unwrap();
  assert_eq!(vehicle.state, VehicleState::Available);

  let fetched = s.get_vehicle(vehicle.vehicle_id).await.unwrap().unwrap();
  assert_eq!(fetched.plate, "ABC-123");
  assert_eq!(fetched.capacity, 12);
  assert_eq!(fetched.created_at, vehicle.created_at);
}

#[tokio::test]
async fn get_vehicle_missing_returns_none() {
  let s = store().await;
  assert!(s.get_vehicle(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_plate_rejected() {
  let s = store().await;
  s.add_vehicle(NewVehicle::new("DUP-1", VehicleCategory::Car, 4))
    .await
    .unwrap();

  let err = s
    .add_vehicle(NewVehicle::new("DUP-1", VehicleCategory::Suv, 6))
    .await
    .unwrap_err();
  assert!(matches!(
    core_err(err),
    CoreError::Duplicate { what: "plate", .. }
  ));
}

#[tokio::test]
async fn zero_capacity_rejected() {
  let s = store().await;
  let err = s
    .add_vehicle(NewVehicle::new("ZERO", VehicleCategory::Car, 0))
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::Validation(_)));
}

#[tokio::test]
async fn list_vehicles_filters_and_pages() {
  let s = store().await;
  s.add_vehicle(NewVehicle::new("CAR-1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  s.add_vehicle(NewVehicle::new("VAN-1", VehicleCategory::Van, 12))
    .await
    .unwrap();
  s.add_vehicle(NewVehicle::new("VAN-2", VehicleCategory::Van, 15))
    .await
    .unwrap();

  let vans = s
    .list_vehicles(&VehicleQuery {
      category: Some(VehicleCategory::Van),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(vans.total, 2);

  let big = s
    .list_vehicles(&VehicleQuery {
      min_capacity: Some(13),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(big.total, 1);
  assert_eq!(big.items[0].plate, "VAN-2");

  let search = s
    .list_vehicles(&VehicleQuery {
      search: Some("van".into()),
      limit: Some(1),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(search.total, 2);
  assert_eq!(search.items.len(), 1);
}

#[tokio::test]
async fn update_vehicle_is_partial() {
  let s = store().await;
  let v = s
    .add_vehicle(NewVehicle::new("UPD-1", VehicleCategory::Car, 4))
    .await
    .unwrap();

  let updated = s
    .update_vehicle(v.vehicle_id, VehicleUpdate {
      model: Some("Corolla".into()),
      odometer_km: Some(1200.0),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(updated.model, "Corolla");
  assert_eq!(updated.odometer_km, 1200.0);
  assert_eq!(updated.capacity, 4);
  assert_eq!(updated.category, VehicleCategory::Car);
}

#[tokio::test]
async fn maintenance_toggle() {
  let s = store().await;
  let v = s
    .add_vehicle(NewVehicle::new("MNT-1", VehicleCategory::Car, 4))
    .await
    .unwrap();

  let v1 = s.set_maintenance(v.vehicle_id, true).await.unwrap();
  assert_eq!(v1.state, VehicleState::Maintenance);
  assert!(s.available_vehicles().await.unwrap().is_empty());

  let v2 = s.set_maintenance(v.vehicle_id, false).await.unwrap();
  assert_eq!(v2.state, VehicleState::Available);
}

#[tokio::test]
async fn claimed_vehicle_cannot_enter_maintenance() {
  let s = store().await;
  let v = s
    .add_vehicle(NewVehicle::new("BUSY-1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  s.add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();
  s.add_assignment(NewAssignment::new(t0(), 2)).await.unwrap();
  assigner(&s).run_at(t0()).await.unwrap();

  let err = s.set_maintenance(v.vehicle_id, true).await.unwrap_err();
  assert!(matches!(core_err(err), CoreError::VehicleBusy { .. }));

  let err = s
    .update_vehicle(v.vehicle_id, VehicleUpdate {
      capacity: Some(1),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::VehicleBusy { .. }));
}

// ─── Drivers and shifts ──────────────────────────────────────────────────────

#[tokio::test]
async fn new_driver_defaults_to_day_off() {
  let s = store().await;
  let d = s
    .add_driver(new_driver("D1", DriverState::default()))
    .await
    .unwrap();
  assert_eq!(d.state, DriverState::DayOff);
  assert!(d.last_assigned_at.is_none());
}

#[tokio::test]
async fn duplicate_national_id_rejected() {
  let s = store().await;
  s.add_driver(new_driver("D1", DriverState::DayOff))
    .await
    .unwrap();
  let err = s
    .add_driver(new_driver("D1", DriverState::DayOff))
    .await
    .unwrap_err();
  assert!(matches!(
    core_err(err),
    CoreError::Duplicate { what: "national_id", .. }
  ));
}

#[tokio::test]
async fn check_in_from_day_off() {
  let s = store().await;
  let d = s
    .add_driver(new_driver("D1", DriverState::DayOff))
    .await
    .unwrap();

  let change = s
    .check_in(d.driver_id, Some("morning".into()))
    .await
    .unwrap();
  assert_eq!(change.driver.state, DriverState::Available);
  assert_eq!(change.record.kind, ShiftKind::CheckIn);
  assert_eq!(change.record.notes.as_deref(), Some("morning"));

  let log = s
    .list_shift_records(&ShiftQuery {
      driver_id: Some(d.driver_id),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(log.total, 1);
  assert_eq!(log.items[0].record_id, change.record.record_id);
}

#[tokio::test]
async fn double_check_in_conflicts() {
  let s = store().await;
  let d = s
    .add_driver(new_driver("D1", DriverState::DayOff))
    .await
    .unwrap();
  s.check_in(d.driver_id, None).await.unwrap();

  let err = s.check_in(d.driver_id, None).await.unwrap_err();
  assert!(matches!(
    core_err(err),
    CoreError::Shift(ShiftConflict::AlreadyStarted)
  ));
}

#[tokio::test]
async fn check_out_without_shift_conflicts() {
  let s = store().await;
  let d = s
    .add_driver(new_driver("D1", DriverState::DayOff))
    .await
    .unwrap();

  let err = s.check_out(d.driver_id, None).await.unwrap_err();
  assert!(matches!(
    core_err(err),
    CoreError::Shift(ShiftConflict::NoActiveShift)
  ));
}

#[tokio::test]
async fn en_route_check_out_rejected_without_record() {
  let s = store().await;
  s.add_vehicle(NewVehicle::new("V1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  let d = s
    .add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();
  s.add_assignment(NewAssignment::new(t0(), 2)).await.unwrap();
  assigner(&s).run_at(t0()).await.unwrap();

  let err = s.check_out(d.driver_id, None).await.unwrap_err();
  let err = core_err(err);
  assert!(matches!(err, CoreError::Shift(ShiftConflict::EnRoute)));
  assert_eq!(err.to_string(), "cannot end shift while en route");

  let driver = s.get_driver(d.driver_id).await.unwrap().unwrap();
  assert_eq!(driver.state, DriverState::EnRoute);
  let log = s.list_shift_records(&ShiftQuery::default()).await.unwrap();
  assert_eq!(log.total, 0);
}

#[tokio::test]
async fn check_in_unknown_driver() {
  let s = store().await;
  let err = s.check_in(Uuid::new_v4(), None).await.unwrap_err();
  assert!(matches!(core_err(err), CoreError::DriverNotFound(_)));
}

#[tokio::test]
async fn shift_records_are_append_only() {
  let s = store().await;
  let d = s
    .add_driver(new_driver("D1", DriverState::DayOff))
    .await
    .unwrap();
  s.check_in(d.driver_id, None).await.unwrap();

  let res = s
    .connection()
    .call(|conn| Ok(conn.execute("DELETE FROM shift_records", [])?))
    .await;
  assert!(res.is_err());

  let res = s
    .connection()
    .call(|conn| Ok(conn.execute("UPDATE shift_records SET notes = 'x'", [])?))
    .await;
  assert!(res.is_err());
}

#[tokio::test]
async fn list_drivers_by_state() {
  let s = store().await;
  s.add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();
  s.add_driver(new_driver("D2", DriverState::DayOff))
    .await
    .unwrap();

  let page = s
    .list_drivers(&DriverQuery {
      state: Some(DriverState::Available),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(page.total, 1);
  assert_eq!(page.items[0].national_id, "D1");
}

// ─── Auto-assignment ─────────────────────────────────────────────────────────

#[tokio::test]
async fn fitting_request_is_assigned() {
  let s = store().await;
  let v = s
    .add_vehicle(NewVehicle::new("V1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  let d = s
    .add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();
  let a = s.add_assignment(NewAssignment::new(t0(), 4)).await.unwrap();

  let outcomes = assigner(&s).run_at(t0()).await.unwrap();
  assert_eq!(outcomes, vec![AssignmentOutcome::Assigned {
    assignment_id: a.assignment_id,
    vehicle_id:    v.vehicle_id,
    driver_id:     d.driver_id,
  }]);

  let a = s.get_assignment(a.assignment_id).await.unwrap().unwrap();
  assert_eq!(a.state, AssignmentState::Scheduled);
  assert_eq!(a.vehicle_id, Some(v.vehicle_id));
  assert_eq!(a.driver_id, Some(d.driver_id));

  let v = s.get_vehicle(v.vehicle_id).await.unwrap().unwrap();
  assert_eq!(v.state, VehicleState::InUse);
  let d = s.get_driver(d.driver_id).await.unwrap().unwrap();
  assert_eq!(d.state, DriverState::EnRoute);
  assert_eq!(d.last_assigned_at, Some(t0()));
}

#[tokio::test]
async fn future_request_reserves_vehicle() {
  let s = store().await;
  let v = s
    .add_vehicle(NewVehicle::new("V1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  s.add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();
  s.add_assignment(NewAssignment::new(t0() + Duration::hours(3), 2))
    .await
    .unwrap();

  assigner(&s).run_at(t0()).await.unwrap();
  let v = s.get_vehicle(v.vehicle_id).await.unwrap().unwrap();
  assert_eq!(v.state, VehicleState::Reserved);
}

#[tokio::test]
async fn oversized_request_finds_no_vehicle() {
  let s = store().await;
  let v = s
    .add_vehicle(NewVehicle::new("V1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  let d = s
    .add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();
  let a = s.add_assignment(NewAssignment::new(t0(), 5)).await.unwrap();

  let outcomes = assigner(&s).run_at(t0()).await.unwrap();
  assert_eq!(outcomes, vec![AssignmentOutcome::NoVehicle {
    assignment_id: a.assignment_id,
  }]);

  let a = s.get_assignment(a.assignment_id).await.unwrap().unwrap();
  assert_eq!(a.state, AssignmentState::FailedAuto);
  assert!(a.vehicle_id.is_none());
  let v = s.get_vehicle(v.vehicle_id).await.unwrap().unwrap();
  assert_eq!(v.state, VehicleState::Available);
  let d = s.get_driver(d.driver_id).await.unwrap().unwrap();
  assert_eq!(d.state, DriverState::Available);
}

#[tokio::test]
async fn no_driver_leaves_vehicle_available() {
  let s = store().await;
  let v = s
    .add_vehicle(NewVehicle::new("V1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  s.add_driver(new_driver("D1", DriverState::DayOff))
    .await
    .unwrap();
  let a = s.add_assignment(NewAssignment::new(t0(), 2)).await.unwrap();

  let outcomes = assigner(&s).run_at(t0()).await.unwrap();
  assert_eq!(outcomes, vec![AssignmentOutcome::NoDriver {
    assignment_id: a.assignment_id,
  }]);

  let v = s.get_vehicle(v.vehicle_id).await.unwrap().unwrap();
  assert_eq!(v.state, VehicleState::Available);
}

#[tokio::test]
async fn second_run_is_a_no_op() {
  let s = store().await;
  s.add_vehicle(NewVehicle::new("V1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  s.add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();
  s.add_assignment(NewAssignment::new(t0(), 2)).await.unwrap();
  s.add_assignment(NewAssignment::new(t0(), 9)).await.unwrap();

  let first = assigner(&s).run_at(t0()).await.unwrap();
  assert_eq!(first.len(), 2);
  let second = assigner(&s).run_at(t0()).await.unwrap();
  assert!(second.is_empty());
}

#[tokio::test]
async fn preferred_category_is_strict() {
  let s = store().await;
  s.add_vehicle(NewVehicle::new("CAR", VehicleCategory::Car, 4))
    .await
    .unwrap();
  s.add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();
  s.add_assignment(
    NewAssignment::new(t0(), 2).with_category(VehicleCategory::Van),
  )
  .await
  .unwrap();

  let outcomes = assigner(&s).run_at(t0()).await.unwrap();
  assert!(matches!(outcomes[0], AssignmentOutcome::NoVehicle { .. }));
}

#[tokio::test]
async fn claim_is_all_or_nothing() {
  let s = store().await;
  let v = s
    .add_vehicle(NewVehicle::new("V1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  let d = s
    .add_driver(new_driver("D1", DriverState::DayOff))
    .await
    .unwrap();
  let a = s.add_assignment(NewAssignment::new(t0(), 2)).await.unwrap();

  // The driver is off shift, so the driver CAS misses.
  let result = s
    .claim(&Claim {
      assignment_id: a.assignment_id,
      vehicle_id:    v.vehicle_id,
      driver_id:     d.driver_id,
      vehicle_state: VehicleState::InUse,
      claimed_at:    t0(),
      passengers:    2,
      category:      None,
    })
    .await
    .unwrap();
  assert_eq!(result, ClaimResult::DriverTaken);

  let a = s.get_assignment(a.assignment_id).await.unwrap().unwrap();
  assert_eq!(a.state, AssignmentState::PendingAuto);
  assert!(a.vehicle_id.is_none());
  let v = s.get_vehicle(v.vehicle_id).await.unwrap().unwrap();
  assert_eq!(v.state, VehicleState::Available);
}

/// Select against the pools, let `edit` change the chosen vehicle, then claim.
async fn claim_after_edit(
  s: &SqliteStore,
  request: NewAssignment,
  edit: VehicleUpdate,
) -> ClaimResult {
  let a = s.add_assignment(request).await.unwrap();
  let vehicles = s.available_vehicles().await.unwrap();
  let drivers = s.available_drivers().await.unwrap();
  let vehicle = select_vehicle(&vehicles, &a).unwrap();
  let driver = select_driver(&drivers).unwrap();

  s.update_vehicle(vehicle.vehicle_id, edit).await.unwrap();

  s.claim(&Claim {
    assignment_id: a.assignment_id,
    vehicle_id:    vehicle.vehicle_id,
    driver_id:     driver.driver_id,
    vehicle_state: VehicleState::InUse,
    claimed_at:    t0(),
    passengers:    a.passengers,
    category:      a.preferred_category,
  })
  .await
  .unwrap()
}

#[tokio::test]
async fn claim_rechecks_capacity() {
  let s = store().await;
  s.add_vehicle(NewVehicle::new("VAN-1", VehicleCategory::Van, 8))
    .await
    .unwrap();
  let d = s
    .add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();

  let result = claim_after_edit(&s, NewAssignment::new(t0(), 6), VehicleUpdate {
    capacity: Some(2),
    ..Default::default()
  })
  .await;
  assert_eq!(result, ClaimResult::VehicleTaken);

  let v = &s.available_vehicles().await.unwrap()[0];
  assert_eq!(v.capacity, 2);
  assert_eq!(v.state, VehicleState::Available);
  let d = s.get_driver(d.driver_id).await.unwrap().unwrap();
  assert_eq!(d.state, DriverState::Available);
  assert!(d.last_assigned_at.is_none());
  let pending = s.pending_assignments().await.unwrap();
  assert_eq!(pending.len(), 1);
  assert!(pending[0].vehicle_id.is_none());
}

#[tokio::test]
async fn claim_rechecks_category() {
  let s = store().await;
  s.add_vehicle(NewVehicle::new("VAN-1", VehicleCategory::Van, 8))
    .await
    .unwrap();
  s.add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();

  let request = NewAssignment::new(t0(), 3).with_category(VehicleCategory::Van);
  let result = claim_after_edit(&s, request, VehicleUpdate {
    category: Some(VehicleCategory::Pickup),
    ..Default::default()
  })
  .await;
  assert_eq!(result, ClaimResult::VehicleTaken);

  let pending = s.pending_assignments().await.unwrap();
  assert_eq!(pending[0].state, AssignmentState::PendingAuto);
}

#[tokio::test]
async fn concurrent_batches_never_double_book() {
  let s = store().await;
  for i in 0..5 {
    s.add_vehicle(NewVehicle::new(format!("V{i}"), VehicleCategory::Van, 8))
      .await
      .unwrap();
    s.add_driver(new_driver(&format!("D{i}"), DriverState::Available))
      .await
      .unwrap();
  }
  for i in 0..12 {
    s.add_assignment(NewAssignment::new(t0() + Duration::minutes(i), 3))
      .await
      .unwrap();
  }

  let store = Arc::new(s.clone());
  let tasks: Vec<_> = (0..4)
    .map(|_| {
      let assigner = AutoAssigner::new(Arc::clone(&store), AssignerConfig::default());
      tokio::spawn(async move { assigner.run_at(t0()).await.unwrap() })
    })
    .collect();

  let mut assigned = 0u64;
  for task in tasks {
    for outcome in task.await.unwrap() {
      if outcome.is_assigned() {
        assigned += 1;
      }
    }
  }
  // Lost claims may leave some requests pending, never double-booked.
  assert!((1..=5).contains(&assigned));

  let scheduled = s
    .list_assignments(&AssignmentQuery {
      state: Some(AssignmentState::Scheduled),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(scheduled.total, assigned);

  let vehicles: HashSet<_> =
    scheduled.items.iter().filter_map(|a| a.vehicle_id).collect();
  let drivers: HashSet<_> =
    scheduled.items.iter().filter_map(|a| a.driver_id).collect();
  assert_eq!(vehicles.len() as u64, assigned);
  assert_eq!(drivers.len() as u64, assigned);
  for a in &scheduled.items {
    assert!(a.passengers <= 8);
  }
}

// ─── Manual assignment ───────────────────────────────────────────────────────

#[tokio::test]
async fn manual_assignment_ignores_category_but_checks_capacity() {
  let s = store().await;
  let small = s
    .add_vehicle(NewVehicle::new("SMALL", VehicleCategory::Car, 2))
    .await
    .unwrap();
  let car = s
    .add_vehicle(NewVehicle::new("CAR", VehicleCategory::Car, 4))
    .await
    .unwrap();
  let d = s
    .add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();
  let a = s
    .add_assignment(
      NewAssignment::new(t0(), 3).with_category(VehicleCategory::Bus),
    )
    .await
    .unwrap();
  let assigner = assigner(&s);

  let err = assigner
    .assign_manually(a.assignment_id, small.vehicle_id, d.driver_id)
    .await
    .unwrap_err();
  assert!(matches!(err, OpError::Domain(CoreError::Validation(_))));

  let done = assigner
    .assign_manually(a.assignment_id, car.vehicle_id, d.driver_id)
    .await
    .unwrap();
  assert_eq!(done.state, AssignmentState::Scheduled);
  assert_eq!(done.vehicle_id, Some(car.vehicle_id));
}

#[tokio::test]
async fn manual_assignment_with_busy_driver_conflicts() {
  let s = store().await;
  let v = s
    .add_vehicle(NewVehicle::new("V1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  let d = s
    .add_driver(new_driver("D1", DriverState::DayOff))
    .await
    .unwrap();
  let a = s.add_assignment(NewAssignment::new(t0(), 2)).await.unwrap();

  let err = assigner(&s)
    .assign_manually(a.assignment_id, v.vehicle_id, d.driver_id)
    .await
    .unwrap_err();
  assert!(matches!(err, OpError::Domain(CoreError::ClaimConflict(_))));

  let v = s.get_vehicle(v.vehicle_id).await.unwrap().unwrap();
  assert_eq!(v.state, VehicleState::Available);
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn start_and_complete_release_resources() {
  let s = store().await;
  let v = s
    .add_vehicle(NewVehicle::new("V1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  let d = s
    .add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();
  let a = s
    .add_assignment(NewAssignment::new(t0() + Duration::days(1), 2))
    .await
    .unwrap();
  assigner(&s).run_at(t0()).await.unwrap();

  let started = s.start_assignment(a.assignment_id).await.unwrap();
  assert_eq!(started.state, AssignmentState::Active);
  let vehicle = s.get_vehicle(v.vehicle_id).await.unwrap().unwrap();
  assert_eq!(vehicle.state, VehicleState::InUse);

  let done = s
    .complete_assignment(a.assignment_id, Some(42.5))
    .await
    .unwrap();
  assert_eq!(done.state, AssignmentState::Completed);
  assert_eq!(done.distance_km, Some(42.5));

  let vehicle = s.get_vehicle(v.vehicle_id).await.unwrap().unwrap();
  assert_eq!(vehicle.state, VehicleState::Available);
  assert_eq!(vehicle.odometer_km, 42.5);
  let driver = s.get_driver(d.driver_id).await.unwrap().unwrap();
  assert_eq!(driver.state, DriverState::Available);
}

#[tokio::test]
async fn cancel_scheduled_releases_resources() {
  let s = store().await;
  let v = s
    .add_vehicle(NewVehicle::new("V1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  let d = s
    .add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();
  let a = s.add_assignment(NewAssignment::new(t0(), 2)).await.unwrap();
  assigner(&s).run_at(t0()).await.unwrap();

  let cancelled = s.cancel_assignment(a.assignment_id).await.unwrap();
  assert_eq!(cancelled.state, AssignmentState::Cancelled);

  let vehicle = s.get_vehicle(v.vehicle_id).await.unwrap().unwrap();
  assert_eq!(vehicle.state, VehicleState::Available);
  assert_eq!(vehicle.odometer_km, 0.0);
  let driver = s.get_driver(d.driver_id).await.unwrap().unwrap();
  assert_eq!(driver.state, DriverState::Available);
}

#[tokio::test]
async fn invalid_transitions_are_rejected() {
  let s = store().await;
  let a = s.add_assignment(NewAssignment::new(t0(), 2)).await.unwrap();

  let err = s.start_assignment(a.assignment_id).await.unwrap_err();
  assert!(matches!(
    core_err(err),
    CoreError::InvalidTransition { from: AssignmentState::PendingAuto, .. }
  ));

  let err = s.complete_assignment(a.assignment_id, Some(-1.0)).await.unwrap_err();
  assert!(matches!(core_err(err), CoreError::Validation(_)));

  let err = s.start_assignment(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(core_err(err), CoreError::AssignmentNotFound(_)));
}

#[tokio::test]
async fn failed_request_can_be_requeued_and_assigned() {
  let s = store().await;
  let a = s.add_assignment(NewAssignment::new(t0(), 2)).await.unwrap();

  let outcomes = assigner(&s).run_at(t0()).await.unwrap();
  assert!(matches!(outcomes[0], AssignmentOutcome::NoVehicle { .. }));

  s.add_vehicle(NewVehicle::new("V1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  s.add_driver(new_driver("D1", DriverState::Available))
    .await
    .unwrap();

  let requeued = s.requeue_assignment(a.assignment_id).await.unwrap();
  assert_eq!(requeued.state, AssignmentState::PendingAuto);

  let outcomes = assigner(&s).run_at(t0()).await.unwrap();
  assert!(outcomes[0].is_assigned());
}

#[tokio::test]
async fn fail_skips_resolved_request() {
  let s = store().await;
  let a = s.add_assignment(NewAssignment::new(t0(), 2)).await.unwrap();
  s.cancel_assignment(a.assignment_id).await.unwrap();

  assert!(!s.fail_assignment(a.assignment_id).await.unwrap());
  let a = s.get_assignment(a.assignment_id).await.unwrap().unwrap();
  assert_eq!(a.state, AssignmentState::Cancelled);
}

#[tokio::test]
async fn list_assignments_by_requester_and_window() {
  let s = store().await;
  let mut first = NewAssignment::new(t0(), 2);
  first.requester_name = "Major Silva".into();
  s.add_assignment(first).await.unwrap();
  let mut second = NewAssignment::new(t0() + Duration::days(2), 2);
  second.requester_name = "Captain Rocha".into();
  s.add_assignment(second).await.unwrap();

  let page = s
    .list_assignments(&AssignmentQuery {
      requester: Some("silva".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(page.total, 1);

  let page = s
    .list_assignments(&AssignmentQuery {
      starts_after: Some(t0() + Duration::days(1)),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(page.total, 1);
  assert_eq!(page.items[0].requester_name, "Captain Rocha");
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn dashboard_counts() {
  let s = store().await;
  let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

  s.add_vehicle(NewVehicle::new("V1", VehicleCategory::Car, 4))
    .await
    .unwrap();
  let v2 = s
    .add_vehicle(NewVehicle::new("V2", VehicleCategory::Van, 12))
    .await
    .unwrap();
  s.set_maintenance(v2.vehicle_id, true).await.unwrap();

  let mut expiring = new_driver("D1", DriverState::DayOff);
  expiring.license_expiry = today + Duration::days(10);
  s.add_driver(expiring).await.unwrap();
  let mut expired = new_driver("D2", DriverState::DayOff);
  expired.license_expiry = today - Duration::days(1);
  s.add_driver(expired).await.unwrap();
  let d3 = s
    .add_driver(new_driver("D3", DriverState::DayOff))
    .await
    .unwrap();
  s.check_in(d3.driver_id, None).await.unwrap();

  s.add_assignment(NewAssignment::new(t0(), 40)).await.unwrap();
  assigner(&s).run_at(t0()).await.unwrap();

  let stats = s.dashboard(today, 30).await.unwrap();
  assert_eq!(stats.totals.vehicles, 2);
  assert_eq!(stats.totals.vehicles_available, 1);
  assert_eq!(stats.totals.drivers, 3);
  assert_eq!(stats.totals.drivers_available, 1);
  assert_eq!(stats.totals.assignments, 1);
  assert_eq!(stats.vehicles_by_category[&VehicleCategory::Van], 1);
  assert_eq!(stats.expiring_licenses.len(), 1);
  assert_eq!(stats.drivers_valid_license, 2);
  assert_eq!(stats.alerts.licenses_expiring, 1);
  assert_eq!(stats.alerts.vehicles_maintenance, 1);
  assert_eq!(stats.alerts.assignments_failed, 1);
}
