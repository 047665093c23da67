//! [`SqliteStore`], the SQLite implementation of [`FleetStore`].

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Days, NaiveDate, NaiveTime, SubsecRound as _, Utc};
use rusqlite::{OptionalExtension as _, params};
use uuid::Uuid;

use fleet_core::{
  Error as CoreError,
  assignment::{Assignment, AssignmentAction, AssignmentState, NewAssignment},
  driver::{
    Driver, DriverState, NewDriver, ShiftChange, ShiftKind, ShiftRecord,
  },
  stats::{DashboardStats, ExpiringLicense, ShiftActivity, Totals},
  store::{
    AssignmentPool, AssignmentQuery, Claim, ClaimResult, DriverQuery,
    FleetStore, Page, ShiftQuery, VehicleQuery,
  },
  vehicle::{NewVehicle, Vehicle, VehicleState, VehicleUpdate},
};

use crate::{
  Result,
  encode::{
    ASSIGNMENT_COLUMNS, DRIVER_COLUMNS, RawAssignment, RawDriver,
    RawShiftRecord, RawVehicle, SHIFT_COLUMNS, VEHICLE_COLUMNS, decode_enum,
    decode_enum_in_call, encode_coords, encode_date, encode_dt, encode_enum,
    encode_uuid, like_pattern,
  },
  schema::SCHEMA,
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Outcome of a guarded read-check-write inside one transaction.
enum Guarded<T> {
  /// The target row does not exist.
  Missing,
  /// A domain rule refused the change; nothing was written.
  Refused(CoreError),
  Done(T),
}

impl<T> Guarded<T> {
  fn into_result(self, missing: CoreError) -> Result<T> {
    match self {
      Self::Missing => Err(missing.into()),
      Self::Refused(e) => Err(e.into()),
      Self::Done(t) => Ok(t),
    }
  }
}

/// Timestamps are stored with microsecond precision; truncate up front so a
/// returned entity equals the one read back later.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

/// `LIMIT -1` means no limit in SQLite.
fn sql_limit(limit: Option<usize>) -> i64 { limit.map_or(-1, |l| l as i64) }

fn sql_offset(offset: Option<usize>) -> i64 { offset.unwrap_or(0) as i64 }

fn count_by(
  conn: &rusqlite::Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<(String, u64)>> {
  let mut stmt = conn.prepare(sql)?;
  stmt
    .query_map(params, |r| Ok((r.get(0)?, r.get(1)?)))?
    .collect()
}

fn decode_counts<K>(what: &'static str, rows: Vec<(String, u64)>) -> Result<BTreeMap<K, u64>>
where
  K: Ord + std::str::FromStr,
{
  rows
    .into_iter()
    .map(|(k, n)| Ok((decode_enum(what, &k)?, n)))
    .collect()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A fleet store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All clones
/// share one connection thread, and every claim runs in a transaction that
/// compare-and-sets each row on its current state.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Apply an operator lifecycle action, releasing or promoting the held
  /// vehicle and driver in the same transaction.
  async fn transition(
    &self,
    id: Uuid,
    action: AssignmentAction,
    distance_km: Option<f64>,
  ) -> Result<Assignment> {
    let id_str = encode_uuid(id);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let row: Option<(String, Option<String>, Option<String>)> = tx
          .query_row(
            "SELECT state, vehicle_id, driver_id FROM assignments
             WHERE assignment_id = ?1",
            params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;
        let Some((state, vehicle_id, driver_id)) = row else {
          return Ok(Guarded::Missing);
        };

        let current: AssignmentState = decode_enum_in_call(&state)?;
        let next = match current.after(action) {
          Ok(next) => next,
          Err(e) => return Ok(Guarded::Refused(e)),
        };

        tx.execute(
          "UPDATE assignments
           SET state = ?2, distance_km = COALESCE(?3, distance_km)
           WHERE assignment_id = ?1 AND state = ?4",
          params![id_str, encode_enum(next), distance_km, state],
        )?;

        match action {
          AssignmentAction::Start => {
            tx.execute(
              "UPDATE vehicles SET state = 'in_use'
               WHERE vehicle_id = ?1 AND state = 'reserved'",
              params![vehicle_id],
            )?;
          }
          AssignmentAction::Complete | AssignmentAction::Cancel
            if current.holds_resources() =>
          {
            tx.execute(
              "UPDATE vehicles
               SET state = 'available',
                   odometer_km = odometer_km + COALESCE(?2, 0)
               WHERE vehicle_id = ?1 AND state IN ('reserved', 'in_use')",
              params![vehicle_id, distance_km],
            )?;
            tx.execute(
              "UPDATE drivers SET state = 'available'
               WHERE driver_id = ?1 AND state = 'en_route'",
              params![driver_id],
            )?;
          }
          _ => {}
        }

        let raw = tx.query_row(
          &format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE assignment_id = ?1"
          ),
          params![id_str],
          RawAssignment::from_row,
        )?;
        tx.commit()?;
        Ok(Guarded::Done(raw))
      })
      .await?;

    let assignment = outcome
      .into_result(CoreError::AssignmentNotFound(id))?
      .into_assignment()?;

    tracing::info!(
      assignment_id = %id,
      %action,
      state = %assignment.state,
      "assignment transition"
    );
    Ok(assignment)
  }

  /// Validate and apply a shift event, appending its record atomically.
  async fn record_shift(
    &self,
    driver_id: Uuid,
    kind: ShiftKind,
    notes: Option<String>,
  ) -> Result<ShiftChange> {
    let record = ShiftRecord {
      record_id: Uuid::new_v4(),
      driver_id,
      recorded_at: now(),
      kind,
      notes,
    };

    let driver_id_str = encode_uuid(driver_id);
    let record_id_str = encode_uuid(record.record_id);
    let at_str        = encode_dt(record.recorded_at);
    let kind_str      = encode_enum(kind);
    let notes         = record.notes.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let state: Option<String> = tx
          .query_row(
            "SELECT state FROM drivers WHERE driver_id = ?1",
            params![driver_id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(state) = state else {
          return Ok(Guarded::Missing);
        };

        let current: DriverState = decode_enum_in_call(&state)?;
        let next = match current.apply(kind) {
          Ok(next) => next,
          Err(conflict) => return Ok(Guarded::Refused(conflict.into())),
        };

        tx.execute(
          "UPDATE drivers SET state = ?2 WHERE driver_id = ?1 AND state = ?3",
          params![driver_id_str, encode_enum(next), state],
        )?;
        tx.execute(
          "INSERT INTO shift_records (record_id, driver_id, recorded_at, kind, notes)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![record_id_str, driver_id_str, at_str, kind_str, notes],
        )?;

        let raw = tx.query_row(
          &format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE driver_id = ?1"),
          params![driver_id_str],
          RawDriver::from_row,
        )?;
        tx.commit()?;
        Ok(Guarded::Done(raw))
      })
      .await?;

    let driver = outcome
      .into_result(CoreError::DriverNotFound(driver_id))?
      .into_driver()?;

    tracing::info!(%driver_id, %kind, state = %driver.state, "shift event recorded");
    Ok(ShiftChange { driver, record })
  }
}

// ─── AssignmentPool impl ─────────────────────────────────────────────────────

impl AssignmentPool for SqliteStore {
  type Error = crate::Error;

  async fn pending_assignments(&self) -> Result<Vec<Assignment>> {
    let raws: Vec<RawAssignment> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
           WHERE state = 'pending_auto'
           ORDER BY requested_start ASC, seq ASC"
        ))?;
        let rows = stmt
          .query_map([], RawAssignment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAssignment::into_assignment).collect()
  }

  async fn available_vehicles(&self) -> Result<Vec<Vehicle>> {
    let raws: Vec<RawVehicle> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VEHICLE_COLUMNS} FROM vehicles
           WHERE state = 'available' ORDER BY seq ASC"
        ))?;
        let rows = stmt
          .query_map([], RawVehicle::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVehicle::into_vehicle).collect()
  }

  async fn available_drivers(&self) -> Result<Vec<Driver>> {
    let raws: Vec<RawDriver> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DRIVER_COLUMNS} FROM drivers
           WHERE state = 'available' ORDER BY seq ASC"
        ))?;
        let rows = stmt
          .query_map([], RawDriver::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDriver::into_driver).collect()
  }

  async fn claim(&self, claim: &Claim) -> Result<ClaimResult> {
    let assignment_id = encode_uuid(claim.assignment_id);
    let vehicle_id    = encode_uuid(claim.vehicle_id);
    let driver_id     = encode_uuid(claim.driver_id);
    let vehicle_state = encode_enum(claim.vehicle_state);
    let claimed_at    = encode_dt(claim.claimed_at);
    let passengers    = claim.passengers;
    let category      = claim.category.map(encode_enum);

    let result = self
      .conn
      .call(move |conn| {
        // Dropping `tx` without commit rolls every CAS back.
        let tx = conn.transaction()?;

        let assignment = tx.execute(
          "UPDATE assignments
           SET state = 'scheduled', vehicle_id = ?2, driver_id = ?3
           WHERE assignment_id = ?1 AND state = 'pending_auto'",
          params![assignment_id, vehicle_id, driver_id],
        )?;
        if assignment == 0 {
          return Ok(ClaimResult::AssignmentResolved);
        }

        // Capacity and category may have been edited since selection.
        let vehicle = tx.execute(
          "UPDATE vehicles SET state = ?2
           WHERE vehicle_id = ?1 AND state = 'available'
             AND capacity >= ?3 AND (?4 IS NULL OR category = ?4)",
          params![vehicle_id, vehicle_state, passengers, category],
        )?;
        if vehicle == 0 {
          return Ok(ClaimResult::VehicleTaken);
        }

        let driver = tx.execute(
          "UPDATE drivers SET state = 'en_route', last_assigned_at = ?2
           WHERE driver_id = ?1 AND state = 'available'",
          params![driver_id, claimed_at],
        )?;
        if driver == 0 {
          return Ok(ClaimResult::DriverTaken);
        }

        tx.commit()?;
        Ok(ClaimResult::Claimed)
      })
      .await?;

    Ok(result)
  }

  async fn fail_assignment(&self, assignment_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(assignment_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE assignments SET state = 'failed_auto'
           WHERE assignment_id = ?1 AND state = 'pending_auto'",
          params![id_str],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }
}

// ─── FleetStore impl ─────────────────────────────────────────────────────────

impl FleetStore for SqliteStore {
  // ── Vehicles ──────────────────────────────────────────────────────────────

  async fn add_vehicle(&self, input: NewVehicle) -> Result<Vehicle> {
    input.validate()?;

    let vehicle = Vehicle {
      vehicle_id:  Uuid::new_v4(),
      plate:       input.plate.trim().to_owned(),
      make:        input.make,
      model:       input.model,
      year:        input.year,
      category:    input.category,
      capacity:    input.capacity,
      odometer_km: input.odometer_km,
      state:       VehicleState::Available,
      created_at:  now(),
    };

    let id_str       = encode_uuid(vehicle.vehicle_id);
    let plate        = vehicle.plate.clone();
    let make         = vehicle.make.clone();
    let model        = vehicle.model.clone();
    let year         = vehicle.year;
    let category_str = encode_enum(vehicle.category);
    let capacity     = vehicle.capacity;
    let odometer_km  = vehicle.odometer_km;
    let state_str    = encode_enum(vehicle.state);
    let at_str       = encode_dt(vehicle.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO vehicles (
             vehicle_id, plate, make, model, year,
             category, capacity, odometer_km, state, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          params![
            id_str,
            plate,
            make,
            model,
            year,
            category_str,
            capacity,
            odometer_km,
            state_str,
            at_str,
          ],
        );
        match res {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(
        CoreError::Duplicate { what: "plate", value: vehicle.plate }.into(),
      );
    }
    Ok(vehicle)
  }

  async fn get_vehicle(&self, id: Uuid) -> Result<Option<Vehicle>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawVehicle> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE vehicle_id = ?1"),
              params![id_str],
              RawVehicle::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVehicle::into_vehicle).transpose()
  }

  async fn list_vehicles(&self, query: &VehicleQuery) -> Result<Page<Vehicle>> {
    let state        = query.state.map(encode_enum);
    let category     = query.category.map(encode_enum);
    let min_capacity = query.min_capacity;
    let search       = like_pattern(query.search.as_deref());
    let limit        = sql_limit(query.limit);
    let offset       = sql_offset(query.offset);

    let (total, raws): (u64, Vec<RawVehicle>) = self
      .conn
      .call(move |conn| {
        const FILTER: &str = "
          WHERE (?1 IS NULL OR state = ?1)
            AND (?2 IS NULL OR category = ?2)
            AND (?3 IS NULL OR capacity >= ?3)
            AND (?4 IS NULL OR plate LIKE ?4 OR make LIKE ?4 OR model LIKE ?4)";

        let total = conn.query_row(
          &format!("SELECT COUNT(*) FROM vehicles {FILTER}"),
          params![state, category, min_capacity, search],
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {VEHICLE_COLUMNS} FROM vehicles {FILTER}
           ORDER BY make, model, seq
           LIMIT ?5 OFFSET ?6"
        ))?;
        let rows = stmt
          .query_map(
            params![state, category, min_capacity, search, limit, offset],
            RawVehicle::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, rows))
      })
      .await?;

    Ok(Page {
      total,
      items: raws
        .into_iter()
        .map(RawVehicle::into_vehicle)
        .collect::<Result<_>>()?,
    })
  }

  async fn update_vehicle(
    &self,
    id: Uuid,
    update: VehicleUpdate,
  ) -> Result<Vehicle> {
    update.validate()?;

    let id_str       = encode_uuid(id);
    let category_str = update.category.map(encode_enum);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let state: Option<String> = tx
          .query_row(
            "SELECT state FROM vehicles WHERE vehicle_id = ?1",
            params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(state) = state else {
          return Ok(Guarded::Missing);
        };

        // Shrinking a claimed vehicle could break its assignment's capacity.
        let state: VehicleState = decode_enum_in_call(&state)?;
        if update.capacity.is_some() && state.is_claimed() {
          return Ok(Guarded::Refused(CoreError::VehicleBusy {
            vehicle_id: id,
            state,
          }));
        }

        tx.execute(
          "UPDATE vehicles SET
             make        = COALESCE(?2, make),
             model       = COALESCE(?3, model),
             year        = COALESCE(?4, year),
             category    = COALESCE(?5, category),
             capacity    = COALESCE(?6, capacity),
             odometer_km = COALESCE(?7, odometer_km)
           WHERE vehicle_id = ?1",
          params![
            id_str,
            update.make,
            update.model,
            update.year,
            category_str,
            update.capacity,
            update.odometer_km,
          ],
        )?;

        let raw = tx.query_row(
          &format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE vehicle_id = ?1"),
          params![id_str],
          RawVehicle::from_row,
        )?;
        tx.commit()?;
        Ok(Guarded::Done(raw))
      })
      .await?;

    outcome
      .into_result(CoreError::VehicleNotFound(id))?
      .into_vehicle()
  }

  async fn set_maintenance(&self, id: Uuid, maintenance: bool) -> Result<Vehicle> {
    let id_str = encode_uuid(id);
    let target = encode_enum(if maintenance {
      VehicleState::Maintenance
    } else {
      VehicleState::Available
    });

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let state: Option<String> = tx
          .query_row(
            "SELECT state FROM vehicles WHERE vehicle_id = ?1",
            params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(state) = state else {
          return Ok(Guarded::Missing);
        };

        let state: VehicleState = decode_enum_in_call(&state)?;
        if state.is_claimed() {
          return Ok(Guarded::Refused(CoreError::VehicleBusy {
            vehicle_id: id,
            state,
          }));
        }

        tx.execute(
          "UPDATE vehicles SET state = ?2
           WHERE vehicle_id = ?1 AND state IN ('available', 'maintenance')",
          params![id_str, target],
        )?;

        let raw = tx.query_row(
          &format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE vehicle_id = ?1"),
          params![id_str],
          RawVehicle::from_row,
        )?;
        tx.commit()?;
        Ok(Guarded::Done(raw))
      })
      .await?;

    let vehicle = outcome
      .into_result(CoreError::VehicleNotFound(id))?
      .into_vehicle()?;

    tracing::info!(vehicle_id = %id, state = %vehicle.state, "vehicle maintenance toggled");
    Ok(vehicle)
  }

  // ── Drivers ───────────────────────────────────────────────────────────────

  async fn add_driver(&self, input: NewDriver) -> Result<Driver> {
    input.validate()?;

    let driver = Driver {
      driver_id:        Uuid::new_v4(),
      national_id:      input.national_id.trim().to_owned(),
      first_name:       input.first_name,
      last_name:        input.last_name,
      license_number:   input.license_number,
      license_expiry:   input.license_expiry,
      state:            input.state,
      last_assigned_at: None,
      created_at:       now(),
    };

    let id_str          = encode_uuid(driver.driver_id);
    let national_id     = driver.national_id.clone();
    let first_name      = driver.first_name.clone();
    let last_name       = driver.last_name.clone();
    let license_number  = driver.license_number.clone();
    let expiry_str      = encode_date(driver.license_expiry);
    let state_str       = encode_enum(driver.state);
    let at_str          = encode_dt(driver.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO drivers (
             driver_id, national_id, first_name, last_name,
             license_number, license_expiry, state, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![
            id_str,
            national_id,
            first_name,
            last_name,
            license_number,
            expiry_str,
            state_str,
            at_str,
          ],
        );
        match res {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(
        CoreError::Duplicate {
          what:  "national_id",
          value: driver.national_id,
        }
        .into(),
      );
    }
    Ok(driver)
  }

  async fn get_driver(&self, id: Uuid) -> Result<Option<Driver>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawDriver> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE driver_id = ?1"),
              params![id_str],
              RawDriver::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDriver::into_driver).transpose()
  }

  async fn list_drivers(&self, query: &DriverQuery) -> Result<Page<Driver>> {
    let state  = query.state.map(encode_enum);
    let search = like_pattern(query.search.as_deref());
    let limit  = sql_limit(query.limit);
    let offset = sql_offset(query.offset);

    let (total, raws): (u64, Vec<RawDriver>) = self
      .conn
      .call(move |conn| {
        const FILTER: &str = "
          WHERE (?1 IS NULL OR state = ?1)
            AND (?2 IS NULL OR national_id LIKE ?2 OR first_name LIKE ?2
                 OR last_name LIKE ?2 OR license_number LIKE ?2)";

        let total = conn.query_row(
          &format!("SELECT COUNT(*) FROM drivers {FILTER}"),
          params![state, search],
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {DRIVER_COLUMNS} FROM drivers {FILTER}
           ORDER BY last_name, first_name, seq
           LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt
          .query_map(params![state, search, limit, offset], RawDriver::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, rows))
      })
      .await?;

    Ok(Page {
      total,
      items: raws
        .into_iter()
        .map(RawDriver::into_driver)
        .collect::<Result<_>>()?,
    })
  }

  async fn check_in(
    &self,
    driver_id: Uuid,
    notes: Option<String>,
  ) -> Result<ShiftChange> {
    self.record_shift(driver_id, ShiftKind::CheckIn, notes).await
  }

  async fn check_out(
    &self,
    driver_id: Uuid,
    notes: Option<String>,
  ) -> Result<ShiftChange> {
    self.record_shift(driver_id, ShiftKind::CheckOut, notes).await
  }

  async fn list_shift_records(
    &self,
    query: &ShiftQuery,
  ) -> Result<Page<ShiftRecord>> {
    let driver_id = query.driver_id.map(encode_uuid);
    let after     = query.recorded_after.map(encode_dt);
    let before    = query.recorded_before.map(encode_dt);
    let limit     = sql_limit(query.limit);
    let offset    = sql_offset(query.offset);

    let (total, raws): (u64, Vec<RawShiftRecord>) = self
      .conn
      .call(move |conn| {
        const FILTER: &str = "
          WHERE (?1 IS NULL OR driver_id = ?1)
            AND (?2 IS NULL OR recorded_at >= ?2)
            AND (?3 IS NULL OR recorded_at <= ?3)";

        let total = conn.query_row(
          &format!("SELECT COUNT(*) FROM shift_records {FILTER}"),
          params![driver_id, after, before],
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {SHIFT_COLUMNS} FROM shift_records {FILTER}
           ORDER BY recorded_at DESC, seq DESC
           LIMIT ?4 OFFSET ?5"
        ))?;
        let rows = stmt
          .query_map(
            params![driver_id, after, before, limit, offset],
            RawShiftRecord::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, rows))
      })
      .await?;

    Ok(Page {
      total,
      items: raws
        .into_iter()
        .map(RawShiftRecord::into_record)
        .collect::<Result<_>>()?,
    })
  }

  // ── Assignments ───────────────────────────────────────────────────────────

  async fn add_assignment(&self, input: NewAssignment) -> Result<Assignment> {
    input.validate()?;

    let assignment = Assignment {
      assignment_id:      Uuid::new_v4(),
      requested_start:    input.requested_start.trunc_subsecs(6),
      expected_end:       input.expected_end.map(|e| e.trunc_subsecs(6)),
      origin:             input.origin,
      destination:        input.destination,
      origin_coords:      input.origin_coords,
      destination_coords: input.destination_coords,
      passengers:         input.passengers,
      preferred_category: input.preferred_category,
      requester_name:     input.requester_name,
      requester_rank:     input.requester_rank,
      vehicle_id:         None,
      driver_id:          None,
      state:              AssignmentState::PendingAuto,
      distance_km:        None,
      notes:              input.notes,
      created_at:         now(),
    };

    let id_str          = encode_uuid(assignment.assignment_id);
    let start_str       = encode_dt(assignment.requested_start);
    let end_str         = assignment.expected_end.map(encode_dt);
    let origin          = assignment.origin.clone();
    let destination     = assignment.destination.clone();
    let origin_json     = encode_coords(assignment.origin_coords.as_ref())?;
    let dest_json       = encode_coords(assignment.destination_coords.as_ref())?;
    let passengers      = assignment.passengers;
    let category_str    = assignment.preferred_category.map(encode_enum);
    let requester_name  = assignment.requester_name.clone();
    let requester_rank  = assignment.requester_rank.clone();
    let state_str       = encode_enum(assignment.state);
    let notes           = assignment.notes.clone();
    let at_str          = encode_dt(assignment.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO assignments (
             assignment_id, requested_start, expected_end, origin, destination,
             origin_coords, destination_coords, passengers, preferred_category,
             requester_name, requester_rank, state, notes, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
          params![
            id_str,
            start_str,
            end_str,
            origin,
            destination,
            origin_json,
            dest_json,
            passengers,
            category_str,
            requester_name,
            requester_rank,
            state_str,
            notes,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(assignment)
  }

  async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawAssignment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE assignment_id = ?1"
              ),
              params![id_str],
              RawAssignment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAssignment::into_assignment).transpose()
  }

  async fn list_assignments(
    &self,
    query: &AssignmentQuery,
  ) -> Result<Page<Assignment>> {
    let state      = query.state.map(encode_enum);
    let vehicle_id = query.vehicle_id.map(encode_uuid);
    let driver_id  = query.driver_id.map(encode_uuid);
    let requester  = like_pattern(query.requester.as_deref());
    let after      = query.starts_after.map(encode_dt);
    let before     = query.starts_before.map(encode_dt);
    let limit      = sql_limit(query.limit);
    let offset     = sql_offset(query.offset);

    let (total, raws): (u64, Vec<RawAssignment>) = self
      .conn
      .call(move |conn| {
        const FILTER: &str = "
          WHERE (?1 IS NULL OR state = ?1)
            AND (?2 IS NULL OR vehicle_id = ?2)
            AND (?3 IS NULL OR driver_id = ?3)
            AND (?4 IS NULL OR requester_name LIKE ?4)
            AND (?5 IS NULL OR requested_start >= ?5)
            AND (?6 IS NULL OR requested_start <= ?6)";

        let total = conn.query_row(
          &format!("SELECT COUNT(*) FROM assignments {FILTER}"),
          params![state, vehicle_id, driver_id, requester, after, before],
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {ASSIGNMENT_COLUMNS} FROM assignments {FILTER}
           ORDER BY requested_start DESC, seq DESC
           LIMIT ?7 OFFSET ?8"
        ))?;
        let rows = stmt
          .query_map(
            params![
              state, vehicle_id, driver_id, requester, after, before, limit,
              offset,
            ],
            RawAssignment::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, rows))
      })
      .await?;

    Ok(Page {
      total,
      items: raws
        .into_iter()
        .map(RawAssignment::into_assignment)
        .collect::<Result<_>>()?,
    })
  }

  async fn start_assignment(&self, id: Uuid) -> Result<Assignment> {
    self.transition(id, AssignmentAction::Start, None).await
  }

  async fn complete_assignment(
    &self,
    id: Uuid,
    distance_km: Option<f64>,
  ) -> Result<Assignment> {
    if let Some(d) = distance_km
      && (!d.is_finite() || d < 0.0)
    {
      return Err(
        CoreError::Validation("distance_km must be a non-negative number".into())
          .into(),
      );
    }
    self.transition(id, AssignmentAction::Complete, distance_km).await
  }

  async fn cancel_assignment(&self, id: Uuid) -> Result<Assignment> {
    self.transition(id, AssignmentAction::Cancel, None).await
  }

  async fn requeue_assignment(&self, id: Uuid) -> Result<Assignment> {
    self.transition(id, AssignmentAction::Requeue, None).await
  }

  // ── Reporting ─────────────────────────────────────────────────────────────

  async fn dashboard(
    &self,
    today: NaiveDate,
    license_alert_days: u32,
  ) -> Result<DashboardStats> {
    let today_str   = encode_date(today);
    let horizon_str = encode_date(today + Days::new(u64::from(license_alert_days)));
    let week_start  = encode_dt((today - Days::new(7)).and_time(NaiveTime::MIN).and_utc());

    let raw = self
      .conn
      .call(move |conn| {
        let vehicles_by_state = count_by(
          conn,
          "SELECT state, COUNT(*) FROM vehicles GROUP BY state",
          params![],
        )?;
        let vehicles_by_category = count_by(
          conn,
          "SELECT category, COUNT(*) FROM vehicles GROUP BY category",
          params![],
        )?;
        let drivers_by_state = count_by(
          conn,
          "SELECT state, COUNT(*) FROM drivers GROUP BY state",
          params![],
        )?;
        let assignments_by_state = count_by(
          conn,
          "SELECT state, COUNT(*) FROM assignments GROUP BY state",
          params![],
        )?;
        let shifts_by_kind = count_by(
          conn,
          "SELECT kind, COUNT(*) FROM shift_records
           WHERE recorded_at >= ?1 GROUP BY kind",
          params![week_start],
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {DRIVER_COLUMNS} FROM drivers
           WHERE license_expiry >= ?1 AND license_expiry <= ?2
           ORDER BY license_expiry, seq"
        ))?;
        let expiring = stmt
          .query_map(params![today_str, horizon_str], RawDriver::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let valid_licenses: u64 = conn.query_row(
          "SELECT COUNT(*) FROM drivers WHERE license_expiry >= ?1",
          params![today_str],
          |r| r.get(0),
        )?;

        Ok(RawDashboard {
          vehicles_by_state,
          vehicles_by_category,
          drivers_by_state,
          assignments_by_state,
          shifts_by_kind,
          expiring,
          valid_licenses,
        })
      })
      .await?;

    raw.into_stats()
  }
}

// ─── Dashboard decoding ──────────────────────────────────────────────────────

struct RawDashboard {
  vehicles_by_state:    Vec<(String, u64)>,
  vehicles_by_category: Vec<(String, u64)>,
  drivers_by_state:     Vec<(String, u64)>,
  assignments_by_state: Vec<(String, u64)>,
  shifts_by_kind:       Vec<(String, u64)>,
  expiring:             Vec<RawDriver>,
  valid_licenses:       u64,
}

impl RawDashboard {
  fn into_stats(self) -> Result<DashboardStats> {
    let vehicles_by_state: BTreeMap<VehicleState, u64> =
      decode_counts("vehicle state", self.vehicles_by_state)?;
    let drivers_by_state: BTreeMap<DriverState, u64> =
      decode_counts("driver state", self.drivers_by_state)?;
    let assignments_by_state: BTreeMap<AssignmentState, u64> =
      decode_counts("assignment state", self.assignments_by_state)?;

    let mut shifts = ShiftActivity::default();
    for (kind, n) in self.shifts_by_kind {
      match decode_enum("shift kind", &kind)? {
        ShiftKind::CheckIn => shifts.check_ins = n,
        ShiftKind::CheckOut => shifts.check_outs = n,
      }
      shifts.total += n;
    }

    let expiring_licenses = self
      .expiring
      .into_iter()
      .map(|raw| {
        let d = raw.into_driver()?;
        Ok(ExpiringLicense {
          driver_id:      d.driver_id,
          first_name:     d.first_name,
          last_name:      d.last_name,
          license_number: d.license_number,
          license_expiry: d.license_expiry,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    let mut stats = DashboardStats {
      generated_at: Utc::now(),
      totals: Totals {
        vehicles: vehicles_by_state.values().sum(),
        drivers: drivers_by_state.values().sum(),
        assignments: assignments_by_state.values().sum(),
        ..Totals::default()
      },
      vehicles_by_state,
      vehicles_by_category: decode_counts(
        "vehicle category",
        self.vehicles_by_category,
      )?,
      drivers_by_state,
      assignments_by_state,
      expiring_licenses,
      drivers_valid_license: self.valid_licenses,
      shifts_last_7_days: shifts,
      alerts: Default::default(),
    };
    stats.derive_summary();
    Ok(stats)
  }
}
