//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that text comparison in SQL is chronological. Dates are
//! `YYYY-MM-DD`. Enums use their snake_case discriminants. Coordinates are
//! compact JSON. UUIDs are hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use fleet_core::{
  assignment::{Assignment, GeoPoint},
  driver::{Driver, ShiftRecord},
  vehicle::Vehicle,
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Any domain enum derived with `strum::IntoStaticStr`.
pub fn encode_enum<T: Into<&'static str>>(value: T) -> String {
  value.into().to_owned()
}

/// Any domain enum derived with `strum::EnumString`.
pub fn decode_enum<T: FromStr>(what: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| Error::Decode { what, value: s.to_owned() })
}

/// Decode inside a `tokio_rusqlite` closure, where errors must be
/// [`tokio_rusqlite::Error`].
pub fn decode_enum_in_call<T>(s: &str) -> tokio_rusqlite::Result<T>
where
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  s.parse().map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))
}

pub fn encode_coords(p: Option<&GeoPoint>) -> Result<Option<String>> {
  p.map(serde_json::to_string).transpose().map_err(Error::from)
}

pub fn decode_coords(s: Option<&str>) -> Result<Option<GeoPoint>> {
  s.map(serde_json::from_str).transpose().map_err(Error::from)
}

/// `Some("abc")` → `Some("%abc%")`, for `LIKE` filters.
pub fn like_pattern(text: Option<&str>) -> Option<String> {
  text
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .map(|t| format!("%{t}%"))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawVehicle::from_row`].
pub const VEHICLE_COLUMNS: &str = "vehicle_id, plate, make, model, year, \
                                   category, capacity, odometer_km, state, \
                                   created_at";

/// Raw values read directly from a `vehicles` row.
pub struct RawVehicle {
  pub vehicle_id:  String,
  pub plate:       String,
  pub make:        String,
  pub model:       String,
  pub year:        Option<i32>,
  pub category:    String,
  pub capacity:    u32,
  pub odometer_km: f64,
  pub state:       String,
  pub created_at:  String,
}

impl RawVehicle {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      vehicle_id:  row.get(0)?,
      plate:       row.get(1)?,
      make:        row.get(2)?,
      model:       row.get(3)?,
      year:        row.get(4)?,
      category:    row.get(5)?,
      capacity:    row.get(6)?,
      odometer_km: row.get(7)?,
      state:       row.get(8)?,
      created_at:  row.get(9)?,
    })
  }

  pub fn into_vehicle(self) -> Result<Vehicle> {
    Ok(Vehicle {
      vehicle_id:  decode_uuid(&self.vehicle_id)?,
      plate:       self.plate,
      make:        self.make,
      model:       self.model,
      year:        self.year,
      category:    decode_enum("vehicle category", &self.category)?,
      capacity:    self.capacity,
      odometer_km: self.odometer_km,
      state:       decode_enum("vehicle state", &self.state)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawDriver::from_row`].
pub const DRIVER_COLUMNS: &str = "driver_id, national_id, first_name, \
                                  last_name, license_number, license_expiry, \
                                  state, last_assigned_at, created_at";

/// Raw values read directly from a `drivers` row.
pub struct RawDriver {
  pub driver_id:        String,
  pub national_id:      String,
  pub first_name:       String,
  pub last_name:        String,
  pub license_number:   String,
  pub license_expiry:   String,
  pub state:            String,
  pub last_assigned_at: Option<String>,
  pub created_at:       String,
}

impl RawDriver {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      driver_id:        row.get(0)?,
      national_id:      row.get(1)?,
      first_name:       row.get(2)?,
      last_name:        row.get(3)?,
      license_number:   row.get(4)?,
      license_expiry:   row.get(5)?,
      state:            row.get(6)?,
      last_assigned_at: row.get(7)?,
      created_at:       row.get(8)?,
    })
  }

  pub fn into_driver(self) -> Result<Driver> {
    Ok(Driver {
      driver_id:        decode_uuid(&self.driver_id)?,
      national_id:      self.national_id,
      first_name:       self.first_name,
      last_name:        self.last_name,
      license_number:   self.license_number,
      license_expiry:   decode_date(&self.license_expiry)?,
      state:            decode_enum("driver state", &self.state)?,
      last_assigned_at: self
        .last_assigned_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawAssignment::from_row`].
pub const ASSIGNMENT_COLUMNS: &str = "assignment_id, requested_start, \
                                      expected_end, origin, destination, \
                                      origin_coords, destination_coords, \
                                      passengers, preferred_category, \
                                      requester_name, requester_rank, \
                                      vehicle_id, driver_id, state, \
                                      distance_km, notes, created_at";

/// Raw values read directly from an `assignments` row.
pub struct RawAssignment {
  pub assignment_id:      String,
  pub requested_start:    String,
  pub expected_end:       Option<String>,
  pub origin:             String,
  pub destination:        String,
  pub origin_coords:      Option<String>,
  pub destination_coords: Option<String>,
  pub passengers:         u32,
  pub preferred_category: Option<String>,
  pub requester_name:     String,
  pub requester_rank:     Option<String>,
  pub vehicle_id:         Option<String>,
  pub driver_id:          Option<String>,
  pub state:              String,
  pub distance_km:        Option<f64>,
  pub notes:              Option<String>,
  pub created_at:         String,
}

impl RawAssignment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assignment_id:      row.get(0)?,
      requested_start:    row.get(1)?,
      expected_end:       row.get(2)?,
      origin:             row.get(3)?,
      destination:        row.get(4)?,
      origin_coords:      row.get(5)?,
      destination_coords: row.get(6)?,
      passengers:         row.get(7)?,
      preferred_category: row.get(8)?,
      requester_name:     row.get(9)?,
      requester_rank:     row.get(10)?,
      vehicle_id:         row.get(11)?,
      driver_id:          row.get(12)?,
      state:              row.get(13)?,
      distance_km:        row.get(14)?,
      notes:              row.get(15)?,
      created_at:         row.get(16)?,
    })
  }

  pub fn into_assignment(self) -> Result<Assignment> {
    Ok(Assignment {
      assignment_id:      decode_uuid(&self.assignment_id)?,
      requested_start:    decode_dt(&self.requested_start)?,
      expected_end:       self.expected_end.as_deref().map(decode_dt).transpose()?,
      origin:             self.origin,
      destination:        self.destination,
      origin_coords:      decode_coords(self.origin_coords.as_deref())?,
      destination_coords: decode_coords(self.destination_coords.as_deref())?,
      passengers:         self.passengers,
      preferred_category: self
        .preferred_category
        .as_deref()
        .map(|c| decode_enum("vehicle category", c))
        .transpose()?,
      requester_name:     self.requester_name,
      requester_rank:     self.requester_rank,
      vehicle_id:         self.vehicle_id.as_deref().map(decode_uuid).transpose()?,
      driver_id:          self.driver_id.as_deref().map(decode_uuid).transpose()?,
      state:              decode_enum("assignment state", &self.state)?,
      distance_km:        self.distance_km,
      notes:              self.notes,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawShiftRecord::from_row`].
pub const SHIFT_COLUMNS: &str = "record_id, driver_id, recorded_at, kind, notes";

/// Raw values read directly from a `shift_records` row.
pub struct RawShiftRecord {
  pub record_id:   String,
  pub driver_id:   String,
  pub recorded_at: String,
  pub kind:        String,
  pub notes:       Option<String>,
}

impl RawShiftRecord {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:   row.get(0)?,
      driver_id:   row.get(1)?,
      recorded_at: row.get(2)?,
      kind:        row.get(3)?,
      notes:       row.get(4)?,
    })
  }

  pub fn into_record(self) -> Result<ShiftRecord> {
    Ok(ShiftRecord {
      record_id:   decode_uuid(&self.record_id)?,
      driver_id:   decode_uuid(&self.driver_id)?,
      recorded_at: decode_dt(&self.recorded_at)?,
      kind:        decode_enum("shift kind", &self.kind)?,
      notes:       self.notes,
    })
  }
}
