//! SQL schema for the fleet SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
///
/// Every table carries an `AUTOINCREMENT` `seq` column: it is the creation
/// order used for deterministic tie-breaks and never changes.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS vehicles (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    vehicle_id   TEXT NOT NULL UNIQUE,
    plate        TEXT NOT NULL UNIQUE,
    make         TEXT NOT NULL,
    model        TEXT NOT NULL,
    year         INTEGER,
    category     TEXT NOT NULL,   -- VehicleCategory discriminant
    capacity     INTEGER NOT NULL CHECK (capacity > 0),
    odometer_km  REAL NOT NULL DEFAULT 0 CHECK (odometer_km >= 0),
    state        TEXT NOT NULL,   -- 'available' | 'in_use' | 'maintenance' | 'reserved'
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS drivers (
    seq               INTEGER PRIMARY KEY AUTOINCREMENT,
    driver_id         TEXT NOT NULL UNIQUE,
    national_id       TEXT NOT NULL UNIQUE,
    first_name        TEXT NOT NULL,
    last_name         TEXT NOT NULL,
    license_number    TEXT NOT NULL,
    license_expiry    TEXT NOT NULL,   -- YYYY-MM-DD
    state             TEXT NOT NULL,   -- 'available' | 'en_route' | 'day_off' | 'unavailable'
    last_assigned_at  TEXT,
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assignments (
    seq                 INTEGER PRIMARY KEY AUTOINCREMENT,
    assignment_id       TEXT NOT NULL UNIQUE,
    requested_start     TEXT NOT NULL,
    expected_end        TEXT,
    origin              TEXT NOT NULL,
    destination         TEXT NOT NULL,
    origin_coords       TEXT,            -- JSON GeoPoint or NULL
    destination_coords  TEXT,            -- JSON GeoPoint or NULL
    passengers          INTEGER NOT NULL CHECK (passengers > 0),
    preferred_category  TEXT,
    requester_name      TEXT NOT NULL,
    requester_rank      TEXT,
    vehicle_id          TEXT REFERENCES vehicles(vehicle_id),
    driver_id           TEXT REFERENCES drivers(driver_id),
    state               TEXT NOT NULL,
    distance_km         REAL CHECK (distance_km IS NULL OR distance_km >= 0),
    notes               TEXT,
    created_at          TEXT NOT NULL,
    -- Scheduled and active assignments hold both resources; pending and
    -- failed ones hold neither.
    CHECK (state NOT IN ('scheduled', 'active')
           OR (vehicle_id IS NOT NULL AND driver_id IS NOT NULL)),
    CHECK (state NOT IN ('pending_auto', 'failed_auto')
           OR (vehicle_id IS NULL AND driver_id IS NULL))
);

-- Shift records are strictly append-only.
CREATE TABLE IF NOT EXISTS shift_records (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id    TEXT NOT NULL UNIQUE,
    driver_id    TEXT NOT NULL REFERENCES drivers(driver_id),
    recorded_at  TEXT NOT NULL,
    kind         TEXT NOT NULL,   -- 'check_in' | 'check_out'
    notes        TEXT
);

CREATE TRIGGER IF NOT EXISTS shift_records_no_update
BEFORE UPDATE ON shift_records
BEGIN
    SELECT RAISE(ABORT, 'shift records are append-only');
END;

CREATE TRIGGER IF NOT EXISTS shift_records_no_delete
BEFORE DELETE ON shift_records
BEGIN
    SELECT RAISE(ABORT, 'shift records are append-only');
END;

CREATE INDEX IF NOT EXISTS vehicles_state_idx       ON vehicles(state);
CREATE INDEX IF NOT EXISTS drivers_state_idx        ON drivers(state);
CREATE INDEX IF NOT EXISTS assignments_state_idx    ON assignments(state, requested_start);
CREATE INDEX IF NOT EXISTS shift_records_driver_idx ON shift_records(driver_id, recorded_at);

PRAGMA user_version = 1;
";
