//! Handlers for `/drivers` endpoints, including shift check-in and
//! check-out.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/drivers` | `?state`, `?search`, paging |
//! | `POST` | `/drivers` | Body: [`NewDriver`] |
//! | `GET`  | `/drivers/availability` | Every driver with its current state |
//! | `GET`  | `/drivers/{id}` | 404 if not found |
//! | `POST` | `/drivers/{id}/check-in` | Optional body `{"notes": "..."}` |
//! | `POST` | `/drivers/{id}/check-out` | Optional body `{"notes": "..."}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use bytes::Bytes;
use chrono::Utc;
use fleet_core::{
  driver::{Driver, DriverState, NewDriver, ShiftChange},
  store::{DriverQuery, FleetStore},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  ApiState,
  error::ApiError,
  optional_json,
  pagination::{Paginated, Paging},
};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub state:     Option<DriverState>,
  pub search:    Option<String>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /drivers`
pub async fn list<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Paginated<Driver>>, ApiError> {
  let paging = Paging::new(params.page, params.page_size)?;
  let query = DriverQuery {
    state:  params.state,
    search: params.search,
    limit:  Some(paging.limit()),
    offset: Some(paging.offset()),
  };

  let page = state
    .store
    .list_drivers(&query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(paging.wrap(page)))
}

// ─── Create / get ────────────────────────────────────────────────────────────

/// `POST /drivers`
pub async fn create<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewDriver>,
) -> Result<impl IntoResponse, ApiError> {
  let driver = state
    .store
    .add_driver(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(driver)))
}

/// `GET /drivers/{id}`
pub async fn get_one<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Driver>, ApiError> {
  let driver = state
    .store
    .get_driver(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("driver {id} not found")))?;
  Ok(Json(driver))
}

// ─── Availability ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Availability {
  pub driver_id:     Uuid,
  pub name:          String,
  pub state:         DriverState,
  pub license_valid: bool,
}

/// `GET /drivers/availability`
pub async fn availability<S: FleetStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<Availability>>, ApiError> {
  let today = Utc::now().date_naive();
  let drivers = state
    .store
    .list_drivers(&DriverQuery::default())
    .await
    .map_err(ApiError::from_store)?;

  let rows = drivers
    .items
    .into_iter()
    .map(|d| Availability {
      driver_id:     d.driver_id,
      name:          d.full_name(),
      state:         d.state,
      license_valid: d.license_valid_on(today),
    })
    .collect();
  Ok(Json(rows))
}

// ─── Shifts ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ShiftBody {
  #[serde(default)]
  pub notes: Option<String>,
}

/// `POST /drivers/{id}/check-in`
pub async fn check_in<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  body: Bytes,
) -> Result<Json<ShiftChange>, ApiError> {
  let body: ShiftBody = optional_json(&body)?;
  let change = state
    .store
    .check_in(id, body.notes)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(change))
}

/// `POST /drivers/{id}/check-out`
pub async fn check_out<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  body: Bytes,
) -> Result<Json<ShiftChange>, ApiError> {
  let body: ShiftBody = optional_json(&body)?;
  let change = state
    .store
    .check_out(id, body.notes)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(change))
}
