//! Handlers for `/vehicles` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/vehicles` | `?state`, `?category`, `?min_capacity`, `?search`, paging |
//! | `POST`  | `/vehicles` | Body: [`NewVehicle`] |
//! | `GET`   | `/vehicles/{id}` | 404 if not found |
//! | `PATCH` | `/vehicles/{id}` | Body: [`VehicleUpdate`] |
//! | `POST`  | `/vehicles/{id}/maintenance` | Body: `{"maintenance": true}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use fleet_core::{
  store::{FleetStore, VehicleQuery},
  vehicle::{NewVehicle, Vehicle, VehicleCategory, VehicleState, VehicleUpdate},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  ApiState,
  error::ApiError,
  pagination::{Paginated, Paging},
};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub state:        Option<VehicleState>,
  pub category:     Option<VehicleCategory>,
  pub min_capacity: Option<u32>,
  pub search:       Option<String>,
  pub page:         Option<u32>,
  pub page_size:    Option<u32>,
}

/// `GET /vehicles`
pub async fn list<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Paginated<Vehicle>>, ApiError> {
  let paging = Paging::new(params.page, params.page_size)?;
  let query = VehicleQuery {
    state:        params.state,
    category:     params.category,
    min_capacity: params.min_capacity,
    search:       params.search,
    limit:        Some(paging.limit()),
    offset:       Some(paging.offset()),
  };

  let page = state
    .store
    .list_vehicles(&query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(paging.wrap(page)))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /vehicles`
pub async fn create<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewVehicle>,
) -> Result<impl IntoResponse, ApiError> {
  let vehicle = state
    .store
    .add_vehicle(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(vehicle)))
}

// ─── Get / update ────────────────────────────────────────────────────────────

/// `GET /vehicles/{id}`
pub async fn get_one<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vehicle>, ApiError> {
  let vehicle = state
    .store
    .get_vehicle(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("vehicle {id} not found")))?;
  Ok(Json(vehicle))
}

/// `PATCH /vehicles/{id}`
pub async fn update<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<VehicleUpdate>,
) -> Result<Json<Vehicle>, ApiError> {
  let vehicle = state
    .store
    .update_vehicle(id, body)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(vehicle))
}

// ─── Maintenance ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MaintenanceBody {
  pub maintenance: bool,
}

/// `POST /vehicles/{id}/maintenance`
pub async fn maintenance<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<MaintenanceBody>,
) -> Result<Json<Vehicle>, ApiError> {
  let vehicle = state
    .store
    .set_maintenance(id, body.maintenance)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(vehicle))
}
