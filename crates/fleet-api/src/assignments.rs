//! Handlers for `/assignments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/assignments` | `?state`, `?requester`, `?from`, `?to`, `?vehicle_id`, `?driver_id`, paging |
//! | `POST` | `/assignments` | Body: [`NewAssignment`]; starts `pending_auto` |
//! | `GET`  | `/assignments/{id}` | 404 if not found |
//! | `POST` | `/assignments/auto-assign` | Runs one batch; `{"results": [...]}` |
//! | `POST` | `/assignments/{id}/assign` | Body: `{"vehicle_id", "driver_id"}` |
//! | `POST` | `/assignments/{id}/start` | `scheduled → active` |
//! | `POST` | `/assignments/{id}/complete` | Optional body `{"distance_km": 12.5}` |
//! | `POST` | `/assignments/{id}/cancel` | Releases held resources |
//! | `POST` | `/assignments/{id}/requeue` | `failed_auto → pending_auto` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use fleet_core::{
  assign::AssignmentOutcome,
  assignment::{Assignment, AssignmentState, NewAssignment},
  store::{AssignmentQuery, FleetStore},
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
  pub state:      Option<AssignmentState>,
  pub requester:  Option<String>,
  pub from:       Option<DateTime<Utc>>,
  pub to:         Option<DateTime<Utc>>,
  pub vehicle_id: Option<Uuid>,
  pub driver_id:  Option<Uuid>,
  pub page:       Option<u32>,
  pub page_size:  Option<u32>,
}

/// `GET /assignments`
pub async fn list<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Paginated<Assignment>>, ApiError> {
  let paging = Paging::new(params.page, params.page_size)?;
  let query = AssignmentQuery {
    state:         params.state,
    vehicle_id:    params.vehicle_id,
    driver_id:     params.driver_id,
    requester:     params.requester,
    starts_after:  params.from,
    starts_before: params.to,
    limit:         Some(paging.limit()),
    offset:        Some(paging.offset()),
  };

  let page = state
    .store
    .list_assignments(&query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(paging.wrap(page)))
}

// ─── Create / get ────────────────────────────────────────────────────────────

/// `POST /assignments`
pub async fn create<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewAssignment>,
) -> Result<impl IntoResponse, ApiError> {
  let assignment = state
    .store
    .add_assignment(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(assignment)))
}

/// `GET /assignments/{id}`
pub async fn get_one<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Assignment>, ApiError> {
  let assignment = state
    .store
    .get_assignment(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("assignment {id} not found")))?;
  Ok(Json(assignment))
}

// ─── Assignment ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BatchResults {
  pub results: Vec<AssignmentOutcome>,
}

/// `POST /assignments/auto-assign`
pub async fn auto_assign<S: FleetStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<BatchResults>, ApiError> {
  let results = state
    .assigner
    .run_auto_assignment()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(BatchResults { results }))
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub vehicle_id: Uuid,
  pub driver_id:  Uuid,
}

/// `POST /assignments/{id}/assign`
pub async fn assign<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AssignBody>,
) -> Result<Json<Assignment>, ApiError> {
  let assignment = state
    .assigner
    .assign_manually(id, body.vehicle_id, body.driver_id)
    .await?;
  Ok(Json(assignment))
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// `POST /assignments/{id}/start`
pub async fn start<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Assignment>, ApiError> {
  let assignment = state
    .store
    .start_assignment(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(assignment))
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteBody {
  #[serde(default)]
  pub distance_km: Option<f64>,
}

/// `POST /assignments/{id}/complete`
pub async fn complete<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  body: Bytes,
) -> Result<Json<Assignment>, ApiError> {
  let body: CompleteBody = optional_json(&body)?;
  let assignment = state
    .store
    .complete_assignment(id, body.distance_km)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(assignment))
}

/// `POST /assignments/{id}/cancel`
pub async fn cancel<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Assignment>, ApiError> {
  let assignment = state
    .store
    .cancel_assignment(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(assignment))
}

/// `POST /assignments/{id}/requeue`
pub async fn requeue<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Assignment>, ApiError> {
  let assignment = state
    .store
    .requeue_assignment(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(assignment))
}
