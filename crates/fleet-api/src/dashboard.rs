//! `GET /dashboard`: fleet-wide counters and alerts as of today (UTC).

use axum::{Json, extract::State};
use chrono::Utc;
use fleet_core::{stats::DashboardStats, store::FleetStore};

use crate::{ApiState, error::ApiError};

pub async fn handler<S: FleetStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<DashboardStats>, ApiError> {
  let stats = state
    .store
    .dashboard(Utc::now().date_naive(), state.license_alert_days)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(stats))
}
