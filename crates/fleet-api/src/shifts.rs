//! `GET /shifts`: the append-only shift log, newest first.
//!
//! Filters: `?driver_id`, `?from` and `?to` (RFC 3339, inclusive), paging.

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, Utc};
use fleet_core::{
  driver::ShiftRecord,
  store::{FleetStore, ShiftQuery},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  ApiState,
  error::ApiError,
  pagination::{Paginated, Paging},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub driver_id: Option<Uuid>,
  pub from:      Option<DateTime<Utc>>,
  pub to:        Option<DateTime<Utc>>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

pub async fn list<S: FleetStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Paginated<ShiftRecord>>, ApiError> {
  let paging = Paging::new(params.page, params.page_size)?;
  let query = ShiftQuery {
    driver_id:       params.driver_id,
    recorded_after:  params.from,
    recorded_before: params.to,
    limit:           Some(paging.limit()),
    offset:          Some(paging.offset()),
  };

  let page = state
    .store
    .list_shift_records(&query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(paging.wrap(page)))
}
