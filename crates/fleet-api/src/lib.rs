//! JSON REST API for the fleet backend.
//!
//! Exposes an axum [`Router`] backed by any [`fleet_core::store::FleetStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", fleet_api::api_router(ApiState::new(store, assigner_cfg, 30)))
//! ```

pub mod assignments;
pub mod dashboard;
pub mod drivers;
pub mod error;
pub mod pagination;
pub mod shifts;
pub mod vehicles;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use bytes::Bytes;
use fleet_core::{
  assign::{AssignerConfig, AutoAssigner},
  store::FleetStore,
};
use serde::de::DeserializeOwned;

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:              Arc<S>,
  pub assigner:           AutoAssigner<S>,
  /// Window for the dashboard's expiring-licence alert.
  pub license_alert_days: u32,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:              Arc::clone(&self.store),
      assigner:           self.assigner.clone(),
      license_alert_days: self.license_alert_days,
    }
  }
}

impl<S: FleetStore> ApiState<S> {
  pub fn new(
    store: Arc<S>,
    assigner: AssignerConfig,
    license_alert_days: u32,
  ) -> Self {
    Self {
      assigner: AutoAssigner::new(Arc::clone(&store), assigner),
      store,
      license_alert_days,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: FleetStore + 'static,
{
  Router::new()
    // Vehicles
    .route("/vehicles", get(vehicles::list::<S>).post(vehicles::create::<S>))
    .route(
      "/vehicles/{id}",
      get(vehicles::get_one::<S>).patch(vehicles::update::<S>),
    )
    .route("/vehicles/{id}/maintenance", post(vehicles::maintenance::<S>))
    // Drivers and shifts
    .route("/drivers", get(drivers::list::<S>).post(drivers::create::<S>))
    .route("/drivers/availability", get(drivers::availability::<S>))
    .route("/drivers/{id}", get(drivers::get_one::<S>))
    .route("/drivers/{id}/check-in", post(drivers::check_in::<S>))
    .route("/drivers/{id}/check-out", post(drivers::check_out::<S>))
    .route("/shifts", get(shifts::list::<S>))
    // Assignments
    .route(
      "/assignments",
      get(assignments::list::<S>).post(assignments::create::<S>),
    )
    .route("/assignments/auto-assign", post(assignments::auto_assign::<S>))
    .route("/assignments/{id}", get(assignments::get_one::<S>))
    .route("/assignments/{id}/assign", post(assignments::assign::<S>))
    .route("/assignments/{id}/start", post(assignments::start::<S>))
    .route("/assignments/{id}/complete", post(assignments::complete::<S>))
    .route("/assignments/{id}/cancel", post(assignments::cancel::<S>))
    .route("/assignments/{id}/requeue", post(assignments::requeue::<S>))
    // Reporting
    .route("/dashboard", get(dashboard::handler::<S>))
    .with_state(state)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Parse a JSON body that may be omitted entirely.
pub(crate) fn optional_json<T>(body: &Bytes) -> Result<T, ApiError>
where
  T: DeserializeOwned + Default,
{
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(T::default());
  }
  serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}
