//! HTTP server assembly for the fleet backend.
//!
//! Wires the JSON API under `/api`, a `/health` probe, and request tracing
//! into one axum [`Router`]. The `fleetd` binary loads [`ServerConfig`] and
//! serves this router.

use std::path::PathBuf;

use axum::{Json, Router, routing::get};
use chrono::Utc;
use fleet_api::{ApiState, api_router};
use fleet_core::{assign::AssignerConfig, store::FleetStore};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `fleet.toml` and `FLEET_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  /// Days ahead for the dashboard's expiring-licence alert.
  pub license_alert_days: u32,
  pub assigner:           AssignerConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:               "127.0.0.1".to_string(),
      port:               8000,
      store_path:         PathBuf::from("fleet.db"),
      license_alert_days: 30,
      assigner:           AssignerConfig::default(),
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router for `state`.
pub fn router<S>(state: ApiState<S>) -> Router
where
  S: FleetStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
  Json(json!({
    "status":    "healthy",
    "service":   "fleet-api",
    "timestamp": Utc::now(),
  }))
}
