//! Automatic vehicle/driver assignment.
//!
//! [`AutoAssigner::run_auto_assignment`] resolves every `pending_auto`
//! request against the current pool of available vehicles and drivers, one
//! request at a time, oldest requested start first.
//!
//! # Selection rules
//!
//! A vehicle qualifies when it is `available`, seats at least the requested
//! number of passengers, and (if the request names one) is of the preferred
//! category. There is no fallback to another category. Among qualifying
//! vehicles the one with the lowest odometer wins; ties go to the vehicle
//! created first.
//!
//! A driver qualifies when `available`. Drivers never assigned before win,
//! then the one whose last assignment is oldest; ties go to the driver created
//! first.
//!
//! # Consistency
//!
//! Each request is committed through a single atomic [`Claim`]. Pools are
//! re-read for every request, so request N+1 never sees a resource claimed by
//! request N. A claim lost to a concurrent writer is retried against a fresh
//! pool up to [`AssignerConfig::max_claim_attempts`] times.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  assignment::{Assignment, AssignmentState},
  driver::{Driver, DriverState},
  error::OpError,
  store::{AssignmentPool, Claim, ClaimResult, FleetStore},
  vehicle::{Vehicle, VehicleState},
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignerConfig {
  /// Requests starting within this many minutes of the run put their vehicle
  /// straight into `in_use` instead of `reserved`.
  pub immediate_window_minutes: i64,
  /// How many times one request may lose a vehicle/driver race before it is
  /// reported as a conflict and left pending.
  pub max_claim_attempts:       u32,
}

impl Default for AssignerConfig {
  fn default() -> Self {
    Self {
      immediate_window_minutes: 15,
      max_claim_attempts:       3,
    }
  }
}

impl AssignerConfig {
  /// The state a freshly claimed vehicle enters for a request starting at
  /// `requested_start`.
  pub fn vehicle_state_for(
    &self,
    requested_start: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> VehicleState {
    if requested_start <= now + Duration::minutes(self.immediate_window_minutes)
    {
      VehicleState::InUse
    } else {
      VehicleState::Reserved
    }
  }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
  /// Another actor moved the request out of `pending_auto` first.
  AlreadyResolved,
  /// Every attempt lost its vehicle or driver to a concurrent claim. The
  /// request stays `pending_auto`.
  Contention,
}

/// The per-request result of an auto-assignment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssignmentOutcome {
  Assigned {
    assignment_id: Uuid,
    vehicle_id:    Uuid,
    driver_id:     Uuid,
  },
  NoVehicle {
    assignment_id: Uuid,
  },
  NoDriver {
    assignment_id: Uuid,
  },
  Conflict {
    assignment_id: Uuid,
    reason:        ConflictReason,
  },
}

impl AssignmentOutcome {
  pub fn assignment_id(&self) -> Uuid {
    match self {
      Self::Assigned { assignment_id, .. }
      | Self::NoVehicle { assignment_id }
      | Self::NoDriver { assignment_id }
      | Self::Conflict { assignment_id, .. } => *assignment_id,
    }
  }

  pub fn is_assigned(&self) -> bool { matches!(self, Self::Assigned { .. }) }
}

// ─── Selection ───────────────────────────────────────────────────────────────

/// Pick the vehicle for `request` from `candidates` (in creation order).
pub fn select_vehicle<'a>(
  candidates: &'a [Vehicle],
  request: &Assignment,
) -> Option<&'a Vehicle> {
  candidates
    .iter()
    .filter(|v| v.state == VehicleState::Available)
    .filter(|v| v.fits(request.passengers))
    .filter(|v| request.preferred_category.is_none_or(|c| v.category == c))
    // `min_by` keeps the first of equal elements.
    .min_by(|a, b| a.odometer_km.total_cmp(&b.odometer_km))
}

/// Pick the least recently assigned available driver from `candidates` (in
/// creation order).
pub fn select_driver(candidates: &[Driver]) -> Option<&Driver> {
  candidates
    .iter()
    .filter(|d| d.state == DriverState::Available)
    // `None < Some(_)`, so never-assigned drivers come first.
    .min_by_key(|d| d.last_assigned_at)
}

// ─── AutoAssigner ────────────────────────────────────────────────────────────

/// Resolves pending assignment requests against a store.
pub struct AutoAssigner<P> {
  pool:   Arc<P>,
  config: AssignerConfig,
}

impl<P> Clone for AutoAssigner<P> {
  fn clone(&self) -> Self {
    Self { pool: Arc::clone(&self.pool), config: self.config.clone() }
  }
}

impl<P: AssignmentPool> AutoAssigner<P> {
  pub fn new(pool: Arc<P>, config: AssignerConfig) -> Self {
    Self { pool, config }
  }

  pub fn config(&self) -> &AssignerConfig { &self.config }

  /// Run one batch over every pending request. See the module docs.
  ///
  /// Individual non-matches never fail the batch; only a store error does,
  /// in which case requests already processed stay committed.
  pub async fn run_auto_assignment(
    &self,
  ) -> Result<Vec<AssignmentOutcome>, P::Error> {
    self.run_at(Utc::now()).await
  }

  /// [`run_auto_assignment`](Self::run_auto_assignment) with an explicit
  /// clock.
  pub async fn run_at(
    &self,
    now: DateTime<Utc>,
  ) -> Result<Vec<AssignmentOutcome>, P::Error> {
    let mut pending = self.pool.pending_assignments().await?;
    // Stable: equal start times keep the store's creation order.
    pending.sort_by_key(|a| a.requested_start);

    let mut outcomes = Vec::with_capacity(pending.len());
    for request in &pending {
      let outcome = self.resolve(request, now).await?;
      tracing::debug!(
        assignment_id = %request.assignment_id,
        outcome = ?outcome,
        "auto-assignment request processed"
      );
      outcomes.push(outcome);
    }

    let assigned = outcomes.iter().filter(|o| o.is_assigned()).count();
    tracing::info!(
      pending = pending.len(),
      assigned,
      unresolved = outcomes.len() - assigned,
      "auto-assignment batch finished"
    );
    Ok(outcomes)
  }

  async fn resolve(
    &self,
    request: &Assignment,
    now: DateTime<Utc>,
  ) -> Result<AssignmentOutcome, P::Error> {
    let assignment_id = request.assignment_id;

    for attempt in 1..=self.config.max_claim_attempts.max(1) {
      let vehicles = self.pool.available_vehicles().await?;
      let Some(vehicle) = select_vehicle(&vehicles, request) else {
        return self
          .fail(assignment_id, AssignmentOutcome::NoVehicle { assignment_id })
          .await;
      };

      let drivers = self.pool.available_drivers().await?;
      let Some(driver) = select_driver(&drivers) else {
        return self
          .fail(assignment_id, AssignmentOutcome::NoDriver { assignment_id })
          .await;
      };

      let claim = Claim {
        assignment_id,
        vehicle_id: vehicle.vehicle_id,
        driver_id: driver.driver_id,
        vehicle_state: self
          .config
          .vehicle_state_for(request.requested_start, now),
        claimed_at: now,
        passengers: request.passengers,
        category: request.preferred_category,
      };

      match self.pool.claim(&claim).await? {
        ClaimResult::Claimed => {
          return Ok(AssignmentOutcome::Assigned {
            assignment_id,
            vehicle_id: claim.vehicle_id,
            driver_id: claim.driver_id,
          });
        }
        ClaimResult::AssignmentResolved => {
          return Ok(AssignmentOutcome::Conflict {
            assignment_id,
            reason: ConflictReason::AlreadyResolved,
          });
        }
        lost => {
          tracing::warn!(
            %assignment_id,
            attempt,
            result = ?lost,
            "claim lost to a concurrent writer"
          );
        }
      }
    }

    Ok(AssignmentOutcome::Conflict {
      assignment_id,
      reason: ConflictReason::Contention,
    })
  }

  /// Record a constraint failure, unless someone else already resolved the
  /// request.
  async fn fail(
    &self,
    assignment_id: Uuid,
    outcome: AssignmentOutcome,
  ) -> Result<AssignmentOutcome, P::Error> {
    if self.pool.fail_assignment(assignment_id).await? {
      Ok(outcome)
    } else {
      Ok(AssignmentOutcome::Conflict {
        assignment_id,
        reason: ConflictReason::AlreadyResolved,
      })
    }
  }
}

impl<S: FleetStore> AutoAssigner<S> {
  /// Bind an operator-chosen vehicle and driver to a pending request.
  ///
  /// Capacity is enforced; the preferred category is not.
  pub async fn assign_manually(
    &self,
    assignment_id: Uuid,
    vehicle_id: Uuid,
    driver_id: Uuid,
  ) -> Result<Assignment, OpError<S::Error>> {
    let store = &self.pool;

    let assignment = store
      .get_assignment(assignment_id)
      .await
      .map_err(OpError::Store)?
      .ok_or(Error::AssignmentNotFound(assignment_id))?;
    if assignment.state != AssignmentState::PendingAuto {
      return Err(
        Error::InvalidTransition { from: assignment.state, action: "assign" }
          .into(),
      );
    }

    let vehicle = store
      .get_vehicle(vehicle_id)
      .await
      .map_err(OpError::Store)?
      .ok_or(Error::VehicleNotFound(vehicle_id))?;
    if !vehicle.fits(assignment.passengers) {
      return Err(
        Error::Validation(format!(
          "vehicle {} seats {}, request needs {}",
          vehicle.plate, vehicle.capacity, assignment.passengers
        ))
        .into(),
      );
    }

    store
      .get_driver(driver_id)
      .await
      .map_err(OpError::Store)?
      .ok_or(Error::DriverNotFound(driver_id))?;

    let now = Utc::now();
    let claim = Claim {
      assignment_id,
      vehicle_id,
      driver_id,
      vehicle_state: self
        .config
        .vehicle_state_for(assignment.requested_start, now),
      claimed_at: now,
      passengers: assignment.passengers,
      // Manual assignment does not enforce category.
      category: None,
    };

    let conflict = match store.claim(&claim).await.map_err(OpError::Store)? {
      ClaimResult::Claimed => {
        tracing::info!(%assignment_id, %vehicle_id, %driver_id, "manual assignment");
        return store
          .get_assignment(assignment_id)
          .await
          .map_err(OpError::Store)?
          .ok_or(Error::AssignmentNotFound(assignment_id).into());
      }
      ClaimResult::VehicleTaken => format!(
        "vehicle {} is not available or no longer seats {}",
        vehicle.plate, assignment.passengers
      ),
      ClaimResult::DriverTaken => format!("driver {driver_id} is not available"),
      ClaimResult::AssignmentResolved => {
        format!("assignment {assignment_id} is no longer pending")
      }
    };
    Err(Error::ClaimConflict(conflict).into())
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
