//! Per-actor endpoints that are not part of the nudge flow itself.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/actors/{actor}/affinity` | 404 if the actor has no history |
//! | `PUT`  | `/actors/{actor}/profile` | Directory sync; 204 |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
};
use chrono::{DateTime, Utc};
use nudge_core::{
  ActorId, NudgeService,
  affinity::AffinityProfile,
  directory::{ActorProfile, Directory, Preferences},
  geo::Position,
  presence::VisibilityTag,
  store::LedgerStore,
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── Affinity ────────────────────────────────────────────────────────────────

/// `GET /actors/{actor}/affinity`
pub async fn affinity<S, D>(
  State(service): State<NudgeService<S, D>>,
  Path(actor): Path<ActorId>,
) -> Result<Json<AffinityProfile>, ApiError>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  service
    .affinity(actor)
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("no affinity profile for {actor}")))
}

// ─── Profile sync ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ProfileBody {
  pub age:                  u8,
  pub visibility:           VisibilityTag,
  #[serde(default)]
  pub preferences:          Preferences,
  /// Defaults to the time of the sync.
  pub last_active:          Option<DateTime<Utc>>,
  #[serde(default)]
  pub approximate_location: Option<Position>,
}

/// `PUT /actors/{actor}/profile`
pub async fn upsert_profile<S, D>(
  State(service): State<NudgeService<S, D>>,
  Path(actor): Path<ActorId>,
  body: Result<Json<ProfileBody>, JsonRejection>,
) -> Result<StatusCode, ApiError>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  let Json(body) = body?;
  if body.preferences.min_age > body.preferences.max_age {
    return Err(ApiError::BadRequest("min_age exceeds max_age".into()));
  }
  if let Some(location) = &body.approximate_location {
    location.validate()?;
  }

  let profile = ActorProfile {
    actor,
    age: body.age,
    visibility: body.visibility,
    preferences: body.preferences,
    last_active: body.last_active.unwrap_or_else(Utc::now),
    approximate_location: body.approximate_location,
  };
  service.upsert_profile(profile).await?;
  Ok(StatusCode::NO_CONTENT)
}
