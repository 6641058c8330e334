//! Handlers for `/presence` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `PUT`    | `/presence/{actor}` | Body: `{"position":{..},"visibility":"women"}` |
//! | `POST`   | `/presence/{actor}/renew` | Body: `{"position":{..}}`; 409 if not active |
//! | `DELETE` | `/presence/{actor}` | 204 whether or not the actor was active |
//! | `GET`    | `/presence/{actor}/nearby` | Optional `?radius=<meters>`; 409 if not active |

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, QueryRejection},
  },
  http::StatusCode,
};
use nudge_core::{
  ActorId, NudgeService,
  directory::Directory,
  geo::Position,
  presence::{NearbyActor, PresenceEntry, VisibilityTag},
  store::LedgerStore,
};
use serde::Deserialize;

use crate::error::ApiError;

/// Radius used when a nearby query names none. The engine clamps it anyway.
pub const DEFAULT_RADIUS_METERS: f64 = 50.0;

// ─── Activate ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActivateBody {
  pub position:   Position,
  pub visibility: VisibilityTag,
}

/// `PUT /presence/{actor}`
pub async fn activate<S, D>(
  State(service): State<NudgeService<S, D>>,
  Path(actor): Path<ActorId>,
  body: Result<Json<ActivateBody>, JsonRejection>,
) -> Result<Json<PresenceEntry>, ApiError>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  let Json(body) = body?;
  let entry = service.activate_presence(actor, body.position, body.visibility)?;
  Ok(Json(entry))
}

// ─── Renew ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RenewBody {
  pub position: Position,
}

/// `POST /presence/{actor}/renew`
pub async fn renew<S, D>(
  State(service): State<NudgeService<S, D>>,
  Path(actor): Path<ActorId>,
  body: Result<Json<RenewBody>, JsonRejection>,
) -> Result<Json<PresenceEntry>, ApiError>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  let Json(body) = body?;
  Ok(Json(service.renew_presence(actor, body.position)?))
}

// ─── Deactivate ──────────────────────────────────────────────────────────────

/// `DELETE /presence/{actor}`
pub async fn deactivate<S, D>(
  State(service): State<NudgeService<S, D>>,
  Path(actor): Path<ActorId>,
) -> StatusCode
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  service.deactivate_presence(actor);
  StatusCode::NO_CONTENT
}

// ─── Nearby ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NearbyParams {
  pub radius: Option<f64>,
}

/// `GET /presence/{actor}/nearby[?radius=<meters>]`
pub async fn nearby<S, D>(
  State(service): State<NudgeService<S, D>>,
  Path(actor): Path<ActorId>,
  params: Result<Query<NearbyParams>, QueryRejection>,
) -> Result<Json<Vec<NearbyActor>>, ApiError>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  let Query(params) = params?;
  let radius = params.radius.unwrap_or(DEFAULT_RADIUS_METERS);
  Ok(Json(service.query_nearby(actor, radius).await?))
}
