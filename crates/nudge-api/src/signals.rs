//! Handlers for signal and interaction endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/signals` | Body: `{"from":..,"to":..,"kind":"nudge","location":{..}?}` |
//! | `GET`  | `/actors/{actor}/signals/sent` | Optional `?kind=like\|pass\|nudge` |
//! | `GET`  | `/actors/{actor}/signals/received` | Optional `?kind=like\|pass\|nudge` |
//! | `POST` | `/interactions` | Body: `{"actor":..,"target":..,"kind":"messaged\|viewed"}` |

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, QueryRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use nudge_core::{
  ActorId, NudgeService,
  affinity::InteractionKind,
  directory::Directory,
  signal::{LocationContext, SignalKind, SignalRecord},
  store::LedgerStore,
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── Record ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub from:     ActorId,
  pub to:       ActorId,
  pub kind:     SignalKind,
  #[serde(default)]
  pub location: Option<LocationContext>,
}

/// `POST /signals`: 201 with the recorded signal and any match it created.
pub async fn create<S, D>(
  State(service): State<NudgeService<S, D>>,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  let Json(body) = body?;
  let outcome = service
    .record_signal(body.from, body.to, body.kind, body.location)
    .await?;
  Ok((StatusCode::CREATED, Json(outcome)))
}

// ─── Listings ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub kind: Option<SignalKind>,
}

/// `GET /actors/{actor}/signals/sent[?kind=<kind>]`
pub async fn sent<S, D>(
  State(service): State<NudgeService<S, D>>,
  Path(actor): Path<ActorId>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<SignalRecord>>, ApiError>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  let Query(params) = params?;
  Ok(Json(service.sent_signals(actor, params.kind)))
}

/// `GET /actors/{actor}/signals/received[?kind=<kind>]`
pub async fn received<S, D>(
  State(service): State<NudgeService<S, D>>,
  Path(actor): Path<ActorId>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<SignalRecord>>, ApiError>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  let Query(params) = params?;
  Ok(Json(service.received_signals(actor, params.kind)))
}

// ─── Interactions ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InteractionBody {
  pub actor:  ActorId,
  pub target: ActorId,
  pub kind:   InteractionKind,
}

/// `POST /interactions`: 204. Likes, passes, nudges and matches are derived
/// by the engine itself and are rejected here.
pub async fn interaction<S, D>(
  State(service): State<NudgeService<S, D>>,
  body: Result<Json<InteractionBody>, JsonRejection>,
) -> Result<StatusCode, ApiError>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  let Json(body) = body?;
  if !matches!(body.kind, InteractionKind::Messaged | InteractionKind::Viewed) {
    return Err(ApiError::BadRequest(format!(
      "{} interactions are recorded by the engine",
      body.kind
    )));
  }
  if body.actor == body.target {
    return Err(ApiError::BadRequest("actor and target must differ".into()));
  }
  service.record_interaction(body.actor, body.target, body.kind);
  Ok(StatusCode::NO_CONTENT)
}
