//! Handlers for candidate ordering.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/actors/{actor}/rank` | Body: `{"candidates":[..]}`; returns them best first |
//! | `GET`  | `/actors/{actor}/discover` | Optional `?limit=<n>` (default 20); 404 without a profile |

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, QueryRejection},
  },
};
use nudge_core::{ActorId, NudgeService, directory::Directory, store::LedgerStore};
use serde::Deserialize;

use crate::error::ApiError;

pub const DEFAULT_DISCOVER_LIMIT: usize = 20;

// ─── Rank ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RankBody {
  pub candidates: Vec<ActorId>,
}

/// `POST /actors/{actor}/rank`
pub async fn rank<S, D>(
  State(service): State<NudgeService<S, D>>,
  Path(actor): Path<ActorId>,
  body: Result<Json<RankBody>, JsonRejection>,
) -> Result<Json<Vec<ActorId>>, ApiError>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  let Json(body) = body?;
  Ok(Json(service.rank_candidates(actor, &body.candidates).await?))
}

// ─── Discover ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DiscoverParams {
  pub limit: Option<usize>,
}

/// `GET /actors/{actor}/discover[?limit=<n>]`
pub async fn discover<S, D>(
  State(service): State<NudgeService<S, D>>,
  Path(actor): Path<ActorId>,
  params: Result<Query<DiscoverParams>, QueryRejection>,
) -> Result<Json<Vec<ActorId>>, ApiError>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  let Query(params) = params?;
  let limit = params.limit.unwrap_or(DEFAULT_DISCOVER_LIMIT);
  Ok(Json(service.discover(actor, limit).await?))
}
