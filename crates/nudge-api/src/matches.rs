//! Handler for `GET /actors/{actor}/matches[?include_expired=true]`.
//!
//! Active matches by default; with `include_expired=true` the full history.
//! Both are newest first.

use axum::{
  Json,
  extract::{Path, Query, State, rejection::QueryRejection},
};
use nudge_core::{
  ActorId, NudgeService, directory::Directory, matching::Match, store::LedgerStore,
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub include_expired: bool,
}

pub async fn list<S, D>(
  State(service): State<NudgeService<S, D>>,
  Path(actor): Path<ActorId>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Match>>, ApiError>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  let Query(params) = params?;
  let matches = if params.include_expired {
    service.match_history(actor)
  } else {
    service.list_active_matches(actor)
  };
  Ok(Json(matches))
}
