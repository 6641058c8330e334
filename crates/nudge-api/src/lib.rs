//! JSON REST API for the Nudge engine.
//!
//! Exposes an axum [`Router`] backed by a [`NudgeService`]. Authentication,
//! TLS and event delivery are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", nudge_api::api_router(service.clone()))
//! ```

pub mod actors;
pub mod error;
pub mod matches;
pub mod presence;
pub mod ranking;
pub mod signals;

use axum::{
  Router,
  routing::{get, post, put},
};
use nudge_core::{NudgeService, directory::Directory, store::LedgerStore};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, D>(service: NudgeService<S, D>) -> Router<()>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  Router::new()
    // Presence
    .route(
      "/presence/{actor}",
      put(presence::activate::<S, D>).delete(presence::deactivate::<S, D>),
    )
    .route("/presence/{actor}/renew", post(presence::renew::<S, D>))
    .route("/presence/{actor}/nearby", get(presence::nearby::<S, D>))
    // Signals
    .route("/signals", post(signals::create::<S, D>))
    .route("/actors/{actor}/signals/sent", get(signals::sent::<S, D>))
    .route("/actors/{actor}/signals/received", get(signals::received::<S, D>))
    .route("/interactions", post(signals::interaction::<S, D>))
    // Matches
    .route("/actors/{actor}/matches", get(matches::list::<S, D>))
    // Ranking
    .route("/actors/{actor}/rank", post(ranking::rank::<S, D>))
    .route("/actors/{actor}/discover", get(ranking::discover::<S, D>))
    // Actors
    .route("/actors/{actor}/affinity", get(actors::affinity::<S, D>))
    .route("/actors/{actor}/profile", put(actors::upsert_profile::<S, D>))
    .layer(TraceLayer::new_for_http())
    .with_state(service)
}
