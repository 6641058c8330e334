//! Error types for `nudge-core`.

use thiserror::Error;

use crate::actor::ActorId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid position: ({latitude}, {longitude})")]
  InvalidPosition { latitude: f64, longitude: f64 },

  /// The actor has no live presence entry, either because it never activated
  /// or because its entry went stale and was evicted.
  #[error("actor {0} is not active")]
  NotActive(ActorId),

  /// The directory has no profile for the actor.
  #[error("unknown actor: {0}")]
  UnknownActor(ActorId),

  #[error("actor {0} cannot signal itself")]
  SelfSignal(ActorId),

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("affinity update failed for {actor}: {reason}")]
  AffinityUpdateFailed { actor: ActorId, reason: String },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("directory error: {0}")]
  Directory(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
