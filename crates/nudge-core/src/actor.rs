//! Actor identity: the only thing the engine knows about a user.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque user identifier.
///
/// Ordering is the byte order of the underlying UUID, which is also the
/// lexicographic order of its hyphenated string form. Canonical pair
/// ordering and distance tie-breaks rely on it.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActorId(pub Uuid);

impl ActorId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for ActorId {
  fn default() -> Self { Self::new() }
}

impl From<Uuid> for ActorId {
  fn from(id: Uuid) -> Self { Self(id) }
}

impl fmt::Display for ActorId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.hyphenated().fmt(f)
  }
}

impl FromStr for ActorId {
  type Err = uuid::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Uuid::parse_str(s).map(Self) }
}

/// An unordered pair of actors in canonical form: the smaller id first.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ActorPair {
  pub first:  ActorId,
  pub second: ActorId,
}

impl ActorPair {
  pub fn new(a: ActorId, b: ActorId) -> Self {
    if a <= b {
      Self { first: a, second: b }
    } else {
      Self { first: b, second: a }
    }
  }

  pub fn contains(&self, actor: ActorId) -> bool {
    self.first == actor || self.second == actor
  }
}
