//! The `Directory` collaborator: profile data the engine reads but never
//! computes: age, visibility category, stated preferences and last activity.
//!
//! Real deployments back this with the user service. [`InMemoryDirectory`]
//! is used by tests and by the standalone server, which fills it through the
//! profile sync endpoint.

use std::{
  collections::{BTreeSet, HashMap},
  convert::Infallible,
  future::Future,
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{actor::ActorId, geo::Position, presence::VisibilityTag};

// ─── Types ───────────────────────────────────────────────────────────────────

/// What an actor is looking for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
  pub min_age:         u8,
  pub max_age:         u8,
  /// Discovery distance cap in kilometres.
  pub max_distance_km: f64,
  pub interested_in:   BTreeSet<VisibilityTag>,
}

impl Default for Preferences {
  fn default() -> Self {
    Self {
      min_age:         18,
      max_age:         99,
      max_distance_km: 50.0,
      interested_in:   BTreeSet::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorProfile {
  pub actor:                ActorId,
  pub age:                  u8,
  pub visibility:           VisibilityTag,
  #[serde(default)]
  pub preferences:          Preferences,
  pub last_active:          DateTime<Utc>,
  /// Coarse home-area location used by discovery, not by nudge mode.
  #[serde(default)]
  pub approximate_location: Option<Position>,
}

impl ActorProfile {
  /// Whether `other` falls inside this actor's age range and interested-in
  /// categories.
  pub fn accepts(&self, other: &ActorProfile) -> bool {
    (self.preferences.min_age..=self.preferences.max_age).contains(&other.age)
      && self.preferences.interested_in.contains(&other.visibility)
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Read (and sync) access to actor profiles.
pub trait Directory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look up one actor. Returns `None` if unknown.
  fn profile(
    &self,
    actor: ActorId,
  ) -> impl Future<Output = Result<Option<ActorProfile>, Self::Error>> + Send + '_;

  /// Look up several actors; unknown ids are skipped.
  fn profiles<'a>(
    &'a self,
    actors: &'a [ActorId],
  ) -> impl Future<Output = Result<Vec<ActorProfile>, Self::Error>> + Send + 'a;

  /// Every actor `requester` would accept by age and category, excluding the
  /// requester, in a stable order.
  fn candidates<'a>(
    &'a self,
    requester: &'a ActorProfile,
  ) -> impl Future<Output = Result<Vec<ActorProfile>, Self::Error>> + Send + 'a;

  /// Create or replace a profile.
  fn upsert_profile(
    &self,
    profile: ActorProfile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── In-memory implementation ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
  profiles: RwLock<HashMap<ActorId, ActorProfile>>,
}

impl InMemoryDirectory {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize { self.profiles.read().len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Directory for InMemoryDirectory {
  type Error = Infallible;

  async fn profile(&self, actor: ActorId) -> Result<Option<ActorProfile>, Infallible> {
    Ok(self.profiles.read().get(&actor).cloned())
  }

  async fn profiles<'a>(
    &'a self,
    actors: &'a [ActorId],
  ) -> Result<Vec<ActorProfile>, Infallible> {
    let profiles = self.profiles.read();
    Ok(actors.iter().filter_map(|a| profiles.get(a).cloned()).collect())
  }

  async fn candidates<'a>(
    &'a self,
    requester: &'a ActorProfile,
  ) -> Result<Vec<ActorProfile>, Infallible> {
    let mut out: Vec<ActorProfile> = self
      .profiles
      .read()
      .values()
      .filter(|p| p.actor != requester.actor && requester.accepts(p))
      .cloned()
      .collect();
    out.sort_by_key(|p| p.actor);
    Ok(out)
  }

  async fn upsert_profile(&self, profile: ActorProfile) -> Result<(), Infallible> {
    self.profiles.write().insert(profile.actor, profile);
    Ok(())
  }
}
