//! The [`PresenceRegistry`]: who is currently in nudge mode, where, and
//! visible to whom.
//!
//! Per actor the registry is a two-state machine:
//!
//! ```text
//! Inactive --activate--> Active --renew--> Active
//!                          |
//!                          +--deactivate / staleness--> Inactive
//! ```
//!
//! Entries and the spatial index live behind a single mutex, so every
//! mutation of an actor's entry is serialised and the index never disagrees
//! with the entry table.

use std::{
  collections::{BTreeSet, HashMap},
  fmt,
  sync::Arc,
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  actor::ActorId,
  clock::Clock,
  config::PresenceConfig,
  geo::{GeoIndex, Position},
  ledger::SignalLedger,
};

// ─── Types ───────────────────────────────────────────────────────────────────

/// The category an actor is visible under (typically a gender); matched
/// against a requester's interested-in set. Stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct VisibilityTag(String);

impl VisibilityTag {
  pub fn new(tag: impl AsRef<str>) -> Self {
    Self(tag.as_ref().trim().to_lowercase())
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for VisibilityTag {
  fn from(s: String) -> Self { Self::new(s) }
}

impl From<&str> for VisibilityTag {
  fn from(s: &str) -> Self { Self::new(s) }
}

impl From<VisibilityTag> for String {
  fn from(t: VisibilityTag) -> Self { t.0 }
}

impl fmt::Display for VisibilityTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
  pub actor:           ActorId,
  pub position:        Position,
  pub visibility:      VisibilityTag,
  pub entered_at:      DateTime<Utc>,
  pub last_renewed_at: DateTime<Utc>,
}

/// One row of a nearby query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyActor {
  pub actor:            ActorId,
  pub distance_meters:  f64,
  pub visibility:       VisibilityTag,
  /// The other actor has an outstanding like or nudge toward the requester.
  pub has_signaled_you: bool,
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct PresenceState {
  entries: HashMap<ActorId, PresenceEntry>,
  index:   GeoIndex,
}

impl PresenceState {
  fn evict_stale(&mut self, cutoff: DateTime<Utc>) -> Vec<ActorId> {
    let stale: Vec<ActorId> = self
      .entries
      .values()
      .filter(|e| e.last_renewed_at < cutoff)
      .map(|e| e.actor)
      .collect();
    for actor in &stale {
      self.entries.remove(actor);
      self.index.remove(*actor);
    }
    stale
  }
}

pub struct PresenceRegistry {
  config: PresenceConfig,
  clock:  Arc<dyn Clock>,
  ledger: Arc<SignalLedger>,
  state:  Mutex<PresenceState>,
}

impl PresenceRegistry {
  pub fn new(
    config: PresenceConfig,
    clock: Arc<dyn Clock>,
    ledger: Arc<SignalLedger>,
  ) -> Self {
    Self {
      config,
      clock,
      ledger,
      state: Mutex::new(PresenceState::default()),
    }
  }

  pub fn config(&self) -> &PresenceConfig { &self.config }

  /// Enter nudge mode, or refresh position and visibility if already in it.
  /// Re-activation keeps the original `entered_at`.
  pub fn activate(
    &self,
    actor: ActorId,
    position: Position,
    visibility: VisibilityTag,
  ) -> Result<PresenceEntry> {
    position.validate()?;
    let now = self.clock.now();
    let mut state = self.state.lock();
    state.evict_stale(self.cutoff(now));

    let entered_at = state
      .entries
      .get(&actor)
      .map(|e| e.entered_at)
      .unwrap_or(now);
    let entry = PresenceEntry {
      actor,
      position,
      visibility,
      entered_at,
      last_renewed_at: now,
    };
    state.entries.insert(actor, entry.clone());
    state.index.insert(actor, position);

    tracing::info!(%actor, visibility = %entry.visibility, "presence activated");
    Ok(entry)
  }

  /// Refresh an active entry's position and liveness timestamp.
  pub fn renew(&self, actor: ActorId, position: Position) -> Result<PresenceEntry> {
    position.validate()?;
    let now = self.clock.now();
    let mut state = self.state.lock();
    state.evict_stale(self.cutoff(now));

    let PresenceState { entries, index } = &mut *state;
    let entry = entries.get_mut(&actor).ok_or(Error::NotActive(actor))?;
    entry.position = position;
    entry.last_renewed_at = now;
    index.update(actor, position);
    Ok(entry.clone())
  }

  /// Leave nudge mode. Returns whether the actor was active; leaving twice is
  /// not an error.
  pub fn deactivate(&self, actor: ActorId) -> bool {
    let mut state = self.state.lock();
    state.index.remove(actor);
    let was_active = state.entries.remove(&actor).is_some();
    if was_active {
      tracing::info!(%actor, "presence deactivated");
    }
    was_active
  }

  /// The actor's live entry, if it has one that has not gone stale.
  pub fn entry(&self, actor: ActorId) -> Option<PresenceEntry> {
    let cutoff = self.cutoff(self.clock.now());
    self
      .state
      .lock()
      .entries
      .get(&actor)
      .filter(|e| e.last_renewed_at >= cutoff)
      .cloned()
  }

  pub fn is_active(&self, actor: ActorId) -> bool { self.entry(actor).is_some() }

  /// Positions of whichever of `actors` are currently present.
  pub fn positions(&self, actors: &[ActorId]) -> HashMap<ActorId, Position> {
    let cutoff = self.cutoff(self.clock.now());
    let state = self.state.lock();
    actors
      .iter()
      .filter_map(|a| state.entries.get(a))
      .filter(|e| e.last_renewed_at >= cutoff)
      .map(|e| (e.actor, e.position))
      .collect()
  }

  pub fn active_count(&self) -> usize { self.state.lock().entries.len() }

  /// Everyone within the clamped radius of `actor`, nearest first, excluding
  /// `actor` itself. `visible_to` restricts results to the given visibility
  /// tags; `None` means no restriction.
  ///
  /// Fails with [`Error::NotActive`] if the requester has no live entry, so
  /// an empty result always means nobody is nearby.
  pub fn query_nearby(
    &self,
    actor: ActorId,
    radius_meters: f64,
    visible_to: Option<&BTreeSet<VisibilityTag>>,
  ) -> Result<Vec<NearbyActor>> {
    let radius = self.config.clamp_radius(radius_meters);
    if radius != radius_meters {
      tracing::debug!(requested = radius_meters, applied = radius, "radius clamped");
    }

    let now = self.clock.now();
    let candidates: Vec<(ActorId, f64, VisibilityTag)> = {
      let mut state = self.state.lock();
      let evicted = state.evict_stale(self.cutoff(now));
      if !evicted.is_empty() {
        tracing::debug!(count = evicted.len(), "evicted stale presence entries");
      }

      let center = state
        .entries
        .get(&actor)
        .map(|e| e.position)
        .ok_or(Error::NotActive(actor))?;

      state
        .index
        .query_within_radius(&center, radius + self.config.boundary_tolerance_meters)
        .into_iter()
        .filter(|n| n.actor != actor)
        .filter_map(|n| {
          let entry = state.entries.get(&n.actor)?;
          let allowed = visible_to.is_none_or(|set| set.contains(&entry.visibility));
          allowed.then(|| (n.actor, n.distance_meters, entry.visibility.clone()))
        })
        .collect()
    };

    // Ledger lookups happen after the presence lock is released.
    Ok(
      candidates
        .into_iter()
        .map(|(other, distance_meters, visibility)| NearbyActor {
          actor: other,
          distance_meters,
          visibility,
          has_signaled_you: self.ledger.has_signaled(other, actor),
        })
        .collect(),
    )
  }

  /// Evict every entry whose last renewal is older than the staleness TTL.
  pub fn sweep_stale(&self) -> Vec<ActorId> {
    let now = self.clock.now();
    let evicted = self.state.lock().evict_stale(self.cutoff(now));
    if !evicted.is_empty() {
      tracing::info!(count = evicted.len(), "swept stale presence entries");
    }
    evicted
  }

  fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    now - self.config.staleness_ttl()
  }
}
