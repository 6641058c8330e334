//! Affinity profiles: per-actor interest estimates derived from interaction
//! history.
//!
//! The probability map is recomputed by replaying a bounded window of the
//! actor's interactions, oldest first, through [`InteractionKind::apply`].
//! Each step overwrites the previous value for that target, so the result is
//! a recency-weighted indicator rather than a calibrated probability.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{actor::ActorId, geo::Position};

/// Starting value for a target with no history.
pub const PRIOR_PROBABILITY: f64 = 0.5;
pub const LIKE_STEP: f64 = 0.2;
pub const MESSAGE_STEP: f64 = 0.1;
pub const PASS_STEP: f64 = 0.3;
/// Value assigned outright when a match is confirmed.
pub const MATCHED_PROBABILITY: f64 = 0.9;
/// Visits closer than this to a known frequent location count toward it.
pub const VISIT_MERGE_RADIUS_METERS: f64 = 100.0;

/// Something an actor did with respect to another actor.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InteractionKind {
  Liked,
  Passed,
  Nudged,
  Matched,
  Messaged,
  Viewed,
}

impl InteractionKind {
  /// Next probability for a target given its current value.
  pub fn apply(self, prior: f64) -> f64 {
    match self {
      Self::Liked => (prior + LIKE_STEP).min(1.0),
      Self::Messaged => (prior + MESSAGE_STEP).min(1.0),
      Self::Passed => (prior - PASS_STEP).max(0.0),
      Self::Matched => MATCHED_PROBABILITY,
      Self::Nudged | Self::Viewed => prior,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
  pub target: ActorId,
  pub kind:   InteractionKind,
  pub at:     DateTime<Utc>,
}

/// A place the actor keeps showing up at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequentLocation {
  pub position:    Position,
  pub visit_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityProfile {
  pub actor:              ActorId,
  pub match_probability:  HashMap<ActorId, f64>,
  pub frequent_locations: Vec<FrequentLocation>,
  pub updated_at:         DateTime<Utc>,
}

impl AffinityProfile {
  pub fn new(actor: ActorId, at: DateTime<Utc>) -> Self {
    Self {
      actor,
      match_probability: HashMap::new(),
      frequent_locations: Vec::new(),
      updated_at: at,
    }
  }

  pub fn match_probability(&self, target: ActorId) -> Option<f64> {
    self.match_probability.get(&target).copied()
  }

  /// Count a visit to `position`, merging it into the nearest known location
  /// within [`VISIT_MERGE_RADIUS_METERS`].
  pub fn record_visit(&mut self, position: Position) {
    let nearest = self
      .frequent_locations
      .iter_mut()
      .map(|loc| (loc.position.distance_to(&position), loc))
      .filter(|(d, _)| *d <= VISIT_MERGE_RADIUS_METERS)
      .min_by(|a, b| a.0.total_cmp(&b.0));

    match nearest {
      Some((_, loc)) => loc.visit_count = loc.visit_count.saturating_add(1),
      None => self.frequent_locations.push(FrequentLocation {
        position,
        visit_count: 1,
      }),
    }
  }

  pub fn has_frequent_location_within(
    &self,
    position: &Position,
    radius_meters: f64,
  ) -> bool {
    self
      .frequent_locations
      .iter()
      .any(|loc| loc.position.distance_to(position) <= radius_meters)
  }
}

/// Replay `interactions` (oldest first) into a fresh probability map.
pub fn compute_match_probabilities<'a>(
  interactions: impl IntoIterator<Item = &'a Interaction>,
) -> HashMap<ActorId, f64> {
  let mut map = HashMap::new();
  for i in interactions {
    let prior = map.get(&i.target).copied().unwrap_or(PRIOR_PROBABILITY);
    map.insert(i.target, i.kind.apply(prior));
  }
  map
}
