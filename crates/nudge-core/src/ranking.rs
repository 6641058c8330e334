//! The [`RankingEngine`]: orders a candidate list for a requester.
//!
//! Score per candidate:
//!
//! | Term | Weight | Value |
//! |------|--------|-------|
//! | match probability | 0.4 | from the requester's affinity profile, 0 if absent |
//! | proximity | 0.3 | `max(0, 1 - d / 10 km)`, 0 if either position is unknown |
//! | frequent location | 0.2 | 1 if any of the requester's frequent locations is within 500 m of the requester |
//! | recency | 0.1 | 1 if the candidate was active in the last 24 h |
//!
//! The frequent-location term looks only at the requester, so it lifts every
//! candidate equally and never changes the order. It is kept as-is.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::Serialize;

use crate::{
  actor::ActorId,
  affinity::AffinityProfile,
  config::RankingConfig,
  geo::Position,
};

pub const MATCH_PROBABILITY_WEIGHT: f64 = 0.4;
pub const PROXIMITY_WEIGHT: f64 = 0.3;
pub const FREQUENT_LOCATION_WEIGHT: f64 = 0.2;
pub const RECENCY_WEIGHT: f64 = 0.1;

/// Distance at which the proximity term reaches zero.
pub const PROXIMITY_HORIZON_METERS: f64 = 10_000.0;
pub const FREQUENT_LOCATION_RADIUS_METERS: f64 = 500.0;
pub const RECENCY_WINDOW_HOURS: i64 = 24;

/// Everything a ranking pass reads. The engine itself holds no state.
#[derive(Debug, Clone, Copy)]
pub struct RankingInput<'a> {
  pub requester:           ActorId,
  pub candidates:          &'a [ActorId],
  pub requester_position:  Option<Position>,
  pub candidate_positions: &'a HashMap<ActorId, Position>,
  pub last_active:         &'a HashMap<ActorId, DateTime<Utc>>,
  pub affinity:            Option<&'a AffinityProfile>,
  pub now:                 DateTime<Utc>,
}

/// Weighted contributions of each term; `total` is their sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
  pub match_probability: f64,
  pub proximity:         f64,
  pub frequent_location: f64,
  pub recency:           f64,
  pub total:             f64,
}

#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
  config: RankingConfig,
}

impl RankingEngine {
  pub fn new(config: RankingConfig) -> Self { Self { config } }

  /// Order candidates by descending score. Equal scores keep their input
  /// order. Without an affinity profile the candidates are shuffled with the
  /// configured seed, or a fresh one if none is configured.
  pub fn rank(&self, input: &RankingInput<'_>) -> Vec<ActorId> {
    let seed = self.config.ranking_seed.unwrap_or_else(rand::random);
    self.rank_with_seed(input, seed)
  }

  pub fn rank_with_seed(&self, input: &RankingInput<'_>, seed: u64) -> Vec<ActorId> {
    let Some(profile) = input.affinity else {
      tracing::debug!(requester = %input.requester, seed, "no affinity profile; shuffling");
      let mut shuffled = input.candidates.to_vec();
      shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
      return shuffled;
    };

    let mut scored: Vec<(ActorId, f64)> = input
      .candidates
      .iter()
      .map(|&c| (c, self.score(input, profile, c).total))
      .collect();
    // `sort_by` is stable, which keeps ties in input order.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().map(|(c, _)| c).collect()
  }

  pub fn score(
    &self,
    input: &RankingInput<'_>,
    profile: &AffinityProfile,
    candidate: ActorId,
  ) -> ScoreBreakdown {
    let match_probability = profile.match_probability(candidate).unwrap_or(0.0);

    let proximity = match (input.requester_position, input.candidate_positions.get(&candidate)) {
      (Some(me), Some(them)) => {
        (1.0 - me.distance_to(them) / PROXIMITY_HORIZON_METERS).max(0.0)
      }
      _ => 0.0,
    };

    let frequent_location = match input.requester_position {
      Some(me)
        if profile.has_frequent_location_within(&me, FREQUENT_LOCATION_RADIUS_METERS) =>
      {
        1.0
      }
      _ => 0.0,
    };

    let recency = match input.last_active.get(&candidate) {
      Some(&seen) if input.now - seen < Duration::hours(RECENCY_WINDOW_HOURS) => 1.0,
      _ => 0.0,
    };

    let breakdown = ScoreBreakdown {
      match_probability: MATCH_PROBABILITY_WEIGHT * match_probability,
      proximity:         PROXIMITY_WEIGHT * proximity,
      frequent_location: FREQUENT_LOCATION_WEIGHT * frequent_location,
      recency:           RECENCY_WEIGHT * recency,
      total:             0.0,
    };
    ScoreBreakdown {
      total: breakdown.match_probability
        + breakdown.proximity
        + breakdown.frequent_location
        + breakdown.recency,
      ..breakdown
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Setup {
    requester:  ActorId,
    candidates: Vec<ActorId>,
    positions:  HashMap<ActorId, Position>,
    active:     HashMap<ActorId, DateTime<Utc>>,
    profile:    AffinityProfile,
    now:        DateTime<Utc>,
  }

  impl Setup {
    fn new(n: usize) -> Self {
      let requester = ActorId::new();
      let now = Utc::now();
      Self {
        requester,
        candidates: (0..n).map(|_| ActorId::new()).collect(),
        positions: HashMap::new(),
        active: HashMap::new(),
        profile: AffinityProfile::new(requester, now),
        now,
      }
    }

    fn input(&self, requester_position: Option<Position>, with_profile: bool) -> RankingInput<'_> {
      RankingInput {
        requester: self.requester,
        candidates: &self.candidates,
        requester_position,
        candidate_positions: &self.positions,
        last_active: &self.active,
        affinity: with_profile.then_some(&self.profile),
        now: self.now,
      }
    }
  }

  fn origin() -> Position { Position::new(0.0, 0.0).unwrap() }

  fn approx(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

  #[test]
  fn match_probability_dominates() {
    let mut s = Setup::new(3);
    let [a, b, c] = [s.candidates[0], s.candidates[1], s.candidates[2]];
    s.profile.match_probability.insert(c, 0.9);
    s.profile.match_probability.insert(b, 0.5);

    let ranked = RankingEngine::default().rank_with_seed(&s.input(None, true), 0);
    assert_eq!(ranked, vec![c, b, a]);
  }

  #[test]
  fn proximity_and_recency_terms() {
    let mut s = Setup::new(2);
    let [near, far] = [s.candidates[0], s.candidates[1]];
    // ~1.1 km and ~22 km north of the origin.
    s.positions.insert(near, Position::new(0.01, 0.0).unwrap());
    s.positions.insert(far, Position::new(0.2, 0.0).unwrap());
    s.active.insert(far, s.now - Duration::hours(1));

    let engine = RankingEngine::default();
    let input = s.input(Some(origin()), true);
    let near_score = engine.score(&input, &s.profile, near);
    let far_score = engine.score(&input, &s.profile, far);

    let expected = 0.3 * (1.0 - origin().distance_to(&s.positions[&near]) / 10_000.0);
    assert!(approx(near_score.proximity, expected));
    assert_eq!(near_score.recency, 0.0);
    assert_eq!(far_score.proximity, 0.0, "beyond 10 km");
    assert!(approx(far_score.recency, 0.1));

    assert_eq!(engine.rank_with_seed(&input, 0), vec![near, far]);

    // Without a requester position proximity contributes nothing.
    let blind = s.input(None, true);
    assert_eq!(engine.score(&blind, &s.profile, near).proximity, 0.0);
  }

  #[test]
  fn stale_activity_earns_no_recency() {
    let mut s = Setup::new(1);
    let c = s.candidates[0];
    s.active.insert(c, s.now - Duration::hours(24));
    let input = s.input(None, true);
    assert_eq!(RankingEngine::default().score(&input, &s.profile, c).recency, 0.0);
  }

  /// Open question: the frequent-location term is requester-centric. It adds
  /// the same amount to every candidate and so never reorders them.
  #[test]
  fn frequent_location_bonus_ignores_the_candidate() {
    let mut s = Setup::new(3);
    s.profile.record_visit(Position::new(0.001, 0.0).unwrap());
    let engine = RankingEngine::default();

    let with_bonus = s.input(Some(origin()), true);
    for &c in &s.candidates {
      assert!(approx(engine.score(&with_bonus, &s.profile, c).frequent_location, 0.2));
    }
    assert_eq!(engine.rank_with_seed(&with_bonus, 0), s.candidates);

    let elsewhere = s.input(Some(Position::new(1.0, 1.0).unwrap()), true);
    assert_eq!(
      engine.score(&elsewhere, &s.profile, s.candidates[0]).frequent_location,
      0.0
    );
  }

  #[test]
  fn ties_keep_input_order() {
    let s = Setup::new(6);
    let engine = RankingEngine::default();
    assert_eq!(engine.rank_with_seed(&s.input(None, true), 7), s.candidates);
  }

  #[test]
  fn ranking_is_deterministic() {
    let mut s = Setup::new(8);
    for (i, &c) in s.candidates.iter().enumerate() {
      s.profile.match_probability.insert(c, (i % 3) as f64 / 3.0);
    }
    let engine = RankingEngine::default();
    let input = s.input(Some(origin()), true);
    assert_eq!(engine.rank(&input), engine.rank(&input));
  }

  #[test]
  fn fallback_shuffle_is_seeded() {
    let s = Setup::new(20);
    let engine = RankingEngine::new(RankingConfig { ranking_seed: Some(42) });
    let input = s.input(None, false);

    let first = engine.rank(&input);
    assert_eq!(first, engine.rank(&input));
    assert_eq!(first, engine.rank_with_seed(&input, 42));

    let mut sorted = first.clone();
    sorted.sort();
    let mut expected = s.candidates.clone();
    expected.sort();
    assert_eq!(sorted, expected, "a permutation of the input");
  }
}
