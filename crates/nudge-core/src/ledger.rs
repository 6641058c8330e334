//! The [`SignalLedger`]: the append-only signal log, reciprocity detection
//! and the interaction history that feeds affinity profiles.
//!
//! The ledger only records and detects. Creating a match from a detected
//! reciprocity is the [`MatchEngine`](crate::matching::MatchEngine)'s job;
//! the ledger hands it a [`MatchCandidateEvent`] and later marks the signals
//! the match consumed as resolved.

use std::{
  collections::{HashMap, VecDeque},
  sync::Arc,
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  actor::{ActorId, ActorPair},
  affinity::{AffinityProfile, Interaction, InteractionKind, compute_match_probabilities},
  clock::Clock,
  config::LedgerConfig,
  matching::MatchType,
  signal::{LocationContext, Signal, SignalKind, SignalRecord},
};

// ─── Events ──────────────────────────────────────────────────────────────────

/// Reciprocity detected between two actors. `actor_a` sent the earlier
/// signal; `actor_b` sent the one that completed the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidateEvent {
  pub actor_a:    ActorId,
  pub actor_b:    ActorId,
  pub match_type: MatchType,
}

impl MatchCandidateEvent {
  pub fn pair(&self) -> ActorPair { ActorPair::new(self.actor_a, self.actor_b) }
}

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct LedgerState {
  log:          Vec<Signal>,
  /// Parallel to `log`: whether the signal was consumed by a match.
  resolved:     Vec<bool>,
  /// Indices into `log` keyed by directed `(from, to)`.
  by_pair:      HashMap<(ActorId, ActorId), Vec<usize>>,
  sent:         HashMap<ActorId, Vec<usize>>,
  received:     HashMap<ActorId, Vec<usize>>,
  /// The most recent interactions per actor, oldest first, capped at the
  /// affinity window.
  interactions: HashMap<ActorId, VecDeque<Interaction>>,
  profiles:     HashMap<ActorId, AffinityProfile>,
}

impl LedgerState {
  fn insert(&mut self, signal: Signal, window: usize) -> usize {
    let idx = self.log.len();
    let (from, to) = (signal.from, signal.to);

    self.by_pair.entry((from, to)).or_default().push(idx);
    self.sent.entry(from).or_default().push(idx);
    self.received.entry(to).or_default().push(idx);

    let profile = self
      .profiles
      .entry(from)
      .or_insert_with(|| AffinityProfile::new(from, signal.created_at));
    if let Some(ctx) = &signal.location {
      profile.record_visit(ctx.position);
    }

    self.push_interaction(
      from,
      Interaction {
        target: to,
        kind:   signal.kind.interaction(),
        at:     signal.created_at,
      },
      window,
    );

    self.log.push(signal);
    self.resolved.push(false);
    idx
  }

  fn push_interaction(&mut self, actor: ActorId, interaction: Interaction, window: usize) {
    let history = self.interactions.entry(actor).or_default();
    let out_of_order = history.back().is_some_and(|last| last.at > interaction.at);
    history.push_back(interaction);
    if out_of_order {
      history.make_contiguous().sort_by_key(|i| i.at);
    }
    while history.len() > window {
      history.pop_front();
    }
  }

  /// Unresolved signals of `kind` sent from `from` to `to`.
  fn unresolved(
    &self,
    from: ActorId,
    to: ActorId,
    kind: SignalKind,
  ) -> impl Iterator<Item = usize> + '_ {
    self
      .by_pair
      .get(&(from, to))
      .into_iter()
      .flatten()
      .copied()
      .filter(move |&i| !self.resolved[i] && self.log[i].kind == kind)
  }

  /// The candidate completed by a just-inserted `kind` signal from `from` to
  /// `to`, if the target has an unresolved signal of the same kind pending.
  fn detect(&self, from: ActorId, to: ActorId, kind: SignalKind) -> Option<MatchCandidateEvent> {
    let match_type = kind.match_type()?;
    self
      .unresolved(to, from, kind)
      .next()
      .map(|_| MatchCandidateEvent { actor_a: to, actor_b: from, match_type })
  }

  fn resolve(&mut self, pair: ActorPair, kind: SignalKind, up_to: DateTime<Utc>) -> usize {
    let targets: Vec<usize> = self
      .unresolved(pair.first, pair.second, kind)
      .chain(self.unresolved(pair.second, pair.first, kind))
      .filter(|&i| self.log[i].created_at <= up_to)
      .collect();
    for &i in &targets {
      self.resolved[i] = true;
    }
    targets.len()
  }

  fn records(&self, indices: Option<&Vec<usize>>, kind: Option<SignalKind>) -> Vec<SignalRecord> {
    let mut out: Vec<SignalRecord> = indices
      .into_iter()
      .flatten()
      .copied()
      .filter(|&i| kind.is_none_or(|k| self.log[i].kind == k))
      .map(|i| SignalRecord {
        signal:   self.log[i].clone(),
        resolved: self.resolved[i],
      })
      .collect();
    out.reverse();
    // Stable: equal timestamps keep newest-appended first.
    out.sort_by(|a, b| b.signal.created_at.cmp(&a.signal.created_at));
    out
  }
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

pub struct SignalLedger {
  config: LedgerConfig,
  clock:  Arc<dyn Clock>,
  state:  RwLock<LedgerState>,
}

impl SignalLedger {
  pub fn new(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
    Self {
      config,
      clock,
      state: RwLock::new(LedgerState::default()),
    }
  }

  /// Build a signal stamped with the ledger's clock without recording it.
  ///
  /// Callers that journal signals durably write the prepared signal first
  /// and only then [`append`](Self::append) it.
  pub fn prepare(
    &self,
    from: ActorId,
    to: ActorId,
    kind: SignalKind,
    location: Option<LocationContext>,
  ) -> Result<Signal> {
    if from == to {
      return Err(Error::SelfSignal(from));
    }
    if let Some(ctx) = &location {
      ctx.position.validate()?;
    }
    Ok(Signal {
      signal_id: Uuid::new_v4(),
      from,
      to,
      kind,
      created_at: self.clock.now(),
      location,
    })
  }

  /// Append `signal` and check for an unresolved reciprocal signal of the
  /// same kind from the target. The append and the lookup happen under one
  /// write lock, so of two crossing signals exactly one sees the other.
  pub fn append(&self, signal: Signal) -> Option<MatchCandidateEvent> {
    let (from, to, kind) = (signal.from, signal.to, signal.kind);
    let mut state = self.state.write();
    state.insert(signal, self.config.affinity_window);

    let candidate = state.detect(from, to, kind)?;
    tracing::debug!(%from, %to, %kind, "reciprocal signal detected");
    Some(candidate)
  }

  /// [`prepare`](Self::prepare) and [`append`](Self::append) in one step.
  pub fn record_signal(
    &self,
    from: ActorId,
    to: ActorId,
    kind: SignalKind,
    location: Option<LocationContext>,
  ) -> Result<(Signal, Option<MatchCandidateEvent>)> {
    let signal = self.prepare(from, to, kind, location)?;
    let candidate = self.append(signal.clone());
    Ok((signal, candidate))
  }

  /// Replay journaled signals in time order.
  ///
  /// Every reciprocity the live path would have detected resolves the pair's
  /// signals again, whether or not it produced a match, so the resolved
  /// flags come out as they were before the restart. No candidates are
  /// returned.
  pub fn restore(&self, signals: impl IntoIterator<Item = Signal>) -> usize {
    let mut signals: Vec<Signal> = signals.into_iter().collect();
    signals.sort_by_key(|s| s.created_at);
    let count = signals.len();
    let mut state = self.state.write();
    for s in signals {
      let (from, to, kind, at) = (s.from, s.to, s.kind, s.created_at);
      state.insert(s, self.config.affinity_window);
      if let Some(candidate) = state.detect(from, to, kind) {
        state.resolve(candidate.pair(), kind, at);
      }
    }
    count
  }

  /// Whether `from` has an outstanding like or nudge toward `to` that `to`
  /// has not returned.
  pub fn has_signaled(&self, from: ActorId, to: ActorId) -> bool {
    let state = self.state.read();
    [SignalKind::Like, SignalKind::Nudge].into_iter().any(|kind| {
      state.unresolved(from, to, kind).next().is_some()
        && state.unresolved(to, from, kind).next().is_none()
    })
  }

  /// Kind of the newest signal `from` sent to `to`.
  pub fn latest_kind(&self, from: ActorId, to: ActorId) -> Option<SignalKind> {
    let state = self.state.read();
    state
      .by_pair
      .get(&(from, to))?
      .iter()
      .map(|&i| &state.log[i])
      .max_by_key(|s| s.created_at)
      .map(|s| s.kind)
  }

  /// Mark every unresolved `kind` signal between the pair, in either
  /// direction and created no later than `up_to`, as resolved. Returns how
  /// many were marked.
  pub fn resolve_pair(&self, pair: ActorPair, kind: SignalKind, up_to: DateTime<Utc>) -> usize {
    self.state.write().resolve(pair, kind, up_to)
  }

  /// Signals `actor` sent, newest first.
  pub fn sent(&self, actor: ActorId, kind: Option<SignalKind>) -> Vec<SignalRecord> {
    let state = self.state.read();
    state.records(state.sent.get(&actor), kind)
  }

  /// Signals `actor` received, newest first.
  pub fn received(&self, actor: ActorId, kind: Option<SignalKind>) -> Vec<SignalRecord> {
    let state = self.state.read();
    state.records(state.received.get(&actor), kind)
  }

  /// Record an interaction reported by a collaborator (a message sent, a
  /// profile viewed).
  pub fn record_interaction(&self, actor: ActorId, target: ActorId, kind: InteractionKind) {
    let at = self.clock.now();
    self.record_interaction_at(actor, target, kind, at);
  }

  /// Record the `matched` interaction for both sides of `pair`.
  pub fn note_match(&self, pair: ActorPair, at: DateTime<Utc>) {
    self.record_interaction_at(pair.first, pair.second, InteractionKind::Matched, at);
    self.record_interaction_at(pair.second, pair.first, InteractionKind::Matched, at);
  }

  fn record_interaction_at(
    &self,
    actor: ActorId,
    target: ActorId,
    kind: InteractionKind,
    at: DateTime<Utc>,
  ) {
    let mut state = self.state.write();
    state
      .profiles
      .entry(actor)
      .or_insert_with(|| AffinityProfile::new(actor, at));
    state.push_interaction(actor, Interaction { target, kind, at }, self.config.affinity_window);
  }

  /// Recompute `actor`'s match probabilities from its interaction window.
  /// Returns `None` if the actor has never interacted with anyone.
  pub fn update_affinity(&self, actor: ActorId) -> Option<AffinityProfile> {
    let now = self.clock.now();
    let mut state = self.state.write();
    let probabilities = compute_match_probabilities(state.interactions.get(&actor)?);
    let profile = state.profiles.get_mut(&actor)?;
    profile.match_probability = probabilities;
    profile.updated_at = now;
    Some(profile.clone())
  }

  pub fn affinity(&self, actor: ActorId) -> Option<AffinityProfile> {
    self.state.read().profiles.get(&actor).cloned()
  }

  /// Every actor that has an affinity profile.
  pub fn profiled_actors(&self) -> Vec<ActorId> {
    self.state.read().profiles.keys().copied().collect()
  }

  pub fn len(&self) -> usize { self.state.read().log.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::{clock::ManualClock, geo::Position};

  fn ledger() -> (SignalLedger, Arc<ManualClock>) {
    ledger_with_window(100)
  }

  fn ledger_with_window(affinity_window: usize) -> (SignalLedger, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let ledger = SignalLedger::new(LedgerConfig { affinity_window }, clock.clone());
    (ledger, clock)
  }

  fn record(
    ledger: &SignalLedger,
    from: ActorId,
    to: ActorId,
    kind: SignalKind,
  ) -> Option<MatchCandidateEvent> {
    ledger.record_signal(from, to, kind, None).unwrap().1
  }

  #[test]
  fn reciprocal_likes_emit_regular_candidate() {
    let (ledger, _) = ledger();
    let (a, b) = (ActorId::new(), ActorId::new());

    assert_eq!(record(&ledger, a, b, SignalKind::Like), None);
    let event = record(&ledger, b, a, SignalKind::Like).unwrap();
    assert_eq!(event, MatchCandidateEvent {
      actor_a:    a,
      actor_b:    b,
      match_type: MatchType::Regular,
    });
  }

  #[test]
  fn reciprocal_nudges_emit_nudge_candidate() {
    let (ledger, _) = ledger();
    let (a, b) = (ActorId::new(), ActorId::new());

    record(&ledger, b, a, SignalKind::Nudge);
    let event = record(&ledger, a, b, SignalKind::Nudge).unwrap();
    assert_eq!(event.match_type, MatchType::Nudge);
    assert_eq!(event.pair(), ActorPair::new(a, b));
  }

  #[test]
  fn mixed_kinds_are_not_reciprocal() {
    let (ledger, _) = ledger();
    let (a, b, c) = (ActorId::new(), ActorId::new(), ActorId::new());

    record(&ledger, a, b, SignalKind::Like);
    assert_eq!(record(&ledger, b, a, SignalKind::Nudge), None);

    // Pass then like: no candidate.
    record(&ledger, a, c, SignalKind::Pass);
    assert_eq!(record(&ledger, c, a, SignalKind::Like), None);
    assert_eq!(record(&ledger, a, c, SignalKind::Pass), None);
  }

  #[test]
  fn earlier_like_survives_a_later_pass_for_reciprocity() {
    let (ledger, clock) = ledger();
    let (a, b) = (ActorId::new(), ActorId::new());

    record(&ledger, a, b, SignalKind::Like);
    clock.advance(Duration::seconds(1));
    record(&ledger, a, b, SignalKind::Pass);
    assert_eq!(ledger.latest_kind(a, b), Some(SignalKind::Pass));

    clock.advance(Duration::seconds(1));
    assert!(record(&ledger, b, a, SignalKind::Like).is_some());
  }

  #[test]
  fn resolved_signals_stop_counting() {
    let (ledger, clock) = ledger();
    let (a, b) = (ActorId::new(), ActorId::new());

    record(&ledger, a, b, SignalKind::Nudge);
    assert!(ledger.has_signaled(a, b));
    let event = record(&ledger, b, a, SignalKind::Nudge).unwrap();
    assert!(!ledger.has_signaled(a, b), "reciprocated");

    assert_eq!(ledger.resolve_pair(event.pair(), SignalKind::Nudge, clock.now()), 2);
    assert_eq!(ledger.len(), 2, "resolution never removes signals");

    clock.advance(Duration::seconds(1));
    assert_eq!(record(&ledger, a, b, SignalKind::Nudge), None);
    assert!(ledger.has_signaled(a, b));

    let received = ledger.received(a, Some(SignalKind::Nudge));
    assert_eq!(received.len(), 1);
    assert!(received[0].resolved);
    let sent = ledger.sent(a, None);
    assert_eq!(sent.len(), 2);
    assert!(!sent[0].resolved, "newest first");
    assert!(sent[1].resolved);
  }

  #[test]
  fn pass_is_not_interest() {
    let (ledger, _) = ledger();
    let (a, b) = (ActorId::new(), ActorId::new());
    record(&ledger, a, b, SignalKind::Pass);
    assert!(!ledger.has_signaled(a, b));
  }

  #[test]
  fn rejects_self_signal_and_bad_location() {
    let (ledger, _) = ledger();
    let a = ActorId::new();
    assert!(matches!(
      ledger.record_signal(a, a, SignalKind::Like, None),
      Err(Error::SelfSignal(_))
    ));

    let bad = LocationContext {
      position:        Position { latitude: 120.0, longitude: 0.0 },
      venue_name:      None,
      distance_meters: None,
    };
    assert!(matches!(
      ledger.record_signal(a, ActorId::new(), SignalKind::Nudge, Some(bad)),
      Err(Error::InvalidPosition { .. })
    ));
    assert!(ledger.is_empty());
  }

  #[test]
  fn affinity_follows_interaction_window() {
    let (ledger, clock) = ledger_with_window(2);
    let (a, b, c) = (ActorId::new(), ActorId::new(), ActorId::new());

    assert!(ledger.update_affinity(a).is_none());

    record(&ledger, a, b, SignalKind::Pass);
    clock.advance(Duration::seconds(1));
    record(&ledger, a, c, SignalKind::Like);
    clock.advance(Duration::seconds(1));
    record(&ledger, a, c, SignalKind::Like);

    // The pass on `b` fell out of the two-entry window.
    let profile = ledger.update_affinity(a).unwrap();
    assert_eq!(profile.match_probability(b), None);
    assert!((profile.match_probability(c).unwrap() - 0.9).abs() < 1e-9);
  }

  #[test]
  fn match_confirmation_sets_both_sides() {
    let (ledger, clock) = ledger();
    let (a, b) = (ActorId::new(), ActorId::new());

    record(&ledger, a, b, SignalKind::Pass);
    ledger.note_match(ActorPair::new(a, b), clock.now());

    assert_eq!(ledger.update_affinity(a).unwrap().match_probability(b), Some(0.9));
    assert_eq!(ledger.update_affinity(b).unwrap().match_probability(a), Some(0.9));
  }

  #[test]
  fn located_signals_become_frequent_locations() {
    let (ledger, _) = ledger();
    let (a, b) = (ActorId::new(), ActorId::new());
    let ctx = LocationContext {
      position:        Position::new(48.8584, 2.2945).unwrap(),
      venue_name:      Some("Tower".into()),
      distance_meters: Some(12.0),
    };
    ledger
      .record_signal(a, b, SignalKind::Nudge, Some(ctx.clone()))
      .unwrap();
    ledger.record_signal(a, b, SignalKind::Nudge, Some(ctx)).unwrap();

    let profile = ledger.affinity(a).unwrap();
    assert_eq!(profile.frequent_locations.len(), 1);
    assert_eq!(profile.frequent_locations[0].visit_count, 2);
  }

  #[test]
  fn restore_replays_resolution_in_time_order() {
    let (source, clock) = ledger();
    let (a, b) = (ActorId::new(), ActorId::new());
    let s1 = source.prepare(a, b, SignalKind::Like, None).unwrap();
    clock.advance(Duration::seconds(1));
    let s2 = source.prepare(b, a, SignalKind::Like, None).unwrap();
    clock.advance(Duration::seconds(1));
    let s3 = source.prepare(a, b, SignalKind::Like, None).unwrap();

    let (restored, _) = ledger();
    assert_eq!(restored.restore(vec![s3, s2, s1]), 3);
    assert_eq!(restored.len(), 3);

    let flags: Vec<bool> = restored.sent(a, None).iter().map(|r| r.resolved).collect();
    assert_eq!(flags, vec![false, true]);
    assert!(restored.has_signaled(a, b));
  }

  #[test]
  fn restore_matches_live_resolution_for_repeated_pairs() {
    let (live, clock) = ledger();
    let (a, b) = (ActorId::new(), ActorId::new());
    let mut journal = Vec::new();

    for (from, to) in [(a, b), (b, a), (a, b), (b, a)] {
      let (signal, candidate) = live.record_signal(from, to, SignalKind::Like, None).unwrap();
      if let Some(c) = candidate {
        live.resolve_pair(c.pair(), SignalKind::Like, clock.now());
      }
      journal.push(signal);
      clock.advance(Duration::minutes(1));
    }

    let (restored, _) = ledger();
    restored.restore(journal);

    let flags = |l: &SignalLedger, actor| -> Vec<bool> {
      l.sent(actor, None).iter().map(|r| r.resolved).collect()
    };
    assert_eq!(flags(&live, a), vec![true, true]);
    assert_eq!(flags(&restored, a), flags(&live, a));
    assert_eq!(flags(&restored, b), flags(&live, b));
    assert!(!restored.has_signaled(a, b));
  }

  #[test]
  fn concurrent_crossing_signals_detect_once() {
    let (ledger, _) = ledger();
    let ledger = Arc::new(ledger);
    let (a, b) = (ActorId::new(), ActorId::new());

    let handles: Vec<_> = [(a, b), (b, a)]
      .into_iter()
      .map(|(from, to)| {
        let ledger = ledger.clone();
        std::thread::spawn(move || {
          ledger.record_signal(from, to, SignalKind::Like, None).unwrap().1
        })
      })
      .collect();
    let detected = handles
      .into_iter()
      .filter_map(|h| h.join().unwrap())
      .count();
    assert_eq!(detected, 1);
  }
}
