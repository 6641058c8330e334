//! Matches and the [`MatchEngine`] that owns their lifecycle.
//!
//! A match is created only from a [`MatchCandidateEvent`]. For any unordered
//! pair at most one unexpired match exists at a time; the check and the
//! insert happen under one lock so two near-simultaneous candidates for the
//! same pair collapse into a single match. Expiry is evaluated lazily
//! whenever matches are read.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
  actor::{ActorId, ActorPair},
  clock::Clock,
  config::MatchConfig,
  ledger::MatchCandidateEvent,
  signal::SignalKind,
};

// ─── Types ───────────────────────────────────────────────────────────────────

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
pub enum MatchType {
  /// Born from reciprocal likes; never expires.
  Regular,
  /// Born from reciprocal nudges; lapses after the configured TTL.
  Nudge,
}

impl MatchType {
  /// The signal kind whose reciprocation produces this match type.
  pub fn signal_kind(self) -> SignalKind {
    match self {
      Self::Regular => SignalKind::Like,
      Self::Nudge => SignalKind::Nudge,
    }
  }
}

/// A mutually recognised connection. `actor_a` is always the smaller id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
  pub match_id:   Uuid,
  pub actor_a:    ActorId,
  pub actor_b:    ActorId,
  pub created_at: DateTime<Utc>,
  pub expires_at: Option<DateTime<Utc>>,
  pub match_type: MatchType,
}

impl Match {
  pub fn pair(&self) -> ActorPair { ActorPair::new(self.actor_a, self.actor_b) }

  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|exp| now > exp)
  }

  pub fn involves(&self, actor: ActorId) -> bool {
    self.actor_a == actor || self.actor_b == actor
  }
}

/// Emitted once per newly created match for the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCreatedEvent {
  #[serde(rename = "match")]
  pub created: Match,
}

/// What [`MatchEngine::handle_candidate`] did with a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandledCandidate {
  Created(Match),
  /// An unexpired match already covered the pair; it is returned unchanged.
  Existing(Match),
}

impl HandledCandidate {
  pub fn as_match(&self) -> &Match {
    match self {
      Self::Created(m) | Self::Existing(m) => m,
    }
  }

  pub fn into_match(self) -> Match {
    match self {
      Self::Created(m) | Self::Existing(m) => m,
    }
  }

  pub fn is_created(&self) -> bool { matches!(self, Self::Created(_)) }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct MatchEngine {
  config: MatchConfig,
  clock:  Arc<dyn Clock>,
  /// Every match ever created, per canonical pair, oldest first.
  pairs:  Mutex<HashMap<ActorPair, Vec<Match>>>,
  events: mpsc::UnboundedSender<MatchCreatedEvent>,
}

impl MatchEngine {
  pub fn new(
    config: MatchConfig,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<MatchCreatedEvent>,
  ) -> Self {
    Self {
      config,
      clock,
      pairs: Mutex::new(HashMap::new()),
      events,
    }
  }

  /// Turn a reciprocity event into a match, or return the pair's existing
  /// unexpired match. Duplicate candidates are never an error.
  pub fn handle_candidate(&self, event: &MatchCandidateEvent) -> HandledCandidate {
    let pair = ActorPair::new(event.actor_a, event.actor_b);
    let now = self.clock.now();

    let created = {
      let mut pairs = self.pairs.lock();
      let history = pairs.entry(pair).or_default();

      if let Some(active) = history.iter().rev().find(|m| !m.is_expired_at(now)) {
        tracing::debug!(
          match_id = %active.match_id,
          "duplicate match candidate for {}/{}",
          pair.first,
          pair.second,
        );
        return HandledCandidate::Existing(active.clone());
      }

      let expires_at = match event.match_type {
        MatchType::Regular => None,
        MatchType::Nudge => Some(now + self.config.nudge_match_ttl()),
      };
      let m = Match {
        match_id: Uuid::new_v4(),
        actor_a: pair.first,
        actor_b: pair.second,
        created_at: now,
        expires_at,
        match_type: event.match_type,
      };
      history.push(m.clone());
      m
    };

    tracing::info!(
      match_id = %created.match_id,
      match_type = %created.match_type,
      "match created for {}/{}",
      created.actor_a,
      created.actor_b,
    );

    if self
      .events
      .send(MatchCreatedEvent { created: created.clone() })
      .is_err()
    {
      tracing::warn!(
        match_id = %created.match_id,
        "match event receiver dropped; notification not queued"
      );
    }

    HandledCandidate::Created(created)
  }

  /// Unexpired matches involving `actor`, newest first.
  pub fn list_active(&self, actor: ActorId) -> Vec<Match> {
    let now = self.clock.now();
    self
      .collect(actor)
      .into_iter()
      .filter(|m| !m.is_expired_at(now))
      .collect()
  }

  /// Every match involving `actor`, expired ones included, newest first.
  pub fn history(&self, actor: ActorId) -> Vec<Match> { self.collect(actor) }

  /// The pair's current unexpired match, if any.
  pub fn active_for_pair(&self, a: ActorId, b: ActorId) -> Option<Match> {
    let now = self.clock.now();
    self
      .pairs
      .lock()
      .get(&ActorPair::new(a, b))
      .and_then(|h| h.iter().rev().find(|m| !m.is_expired_at(now)).cloned())
  }

  /// Load previously journaled matches without emitting events.
  pub fn restore(&self, matches: impl IntoIterator<Item = Match>) -> usize {
    let mut pairs = self.pairs.lock();
    let mut count = 0;
    for m in matches {
      pairs.entry(m.pair()).or_default().push(m);
      count += 1;
    }
    for history in pairs.values_mut() {
      history.sort_by_key(|m| m.created_at);
    }
    count
  }

  fn collect(&self, actor: ActorId) -> Vec<Match> {
    let mut out: Vec<Match> = self
      .pairs
      .lock()
      .iter()
      .filter(|(pair, _)| pair.contains(actor))
      .flat_map(|(_, history)| history.iter().cloned())
      .collect();
    out.sort_by(|a, b| {
      b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.match_id.cmp(&b.match_id))
    });
    out
  }
}
