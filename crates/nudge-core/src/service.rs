//! [`NudgeService`]: the engine's call boundary.
//!
//! Wires the five components together with their collaborators: a
//! [`LedgerStore`] journal and a [`Directory`] of profiles. Created matches
//! leave the engine as [`MatchCreatedEvent`]s on the channel returned by
//! [`NudgeService::new`]; whoever owns the receiver delivers them.
//!
//! Affinity recomputation runs on a spawned task after each signal or
//! interaction. Callers never wait for it and its failures are only logged.
//! The service therefore has to be used from within a Tokio runtime.

use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::{
  Error, Result,
  actor::ActorId,
  affinity::{AffinityProfile, InteractionKind},
  clock::Clock,
  config::EngineConfig,
  directory::{ActorProfile, Directory},
  geo::Position,
  ledger::SignalLedger,
  matching::{HandledCandidate, Match, MatchCreatedEvent, MatchEngine},
  presence::{NearbyActor, PresenceEntry, PresenceRegistry, VisibilityTag},
  ranking::{RankingEngine, RankingInput},
  signal::{LocationContext, Signal, SignalKind, SignalRecord},
  store::LedgerStore,
};

/// Result of [`NudgeService::record_signal`].
#[derive(Debug, Clone, Serialize)]
pub struct SignalOutcome {
  pub signal:        Signal,
  /// Present only when this signal created a new match.
  pub match_created: Option<MatchCreatedEvent>,
}

/// Counts reported by [`NudgeService::restore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
  pub signals:  usize,
  pub matches:  usize,
  pub profiles: usize,
}

struct Inner<S, D> {
  clock:     Arc<dyn Clock>,
  presence:  PresenceRegistry,
  ledger:    Arc<SignalLedger>,
  matches:   MatchEngine,
  ranking:   RankingEngine,
  store:     Arc<S>,
  directory: Arc<D>,
}

/// Shared handle to the engine. Cloning is cheap.
pub struct NudgeService<S, D> {
  inner: Arc<Inner<S, D>>,
}

impl<S, D> Clone for NudgeService<S, D> {
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl<S, D> NudgeService<S, D>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  /// Build the engine. The returned receiver yields one event per created
  /// match.
  pub fn new(
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    store: Arc<S>,
    directory: Arc<D>,
  ) -> (Self, mpsc::UnboundedReceiver<MatchCreatedEvent>) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let ledger = Arc::new(SignalLedger::new(config.ledger, clock.clone()));
    let presence = PresenceRegistry::new(config.presence, clock.clone(), ledger.clone());
    let matches = MatchEngine::new(config.matching, clock.clone(), events_tx);
    let ranking = RankingEngine::new(config.ranking);

    let inner = Inner {
      clock,
      presence,
      ledger,
      matches,
      ranking,
      store,
      directory,
    };
    (Self { inner: Arc::new(inner) }, events_rx)
  }

  /// Rebuild in-memory state from the journal. Call once, before serving.
  pub async fn restore(&self) -> Result<RestoreSummary> {
    let signals = self.inner.store.load_signals().await.map_err(store_err)?;
    let matches = self.inner.store.load_matches().await.map_err(store_err)?;

    let ledger = &self.inner.ledger;
    let signal_count = ledger.restore(signals);
    for m in &matches {
      ledger.note_match(m.pair(), m.created_at);
    }
    let match_count = self.inner.matches.restore(matches);

    let mut profile_count = 0;
    for actor in ledger.profiled_actors() {
      if ledger.update_affinity(actor).is_some() {
        profile_count += 1;
      }
    }

    let summary = RestoreSummary {
      signals:  signal_count,
      matches:  match_count,
      profiles: profile_count,
    };
    tracing::info!(
      signals = summary.signals,
      matches = summary.matches,
      profiles = summary.profiles,
      "engine state restored"
    );
    Ok(summary)
  }

  // ── Presence ──────────────────────────────────────────────────────────────

  pub fn activate_presence(
    &self,
    actor: ActorId,
    position: Position,
    visibility: VisibilityTag,
  ) -> Result<PresenceEntry> {
    self.inner.presence.activate(actor, position, visibility)
  }

  pub fn renew_presence(&self, actor: ActorId, position: Position) -> Result<PresenceEntry> {
    self.inner.presence.renew(actor, position)
  }

  /// No-op if the actor is already inactive.
  pub fn deactivate_presence(&self, actor: ActorId) -> bool {
    self.inner.presence.deactivate(actor)
  }

  pub fn presence(&self, actor: ActorId) -> Option<PresenceEntry> {
    self.inner.presence.entry(actor)
  }

  /// Nearby actors visible to `actor`. The interested-in categories come
  /// from the requester's directory profile; without a profile nobody is
  /// filtered out.
  pub async fn query_nearby(
    &self,
    actor: ActorId,
    radius_meters: f64,
  ) -> Result<Vec<NearbyActor>> {
    let profile = self
      .inner
      .directory
      .profile(actor)
      .await
      .map_err(directory_err)?;
    let visible_to = profile.map(|p| p.preferences.interested_in);
    self
      .inner
      .presence
      .query_nearby(actor, radius_meters, visible_to.as_ref())
  }

  /// Evict stale presence entries. Queries also do this lazily; the server
  /// calls it periodically to bound memory.
  pub fn sweep_presence(&self) -> Vec<ActorId> { self.inner.presence.sweep_stale() }

  // ── Signals ───────────────────────────────────────────────────────────────

  /// Record a like, pass or nudge. If it completes a reciprocal pair a match
  /// is created (or the pair's existing match is reused) and the consumed
  /// signals are resolved.
  ///
  /// The signal is journaled before it becomes visible; a journal failure
  /// fails the call and records nothing.
  pub async fn record_signal(
    &self,
    from: ActorId,
    to: ActorId,
    kind: SignalKind,
    location: Option<LocationContext>,
  ) -> Result<SignalOutcome> {
    let inner = &self.inner;
    let signal = inner.ledger.prepare(from, to, kind, location)?;
    inner
      .store
      .append_signal(signal.clone())
      .await
      .map_err(store_err)?;

    let mut refresh = vec![from];
    let mut match_created = None;

    if let Some(candidate) = inner.ledger.append(signal.clone()) {
      let handled = inner.matches.handle_candidate(&candidate);
      inner.ledger.resolve_pair(
        candidate.pair(),
        candidate.match_type.signal_kind(),
        inner.clock.now(),
      );

      if let HandledCandidate::Created(m) = handled {
        inner.ledger.note_match(m.pair(), m.created_at);
        if let Err(e) = inner.store.append_match(m.clone()).await {
          tracing::error!(match_id = %m.match_id, error = %e, "failed to journal match");
        }
        refresh.push(to);
        match_created = Some(MatchCreatedEvent { created: m });
      }
    }

    self.spawn_affinity_refresh(refresh);
    Ok(SignalOutcome { signal, match_created })
  }

  /// Record a collaborator-reported interaction such as a message or a
  /// profile view.
  ///
  /// # Panics
  ///
  /// Must be called from within a Tokio runtime: the affinity refresh is
  /// spawned onto it.
  pub fn record_interaction(&self, actor: ActorId, target: ActorId, kind: InteractionKind) {
    self.inner.ledger.record_interaction(actor, target, kind);
    self.spawn_affinity_refresh(vec![actor]);
  }

  pub fn sent_signals(&self, actor: ActorId, kind: Option<SignalKind>) -> Vec<SignalRecord> {
    self.inner.ledger.sent(actor, kind)
  }

  pub fn received_signals(&self, actor: ActorId, kind: Option<SignalKind>) -> Vec<SignalRecord> {
    self.inner.ledger.received(actor, kind)
  }

  // ── Matches ───────────────────────────────────────────────────────────────

  /// Unexpired matches involving `actor`, newest first.
  pub fn list_active_matches(&self, actor: ActorId) -> Vec<Match> {
    self.inner.matches.list_active(actor)
  }

  /// Every match involving `actor`, expired ones included, newest first.
  pub fn match_history(&self, actor: ActorId) -> Vec<Match> {
    self.inner.matches.history(actor)
  }

  // ── Affinity & ranking ────────────────────────────────────────────────────

  pub fn affinity(&self, actor: ActorId) -> Option<AffinityProfile> {
    self.inner.ledger.affinity(actor)
  }

  /// Recompute and persist `actor`'s affinity profile. Returns `None` if the
  /// actor has no interaction history.
  pub async fn refresh_affinity(&self, actor: ActorId) -> Result<Option<AffinityProfile>> {
    let Some(profile) = self.inner.ledger.update_affinity(actor) else {
      return Ok(None);
    };
    self
      .inner
      .store
      .save_affinity(profile.clone())
      .await
      .map_err(|e| Error::AffinityUpdateFailed {
        actor,
        reason: e.to_string(),
      })?;
    Ok(Some(profile))
  }

  /// Panics outside a Tokio runtime.
  fn spawn_affinity_refresh(&self, actors: Vec<ActorId>) {
    let service = self.clone();
    tokio::spawn(async move {
      for actor in actors {
        if let Err(e) = service.refresh_affinity(actor).await {
          tracing::warn!(%actor, error = %e, "affinity refresh failed");
        }
      }
    });
  }

  /// Order `candidates` for `actor`, best first.
  pub async fn rank_candidates(
    &self,
    actor: ActorId,
    candidates: &[ActorId],
  ) -> Result<Vec<ActorId>> {
    let inner = &self.inner;
    let requester = inner.directory.profile(actor).await.map_err(directory_err)?;
    let profiles = inner
      .directory
      .profiles(candidates)
      .await
      .map_err(directory_err)?;

    let requester_position = inner
      .presence
      .entry(actor)
      .map(|e| e.position)
      .or_else(|| requester.and_then(|p| p.approximate_location));

    // Live presence positions win over the directory's coarse ones.
    let mut candidate_positions: HashMap<ActorId, Position> = profiles
      .iter()
      .filter_map(|p| p.approximate_location.map(|l| (p.actor, l)))
      .collect();
    candidate_positions.extend(inner.presence.positions(candidates));

    let last_active: HashMap<_, _> =
      profiles.iter().map(|p| (p.actor, p.last_active)).collect();
    let affinity = inner.ledger.affinity(actor);

    let input = RankingInput {
      requester: actor,
      candidates,
      requester_position,
      candidate_positions: &candidate_positions,
      last_active: &last_active,
      affinity: affinity.as_ref(),
      now: inner.clock.now(),
    };
    Ok(inner.ranking.rank(&input))
  }

  /// The discovery feed: directory candidates the requester would accept,
  /// inside their distance cap when both locations are known, minus anyone
  /// they already liked or passed, ranked and truncated to `limit`.
  pub async fn discover(&self, actor: ActorId, limit: usize) -> Result<Vec<ActorId>> {
    let inner = &self.inner;
    let requester = inner
      .directory
      .profile(actor)
      .await
      .map_err(directory_err)?
      .ok_or(Error::UnknownActor(actor))?;

    let origin = inner
      .presence
      .entry(actor)
      .map(|e| e.position)
      .or(requester.approximate_location);
    let cap_meters = requester.preferences.max_distance_km * 1000.0;

    let candidates: Vec<ActorId> = inner
      .directory
      .candidates(&requester)
      .await
      .map_err(directory_err)?
      .into_iter()
      .filter(|p| within_cap(origin, p, cap_meters))
      .filter(|p| {
        !matches!(
          inner.ledger.latest_kind(actor, p.actor),
          Some(SignalKind::Like | SignalKind::Pass)
        )
      })
      .map(|p| p.actor)
      .collect();

    let mut ranked = self.rank_candidates(actor, &candidates).await?;
    ranked.truncate(limit);
    Ok(ranked)
  }

  // ── Directory sync ────────────────────────────────────────────────────────

  pub async fn upsert_profile(&self, profile: ActorProfile) -> Result<()> {
    self
      .inner
      .directory
      .upsert_profile(profile)
      .await
      .map_err(directory_err)
  }
}

fn within_cap(origin: Option<Position>, candidate: &ActorProfile, cap_meters: f64) -> bool {
  match (origin, candidate.approximate_location) {
    (Some(me), Some(them)) => me.distance_to(&them) <= cap_meters,
    _ => true,
  }
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
  Error::Store(Box::new(e))
}

fn directory_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
  Error::Directory(Box::new(e))
}
