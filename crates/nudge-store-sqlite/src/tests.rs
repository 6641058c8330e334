//! Integration tests for `SqliteStore` against an in-memory database.

use std::{collections::HashMap, sync::Arc};

use chrono::{Duration, TimeZone, Utc};
use nudge_core::{
  ActorId, NudgeService,
  affinity::AffinityProfile,
  clock::{Clock, ManualClock},
  config::EngineConfig,
  directory::InMemoryDirectory,
  geo::Position,
  matching::{Match, MatchType},
  signal::{LocationContext, Signal, SignalKind},
  store::LedgerStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn signal(from: ActorId, to: ActorId, kind: SignalKind, minute: i64) -> Signal {
  Signal {
    signal_id: Uuid::new_v4(),
    from,
    to,
    kind,
    created_at: Utc.with_ymd_and_hms(2026, 6, 1, 20, 0, 0).unwrap() + Duration::minutes(minute),
    location: None,
  }
}

// ─── Signals ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn signals_load_in_append_order() {
  let s = store().await;
  let (a, b) = (ActorId::new(), ActorId::new());

  let first = signal(a, b, SignalKind::Nudge, 0);
  let mut second = signal(b, a, SignalKind::Like, 1);
  second.location = Some(LocationContext {
    position:        Position::new(40.7128, -74.006).unwrap(),
    venue_name:      Some("Pier 17".into()),
    distance_meters: Some(35.5),
  });

  s.append_signal(first.clone()).await.unwrap();
  s.append_signal(second.clone()).await.unwrap();

  let loaded = s.load_signals().await.unwrap();
  assert_eq!(loaded.len(), 2);
  assert_eq!(loaded[0], first);
  assert_eq!(loaded[1].signal_id, second.signal_id);
  assert_eq!(loaded[1].created_at, second.created_at);

  let ctx = loaded[1].location.as_ref().expect("location kept");
  assert_eq!(ctx.venue_name.as_deref(), Some("Pier 17"));
  assert!((ctx.position.latitude - 40.7128).abs() < 1e-9);
  assert!((ctx.position.longitude + 74.006).abs() < 1e-9);
}

#[tokio::test]
async fn duplicate_signal_id_is_rejected() {
  let s = store().await;
  let sig = signal(ActorId::new(), ActorId::new(), SignalKind::Pass, 0);

  s.append_signal(sig.clone()).await.unwrap();
  assert!(s.append_signal(sig).await.is_err());
  assert_eq!(s.load_signals().await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_store_loads_nothing() {
  let s = store().await;
  assert!(s.load_signals().await.unwrap().is_empty());
  assert!(s.load_matches().await.unwrap().is_empty());
  assert!(s.get_affinity(ActorId::new()).await.unwrap().is_none());
}

// ─── Matches ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn matches_keep_expiry() {
  let s = store().await;
  let (x, y) = (ActorId::new(), ActorId::new());
  let (actor_a, actor_b) = if x < y { (x, y) } else { (y, x) };
  let created_at = Utc.with_ymd_and_hms(2026, 6, 1, 21, 30, 0).unwrap();

  let nudge = Match {
    match_id: Uuid::new_v4(),
    actor_a,
    actor_b,
    created_at,
    expires_at: Some(created_at + Duration::hours(72)),
    match_type: MatchType::Nudge,
  };
  let regular = Match {
    match_id: Uuid::new_v4(),
    expires_at: None,
    match_type: MatchType::Regular,
    ..nudge.clone()
  };

  s.append_match(nudge.clone()).await.unwrap();
  s.append_match(regular.clone()).await.unwrap();

  assert_eq!(s.load_matches().await.unwrap(), vec![nudge, regular]);
}

// ─── Affinity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn affinity_profile_is_replaced() {
  let s = store().await;
  let (me, other) = (ActorId::new(), ActorId::new());
  let at = Utc.with_ymd_and_hms(2026, 6, 1, 20, 0, 0).unwrap();

  let mut profile = AffinityProfile::new(me, at);
  profile.match_probability = HashMap::from([(other, 0.7)]);
  s.save_affinity(profile.clone()).await.unwrap();

  profile.match_probability.insert(other, 0.9);
  profile.updated_at = at + Duration::minutes(5);
  s.save_affinity(profile.clone()).await.unwrap();

  let loaded = s.get_affinity(me).await.unwrap().expect("saved profile");
  assert_eq!(loaded.updated_at, profile.updated_at);
  assert!((loaded.match_probability(other).unwrap() - 0.9).abs() < 1e-9);
}

// ─── Engine restore ──────────────────────────────────────────────────────────

#[tokio::test]
async fn engine_state_survives_a_restart() {
  let store = Arc::new(store().await);
  let (a, b) = (ActorId::new(), ActorId::new());

  let service = |store: Arc<SqliteStore>| {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
    NudgeService::new(
      EngineConfig::default(),
      clock,
      store,
      Arc::new(InMemoryDirectory::new()),
    )
    .0
  };

  let first = service(store.clone());
  first.record_signal(a, b, SignalKind::Nudge, None).await.unwrap();
  let outcome = first.record_signal(b, a, SignalKind::Nudge, None).await.unwrap();
  let created = outcome.match_created.expect("nudge match").created;

  let second = service(store);
  let summary = second.restore().await.unwrap();
  assert_eq!(summary.signals, 2);
  assert_eq!(summary.matches, 1);
  assert_eq!(second.list_active_matches(a), vec![created]);
  assert!(second.received_signals(a, None).iter().all(|r| r.resolved));
}
