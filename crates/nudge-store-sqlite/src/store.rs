//! [`SqliteStore`]: the SQLite implementation of [`LedgerStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;

use nudge_core::{
  ActorId,
  affinity::AffinityProfile,
  matching::Match,
  signal::Signal,
  store::LedgerStore,
};

use crate::{
  Error, Result,
  encode::{
    RawMatch, RawSignal, decode_profile, encode_actor, encode_dt, encode_location,
    encode_match_type, encode_profile, encode_signal_kind, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Nudge journal backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a journal at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory journal: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The last saved affinity profile for `actor`, if any.
  pub async fn get_affinity(&self, actor: ActorId) -> Result<Option<AffinityProfile>> {
    let id_str = encode_actor(actor);

    let json: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT profile_json FROM affinity_profiles WHERE actor_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    json.as_deref().map(decode_profile).transpose()
  }
}

// ─── LedgerStore impl ────────────────────────────────────────────────────────

impl LedgerStore for SqliteStore {
  type Error = Error;

  async fn append_signal(&self, signal: Signal) -> Result<()> {
    let id_str       = encode_uuid(signal.signal_id);
    let from_str     = encode_actor(signal.from);
    let to_str       = encode_actor(signal.to);
    let kind_str     = encode_signal_kind(signal.kind).to_owned();
    let at_str       = encode_dt(signal.created_at);
    let location_str = signal.location.as_ref().map(encode_location).transpose()?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO signals
             (signal_id, from_actor, to_actor, kind, created_at, location_json)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, from_str, to_str, kind_str, at_str, location_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn append_match(&self, m: Match) -> Result<()> {
    let id_str      = encode_uuid(m.match_id);
    let a_str       = encode_actor(m.actor_a);
    let b_str       = encode_actor(m.actor_b);
    let type_str    = encode_match_type(m.match_type).to_owned();
    let created_str = encode_dt(m.created_at);
    let expires_str = m.expires_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO matches
             (match_id, actor_a, actor_b, match_type, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, a_str, b_str, type_str, created_str, expires_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn save_affinity(&self, profile: AffinityProfile) -> Result<()> {
    let id_str   = encode_actor(profile.actor);
    let json_str = encode_profile(&profile)?;
    let at_str   = encode_dt(profile.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO affinity_profiles (actor_id, profile_json, updated_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT(actor_id) DO UPDATE SET
             profile_json = excluded.profile_json,
             updated_at   = excluded.updated_at",
          rusqlite::params![id_str, json_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn load_signals(&self) -> Result<Vec<Signal>> {
    let raws: Vec<RawSignal> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT signal_id, from_actor, to_actor, kind, created_at, location_json
           FROM signals ORDER BY rowid",
        )?;
        let rows = stmt
          .query_map([], RawSignal::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSignal::into_signal).collect()
  }

  async fn load_matches(&self) -> Result<Vec<Match>> {
    let raws: Vec<RawMatch> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT match_id, actor_a, actor_b, match_type, created_at, expires_at
           FROM matches ORDER BY rowid",
        )?;
        let rows = stmt
          .query_map([], RawMatch::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMatch::into_match).collect()
  }
}
