//! Encoding and decoding helpers between engine types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings and UUIDs hyphenated lowercase strings.
//! Location contexts and affinity profiles are stored as compact JSON.

use chrono::{DateTime, Utc};
use nudge_core::{
  ActorId,
  affinity::AffinityProfile,
  matching::{Match, MatchType},
  signal::{LocationContext, Signal, SignalKind},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_actor(id: ActorId) -> String { encode_uuid(id.0) }

pub fn decode_actor(s: &str) -> Result<ActorId> { decode_uuid(s).map(ActorId) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── SignalKind ──────────────────────────────────────────────────────────────

pub fn encode_signal_kind(k: SignalKind) -> &'static str {
  match k {
    SignalKind::Like => "like",
    SignalKind::Pass => "pass",
    SignalKind::Nudge => "nudge",
  }
}

pub fn decode_signal_kind(s: &str) -> Result<SignalKind> {
  match s {
    "like" => Ok(SignalKind::Like),
    "pass" => Ok(SignalKind::Pass),
    "nudge" => Ok(SignalKind::Nudge),
    other => Err(Error::UnknownVariant {
      column: "kind",
      value:  other.to_owned(),
    }),
  }
}

// ─── MatchType ───────────────────────────────────────────────────────────────

pub fn encode_match_type(t: MatchType) -> &'static str {
  match t {
    MatchType::Regular => "regular",
    MatchType::Nudge => "nudge",
  }
}

pub fn decode_match_type(s: &str) -> Result<MatchType> {
  match s {
    "regular" => Ok(MatchType::Regular),
    "nudge" => Ok(MatchType::Nudge),
    other => Err(Error::UnknownVariant {
      column: "match_type",
      value:  other.to_owned(),
    }),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_location(ctx: &LocationContext) -> Result<String> {
  Ok(serde_json::to_string(ctx)?)
}

pub fn decode_location(s: &str) -> Result<LocationContext> { Ok(serde_json::from_str(s)?) }

pub fn encode_profile(profile: &AffinityProfile) -> Result<String> {
  Ok(serde_json::to_string(profile)?)
}

pub fn decode_profile(s: &str) -> Result<AffinityProfile> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `signals` row.
pub struct RawSignal {
  pub signal_id:     String,
  pub from_actor:    String,
  pub to_actor:      String,
  pub kind:          String,
  pub created_at:    String,
  pub location_json: Option<String>,
}

impl RawSignal {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      signal_id:     row.get(0)?,
      from_actor:    row.get(1)?,
      to_actor:      row.get(2)?,
      kind:          row.get(3)?,
      created_at:    row.get(4)?,
      location_json: row.get(5)?,
    })
  }

  pub fn into_signal(self) -> Result<Signal> {
    Ok(Signal {
      signal_id:  decode_uuid(&self.signal_id)?,
      from:       decode_actor(&self.from_actor)?,
      to:         decode_actor(&self.to_actor)?,
      kind:       decode_signal_kind(&self.kind)?,
      created_at: decode_dt(&self.created_at)?,
      location:   self
        .location_json
        .as_deref()
        .map(decode_location)
        .transpose()?,
    })
  }
}

/// Raw strings read directly from a `matches` row.
pub struct RawMatch {
  pub match_id:   String,
  pub actor_a:    String,
  pub actor_b:    String,
  pub match_type: String,
  pub created_at: String,
  pub expires_at: Option<String>,
}

impl RawMatch {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      match_id:   row.get(0)?,
      actor_a:    row.get(1)?,
      actor_b:    row.get(2)?,
      match_type: row.get(3)?,
      created_at: row.get(4)?,
      expires_at: row.get(5)?,
    })
  }

  pub fn into_match(self) -> Result<Match> {
    Ok(Match {
      match_id:   decode_uuid(&self.match_id)?,
      actor_a:    decode_actor(&self.actor_a)?,
      actor_b:    decode_actor(&self.actor_b)?,
      match_type: decode_match_type(&self.match_type)?,
      created_at: decode_dt(&self.created_at)?,
      expires_at: self.expires_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
