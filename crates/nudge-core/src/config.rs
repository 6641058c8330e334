//! Engine configuration.
//!
//! Every field has a default so an empty configuration file is valid. The
//! server nests [`EngineConfig`] under its own `[engine]` table.

use chrono::Duration;
use serde::Deserialize;

use crate::{Error, Result};

/// Longest accepted presence staleness TTL: one day.
pub const MAX_STALENESS_TTL_SECS: u64 = 24 * 60 * 60;
/// Longest accepted nudge match lifetime: one year.
pub const MAX_NUDGE_MATCH_TTL_HOURS: i64 = 365 * 24;

/// Top-level configuration for all engine components.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub presence: PresenceConfig,
  pub ledger:   LedgerConfig,
  pub matching: MatchConfig,
  pub ranking:  RankingConfig,
}

impl EngineConfig {
  /// Reject settings that would make the engine misbehave at runtime.
  pub fn validate(&self) -> Result<()> {
    self.presence.validate()?;
    if self.ledger.affinity_window == 0 {
      return Err(invalid("ledger.affinity_window must be at least 1"));
    }
    let ttl = self.matching.nudge_match_ttl_hours;
    if !(1..=MAX_NUDGE_MATCH_TTL_HOURS).contains(&ttl) {
      return Err(invalid(format!(
        "matching.nudge_match_ttl_hours must be within 1..={MAX_NUDGE_MATCH_TTL_HOURS}, got {ttl}"
      )));
    }
    Ok(())
  }
}

fn invalid(reason: impl Into<String>) -> Error { Error::InvalidConfig(reason.into()) }

// ─── Presence ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
  /// Lower bound applied to every nearby query radius.
  pub min_radius_meters:         f64,
  /// Upper bound applied to every nearby query radius.
  pub max_radius_meters:         f64,
  /// Entries not renewed for longer than this are evicted.
  pub staleness_ttl_secs:        u64,
  /// Slack added to the clamped radius when matching distances, so an actor
  /// reported at 50.04 m still shows up in a 50 m query.
  pub boundary_tolerance_meters: f64,
}

impl Default for PresenceConfig {
  fn default() -> Self {
    Self {
      min_radius_meters:         20.0,
      max_radius_meters:         50.0,
      // Three missed renewals at the 5 s client poll period.
      staleness_ttl_secs:        15,
      boundary_tolerance_meters: 1.0,
    }
  }
}

impl PresenceConfig {
  fn validate(&self) -> Result<()> {
    let (min, max) = (self.min_radius_meters, self.max_radius_meters);
    if !(min.is_finite() && max.is_finite() && 0.0 <= min && min <= max) {
      return Err(invalid(format!(
        "presence radius band must satisfy 0 <= min <= max, got min = {min}, max = {max}"
      )));
    }
    let tolerance = self.boundary_tolerance_meters;
    if !(tolerance.is_finite() && tolerance >= 0.0) {
      return Err(invalid(format!(
        "presence.boundary_tolerance_meters must be finite and non-negative, got {tolerance}"
      )));
    }
    let ttl = self.staleness_ttl_secs;
    if !(1..=MAX_STALENESS_TTL_SECS).contains(&ttl) {
      return Err(invalid(format!(
        "presence.staleness_ttl_secs must be within 1..={MAX_STALENESS_TTL_SECS}, got {ttl}"
      )));
    }
    Ok(())
  }

  pub fn staleness_ttl(&self) -> Duration {
    Duration::seconds(self.staleness_ttl_secs as i64)
  }

  /// Clamp a requested radius into the configured band. Non-finite requests
  /// fall back to the minimum.
  pub fn clamp_radius(&self, requested: f64) -> f64 {
    if !requested.is_finite() {
      return self.min_radius_meters;
    }
    requested.clamp(self.min_radius_meters, self.max_radius_meters)
  }
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
  /// How many of an actor's most recent interactions feed the affinity
  /// recomputation.
  pub affinity_window: usize,
}

impl Default for LedgerConfig {
  fn default() -> Self { Self { affinity_window: 100 } }
}

// ─── Matching ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
  /// Lifetime of a match born from reciprocal nudges.
  pub nudge_match_ttl_hours: i64,
}

impl Default for MatchConfig {
  fn default() -> Self { Self { nudge_match_ttl_hours: 72 } }
}

impl MatchConfig {
  pub fn nudge_match_ttl(&self) -> Duration {
    Duration::hours(self.nudge_match_ttl_hours)
  }
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
  /// Seed for the no-affinity fallback shuffle. `None` draws a fresh seed
  /// per call.
  pub ranking_seed: Option<u64>,
}
