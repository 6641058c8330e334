//! Signal types: directional interest events between two actors.
//!
//! Signals are append-only. A signal is never mutated once recorded; whether
//! it has been consumed by a match is tracked alongside it by the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{
  actor::ActorId,
  affinity::InteractionKind,
  geo::Position,
  matching::MatchType,
};

/// The kind of interest one actor expresses toward another.
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
pub enum SignalKind {
  Like,
  Pass,
  Nudge,
}

impl SignalKind {
  /// The match type a reciprocated signal of this kind produces. `Pass` is
  /// never reciprocal.
  pub fn match_type(self) -> Option<MatchType> {
    match self {
      Self::Like => Some(MatchType::Regular),
      Self::Nudge => Some(MatchType::Nudge),
      Self::Pass => None,
    }
  }

  /// Whether a signal of this kind counts as "they're interested in you".
  pub fn is_interest(self) -> bool { self.match_type().is_some() }

  pub fn interaction(self) -> InteractionKind {
    match self {
      Self::Like => InteractionKind::Liked,
      Self::Pass => InteractionKind::Passed,
      Self::Nudge => InteractionKind::Nudged,
    }
  }
}

/// Where the sender was when the signal went out. Nudges always carry one
/// in practice; other kinds may.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationContext {
  pub position:        Position,
  #[serde(default)]
  pub venue_name:      Option<String>,
  /// Distance to the target at send time, when the client knew it.
  #[serde(default)]
  pub distance_meters: Option<f64>,
}

/// An immutable interest event. `created_at` is assigned by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
  pub signal_id:  Uuid,
  pub from:       ActorId,
  pub to:         ActorId,
  pub kind:       SignalKind,
  pub created_at: DateTime<Utc>,
  pub location:   Option<LocationContext>,
}

/// A signal as returned by sent/received listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
  #[serde(flatten)]
  pub signal:   Signal,
  /// `true` once the signal has been consumed by a match (a revealed nudge).
  pub resolved: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_string_forms_agree() {
    for kind in [SignalKind::Like, SignalKind::Pass, SignalKind::Nudge] {
      let via_serde = serde_json::to_value(kind).unwrap();
      assert_eq!(via_serde, serde_json::Value::String(kind.to_string()));
      assert_eq!(kind.to_string().parse::<SignalKind>().unwrap(), kind);
    }
  }

  #[test]
  fn pass_is_never_reciprocal() {
    assert_eq!(SignalKind::Pass.match_type(), None);
    assert_eq!(SignalKind::Like.match_type(), Some(MatchType::Regular));
    assert_eq!(SignalKind::Nudge.match_type(), Some(MatchType::Nudge));
  }
}
