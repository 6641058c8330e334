//! The `LedgerStore` trait: the durable journal behind the in-memory
//! engine.
//!
//! Signals and matches are append-only; affinity profiles are replaced
//! wholesale on each recomputation. Implemented by storage backends (e.g.
//! `nudge-store-sqlite`); [`MemoryStore`] keeps everything in process.

use std::{convert::Infallible, future::Future};

use parking_lot::Mutex;

use crate::{affinity::AffinityProfile, matching::Match, signal::Signal};

pub trait LedgerStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn append_signal(
    &self,
    signal: Signal,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn append_match(
    &self,
    m: Match,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Replace the stored profile for `profile.actor`.
  fn save_affinity(
    &self,
    profile: AffinityProfile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// All journaled signals, oldest first.
  fn load_signals(&self) -> impl Future<Output = Result<Vec<Signal>, Self::Error>> + Send + '_;

  /// All journaled matches, oldest first.
  fn load_matches(&self) -> impl Future<Output = Result<Vec<Match>, Self::Error>> + Send + '_;
}

/// A journal that lives and dies with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
  signals:  Mutex<Vec<Signal>>,
  matches:  Mutex<Vec<Match>>,
  profiles: Mutex<Vec<AffinityProfile>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  pub fn affinity(&self, actor: crate::ActorId) -> Option<AffinityProfile> {
    self.profiles.lock().iter().find(|p| p.actor == actor).cloned()
  }
}

impl LedgerStore for MemoryStore {
  type Error = Infallible;

  async fn append_signal(&self, signal: Signal) -> Result<(), Infallible> {
    self.signals.lock().push(signal);
    Ok(())
  }

  async fn append_match(&self, m: Match) -> Result<(), Infallible> {
    self.matches.lock().push(m);
    Ok(())
  }

  async fn save_affinity(&self, profile: AffinityProfile) -> Result<(), Infallible> {
    let mut profiles = self.profiles.lock();
    profiles.retain(|p| p.actor != profile.actor);
    profiles.push(profile);
    Ok(())
  }

  async fn load_signals(&self) -> Result<Vec<Signal>, Infallible> {
    Ok(self.signals.lock().clone())
  }

  async fn load_matches(&self) -> Result<Vec<Match>, Infallible> {
    Ok(self.matches.lock().clone())
  }
}
