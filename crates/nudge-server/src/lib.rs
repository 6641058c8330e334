//! Standalone server around the Nudge engine.
//!
//! Holds the runtime configuration, the background presence sweeper and the
//! match notifier. The binary in `main.rs` wires them to a SQLite journal and
//! the JSON API.

pub mod notify;

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use nudge_core::{
  NudgeService, config::EngineConfig, directory::Directory, store::LedgerStore,
};
use serde::Deserialize;
use tokio::task::JoinHandle;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `NUDGE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  /// Period of the stale-presence sweep.
  pub sweep_interval_secs: u64,
  /// Where match events are POSTed. Unset means they are only logged.
  pub webhook_url:         Option<String>,
  pub engine:              EngineConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".to_string(),
      port:                8080,
      store_path:          PathBuf::from("~/.local/share/nudge/nudge.db"),
      sweep_interval_secs: 5,
      webhook_url:         None,
      engine:              EngineConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Check the engine settings before anything is built from them.
  pub fn validate(&self) -> nudge_core::Result<()> { self.engine.validate() }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs.max(1))
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Background tasks ────────────────────────────────────────────────────────

/// Periodically evict stale presence entries so actors who vanish without
/// deactivating do not linger in memory between queries.
pub fn spawn_sweeper<S, D>(service: NudgeService<S, D>, period: Duration) -> JoinHandle<()>
where
  S: LedgerStore + 'static,
  D: Directory + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      service.sweep_presence();
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_config_uses_defaults() {
    let cfg: ServerConfig = config::Config::builder()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.sweep_interval(), Duration::from_secs(5));
    assert!(cfg.webhook_url.is_none());
    assert_eq!(cfg.engine.presence.max_radius_meters, 50.0);
  }

  #[test]
  fn nested_engine_settings_override_defaults() {
    let toml = r#"
      port = 9000
      webhook_url = "http://localhost:9999/hooks/match"

      [engine.presence]
      staleness_ttl_secs = 30

      [engine.ranking]
      ranking_seed = 7
    "#;
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();

    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.engine.presence.staleness_ttl_secs, 30);
    assert_eq!(cfg.engine.presence.min_radius_meters, 20.0);
    assert_eq!(cfg.engine.ranking.ranking_seed, Some(7));
  }

  #[test]
  fn inverted_radius_band_fails_validation() {
    let toml = r#"
      [engine.presence]
      min_radius_meters = 100.0
      max_radius_meters = 50.0
    "#;
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();

    assert!(cfg.validate().is_err());
    assert!(ServerConfig::default().validate().is_ok());
  }

  #[test]
  fn zero_sweep_interval_is_raised() {
    let cfg = ServerConfig {
      sweep_interval_secs: 0,
      ..Default::default()
    };
    assert_eq!(cfg.sweep_interval(), Duration::from_secs(1));
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/nudge.db")),
      PathBuf::from(home).join("nudge.db")
    );
    assert_eq!(expand_tilde(Path::new("/tmp/nudge.db")), PathBuf::from("/tmp/nudge.db"));
  }
}
