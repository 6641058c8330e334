//! nudge-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `NUDGE_*`
//! environment variables, replays the SQLite journal into the in-memory
//! engine, and serves the JSON API under `/api`.
//!
//! Nested engine settings use `__` in environment variables, e.g.
//! `NUDGE_ENGINE__PRESENCE__STALENESS_TTL_SECS=30`.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use nudge_core::{NudgeService, clock::SystemClock, directory::InMemoryDirectory};
use nudge_server::{ServerConfig, expand_tilde, notify::Notifier, spawn_sweeper};
use nudge_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Nudge proximity matching server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("NUDGE")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg
    .validate()
    .context("invalid engine configuration")?;

  // Open the SQLite journal.
  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Build the engine and replay the journal.
  let (service, events) = NudgeService::new(
    server_cfg.engine.clone(),
    Arc::new(SystemClock),
    Arc::new(store),
    Arc::new(InMemoryDirectory::new()),
  );
  service
    .restore()
    .await
    .context("failed to restore engine state")?;

  let notifier = Notifier::from_config(&server_cfg)?;
  tokio::spawn(notifier.run(events));
  spawn_sweeper(service.clone(), server_cfg.sweep_interval());

  let app = Router::new().nest("/api", nudge_api::api_router(service));
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      tracing::info!("shutting down");
    })
    .await
    .context("server error")?;

  Ok(())
}
