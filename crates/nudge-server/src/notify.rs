//! Delivery of [`MatchCreatedEvent`]s to the outside world.
//!
//! The engine only publishes events on a channel. The server drains it here
//! and either logs each event or POSTs it as JSON to a configured webhook.
//! Delivery is best-effort: a failed POST is logged and the event dropped.

use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use nudge_core::matching::MatchCreatedEvent;
use reqwest::Client;
use tokio::sync::mpsc;

use crate::ServerConfig;

#[derive(Debug, Clone)]
pub enum Notifier {
  /// Log events and do nothing else.
  Log,
  Webhook { client: Client, url: String },
}

impl Notifier {
  pub fn from_config(config: &ServerConfig) -> Result<Self> {
    match &config.webhook_url {
      None => Ok(Self::Log),
      Some(url) => Self::webhook(url.clone()),
    }
  }

  pub fn webhook(url: String) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(10))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self::Webhook { client, url })
  }

  /// Deliver one event.
  pub async fn deliver(&self, event: &MatchCreatedEvent) -> Result<()> {
    let m = &event.created;
    tracing::info!(
      match_id = %m.match_id,
      actor_a = %m.actor_a,
      actor_b = %m.actor_b,
      match_type = %m.match_type,
      "notifying match"
    );

    let Self::Webhook { client, url } = self else {
      return Ok(());
    };
    let resp = client
      .post(url)
      .json(event)
      .send()
      .await
      .with_context(|| format!("POST {url} failed"))?;
    if !resp.status().is_success() {
      return Err(anyhow!("POST {url} → {}", resp.status()));
    }
    Ok(())
  }

  /// Drain `events` until every sender is gone.
  pub async fn run(self, mut events: mpsc::UnboundedReceiver<MatchCreatedEvent>) {
    while let Some(event) = events.recv().await {
      if let Err(e) = self.deliver(&event).await {
        tracing::warn!(match_id = %event.created.match_id, error = %e, "match notification failed");
      }
    }
    tracing::debug!("match event channel closed");
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
  use chrono::{Duration as ChronoDuration, Utc};
  use nudge_core::{
    ActorId,
    matching::{Match, MatchType},
  };
  use serde_json::Value;
  use tokio::{net::TcpListener, sync::Mutex};
  use uuid::Uuid;

  use super::*;

  fn event() -> MatchCreatedEvent {
    let (x, y) = (ActorId::new(), ActorId::new());
    let (actor_a, actor_b) = if x < y { (x, y) } else { (y, x) };
    let created_at = Utc::now();
    MatchCreatedEvent {
      created: Match {
        match_id: Uuid::new_v4(),
        actor_a,
        actor_b,
        created_at,
        expires_at: Some(created_at + ChronoDuration::hours(72)),
        match_type: MatchType::Nudge,
      },
    }
  }

  /// Spawn a webhook receiver answering with `status`; returns its URL and
  /// the bodies it received.
  async fn receiver(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
      .route(
        "/hooks/match",
        post(move |State(seen): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
          seen.lock().await.push(body);
          status
        }),
      )
      .with_state(seen.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}/hooks/match"), seen)
  }

  #[tokio::test]
  async fn log_notifier_always_succeeds() {
    assert!(Notifier::Log.deliver(&event()).await.is_ok());
  }

  #[tokio::test]
  async fn webhook_receives_the_event() {
    let (url, seen) = receiver(StatusCode::OK).await;
    let notifier = Notifier::webhook(url).unwrap();
    let event = event();

    notifier.deliver(&event).await.unwrap();

    let bodies = seen.lock().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["match"]["match_id"], event.created.match_id.to_string());
    assert_eq!(bodies[0]["match"]["match_type"], "nudge");
  }

  #[tokio::test]
  async fn webhook_error_status_is_reported() {
    let (url, _seen) = receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
    let notifier = Notifier::webhook(url).unwrap();
    assert!(notifier.deliver(&event()).await.is_err());
  }

  #[tokio::test]
  async fn run_drains_until_closed() {
    let (url, seen) = receiver(StatusCode::NO_CONTENT).await;
    let notifier = Notifier::webhook(url).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tx.send(event()).unwrap();
    tx.send(event()).unwrap();
    drop(tx);
    notifier.run(rx).await;

    assert_eq!(seen.lock().await.len(), 2);
  }
}
