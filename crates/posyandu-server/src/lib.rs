//! HTTP layer for the Posyandu immunization registry.
//!
//! Exposes an axum [`Router`] with two surfaces backed by any
//! [`RegistryStore`]:
//!
//! - `POST /sms` — the gateway webhook. Form-encoded `From`/`Body`, answers
//!   with the reply text the gateway should deliver back to the sender.
//! - `GET /admin/health`, `POST /admin/sweep` — Basic-auth operator
//!   endpoints for the registry snapshot and an on-demand recovery sweep.

pub mod auth;
pub mod error;
pub mod jobs;
pub mod notifier;
pub mod sweep;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  extract::{Form, State},
  routing::{get, post},
};
use posyandu_core::store::RegistryStore;
use posyandu_sms::Dispatcher;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, Authenticated};
use notifier::SimulatedGateway;
use sweep::{RecoverySweep, SweepReport};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  pub admin_username:      String,
  pub admin_password_hash: String,
  /// UTC hour of the daily reminder pass.
  #[serde(default = "default_reminder_hour")]
  pub reminder_hour:       u32,
  /// UTC hour of the Sunday education pass.
  #[serde(default = "default_education_hour")]
  pub education_hour:      u32,
  #[serde(default = "default_sweep_interval_hours")]
  pub sweep_interval_hours: u64,
  /// How many days before the due date a reminder goes out.
  #[serde(default = "default_reminder_lead_days")]
  pub reminder_lead_days:  u64,
}

fn default_reminder_hour() -> u32 { 9 }
fn default_education_hour() -> u32 { 8 }
fn default_sweep_interval_hours() -> u64 { 4 }
fn default_reminder_lead_days() -> u64 { 1 }

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: RegistryStore> {
  pub store:      Arc<S>,
  pub dispatcher: Dispatcher<S>,
  pub auth:       Arc<AuthConfig>,
  pub config:     Arc<ServerConfig>,
}

impl<S: RegistryStore> AppState<S> {
  pub fn new(store: Arc<S>, config: ServerConfig) -> Self {
    Self {
      dispatcher: Dispatcher::new(Arc::clone(&store)),
      auth: Arc::new(AuthConfig {
        username:      config.admin_username.clone(),
        password_hash: config.admin_password_hash.clone(),
      }),
      config: Arc::new(config),
      store,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the registry server.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RegistryStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/sms",          post(sms_webhook::<S>))
    .route("/admin/health", get(admin_health::<S>))
    .route("/admin/sweep",  post(admin_sweep::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// Gateway webhook payload. Field names follow the common SMS-gateway
/// convention of capitalised `From`/`Body`.
#[derive(Deserialize)]
pub struct InboundSms {
  #[serde(rename = "From")]
  pub from: String,
  #[serde(rename = "Body")]
  pub body: String,
}

async fn sms_webhook<S>(
  State(state): State<AppState<S>>,
  Form(inbound): Form<InboundSms>,
) -> String
where
  S: RegistryStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let sender = notifier::normalize_phone(&inbound.from);
  state.dispatcher.handle(&sender, &inbound.body).await
}

#[derive(Serialize)]
struct HealthResponse {
  status:    &'static str,
  babies:    u64,
  schedules: u64,
  logs:      u64,
}

async fn admin_health<S>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<Json<HealthResponse>, Error>
where
  S: RegistryStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let counts = state.store.counts().await.map_err(Error::store)?;
  Ok(Json(HealthResponse {
    status:    "ok",
    babies:    counts.babies,
    schedules: counts.schedules,
    logs:      counts.logs,
  }))
}

async fn admin_sweep<S>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
) -> Json<SweepReport>
where
  S: RegistryStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let sweep =
    RecoverySweep::new(Arc::clone(&state.store), SimulatedGateway);
  Json(sweep.run().await)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use posyandu_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use tower::ServiceExt as _;

  use super::*;

  async fn make_state(password: &str) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    AppState::new(Arc::new(store), ServerConfig {
      host:                 "127.0.0.1".to_string(),
      port:                 8080,
      store_path:           PathBuf::from(":memory:"),
      admin_username:       "admin".to_string(),
      admin_password_hash:  hash,
      reminder_hour:        default_reminder_hour(),
      education_hour:       default_education_hour(),
      sweep_interval_hours: default_sweep_interval_hours(),
      reminder_lead_days:   default_reminder_lead_days(),
    })
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn send_sms(
    state: AppState<SqliteStore>,
    from: &str,
    body: &str,
  ) -> (StatusCode, String) {
    let form = format!(
      "From={}&Body={}",
      urlencode(from),
      urlencode(body),
    );
    let req = Request::builder()
      .method("POST")
      .uri("/sms")
      .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
      .body(Body::from(form))
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
  }

  fn urlencode(s: &str) -> String {
    let mut out = String::new();
    for b in s.bytes() {
      match b {
        b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' => {
          out.push(b as char);
        }
        b' ' => out.push('+'),
        _ => out.push_str(&format!("%{b:02X}")),
      }
    }
    out
  }

  #[tokio::test]
  async fn webhook_answers_help() {
    let state = make_state("secret").await;
    let (status, reply) = send_sms(state, "+6281111111111", "HELP").await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply.contains("REG#NAMA_BAYI"));
  }

  #[tokio::test]
  async fn webhook_registers_and_health_reflects_it() {
    let state = make_state("secret").await;
    let (status, reply) = send_sms(
      state.clone(),
      "+6281111111111",
      "REG#AISHA#12-05-2024#SITI#PRAYA",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply.contains("terdaftar"));

    let req = Request::builder()
      .method("GET")
      .uri("/admin/health")
      .header(header::AUTHORIZATION, auth_header("admin", "secret"))
      .body(Body::empty())
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["babies"], 1);
    assert_eq!(health["schedules"], 5);
  }

  #[tokio::test]
  async fn admin_routes_require_auth() {
    let state = make_state("secret").await;
    let req = Request::builder()
      .method("GET")
      .uri("/admin/health")
      .body(Body::empty())
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[tokio::test]
  async fn admin_sweep_reports_what_it_did() {
    let state = make_state("secret").await;
    send_sms(
      state.clone(),
      "+6281111111111",
      "REG#AISHA#12-05-2024#SITI#PRAYA",
    )
    .await;

    let req = Request::builder()
      .method("POST")
      .uri("/admin/sweep")
      .header(header::AUTHORIZATION, auth_header("admin", "secret"))
      .body(Body::empty())
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(report["babies"], 1);
    // Every due date for a 2024 birth has long passed the grace window.
    assert_eq!(report["overdue_marked"], 5);
    assert_eq!(report["schedules_backfilled"], 0);
  }

  #[tokio::test]
  async fn webhook_rejects_malformed_commands_with_usage() {
    let state = make_state("secret").await;
    let (status, reply) =
      send_sms(state, "+6281111111111", "REG#AISHA#12-05-2024").await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply.contains("REG#NAMA_BAYI"));
  }
}
