//! posyandu-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens an
//! in-process SQLite store, spawns the background jobs, and serves the SMS
//! webhook plus the admin endpoints over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `admin_password_hash` in
//! config.toml:
//!
//! ```
//! cargo run -p posyandu-server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use posyandu_core::{store::RegistryStore, worker::NewHealthWorker};
use posyandu_server::{
  AppState, ServerConfig,
  jobs::Jobs,
  notifier::SimulatedGateway,
  sweep::RecoverySweep,
};
use posyandu_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Posyandu immunization registry server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Register a health worker (`NAME:PHONE:VILLAGE:ROLE`) and exit.
  #[arg(long, value_name = "NAME:PHONE:VILLAGE:ROLE")]
  seed_worker: Option<String>,

  /// Run one recovery sweep, print the report as JSON, and exit.
  #[arg(long)]
  sweep_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("POSYANDU"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  // Helper mode: seed a health worker and exit.
  if let Some(spec) = cli.seed_worker {
    let worker = parse_worker_spec(&spec)?;
    let created = store.add_worker(worker).await?;
    println!("registered worker {} ({})", created.name, created.phone);
    return Ok(());
  }

  // Helper mode: one sweep pass and exit.
  if cli.sweep_once {
    let sweep = RecoverySweep::new(Arc::clone(&store), SimulatedGateway);
    let report = sweep.run().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  let state = AppState::new(Arc::clone(&store), server_cfg.clone());
  let jobs = Jobs::new(
    Arc::clone(&store),
    SimulatedGateway,
    Arc::clone(&state.config),
  );
  tokio::spawn(jobs.run());

  let app = posyandu_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Parse the `--seed-worker` argument.
fn parse_worker_spec(spec: &str) -> anyhow::Result<NewHealthWorker> {
  let parts: Vec<&str> = spec.split(':').collect();
  let [name, phone, village, role] = parts[..] else {
    anyhow::bail!("expected NAME:PHONE:VILLAGE:ROLE, got {spec:?}");
  };
  Ok(NewHealthWorker {
    name:             name.to_string(),
    role:             role.to_string(),
    phone:            phone.to_string(),
    assigned_village: village.to_string(),
  })
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn worker_spec_parses_all_four_fields() {
    let worker =
      parse_worker_spec("Bidan Rina:+6283333333333:Praya:bidan").unwrap();
    assert_eq!(worker.name, "Bidan Rina");
    assert_eq!(worker.phone, "+6283333333333");
    assert_eq!(worker.assigned_village, "Praya");
    assert_eq!(worker.role, "bidan");
  }

  #[test]
  fn worker_spec_rejects_missing_fields() {
    assert!(parse_worker_spec("Bidan Rina:+6283333333333").is_err());
  }
}
