//! Health worker — the only senders allowed to file `LAPOR` reports.
//!
//! The phone number doubles as the authentication token: a report is
//! authorized iff its sender number matches an active worker row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthWorker {
  pub worker_id:        i64,
  pub name:             String,
  /// Job title, e.g. "Bidan" or "Kader".
  pub role:             String,
  /// Unique; matched verbatim against inbound sender numbers.
  pub phone:            String,
  pub assigned_village: String,
  /// Deactivated workers keep their row but lose report authorization.
  pub active:           bool,
  pub created_at:       DateTime<Utc>,
}

/// Input to [`crate::store::RegistryStore::add_worker`].
#[derive(Debug, Clone)]
pub struct NewHealthWorker {
  pub name:             String,
  pub role:             String,
  pub phone:            String,
  pub assigned_village: String,
}
