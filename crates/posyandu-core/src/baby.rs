//! Baby — the immunization subject tracked by the registry.
//!
//! A baby is identified by a short wire-visible id (`LT-###`) that parents
//! and health workers type into SMS commands. Ids are never reused; exactly
//! one baby per (name, mother, birth date) tuple is ever accepted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A registered baby. Owns its [`crate::schedule::Schedule`] rows; deleting a
/// baby cascades to them at the store level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baby {
  /// Wire-visible id, format `LT-###` (or a 4-digit time-derived fallback).
  pub baby_id:      String,
  pub name:         String,
  pub birth_date:   NaiveDate,
  pub mother_name:  String,
  /// Village name; a soft reference into [`crate::village::Village`] —
  /// unregistered villages are legal.
  pub village:      String,
  /// Phone number of the registering parent; the authorization token for
  /// `INFO` requests.
  pub parent_phone: String,
  /// Server-assigned timestamp; never changes after creation.
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::RegistryStore::create_baby`].
/// `created_at` is always set by the store; it is not accepted from callers.
#[derive(Debug, Clone)]
pub struct NewBaby {
  pub baby_id:      String,
  pub name:         String,
  pub birth_date:   NaiveDate,
  pub mother_name:  String,
  pub village:      String,
  pub parent_phone: String,
}
