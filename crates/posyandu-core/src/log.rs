//! SMS log — the append-only record of every message crossing the boundary.
//!
//! Rows are never edited after insertion except once, to record the
//! processing outcome. Old rows are purged by the recovery sweep after the
//! retention window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Incoming,
  Outgoing,
}

impl Direction {
  pub fn discriminant(self) -> &'static str {
    match self {
      Self::Incoming => "incoming",
      Self::Outgoing => "outgoing",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "incoming" => Ok(Self::Incoming),
      "outgoing" => Ok(Self::Outgoing),
      other => Err(Error::UnknownDirection(other.to_string())),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsLog {
  pub log_id:     i64,
  pub phone:      String,
  pub direction:  Direction,
  pub content:    String,
  /// Set once, after the message is handled (incoming) or handed to the
  /// gateway (outgoing).
  pub processed:  bool,
  pub error:      Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::RegistryStore::append_log`].
#[derive(Debug, Clone)]
pub struct NewSmsLog {
  pub phone:     String,
  pub direction: Direction,
  pub content:   String,
}
