//! Village — contact metadata for the community a baby belongs to.
//!
//! Referenced from [`crate::baby::Baby::village`] by name only; the registry
//! accepts babies from villages that were never entered here. Coordinator
//! details feed outbound message footers, nothing else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Village {
  /// Unique short code, e.g. `PRY`.
  pub code:              String,
  /// Unique display name, the value babies reference.
  pub name:              String,
  pub coordinator_name:  Option<String>,
  pub coordinator_phone: Option<String>,
  pub created_at:        DateTime<Utc>,
}

/// Input to [`crate::store::RegistryStore::add_village`].
#[derive(Debug, Clone)]
pub struct NewVillage {
  pub code:              String,
  pub name:              String,
  pub coordinator_name:  Option<String>,
  pub coordinator_phone: Option<String>,
}
