//! Error types for `posyandu-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("baby not found: {0}")]
  BabyNotFound(String),

  #[error("unknown immunization type: {0:?}")]
  UnknownImmunization(String),

  #[error("unknown schedule status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown message direction: {0:?}")]
  UnknownDirection(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
