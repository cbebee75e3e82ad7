//! Error types for `posyandu-sms`.
//!
//! [`ParseError`] covers user-input defects; each variant maps to a distinct
//! stateless response text. Storage faults are a separate type
//! ([`DispatchError`]) so the two can never be conflated.

use thiserror::Error;

/// Which command's usage a malformed message violated; selects the usage
/// example shown in the error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
  Register,
  Report,
  Info,
}

/// A rejected inbound message. Always answered with a response text, never
/// propagated as a fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  /// Wrong field count or an out-of-set immunization type. Checked before
  /// any date parsing.
  #[error("invalid format for {0:?} command")]
  InvalidFormat(CommandKind),

  /// A field that must be `DD-MM-YYYY` was not.
  #[error("invalid date: {0:?}")]
  InvalidDate(String),

  /// No known command prefix matched.
  #[error("unrecognized command")]
  Unrecognized,
}

/// A storage fault inside command dispatch. Logged and rendered as a generic
/// failure response; never crosses the SMS boundary.
#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DispatchError {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}
