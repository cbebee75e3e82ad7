//! Inbound SMS tokenizer and command classifier.
//!
//! Pure string → command mapping; never touches storage. Normalization is
//! trim + uppercase, then a fixed-prefix dispatch in precedence order
//! REG → LAPOR → INFO → help keywords → unrecognized. Field-count checks
//! always precede date parsing, so `REG#A#2024-05-12#B` (four fields) is an
//! [`ParseError::InvalidFormat`], not an invalid date.

use chrono::NaiveDate;
use posyandu_core::schedule::ImmunizationType;

use crate::error::{CommandKind, ParseError};

/// A classified inbound message. All text fields are uppercase, exactly as
/// normalised from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Register {
    name:        String,
    birth_date:  NaiveDate,
    mother_name: String,
    village:     String,
  },
  Report {
    baby_id:      String,
    immunization: ImmunizationType,
    /// Given only by the 4-field `LAPOR` variant; recorded as the
    /// completion date in place of "now".
    report_date:  Option<NaiveDate>,
  },
  Info {
    baby_id: String,
  },
  Help,
}

/// Accepted spellings of the help command.
const HELP_KEYWORDS: [&str; 3] = ["HELP", "BANTUAN", "TOLONGAN"];

/// Parse one inbound message.
pub fn parse(raw: &str) -> Result<Command, ParseError> {
  let text = raw.trim().to_uppercase();

  if text.starts_with("REG#") {
    parse_register(&text)
  } else if text.starts_with("LAPOR#") {
    parse_report(&text)
  } else if text.starts_with("INFO#") {
    parse_info(&text)
  } else if HELP_KEYWORDS.contains(&text.as_str()) {
    Ok(Command::Help)
  } else {
    Err(ParseError::Unrecognized)
  }
}

/// `REG#<name>#<dd-mm-yyyy>#<mother>#<village>` — exactly 5 fields.
fn parse_register(text: &str) -> Result<Command, ParseError> {
  let parts: Vec<&str> = text.split('#').collect();
  if parts.len() != 5 {
    return Err(ParseError::InvalidFormat(CommandKind::Register));
  }

  Ok(Command::Register {
    name:        parts[1].to_string(),
    birth_date:  parse_date(parts[2])?,
    mother_name: parts[3].to_string(),
    village:     parts[4].to_string(),
  })
}

/// `LAPOR#<baby_id>#<type>` or `LAPOR#<baby_id>#<type>#<dd-mm-yyyy>`.
fn parse_report(text: &str) -> Result<Command, ParseError> {
  let parts: Vec<&str> = text.split('#').collect();
  if parts.len() != 3 && parts.len() != 4 {
    return Err(ParseError::InvalidFormat(CommandKind::Report));
  }

  // The immunization set is closed; an unknown token is a format defect.
  let immunization = ImmunizationType::parse(parts[2])
    .map_err(|_| ParseError::InvalidFormat(CommandKind::Report))?;

  let report_date = if parts.len() == 4 {
    Some(parse_date(parts[3])?)
  } else {
    None
  };

  Ok(Command::Report {
    baby_id: parts[1].to_string(),
    immunization,
    report_date,
  })
}

/// `INFO#<baby_id>` — exactly 2 fields.
fn parse_info(text: &str) -> Result<Command, ParseError> {
  let parts: Vec<&str> = text.split('#').collect();
  if parts.len() != 2 {
    return Err(ParseError::InvalidFormat(CommandKind::Info));
  }

  Ok(Command::Info { baby_id: parts[1].to_string() })
}

fn parse_date(s: &str) -> Result<NaiveDate, ParseError> {
  NaiveDate::parse_from_str(s, "%d-%m-%Y")
    .map_err(|_| ParseError::InvalidDate(s.to_string()))
}
