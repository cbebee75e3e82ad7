//! Schedule — one immunization due-date obligation for a baby — and the
//! deterministic calculator that derives the full set from a birth date.
//!
//! Status transitions are monotone: `scheduled → completed` and
//! `scheduled → overdue` (an overdue schedule can still be completed by a
//! late report; `completed` is terminal and is never revisited).

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Immunization types ──────────────────────────────────────────────────────

/// The closed set of immunizations tracked by the program (one dose per type,
/// a simplified national-guideline subset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImmunizationType {
  Bcg,
  Polio,
  Dpt,
  Campak,
  Hepatitis,
}

impl ImmunizationType {
  /// The discriminant string stored in the `immunization` column and shown
  /// in outbound messages.
  pub fn label(self) -> &'static str {
    match self {
      Self::Bcg => "BCG",
      Self::Polio => "Polio",
      Self::Dpt => "DPT",
      Self::Campak => "Campak",
      Self::Hepatitis => "Hepatitis",
    }
  }

  /// Parse an SMS token or database discriminant. Case-insensitive.
  pub fn parse(s: &str) -> Result<Self> {
    match s.to_ascii_uppercase().as_str() {
      "BCG" => Ok(Self::Bcg),
      "POLIO" => Ok(Self::Polio),
      "DPT" => Ok(Self::Dpt),
      "CAMPAK" => Ok(Self::Campak),
      "HEPATITIS" => Ok(Self::Hepatitis),
      other => Err(Error::UnknownImmunization(other.to_string())),
    }
  }
}

impl std::fmt::Display for ImmunizationType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.label())
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of a schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
  /// Open, waiting for a report.
  Scheduled,
  /// Terminal: a health worker reported the immunization as given.
  Completed,
  /// Past due; still completable by a late report.
  Overdue,
}

impl ScheduleStatus {
  pub fn discriminant(self) -> &'static str {
    match self {
      Self::Scheduled => "scheduled",
      Self::Completed => "completed",
      Self::Overdue => "overdue",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "scheduled" => Ok(Self::Scheduled),
      "completed" => Ok(Self::Completed),
      "overdue" => Ok(Self::Overdue),
      other => Err(Error::UnknownStatus(other.to_string())),
    }
  }

  /// True while a report can still complete the entry.
  pub fn is_open(self) -> bool { !matches!(self, Self::Completed) }
}

// ─── Schedule ────────────────────────────────────────────────────────────────

/// One immunization obligation. Invariant: `completed_at` is non-null iff
/// `status == Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
  pub schedule_id:  i64,
  pub baby_id:      String,
  pub immunization: ImmunizationType,
  pub due_date:     NaiveDate,
  pub status:       ScheduleStatus,
  pub created_at:   DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

// ─── Calculator ──────────────────────────────────────────────────────────────

/// One row of the calculator output — an immunization type with its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
  pub immunization: ImmunizationType,
  pub due_date:     NaiveDate,
}

/// Due-date offsets from the birth date, in days. Output order is this
/// declaration order, not date order.
pub const SCHEDULE_RULES: [(ImmunizationType, u64); 5] = [
  (ImmunizationType::Bcg, 30),
  (ImmunizationType::Hepatitis, 60),
  (ImmunizationType::Polio, 60),
  (ImmunizationType::Dpt, 60),
  (ImmunizationType::Campak, 270),
];

/// Compute the full immunization schedule for a birth date.
///
/// Pure and deterministic. Dates in the past are valid output: registering a
/// baby born long ago yields entries that are already past due, which the
/// recovery sweep will transition to overdue.
pub fn compute_schedule(birth_date: NaiveDate) -> Vec<ScheduleEntry> {
  SCHEDULE_RULES
    .iter()
    .map(|&(immunization, offset)| ScheduleEntry {
      immunization,
      // Adding days cannot overflow for any representable birth date.
      due_date: birth_date + Days::new(offset),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn five_entries_in_declaration_order() {
    let entries = compute_schedule(date(2024, 5, 12));
    let types: Vec<_> = entries.iter().map(|e| e.immunization).collect();
    assert_eq!(types, vec![
      ImmunizationType::Bcg,
      ImmunizationType::Hepatitis,
      ImmunizationType::Polio,
      ImmunizationType::Dpt,
      ImmunizationType::Campak,
    ]);
  }

  #[test]
  fn offsets_for_reference_birth_date() {
    // The worked example from the help text: born 12-05-2024.
    let entries = compute_schedule(date(2024, 5, 12));
    assert_eq!(entries[0].due_date, date(2024, 6, 11)); // BCG +30
    assert_eq!(entries[1].due_date, date(2024, 7, 11)); // Hepatitis +60
    assert_eq!(entries[2].due_date, date(2024, 7, 11)); // Polio +60
    assert_eq!(entries[3].due_date, date(2024, 7, 11)); // DPT +60
    assert_eq!(entries[4].due_date, date(2025, 2, 6)); // Campak +270
  }

  #[test]
  fn leap_day_birth_date() {
    let entries = compute_schedule(date(2024, 2, 29));
    assert_eq!(entries[0].due_date, date(2024, 3, 30));
    assert_eq!(entries[4].due_date, date(2024, 11, 25));
  }

  #[test]
  fn month_end_crossing_a_year_boundary() {
    let entries = compute_schedule(date(2023, 12, 31));
    assert_eq!(entries[0].due_date, date(2024, 1, 30));
    assert_eq!(entries[4].due_date, date(2024, 9, 26));
  }

  #[test]
  fn past_birth_dates_are_accepted() {
    let entries = compute_schedule(date(2019, 1, 1));
    assert_eq!(entries.len(), 5);
    assert!(entries.iter().all(|e| e.due_date < date(2020, 1, 1)));
  }

  #[test]
  fn immunization_parse_round_trip() {
    for (t, _) in SCHEDULE_RULES {
      assert_eq!(ImmunizationType::parse(t.label()).unwrap(), t);
      assert_eq!(
        ImmunizationType::parse(&t.label().to_uppercase()).unwrap(),
        t
      );
    }
    assert!(ImmunizationType::parse("MEASLES").is_err());
  }

  #[test]
  fn status_open_test() {
    assert!(ScheduleStatus::Scheduled.is_open());
    assert!(ScheduleStatus::Overdue.is_open());
    assert!(!ScheduleStatus::Completed.is_open());
  }
}
