//! The `RegistryStore` trait and supporting outcome types.
//!
//! The trait is implemented by storage backends (e.g.
//! `posyandu-store-sqlite`). Higher layers (the SMS dispatcher, the recovery
//! sweep, the webhook server) depend on this abstraction, not on any
//! concrete backend.
//!
//! Expected, contended results — a baby id already taken, a completion race
//! lost — are data ([`RegistrationOutcome`], [`CompletionOutcome`]), not
//! errors. `Self::Error` is reserved for real storage faults.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::{
  baby::{Baby, NewBaby},
  log::{NewSmsLog, SmsLog},
  schedule::{ImmunizationType, Schedule, ScheduleEntry},
  village::{NewVillage, Village},
  worker::{HealthWorker, NewHealthWorker},
};

// ─── Outcome types ───────────────────────────────────────────────────────────

/// Result of an attempted baby registration.
#[derive(Debug)]
pub enum RegistrationOutcome {
  /// The baby and its full schedule were committed atomically.
  Created(Baby),
  /// The chosen `LT-###` id lost a uniqueness race; the caller should
  /// generate a fresh id and retry.
  IdTaken,
  /// A baby with the same (name, mother, birth date) already exists; the
  /// existing row is returned so callers can answer idempotently.
  Duplicate(Baby),
}

/// Result of an attempted schedule completion.
#[derive(Debug)]
pub enum CompletionOutcome {
  /// The compare-and-set won; the updated row is returned.
  Completed(Schedule),
  /// No open schedule exists for (baby, immunization) — never scheduled or
  /// already completed, intentionally indistinguishable to the caller.
  NotFound,
  /// An open schedule was observed but a concurrent transition won the
  /// compare-and-set first.
  Conflict,
}

/// Row totals for operational visibility.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreCounts {
  pub babies:    u64,
  pub schedules: u64,
  pub logs:      u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an immunization-registry storage backend.
///
/// Multi-row writes (`create_baby`, `mark_overdue_before`) are atomic within
/// a single call. Per-schedule status transitions are serialized by
/// compare-and-set on the status column: at most one terminal transition
/// wins, the loser observes [`CompletionOutcome::Conflict`].
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait RegistryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Babies ────────────────────────────────────────────────────────────

  /// Create a baby together with all of its schedule entries in one
  /// transaction. Uniqueness violations surface as outcomes, not errors.
  fn create_baby(
    &self,
    baby: NewBaby,
    entries: Vec<ScheduleEntry>,
  ) -> impl Future<Output = Result<RegistrationOutcome, Self::Error>> + Send + '_;

  /// Retrieve a baby by its `LT-###` id. Returns `None` if not found.
  fn get_baby<'a>(
    &'a self,
    baby_id: &'a str,
  ) -> impl Future<Output = Result<Option<Baby>, Self::Error>> + Send + 'a;

  /// Look up a baby by its identity tuple (name, mother, birth date).
  fn find_baby_by_identity<'a>(
    &'a self,
    name: &'a str,
    mother_name: &'a str,
    birth_date: NaiveDate,
  ) -> impl Future<Output = Result<Option<Baby>, Self::Error>> + Send + 'a;

  /// Babies with zero schedule rows — a data-integrity defect repaired by
  /// the recovery sweep's backfill step.
  fn babies_without_schedules(
    &self,
  ) -> impl Future<Output = Result<Vec<Baby>, Self::Error>> + Send + '_;

  // ── Schedules ─────────────────────────────────────────────────────────

  /// Open (scheduled) entries for a baby due on or after `from`, ordered by
  /// due date ascending.
  fn upcoming_schedules<'a>(
    &'a self,
    baby_id: &'a str,
    from: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Schedule>, Self::Error>> + Send + 'a;

  /// Number of completed entries for a baby.
  fn completed_count<'a>(
    &'a self,
    baby_id: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Complete the open schedule for (baby, immunization) via compare-and-set
  /// (`scheduled` and `overdue` rows are both completable).
  fn complete_schedule<'a>(
    &'a self,
    baby_id: &'a str,
    immunization: ImmunizationType,
    completed_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<CompletionOutcome, Self::Error>> + Send + 'a;

  /// Scheduled entries due exactly on `date`, joined with their babies —
  /// the reminder job's working set.
  fn schedules_due_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<(Schedule, Baby)>, Self::Error>> + Send + '_;

  /// Transition every `scheduled` entry with `due_date < cutoff` to
  /// `overdue`, atomically, and return the transitioned rows with their
  /// babies. Idempotent: a second call with the same cutoff returns nothing.
  fn mark_overdue_before(
    &self,
    cutoff: NaiveDate,
  ) -> impl Future<Output = Result<Vec<(Schedule, Baby)>, Self::Error>> + Send + '_;

  /// Insert schedule entries for an existing baby (sweep backfill). Returns
  /// the number of rows created.
  fn insert_schedules<'a>(
    &'a self,
    baby_id: &'a str,
    entries: Vec<ScheduleEntry>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  // ── Health workers ────────────────────────────────────────────────────

  fn add_worker(
    &self,
    worker: NewHealthWorker,
  ) -> impl Future<Output = Result<HealthWorker, Self::Error>> + Send + '_;

  /// The active worker owning `phone`, if any — the LAPOR authorization
  /// check.
  fn active_worker_by_phone<'a>(
    &'a self,
    phone: &'a str,
  ) -> impl Future<Output = Result<Option<HealthWorker>, Self::Error>> + Send + 'a;

  // ── Villages ──────────────────────────────────────────────────────────

  fn add_village(
    &self,
    village: NewVillage,
  ) -> impl Future<Output = Result<Village, Self::Error>> + Send + '_;

  fn village_by_name<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Village>, Self::Error>> + Send + 'a;

  // ── SMS log ───────────────────────────────────────────────────────────

  /// Append a log row. `created_at` and `processed = false` are set by the
  /// store.
  fn append_log(
    &self,
    log: NewSmsLog,
  ) -> impl Future<Output = Result<SmsLog, Self::Error>> + Send + '_;

  /// Record the one-time processing outcome for a log row.
  fn finish_log(
    &self,
    log_id: i64,
    processed: bool,
    error: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Count log rows older than `cutoff` (the retention hysteresis input).
  fn stale_log_count(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Delete log rows older than `cutoff`; returns how many were removed.
  fn purge_logs_before(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Ops ───────────────────────────────────────────────────────────────

  /// Row totals for the sweep's health snapshot.
  fn counts(
    &self,
  ) -> impl Future<Output = Result<StoreCounts, Self::Error>> + Send + '_;

  /// Distinct (parent phone, mother name) pairs over babies that still have
  /// open schedules — the weekly education job's recipients.
  fn parents_with_open_schedules(
    &self,
  ) -> impl Future<Output = Result<Vec<(String, String)>, Self::Error>> + Send + '_;
}
