//! Recovery sweep — the self-healing pass over the registry.
//!
//! Repairs the three drift classes the system accumulates when messages are
//! lost or a crash interrupts processing:
//!
//! 1. `scheduled` rows whose due date has passed the grace window become
//!    `overdue` (and the parent is alerted);
//! 2. babies with zero schedule rows get their full schedule backfilled
//!    from their birth date;
//! 3. the SMS log is trimmed to the retention window once enough stale rows
//!    accumulate.
//!
//! Every step is idempotent, so the sweep can run on a timer and on demand
//! without coordination. A step failing is traced and skipped; the remaining
//! steps still run.

use std::sync::Arc;

use chrono::{Days, Duration, Utc};
use posyandu_core::{schedule::compute_schedule, store::RegistryStore};
use posyandu_sms::messages;
use serde::Serialize;

use crate::notifier::{Notifier, send_logged};

/// Days past the due date before a `scheduled` row is considered overdue.
pub const GRACE_DAYS: u64 = 1;

/// Log rows older than this many days are eligible for purging.
pub const LOG_RETENTION_DAYS: i64 = 30;

/// Purge only fires once this many stale rows exist, so the sweep is not
/// deleting a handful of rows every pass.
pub const LOG_PURGE_THRESHOLD: u64 = 100;

/// What one sweep pass actually did.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepReport {
  pub overdue_marked:       u64,
  pub schedules_backfilled: u64,
  pub logs_purged:          u64,
  pub babies:               u64,
  pub schedules:            u64,
  pub logs:                 u64,
}

pub struct RecoverySweep<S, N> {
  store:    Arc<S>,
  notifier: N,
}

impl<S, N> RecoverySweep<S, N>
where
  S: RegistryStore,
  N: Notifier,
{
  pub fn new(store: Arc<S>, notifier: N) -> Self { Self { store, notifier } }

  /// Run one full pass. Infallible by construction: each step owns its
  /// errors.
  pub async fn run(&self) -> SweepReport {
    let mut report = SweepReport::default();

    report.overdue_marked = self.mark_overdue().await;
    report.schedules_backfilled = self.backfill_schedules().await;
    report.logs_purged = self.purge_stale_logs().await;
    self.snapshot(&mut report).await;

    tracing::info!(
      overdue = report.overdue_marked,
      backfilled = report.schedules_backfilled,
      purged = report.logs_purged,
      "recovery sweep finished"
    );
    report
  }

  async fn mark_overdue(&self) -> u64 {
    let cutoff = Utc::now().date_naive() - Days::new(GRACE_DAYS);
    let transitioned = match self.store.mark_overdue_before(cutoff).await {
      Ok(rows) => rows,
      Err(e) => {
        tracing::error!(error = %e, "overdue transition failed");
        return 0;
      }
    };

    for (schedule, baby) in &transitioned {
      let text = messages::overdue_alert(baby, schedule);
      send_logged(&*self.store, &self.notifier, &baby.parent_phone, &text)
        .await;
    }
    transitioned.len() as u64
  }

  async fn backfill_schedules(&self) -> u64 {
    let orphans = match self.store.babies_without_schedules().await {
      Ok(babies) => babies,
      Err(e) => {
        tracing::error!(error = %e, "orphan scan failed");
        return 0;
      }
    };

    let mut created = 0;
    for baby in orphans {
      let entries = compute_schedule(baby.birth_date);
      match self.store.insert_schedules(&baby.baby_id, entries).await {
        Ok(n) => {
          tracing::warn!(baby_id = %baby.baby_id, rows = n, "backfilled schedule");
          created += n;
        }
        Err(e) => {
          tracing::error!(error = %e, baby_id = %baby.baby_id, "backfill failed");
        }
      }
    }
    created
  }

  async fn purge_stale_logs(&self) -> u64 {
    let cutoff = Utc::now() - Duration::days(LOG_RETENTION_DAYS);
    let stale = match self.store.stale_log_count(cutoff).await {
      Ok(n) => n,
      Err(e) => {
        tracing::error!(error = %e, "stale log count failed");
        return 0;
      }
    };
    if stale <= LOG_PURGE_THRESHOLD {
      return 0;
    }

    match self.store.purge_logs_before(cutoff).await {
      Ok(n) => n,
      Err(e) => {
        tracing::error!(error = %e, "log purge failed");
        0
      }
    }
  }

  async fn snapshot(&self, report: &mut SweepReport) {
    match self.store.counts().await {
      Ok(counts) => {
        report.babies = counts.babies;
        report.schedules = counts.schedules;
        report.logs = counts.logs;
        if counts.schedules < counts.babies {
          tracing::warn!(
            babies = counts.babies,
            schedules = counts.schedules,
            "fewer schedules than babies, registry may still be degraded"
          );
        }
      }
      Err(e) => tracing::error!(error = %e, "counts snapshot failed"),
    }
  }
}
