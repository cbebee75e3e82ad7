//! Scheduled background work: reminders, weekly education, periodic sweeps.
//!
//! Three independent loops share one store and one notifier:
//!
//! - daily reminders for schedules falling due tomorrow;
//! - weekly education texts to parents with open schedules (Sunday);
//! - a recovery sweep on a fixed interval.
//!
//! Next-fire-time computation is pure and separately tested; the loops just
//! sleep until it.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Duration, NaiveTime, Utc, Weekday};
use posyandu_core::store::RegistryStore;
use posyandu_sms::messages;

use crate::{
  ServerConfig,
  notifier::{Notifier, send_logged},
  sweep::RecoverySweep,
};

pub struct Jobs<S, N> {
  store:    Arc<S>,
  notifier: N,
  config:   Arc<ServerConfig>,
}

impl<S, N> Jobs<S, N>
where
  S: RegistryStore,
  N: Notifier + Clone,
{
  pub fn new(store: Arc<S>, notifier: N, config: Arc<ServerConfig>) -> Self {
    Self {
      store,
      notifier,
      config,
    }
  }

  /// Run all three loops until the process exits.
  pub async fn run(self) {
    let reminders = Self {
      store:    Arc::clone(&self.store),
      notifier: self.notifier.clone(),
      config:   Arc::clone(&self.config),
    };
    let education = Self {
      store:    Arc::clone(&self.store),
      notifier: self.notifier.clone(),
      config:   Arc::clone(&self.config),
    };

    tokio::join!(
      reminders.reminder_loop(),
      education.education_loop(),
      self.sweep_loop(),
    );
  }

  async fn reminder_loop(self) {
    loop {
      sleep_until(next_daily(Utc::now(), self.config.reminder_hour)).await;
      let sent = self.send_due_reminders().await;
      tracing::info!(sent, "reminder pass finished");
    }
  }

  async fn education_loop(self) {
    loop {
      sleep_until(next_weekly(
        Utc::now(),
        Weekday::Sun,
        self.config.education_hour,
      ))
      .await;
      let sent = self.send_weekly_education().await;
      tracing::info!(sent, "weekly education pass finished");
    }
  }

  async fn sweep_loop(self) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(
      self.config.sweep_interval_hours * 3600,
    ));
    let sweep =
      RecoverySweep::new(Arc::clone(&self.store), self.notifier.clone());
    loop {
      interval.tick().await;
      sweep.run().await;
    }
  }

  /// One reminder pass: text every parent whose baby has a schedule falling
  /// due `reminder_lead_days` from today. Returns how many went out.
  pub async fn send_due_reminders(&self) -> u64 {
    let target =
      Utc::now().date_naive() + Days::new(self.config.reminder_lead_days);
    let due = match self.store.schedules_due_on(target).await {
      Ok(rows) => rows,
      Err(e) => {
        tracing::error!(error = %e, "due-schedule scan failed");
        return 0;
      }
    };

    let mut sent = 0;
    for (schedule, baby) in &due {
      let text = messages::reminder(baby, schedule);
      send_logged(&*self.store, &self.notifier, &baby.parent_phone, &text)
        .await;
      sent += 1;
    }
    sent
  }

  /// One education pass: one text per distinct parent with open schedules.
  pub async fn send_weekly_education(&self) -> u64 {
    let parents = match self.store.parents_with_open_schedules().await {
      Ok(rows) => rows,
      Err(e) => {
        tracing::error!(error = %e, "parent scan failed");
        return 0;
      }
    };

    let mut sent = 0;
    for (phone, mother_name) in &parents {
      let text = messages::weekly_education(mother_name);
      send_logged(&*self.store, &self.notifier, phone, &text).await;
      sent += 1;
    }
    sent
  }
}

async fn sleep_until(at: DateTime<Utc>) {
  let wait = (at - Utc::now()).to_std().unwrap_or_default();
  tokio::time::sleep(wait).await;
}

/// Next occurrence of `hour:00` strictly after `now`.
fn next_daily(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
  let at = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
  let today = now.date_naive().and_time(at).and_utc();
  if today > now { today } else { today + Duration::days(1) }
}

/// Next occurrence of `weekday` at `hour:00` strictly after `now`.
fn next_weekly(now: DateTime<Utc>, weekday: Weekday, hour: u32) -> DateTime<Utc> {
  let mut candidate = next_daily(now, hour);
  while candidate.weekday() != weekday {
    candidate += Duration::days(1);
  }
  candidate
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use chrono::TimeZone;
  use posyandu_core::{baby::NewBaby, schedule::compute_schedule};
  use posyandu_store_sqlite::SqliteStore;

  use super::*;

  #[derive(Default)]
  struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
  }

  impl Notifier for &RecordingNotifier {
    async fn send(&self, phone: &str, text: &str) {
      self
        .sent
        .lock()
        .unwrap()
        .push((phone.to_string(), text.to_string()));
    }
  }

  fn config() -> Arc<ServerConfig> {
    Arc::new(ServerConfig {
      host:                 "127.0.0.1".to_string(),
      port:                 8080,
      store_path:           std::path::PathBuf::from(":memory:"),
      admin_username:       "admin".to_string(),
      admin_password_hash:  String::new(),
      reminder_hour:        9,
      education_hour:       8,
      sweep_interval_hours: 4,
      reminder_lead_days:   1,
    })
  }

  async fn seeded_store(birth_offset_days: u64) -> Arc<SqliteStore> {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let birth = Utc::now().date_naive() - Days::new(birth_offset_days);
    store
      .create_baby(
        NewBaby {
          baby_id:      "LT-001".to_string(),
          name:         "Aisha".to_string(),
          birth_date:   birth,
          mother_name:  "Siti".to_string(),
          village:      "Praya".to_string(),
          parent_phone: "+6281111111111".to_string(),
        },
        compute_schedule(birth),
      )
      .await
      .unwrap();
    store
  }

  #[tokio::test]
  async fn reminder_pass_texts_tomorrows_due_schedules() {
    // BCG is due at +30 days, so a birth 29 days ago falls due tomorrow.
    let store = seeded_store(29).await;
    let notifier = RecordingNotifier::default();
    let jobs = Jobs::new(Arc::clone(&store), &notifier, config());

    assert_eq!(jobs.send_due_reminders().await, 1);
    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent[0].0, "+6281111111111");
    assert!(sent[0].1.contains("BCG"));
  }

  #[tokio::test]
  async fn reminder_pass_with_nothing_due_sends_nothing() {
    let store = seeded_store(5).await;
    let notifier = RecordingNotifier::default();
    let jobs = Jobs::new(Arc::clone(&store), &notifier, config());
    assert_eq!(jobs.send_due_reminders().await, 0);
  }

  #[tokio::test]
  async fn education_pass_texts_each_parent_once() {
    let store = seeded_store(5).await;
    let notifier = RecordingNotifier::default();
    let jobs = Jobs::new(Arc::clone(&store), &notifier, config());

    assert_eq!(jobs.send_weekly_education().await, 1);
    let sent = notifier.sent.lock().unwrap();
    assert!(sent[0].1.contains("Siti"));
  }

  fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
  }

  #[test]
  fn next_daily_later_today() {
    let now = at(2026, 8, 29, 7, 30);
    assert_eq!(next_daily(now, 9), at(2026, 8, 29, 9, 0));
  }

  #[test]
  fn next_daily_rolls_to_tomorrow() {
    let now = at(2026, 8, 29, 9, 0);
    assert_eq!(next_daily(now, 9), at(2026, 8, 30, 9, 0));
  }

  #[test]
  fn next_weekly_finds_the_coming_sunday() {
    // 2026-08-29 is a Saturday.
    let now = at(2026, 8, 29, 12, 0);
    let next = next_weekly(now, Weekday::Sun, 8);
    assert_eq!(next, at(2026, 8, 30, 8, 0));
    assert_eq!(next.weekday(), Weekday::Sun);
  }

  #[test]
  fn next_weekly_skips_the_same_morning() {
    // Sunday after the education hour has passed.
    let now = at(2026, 8, 30, 9, 0);
    let next = next_weekly(now, Weekday::Sun, 8);
    assert_eq!(next, at(2026, 9, 6, 8, 0));
  }
}
