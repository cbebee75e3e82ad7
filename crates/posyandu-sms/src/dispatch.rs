//! Command dispatch — the storage-effecting half of the protocol.
//!
//! [`Dispatcher::handle`] is the single entry point for inbound messages.
//! It always returns a response text: parse failures get usage texts,
//! storage faults are logged and answered with a generic failure message.
//! Both the inbound message and the outbound reply are appended to the SMS
//! log; a log write failing is itself logged but never blocks the reply.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use posyandu_core::{
  baby::NewBaby,
  log::{Direction, NewSmsLog},
  schedule::{ImmunizationType, compute_schedule},
  store::{CompletionOutcome, RegistrationOutcome, RegistryStore},
};
use rand_core::{OsRng, RngCore};

use crate::{
  command::{Command, parse},
  error::DispatchError,
  messages,
};

/// Bounded random probing before falling back to a time-derived id.
const ID_PROBE_LIMIT: u32 = 100;

/// Applies parsed commands against a [`RegistryStore`] and renders replies.
pub struct Dispatcher<S> {
  store: Arc<S>,
}

impl<S> Clone for Dispatcher<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<S: RegistryStore> Dispatcher<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Handle one inbound message end to end and return the reply text.
  ///
  /// Never fails: storage faults collapse to a generic failure response
  /// after being traced.
  pub async fn handle(&self, sender: &str, raw: &str) -> String {
    let incoming = self
      .store
      .append_log(NewSmsLog {
        phone:     sender.to_string(),
        direction: Direction::Incoming,
        content:   raw.to_string(),
      })
      .await;
    let incoming_id = match &incoming {
      Ok(log) => Some(log.log_id),
      Err(e) => {
        tracing::error!(error = %e, "failed to log inbound message");
        None
      }
    };

    let (reply, fault) = match parse(raw) {
      Err(parse_err) => (messages::parse_error(&parse_err), None),
      Ok(command) => match self.dispatch(sender, command).await {
        Ok(reply) => (reply, None),
        Err(DispatchError::Store(e)) => {
          tracing::error!(error = %e, sender, "command dispatch failed");
          (messages::system_error(), Some(e.to_string()))
        }
      },
    };

    if let Some(log_id) = incoming_id
      && let Err(e) = self
        .store
        .finish_log(log_id, fault.is_none(), fault)
        .await
    {
      tracing::error!(error = %e, log_id, "failed to finalize inbound log");
    }

    match self
      .store
      .append_log(NewSmsLog {
        phone:     sender.to_string(),
        direction: Direction::Outgoing,
        content:   reply.clone(),
      })
      .await
    {
      Ok(log) => {
        if let Err(e) = self.store.finish_log(log.log_id, true, None).await {
          tracing::error!(error = %e, log_id = log.log_id, "failed to finalize outbound log");
        }
      }
      Err(e) => tracing::error!(error = %e, "failed to log outbound reply"),
    }

    reply
  }

  async fn dispatch(
    &self,
    sender: &str,
    command: Command,
  ) -> Result<String, DispatchError> {
    match command {
      Command::Register {
        name,
        birth_date,
        mother_name,
        village,
      } => {
        self
          .register(sender, name, birth_date, mother_name, village)
          .await
      }
      Command::Report {
        baby_id,
        immunization,
        report_date,
      } => self.report(sender, &baby_id, immunization, report_date).await,
      Command::Info { baby_id } => self.info(sender, &baby_id).await,
      Command::Help => Ok(messages::help().to_string()),
    }
  }

  // ── REG ───────────────────────────────────────────────────────────────

  async fn register(
    &self,
    sender: &str,
    name: String,
    birth_date: NaiveDate,
    mother_name: String,
    village: String,
  ) -> Result<String, DispatchError> {
    let name = title_case(&name);
    let mother_name = title_case(&mother_name);
    let village = title_case(&village);

    // Idempotency fast path; the store's identity constraint still backstops
    // the race between this check and the insert.
    if let Some(existing) = self
      .store
      .find_baby_by_identity(&name, &mother_name, birth_date)
      .await
      .map_err(DispatchError::store)?
    {
      return Ok(messages::already_registered(&existing));
    }

    let entries = compute_schedule(birth_date);
    let mut probes = 0;
    let baby = loop {
      let baby_id = if probes < ID_PROBE_LIMIT {
        let n = OsRng.next_u32() % 999 + 1;
        format!("LT-{n:03}")
      } else {
        format!("LT-{:04}", Utc::now().timestamp() % 10_000)
      };
      probes += 1;

      let outcome = self
        .store
        .create_baby(
          NewBaby {
            baby_id,
            name: name.clone(),
            birth_date,
            mother_name: mother_name.clone(),
            village: village.clone(),
            parent_phone: sender.to_string(),
          },
          entries.clone(),
        )
        .await
        .map_err(DispatchError::store)?;

      match outcome {
        RegistrationOutcome::Created(baby) => break baby,
        RegistrationOutcome::Duplicate(existing) => {
          return Ok(messages::already_registered(&existing));
        }
        RegistrationOutcome::IdTaken if probes <= ID_PROBE_LIMIT => continue,
        RegistrationOutcome::IdTaken => {
          tracing::warn!(name, "exhausted baby id probes");
          return Ok(messages::registration_failed());
        }
      }
    };

    let coordinator = self
      .store
      .village_by_name(&baby.village)
      .await
      .map_err(DispatchError::store)?
      .and_then(|v| v.coordinator_name);

    tracing::info!(baby_id = %baby.baby_id, village = %baby.village, "baby registered");
    Ok(messages::registration_success(
      &baby,
      &entries,
      coordinator.as_deref(),
    ))
  }

  // ── LAPOR ─────────────────────────────────────────────────────────────

  async fn report(
    &self,
    sender: &str,
    baby_id: &str,
    immunization: ImmunizationType,
    report_date: Option<NaiveDate>,
  ) -> Result<String, DispatchError> {
    let Some(worker) = self
      .store
      .active_worker_by_phone(sender)
      .await
      .map_err(DispatchError::store)?
    else {
      return Ok(messages::unauthorized_reporter());
    };

    let completed_at = report_date
      .map(|d| d.and_time(NaiveTime::MIN).and_utc())
      .unwrap_or_else(Utc::now);

    let outcome = self
      .store
      .complete_schedule(baby_id, immunization, completed_at)
      .await
      .map_err(DispatchError::store)?;

    match outcome {
      CompletionOutcome::NotFound => {
        Ok(messages::report_not_found(baby_id, immunization))
      }
      CompletionOutcome::Conflict => {
        Ok(messages::report_conflict(baby_id, immunization))
      }
      CompletionOutcome::Completed(schedule) => {
        let baby = self
          .store
          .get_baby(&schedule.baby_id)
          .await
          .map_err(DispatchError::store)?;
        // The schedule row just updated holds a live FK to its baby.
        let Some(baby) = baby else {
          return Ok(messages::baby_not_found(baby_id));
        };
        tracing::info!(
          baby_id = %baby.baby_id,
          %immunization,
          worker = %worker.name,
          "immunization reported"
        );
        Ok(messages::report_success(&worker, immunization, &baby))
      }
    }
  }

  // ── INFO ──────────────────────────────────────────────────────────────

  async fn info(
    &self,
    sender: &str,
    baby_id: &str,
  ) -> Result<String, DispatchError> {
    let Some(baby) = self
      .store
      .get_baby(baby_id)
      .await
      .map_err(DispatchError::store)?
    else {
      return Ok(messages::baby_not_found(baby_id));
    };

    let authorized = baby.parent_phone == sender
      || self
        .store
        .active_worker_by_phone(sender)
        .await
        .map_err(DispatchError::store)?
        .is_some();
    if !authorized {
      return Ok(messages::unauthorized_info());
    }

    let today = Utc::now().date_naive();
    let completed = self
      .store
      .completed_count(&baby.baby_id)
      .await
      .map_err(DispatchError::store)?;
    let upcoming = self
      .store
      .upcoming_schedules(&baby.baby_id, today)
      .await
      .map_err(DispatchError::store)?;

    Ok(messages::info_response(&baby, completed, &upcoming))
  }
}

/// First letter of each whitespace-separated word upper-cased, the rest
/// lower-cased. Names arrive upper-cased from parsing.
fn title_case(s: &str) -> String {
  s.split_whitespace()
    .map(|word| {
      let mut chars = word.chars();
      match chars.next() {
        Some(first) => {
          first.to_uppercase().collect::<String>()
            + &chars.as_str().to_lowercase()
        }
        None => String::new(),
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}

#[cfg(test)]
mod tests {
  use chrono::{Days, Utc};
  use posyandu_core::{
    village::NewVillage,
    worker::NewHealthWorker,
  };
  use posyandu_store_sqlite::SqliteStore;

  use super::*;

  async fn dispatcher() -> Dispatcher<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    Dispatcher::new(Arc::new(store))
  }

  async fn seed_worker(d: &Dispatcher<SqliteStore>, phone: &str) {
    d.store
      .add_worker(NewHealthWorker {
        name:             "Bidan Rina".to_string(),
        role:             "bidan".to_string(),
        phone:            phone.to_string(),
        assigned_village: "Praya".to_string(),
      })
      .await
      .unwrap();
  }

  #[test]
  fn title_case_normalizes_words() {
    assert_eq!(title_case("AISHA PUTRI"), "Aisha Putri");
    assert_eq!(title_case("siti"), "Siti");
    assert_eq!(title_case("  praya  barat "), "Praya Barat");
  }

  #[tokio::test]
  async fn help_is_answered_and_logged() {
    let d = dispatcher().await;
    let reply = d.handle("+6281111111111", "HELP").await;
    assert!(reply.contains("REG#NAMA_BAYI"));

    let counts = d.store.counts().await.unwrap();
    assert_eq!(counts.logs, 2);
  }

  #[tokio::test]
  async fn register_creates_baby_with_full_schedule() {
    let d = dispatcher().await;
    let reply = d
      .handle("+6281111111111", "REG#AISHA#12-05-2024#SITI#PRAYA")
      .await;
    assert!(reply.contains("Aisha"));
    assert!(reply.contains("BCG: 11-06-2024"));

    let counts = d.store.counts().await.unwrap();
    assert_eq!(counts.babies, 1);
    assert_eq!(counts.schedules, 5);
  }

  #[tokio::test]
  async fn register_is_idempotent_per_identity() {
    let d = dispatcher().await;
    let first = d
      .handle("+6281111111111", "REG#AISHA#12-05-2024#SITI#PRAYA")
      .await;
    let id = extract_id(&first);

    let second = d
      .handle("+6282222222222", "reg#aisha#12-05-2024#siti#praya")
      .await;
    assert!(second.contains("sudah terdaftar"));
    assert!(second.contains(&id));

    let counts = d.store.counts().await.unwrap();
    assert_eq!(counts.babies, 1);
  }

  #[tokio::test]
  async fn register_names_village_coordinator_when_known() {
    let d = dispatcher().await;
    d.store
      .add_village(NewVillage {
        code:              "PRY".to_string(),
        name:              "Praya".to_string(),
        coordinator_name:  Some("Ibu Ketut".to_string()),
        coordinator_phone: Some("+6287777777777".to_string()),
      })
      .await
      .unwrap();

    let reply = d
      .handle("+6281111111111", "REG#AISHA#12-05-2024#SITI#PRAYA")
      .await;
    assert!(reply.contains("Ibu Ketut"));
  }

  #[tokio::test]
  async fn register_rejects_bad_date_statelessly() {
    let d = dispatcher().await;
    let reply = d
      .handle("+6281111111111", "REG#AISHA#2024-05-12#SITI#PRAYA")
      .await;
    assert!(reply.contains("DD-MM-YYYY"));

    let counts = d.store.counts().await.unwrap();
    assert_eq!(counts.babies, 0);
  }

  #[tokio::test]
  async fn report_requires_active_worker() {
    let d = dispatcher().await;
    d.handle("+6281111111111", "REG#AISHA#12-05-2024#SITI#PRAYA")
      .await;

    let reply = d.handle("+6289999999999", "LAPOR#LT-001#BCG").await;
    assert!(reply.contains("tidak terdaftar sebagai petugas"));
  }

  #[tokio::test]
  async fn report_completes_the_open_schedule() {
    let d = dispatcher().await;
    let reg = d
      .handle("+6281111111111", "REG#AISHA#12-05-2024#SITI#PRAYA")
      .await;
    let baby_id = extract_id(&reg);
    seed_worker(&d, "+6283333333333").await;

    let reply = d
      .handle("+6283333333333", &format!("LAPOR#{baby_id}#BCG"))
      .await;
    assert!(reply.contains("Bidan Rina"));
    assert!(reply.contains("Aisha"));

    assert_eq!(d.store.completed_count(&baby_id).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn report_with_explicit_date_sets_completed_at() {
    let d = dispatcher().await;
    let reg = d
      .handle("+6281111111111", "REG#AISHA#12-05-2024#SITI#PRAYA")
      .await;
    let baby_id = extract_id(&reg);
    seed_worker(&d, "+6283333333333").await;

    d.handle("+6283333333333", &format!("LAPOR#{baby_id}#BCG#15-06-2024"))
      .await;

    let outcome = d
      .store
      .complete_schedule(&baby_id, ImmunizationType::Bcg, Utc::now())
      .await
      .unwrap();
    assert!(matches!(outcome, CompletionOutcome::NotFound));
  }

  #[tokio::test]
  async fn repeated_report_answers_not_found() {
    let d = dispatcher().await;
    let reg = d
      .handle("+6281111111111", "REG#AISHA#12-05-2024#SITI#PRAYA")
      .await;
    let baby_id = extract_id(&reg);
    seed_worker(&d, "+6283333333333").await;

    d.handle("+6283333333333", &format!("LAPOR#{baby_id}#BCG"))
      .await;
    let second = d
      .handle("+6283333333333", &format!("LAPOR#{baby_id}#BCG"))
      .await;
    assert!(second.contains("tidak ditemukan atau sudah selesai"));
  }

  #[tokio::test]
  async fn info_answers_unknown_id() {
    let d = dispatcher().await;
    let reply = d.handle("+6281111111111", "INFO#LT-999").await;
    assert!(reply.contains("LT-999"));
    assert!(reply.contains("tidak ditemukan"));
  }

  #[tokio::test]
  async fn info_requires_parent_or_worker() {
    let d = dispatcher().await;
    let reg = d
      .handle("+6281111111111", "REG#AISHA#12-05-2024#SITI#PRAYA")
      .await;
    let baby_id = extract_id(&reg);

    let stranger = d
      .handle("+6286666666666", &format!("INFO#{baby_id}"))
      .await;
    assert!(stranger.contains("tidak berhak"));

    let parent = d
      .handle("+6281111111111", &format!("INFO#{baby_id}"))
      .await;
    assert!(parent.contains("Imunisasi selesai: 0"));

    seed_worker(&d, "+6283333333333").await;
    let worker = d
      .handle("+6283333333333", &format!("INFO#{baby_id}"))
      .await;
    assert!(worker.contains("Jadwal mendatang"));
  }

  #[tokio::test]
  async fn info_counts_completed_and_lists_upcoming() {
    let d = dispatcher().await;
    // Birth date relative to today so every entry is still upcoming.
    let birth = Utc::now().date_naive() - Days::new(5);
    let reg = d
      .handle(
        "+6281111111111",
        &format!("REG#AISHA#{}#SITI#PRAYA", birth.format("%d-%m-%Y")),
      )
      .await;
    let baby_id = extract_id(&reg);
    seed_worker(&d, "+6283333333333").await;
    d.handle("+6283333333333", &format!("LAPOR#{baby_id}#BCG"))
      .await;

    let reply = d
      .handle("+6281111111111", &format!("INFO#{baby_id}"))
      .await;
    assert!(reply.contains("Imunisasi selesai: 1"));
    assert!(reply.contains("Polio"));
    assert!(!reply.contains("- BCG"));
  }

  #[tokio::test]
  async fn garbage_gets_the_unrecognized_response() {
    let d = dispatcher().await;
    let reply = d.handle("+6281111111111", "HALO APA KABAR").await;
    assert!(reply.contains("Format SMS tidak tepat"));
  }

  fn extract_id(registration_reply: &str) -> String {
    registration_reply
      .split("ID: ")
      .nth(1)
      .expect("reply contains the baby id")
      .split(')')
      .next()
      .unwrap()
      .to_string()
  }
}
