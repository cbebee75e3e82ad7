//! [`SqliteStore`] — the SQLite implementation of [`RegistryStore`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::OptionalExtension as _;

use posyandu_core::{
  baby::{Baby, NewBaby},
  log::{NewSmsLog, SmsLog},
  schedule::{ImmunizationType, Schedule, ScheduleEntry, ScheduleStatus},
  store::{CompletionOutcome, RegistrationOutcome, RegistryStore, StoreCounts},
  village::{NewVillage, Village},
  worker::{HealthWorker, NewHealthWorker},
};

use crate::{
  Error, Result,
  encode::{
    RawBaby, RawSchedule, RawVillage, RawWorker, encode_date, encode_dt,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Posyandu registry backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// How the babies INSERT inside [`SqliteStore::create_baby`] resolved; the
/// two constraint outcomes are told apart by the violated column set.
enum RawCreation {
  Created,
  IdTaken,
  IdentityClash,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

#[cfg(test)]
impl SqliteStore {
  /// Test hook: run arbitrary SQL, e.g. to backdate rows past a retention
  /// cutoff.
  pub(crate) async fn execute_batch_raw(&self, sql: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Map a joined `schedules s JOIN babies b` row (schedule columns first).
fn joined_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<(RawSchedule, RawBaby)> {
  let schedule = RawSchedule {
    schedule_id:  row.get(0)?,
    baby_id:      row.get(1)?,
    immunization: row.get(2)?,
    due_date:     row.get(3)?,
    status:       row.get(4)?,
    created_at:   row.get(5)?,
    completed_at: row.get(6)?,
  };
  let baby = RawBaby {
    baby_id:      row.get(7)?,
    name:         row.get(8)?,
    birth_date:   row.get(9)?,
    mother_name:  row.get(10)?,
    village:      row.get(11)?,
    parent_phone: row.get(12)?,
    created_at:   row.get(13)?,
  };
  Ok((schedule, baby))
}

const JOINED_COLUMNS: &str =
  "s.schedule_id, s.baby_id, s.immunization, s.due_date, s.status, \
   s.created_at, s.completed_at, \
   b.baby_id, b.name, b.birth_date, b.mother_name, b.village, \
   b.parent_phone, b.created_at";

fn decode_joined(
  raws: Vec<(RawSchedule, RawBaby)>,
) -> Result<Vec<(Schedule, Baby)>> {
  raws
    .into_iter()
    .map(|(s, b)| Ok((s.into_schedule()?, b.into_baby()?)))
    .collect()
}

// ─── RegistryStore impl ──────────────────────────────────────────────────────

impl RegistryStore for SqliteStore {
  type Error = Error;

  // ── Babies ────────────────────────────────────────────────────────────────

  async fn create_baby(
    &self,
    baby: NewBaby,
    entries: Vec<ScheduleEntry>,
  ) -> Result<RegistrationOutcome> {
    let created_at = Utc::now();
    let at_str     = encode_dt(created_at);

    let insert_baby = baby.clone();
    let raw: RawCreation = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let res = tx.execute(
          "INSERT INTO babies (
             baby_id, name, birth_date, mother_name, village, parent_phone,
             created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            insert_baby.baby_id,
            insert_baby.name,
            encode_date(insert_baby.birth_date),
            insert_baby.mother_name,
            insert_baby.village,
            insert_baby.parent_phone,
            at_str,
          ],
        );

        if let Err(e) = res {
          // Dropping `tx` rolls back. Constraint violations are expected
          // outcomes (id probe collision, concurrent duplicate REG).
          if let rusqlite::Error::SqliteFailure(err, Some(msg)) = &e
            && err.code == rusqlite::ErrorCode::ConstraintViolation
          {
            if msg.contains("babies.baby_id") {
              return Ok(RawCreation::IdTaken);
            }
            return Ok(RawCreation::IdentityClash);
          }
          return Err(e.into());
        }

        for entry in &entries {
          tx.execute(
            "INSERT INTO schedules (
               baby_id, immunization, due_date, status, created_at
             ) VALUES (?1, ?2, ?3, 'scheduled', ?4)",
            rusqlite::params![
              insert_baby.baby_id,
              entry.immunization.label(),
              encode_date(entry.due_date),
              at_str,
            ],
          )?;
        }

        tx.commit()?;
        Ok(RawCreation::Created)
      })
      .await?;

    match raw {
      RawCreation::Created => Ok(RegistrationOutcome::Created(Baby {
        baby_id: baby.baby_id,
        name: baby.name,
        birth_date: baby.birth_date,
        mother_name: baby.mother_name,
        village: baby.village,
        parent_phone: baby.parent_phone,
        created_at,
      })),
      RawCreation::IdTaken => Ok(RegistrationOutcome::IdTaken),
      RawCreation::IdentityClash => {
        let existing = self
          .find_baby_by_identity(&baby.name, &baby.mother_name, baby.birth_date)
          .await?
          .ok_or_else(|| {
            // Clash row vanished between the INSERT and this read.
            Error::Core(posyandu_core::Error::BabyNotFound(baby.baby_id))
          })?;
        Ok(RegistrationOutcome::Duplicate(existing))
      }
    }
  }

  async fn get_baby(&self, baby_id: &str) -> Result<Option<Baby>> {
    let id = baby_id.to_owned();

    let raw: Option<RawBaby> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM babies WHERE baby_id = ?1",
                RawBaby::COLUMNS
              ),
              rusqlite::params![id],
              RawBaby::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawBaby::into_baby).transpose()
  }

  async fn find_baby_by_identity(
    &self,
    name: &str,
    mother_name: &str,
    birth_date: NaiveDate,
  ) -> Result<Option<Baby>> {
    let name      = name.to_owned();
    let mother    = mother_name.to_owned();
    let birth_str = encode_date(birth_date);

    let raw: Option<RawBaby> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM babies
                 WHERE name = ?1 AND mother_name = ?2 AND birth_date = ?3",
                RawBaby::COLUMNS
              ),
              rusqlite::params![name, mother, birth_str],
              RawBaby::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawBaby::into_baby).transpose()
  }

  async fn babies_without_schedules(&self) -> Result<Vec<Baby>> {
    let raws: Vec<RawBaby> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT b.baby_id, b.name, b.birth_date, b.mother_name, b.village,
                  b.parent_phone, b.created_at
           FROM babies b
           LEFT JOIN schedules s ON s.baby_id = b.baby_id
           WHERE s.schedule_id IS NULL",
        )?;
        let rows = stmt
          .query_map([], RawBaby::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBaby::into_baby).collect()
  }

  // ── Schedules ─────────────────────────────────────────────────────────────

  async fn upcoming_schedules(
    &self,
    baby_id: &str,
    from: NaiveDate,
  ) -> Result<Vec<Schedule>> {
    let id       = baby_id.to_owned();
    let from_str = encode_date(from);

    let raws: Vec<RawSchedule> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM schedules
           WHERE baby_id = ?1 AND status = 'scheduled' AND due_date >= ?2
           ORDER BY due_date ASC",
          RawSchedule::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id, from_str], RawSchedule::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSchedule::into_schedule).collect()
  }

  async fn completed_count(&self, baby_id: &str) -> Result<u64> {
    let id = baby_id.to_owned();

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM schedules
           WHERE baby_id = ?1 AND status = 'completed'",
          rusqlite::params![id],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(count as u64)
  }

  async fn complete_schedule(
    &self,
    baby_id: &str,
    immunization: ImmunizationType,
    completed_at: DateTime<Utc>,
  ) -> Result<CompletionOutcome> {
    let id     = baby_id.to_owned();
    let label  = immunization.label();
    let at_str = encode_dt(completed_at);

    let raw: Option<Option<RawSchedule>> = self
      .conn
      .call(move |conn| {
        let target: Option<i64> = conn
          .query_row(
            "SELECT schedule_id FROM schedules
             WHERE baby_id = ?1 AND immunization = ?2
               AND status IN ('scheduled', 'overdue')",
            rusqlite::params![id, label],
            |row| row.get(0),
          )
          .optional()?;

        let Some(schedule_id) = target else {
          return Ok(None);
        };

        // Compare-and-set: at most one terminal transition wins. Zero rows
        // here means a concurrent writer got there first.
        let changed = conn.execute(
          "UPDATE schedules SET status = 'completed', completed_at = ?2
           WHERE schedule_id = ?1 AND status IN ('scheduled', 'overdue')",
          rusqlite::params![schedule_id, at_str],
        )?;

        if changed == 0 {
          return Ok(Some(None));
        }

        let row = conn.query_row(
          &format!(
            "SELECT {} FROM schedules WHERE schedule_id = ?1",
            RawSchedule::COLUMNS
          ),
          rusqlite::params![schedule_id],
          RawSchedule::from_row,
        )?;
        Ok(Some(Some(row)))
      })
      .await?;

    match raw {
      None => Ok(CompletionOutcome::NotFound),
      Some(None) => Ok(CompletionOutcome::Conflict),
      Some(Some(r)) => Ok(CompletionOutcome::Completed(r.into_schedule()?)),
    }
  }

  async fn schedules_due_on(
    &self,
    date: NaiveDate,
  ) -> Result<Vec<(Schedule, Baby)>> {
    let date_str = encode_date(date);

    let raws: Vec<(RawSchedule, RawBaby)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {JOINED_COLUMNS}
           FROM schedules s
           JOIN babies b ON b.baby_id = s.baby_id
           WHERE s.status = 'scheduled' AND s.due_date = ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![date_str], joined_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    decode_joined(raws)
  }

  async fn mark_overdue_before(
    &self,
    cutoff: NaiveDate,
  ) -> Result<Vec<(Schedule, Baby)>> {
    let cutoff_str = encode_date(cutoff);

    let raws: Vec<(RawSchedule, RawBaby)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let rows = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {JOINED_COLUMNS}
             FROM schedules s
             JOIN babies b ON b.baby_id = s.baby_id
             WHERE s.status = 'scheduled' AND s.due_date < ?1"
          ))?;
          stmt
            .query_map(rusqlite::params![cutoff_str], joined_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.execute(
          "UPDATE schedules SET status = 'overdue'
           WHERE status = 'scheduled' AND due_date < ?1",
          rusqlite::params![cutoff_str],
        )?;

        tx.commit()?;
        Ok(rows)
      })
      .await?;

    let mut pairs = decode_joined(raws)?;
    // The rows were read before the UPDATE; reflect their committed state.
    for (schedule, _) in &mut pairs {
      schedule.status = ScheduleStatus::Overdue;
    }
    Ok(pairs)
  }

  async fn insert_schedules(
    &self,
    baby_id: &str,
    entries: Vec<ScheduleEntry>,
  ) -> Result<u64> {
    let id     = baby_id.to_owned();
    let at_str = encode_dt(Utc::now());

    let inserted: u64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0u64;
        for entry in &entries {
          tx.execute(
            "INSERT INTO schedules (
               baby_id, immunization, due_date, status, created_at
             ) VALUES (?1, ?2, ?3, 'scheduled', ?4)",
            rusqlite::params![
              id,
              entry.immunization.label(),
              encode_date(entry.due_date),
              at_str,
            ],
          )?;
          inserted += 1;
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;

    Ok(inserted)
  }

  // ── Health workers ────────────────────────────────────────────────────────

  async fn add_worker(&self, worker: NewHealthWorker) -> Result<HealthWorker> {
    let created_at = Utc::now();
    let at_str     = encode_dt(created_at);
    let insert     = worker.clone();

    let worker_id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO health_workers (
             name, role, phone, assigned_village, active, created_at
           ) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
          rusqlite::params![
            insert.name,
            insert.role,
            insert.phone,
            insert.assigned_village,
            at_str,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(HealthWorker {
      worker_id,
      name: worker.name,
      role: worker.role,
      phone: worker.phone,
      assigned_village: worker.assigned_village,
      active: true,
      created_at,
    })
  }

  async fn active_worker_by_phone(
    &self,
    phone: &str,
  ) -> Result<Option<HealthWorker>> {
    let phone = phone.to_owned();

    let raw: Option<RawWorker> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM health_workers
                 WHERE phone = ?1 AND active = 1",
                RawWorker::COLUMNS
              ),
              rusqlite::params![phone],
              RawWorker::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawWorker::into_worker).transpose()
  }

  // ── Villages ──────────────────────────────────────────────────────────────

  async fn add_village(&self, village: NewVillage) -> Result<Village> {
    let created_at = Utc::now();
    let at_str     = encode_dt(created_at);
    let insert     = village.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO villages (
             code, name, coordinator_name, coordinator_phone, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            insert.code,
            insert.name,
            insert.coordinator_name,
            insert.coordinator_phone,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(Village {
      code: village.code,
      name: village.name,
      coordinator_name: village.coordinator_name,
      coordinator_phone: village.coordinator_phone,
      created_at,
    })
  }

  async fn village_by_name(&self, name: &str) -> Result<Option<Village>> {
    let name = name.to_owned();

    let raw: Option<RawVillage> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM villages WHERE name = ?1",
                RawVillage::COLUMNS
              ),
              rusqlite::params![name],
              RawVillage::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVillage::into_village).transpose()
  }

  // ── SMS log ───────────────────────────────────────────────────────────────

  async fn append_log(&self, log: NewSmsLog) -> Result<SmsLog> {
    let created_at = Utc::now();
    let at_str     = encode_dt(created_at);
    let insert     = log.clone();

    let log_id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sms_log (phone, direction, content, processed, created_at)
           VALUES (?1, ?2, ?3, 0, ?4)",
          rusqlite::params![
            insert.phone,
            insert.direction.discriminant(),
            insert.content,
            at_str,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(SmsLog {
      log_id,
      phone: log.phone,
      direction: log.direction,
      content: log.content,
      processed: false,
      error: None,
      created_at,
    })
  }

  async fn finish_log(
    &self,
    log_id: i64,
    processed: bool,
    error: Option<String>,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE sms_log SET processed = ?2, error = ?3 WHERE log_id = ?1",
          rusqlite::params![log_id, processed, error],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn stale_log_count(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let cutoff_str = encode_dt(cutoff);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM sms_log WHERE created_at < ?1",
          rusqlite::params![cutoff_str],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(count as u64)
  }

  async fn purge_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let cutoff_str = encode_dt(cutoff);

    let removed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM sms_log WHERE created_at < ?1",
          rusqlite::params![cutoff_str],
        )?)
      })
      .await?;

    Ok(removed as u64)
  }

  // ── Ops ───────────────────────────────────────────────────────────────────

  async fn counts(&self) -> Result<StoreCounts> {
    let (babies, schedules, logs): (i64, i64, i64) = self
      .conn
      .call(|conn| {
        let babies =
          conn.query_row("SELECT COUNT(*) FROM babies", [], |r| r.get(0))?;
        let schedules =
          conn.query_row("SELECT COUNT(*) FROM schedules", [], |r| r.get(0))?;
        let logs =
          conn.query_row("SELECT COUNT(*) FROM sms_log", [], |r| r.get(0))?;
        Ok((babies, schedules, logs))
      })
      .await?;

    Ok(StoreCounts {
      babies:    babies as u64,
      schedules: schedules as u64,
      logs:      logs as u64,
    })
  }

  async fn parents_with_open_schedules(&self) -> Result<Vec<(String, String)>> {
    let pairs: Vec<(String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT b.parent_phone, b.mother_name
           FROM babies b
           JOIN schedules s ON s.baby_id = b.baby_id
           WHERE s.status IN ('scheduled', 'overdue')",
        )?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(pairs)
  }
}
