//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as ISO 8601
//! `YYYY-MM-DD`, so string comparison in SQL matches chronological order.
//! Enums are stored as their discriminant strings.

use chrono::{DateTime, NaiveDate, Utc};
use posyandu_core::{
  baby::Baby,
  schedule::{ImmunizationType, Schedule, ScheduleStatus},
  village::Village,
  worker::HealthWorker,
};

use crate::{Error, Result};

// ─── Dates and times ─────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `babies` row.
pub struct RawBaby {
  pub baby_id:      String,
  pub name:         String,
  pub birth_date:   String,
  pub mother_name:  String,
  pub village:      String,
  pub parent_phone: String,
  pub created_at:   String,
}

impl RawBaby {
  /// Column list matching the field order of [`RawBaby::from_row`].
  pub const COLUMNS: &'static str =
    "baby_id, name, birth_date, mother_name, village, parent_phone, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      baby_id:      row.get(0)?,
      name:         row.get(1)?,
      birth_date:   row.get(2)?,
      mother_name:  row.get(3)?,
      village:      row.get(4)?,
      parent_phone: row.get(5)?,
      created_at:   row.get(6)?,
    })
  }

  pub fn into_baby(self) -> Result<Baby> {
    Ok(Baby {
      baby_id:      self.baby_id,
      name:         self.name,
      birth_date:   decode_date(&self.birth_date)?,
      mother_name:  self.mother_name,
      village:      self.village,
      parent_phone: self.parent_phone,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `schedules` row.
pub struct RawSchedule {
  pub schedule_id:  i64,
  pub baby_id:      String,
  pub immunization: String,
  pub due_date:     String,
  pub status:       String,
  pub created_at:   String,
  pub completed_at: Option<String>,
}

impl RawSchedule {
  pub const COLUMNS: &'static str =
    "schedule_id, baby_id, immunization, due_date, status, created_at, \
     completed_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      schedule_id:  row.get(0)?,
      baby_id:      row.get(1)?,
      immunization: row.get(2)?,
      due_date:     row.get(3)?,
      status:       row.get(4)?,
      created_at:   row.get(5)?,
      completed_at: row.get(6)?,
    })
  }

  pub fn into_schedule(self) -> Result<Schedule> {
    Ok(Schedule {
      schedule_id:  self.schedule_id,
      baby_id:      self.baby_id,
      immunization: ImmunizationType::parse(&self.immunization)?,
      due_date:     decode_date(&self.due_date)?,
      status:       ScheduleStatus::parse(&self.status)?,
      created_at:   decode_dt(&self.created_at)?,
      completed_at: self.completed_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw strings read directly from a `health_workers` row.
pub struct RawWorker {
  pub worker_id:        i64,
  pub name:             String,
  pub role:             String,
  pub phone:            String,
  pub assigned_village: String,
  pub active:           bool,
  pub created_at:       String,
}

impl RawWorker {
  pub const COLUMNS: &'static str =
    "worker_id, name, role, phone, assigned_village, active, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      worker_id:        row.get(0)?,
      name:             row.get(1)?,
      role:             row.get(2)?,
      phone:            row.get(3)?,
      assigned_village: row.get(4)?,
      active:           row.get(5)?,
      created_at:       row.get(6)?,
    })
  }

  pub fn into_worker(self) -> Result<HealthWorker> {
    Ok(HealthWorker {
      worker_id:        self.worker_id,
      name:             self.name,
      role:             self.role,
      phone:            self.phone,
      assigned_village: self.assigned_village,
      active:           self.active,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `villages` row.
pub struct RawVillage {
  pub code:              String,
  pub name:              String,
  pub coordinator_name:  Option<String>,
  pub coordinator_phone: Option<String>,
  pub created_at:        String,
}

impl RawVillage {
  pub const COLUMNS: &'static str =
    "code, name, coordinator_name, coordinator_phone, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      code:              row.get(0)?,
      name:              row.get(1)?,
      coordinator_name:  row.get(2)?,
      coordinator_phone: row.get(3)?,
      created_at:        row.get(4)?,
    })
  }

  pub fn into_village(self) -> Result<Village> {
    Ok(Village {
      code:              self.code,
      name:              self.name,
      coordinator_name:  self.coordinator_name,
      coordinator_phone: self.coordinator_phone,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}
