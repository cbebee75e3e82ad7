//! SQL schema for the Posyandu SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Registration is idempotent on the identity tuple; the UNIQUE constraint is
-- the backstop for two concurrent REG commands racing past the pre-check.
CREATE TABLE IF NOT EXISTS babies (
    baby_id      TEXT PRIMARY KEY,  -- wire-visible id, 'LT-###'
    name         TEXT NOT NULL,
    birth_date   TEXT NOT NULL,     -- ISO 8601 date
    mother_name  TEXT NOT NULL,
    village      TEXT NOT NULL,     -- soft reference to villages.name
    parent_phone TEXT NOT NULL,
    created_at   TEXT NOT NULL,     -- ISO 8601 UTC; server-assigned
    UNIQUE (name, mother_name, birth_date)
);

-- Schedules are owned children of their baby; deleting a baby deletes them.
-- `status` is the only column ever updated, always by compare-and-set.
CREATE TABLE IF NOT EXISTS schedules (
    schedule_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    baby_id      TEXT NOT NULL REFERENCES babies(baby_id) ON DELETE CASCADE,
    immunization TEXT NOT NULL,     -- 'BCG'|'Polio'|'DPT'|'Campak'|'Hepatitis'
    due_date     TEXT NOT NULL,     -- ISO 8601 date
    status       TEXT NOT NULL DEFAULT 'scheduled',
    created_at   TEXT NOT NULL,
    completed_at TEXT,              -- non-null iff status = 'completed'
    CHECK ((status = 'completed') = (completed_at IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS villages (
    code              TEXT PRIMARY KEY,
    name              TEXT NOT NULL UNIQUE,
    coordinator_name  TEXT,
    coordinator_phone TEXT,
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS health_workers (
    worker_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT NOT NULL,
    role             TEXT NOT NULL,
    phone            TEXT NOT NULL UNIQUE,  -- the LAPOR authorization token
    assigned_village TEXT NOT NULL,
    active           INTEGER NOT NULL DEFAULT 1,
    created_at       TEXT NOT NULL
);

-- Append-only; rows are touched again only to set processed/error, and
-- eventually purged by the recovery sweep.
CREATE TABLE IF NOT EXISTS sms_log (
    log_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    phone      TEXT NOT NULL,
    direction  TEXT NOT NULL,       -- 'incoming' | 'outgoing'
    content    TEXT NOT NULL,
    processed  INTEGER NOT NULL DEFAULT 0,
    error      TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS babies_village_idx       ON babies(village);
CREATE INDEX IF NOT EXISTS schedules_baby_idx       ON schedules(baby_id);
CREATE INDEX IF NOT EXISTS schedules_status_due_idx ON schedules(status, due_date);
CREATE INDEX IF NOT EXISTS sms_log_created_idx      ON sms_log(created_at);
CREATE INDEX IF NOT EXISTS sms_log_phone_idx        ON sms_log(phone);

PRAGMA user_version = 1;
";
