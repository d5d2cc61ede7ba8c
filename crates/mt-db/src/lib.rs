//! Storage layer for the milk tracker.
//!
//! Persists milkings, batches, daily summaries and notifications using `rusqlite`,
//! and runs every mutation as one transaction across all of them.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved between threads but not shared without external
//! synchronization. Concurrent callers open one `Database` per thread on the same file:
//! mutations take the write lock up front (`BEGIN IMMEDIATE`) and wait at most the
//! configured busy timeout for it.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Batch instants and bookkeeping columns are stored as UTC RFC 3339 text with
//! millisecond precision (e.g. `2025-03-04T08:00:00.000Z`), so text order matches
//! time order. A milking keeps its local offset in `milked_at`, plus the UTC form in
//! `milked_at_utc` and its local date in `milk_date`.
//!
//! ## Volumes
//!
//! Volumes are integer millilitres (`*_ml` columns). `CHECK` constraints keep every
//! summary bucket non-negative and `total_ml` equal to the bucket sum.

mod aggregate;
mod batches;
pub mod error;
mod helpers;
mod herd;
mod monitor;
mod notifications;
mod recorder;
mod sweep;

use std::path::Path;
use std::time::Duration;

use mt_core::Policy;
use rusqlite::Connection;

pub use aggregate::SummaryFilter;
pub use error::{DbError, Result};
pub use herd::{CowRecord, HerdDirectory, UserRecord};

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
    policy: Policy,
}

/// Row counts for a quick health view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub cows: i64,
    pub users: i64,
    pub events: i64,
    pub fresh_batches: i64,
    pub expired_batches: i64,
    pub summaries: i64,
    pub unread_notifications: i64,
}

/// Lock wait used until the caller sets its own.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let db = Self {
            conn,
            policy: Policy::default(),
        };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            policy: Policy::default(),
        };
        db.init()?;
        Ok(db)
    }

    /// Replaces the freshness and production policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Bounds how long a mutation waits for another writer's lock.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cows (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cow_managers (
                cow_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (cow_id, user_id),
                FOREIGN KEY (cow_id) REFERENCES cows(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Batches: perishable groupings of milkings
            -- status: 'fresh' or 'expired'
            -- production_time/expiry_time: UTC, expiry = production + freshness window
            CREATE TABLE IF NOT EXISTS batches (
                id INTEGER PRIMARY KEY,
                batch_number TEXT NOT NULL UNIQUE,
                total_volume_ml INTEGER NOT NULL CHECK (total_volume_ml >= 0),
                status TEXT NOT NULL CHECK (status IN ('fresh', 'expired')),
                production_time TEXT NOT NULL,
                expiry_time TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_batches_status_expiry ON batches(status, expiry_time);

            -- Milking events: one row per recorded milking
            -- milked_at: local RFC 3339 with offset; milk_date: local date (YYYY-MM-DD)
            CREATE TABLE IF NOT EXISTS milking_events (
                id INTEGER PRIMARY KEY,
                cow_id INTEGER NOT NULL,
                milker_id INTEGER NOT NULL,
                batch_id INTEGER,
                volume_ml INTEGER NOT NULL CHECK (volume_ml > 0),
                milked_at TEXT NOT NULL,
                milked_at_utc TEXT NOT NULL,
                milk_date TEXT NOT NULL,
                session_number INTEGER NOT NULL,
                previous_volume_ml INTEGER,
                note TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (cow_id) REFERENCES cows(id),
                FOREIGN KEY (milker_id) REFERENCES users(id),
                FOREIGN KEY (batch_id) REFERENCES batches(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_batch ON milking_events(batch_id);
            CREATE INDEX IF NOT EXISTS idx_events_cow_date ON milking_events(cow_id, milk_date);

            CREATE TABLE IF NOT EXISTS daily_summaries (
                cow_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                morning_ml INTEGER NOT NULL DEFAULT 0 CHECK (morning_ml >= 0),
                afternoon_ml INTEGER NOT NULL DEFAULT 0 CHECK (afternoon_ml >= 0),
                evening_ml INTEGER NOT NULL DEFAULT 0 CHECK (evening_ml >= 0),
                total_ml INTEGER NOT NULL
                    CHECK (total_ml = morning_ml + afternoon_ml + evening_ml),
                sessions INTEGER NOT NULL DEFAULT 0 CHECK (sessions >= 0),
                updated_at TEXT NOT NULL,
                PRIMARY KEY (cow_id, date),
                FOREIGN KEY (cow_id) REFERENCES cows(id)
            );

            CREATE INDEX IF NOT EXISTS idx_summaries_date ON daily_summaries(date);

            -- Last session number handed out per (cow, date). Never decremented.
            CREATE TABLE IF NOT EXISTS session_counters (
                cow_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                last_number INTEGER NOT NULL,
                PRIMARY KEY (cow_id, date)
            );

            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                cow_id INTEGER NOT NULL,
                batch_id INTEGER,
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (cow_id) REFERENCES cows(id) ON DELETE CASCADE,
                FOREIGN KEY (batch_id) REFERENCES batches(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read);
            -- One expiry notification per manager per batch
            CREATE UNIQUE INDEX IF NOT EXISTS idx_notifications_expiry_per_manager
                ON notifications(batch_id, user_id) WHERE kind = 'milk_expiry';
            ",
        )?;
        Ok(())
    }

    /// Counts rows per table.
    pub fn store_stats(&self) -> Result<StoreStats> {
        let stats = self.conn.query_row(
            "
            SELECT
                (SELECT COUNT(*) FROM cows),
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM milking_events),
                (SELECT COUNT(*) FROM batches WHERE status = 'fresh'),
                (SELECT COUNT(*) FROM batches WHERE status = 'expired'),
                (SELECT COUNT(*) FROM daily_summaries),
                (SELECT COUNT(*) FROM notifications WHERE is_read = 0)
            ",
            [],
            |row| {
                Ok(StoreStats {
                    cows: row.get(0)?,
                    users: row.get(1)?,
                    events: row.get(2)?,
                    fresh_batches: row.get(3)?,
                    expired_batches: row.get(4)?,
                    summaries: row.get(5)?,
                    unread_notifications: row.get(6)?,
                })
            },
        )?;
        Ok(stats)
    }
}
