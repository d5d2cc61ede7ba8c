use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use mt_core::{
    AlertKind, Batch, BatchStatus, CowId, DailySummary, MilkingEvent, Notification, SummaryKey,
    UserId, ValidationError, Volume,
};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};

use crate::error::{DbError, Result};

pub(crate) const EVENT_COLUMNS: &str = "id, cow_id, milker_id, batch_id, volume_ml, milked_at, \
     session_number, previous_volume_ml, note, created_at, updated_at";

pub(crate) const BATCH_COLUMNS: &str = "id, batch_number, total_volume_ml, status, \
     production_time, expiry_time, created_at, updated_at";

pub(crate) const SUMMARY_COLUMNS: &str =
    "cow_id, date, morning_ml, afternoon_ml, evening_ml, total_ml, sessions";

pub(crate) const NOTIFICATION_COLUMNS: &str =
    "id, user_id, cow_id, batch_id, kind, message, is_read, created_at";

/// Starts a transaction that takes the write lock up front.
///
/// Two mutations touching the same summary or batch are serialized here; the
/// connection's busy timeout bounds the wait.
pub(crate) fn immediate(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// Formats an instant for storage. Fixed width, so text order is time order.
pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Formats a local instant for storage, keeping its offset.
pub(crate) fn format_local(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_utc(timestamp: &str, entity: &'static str, id: i64) -> Result<DateTime<Utc>> {
    parse_local(timestamp, entity, id).map(|parsed| parsed.with_timezone(&Utc))
}

pub(crate) fn parse_local(
    timestamp: &str,
    entity: &'static str,
    id: i64,
) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(timestamp).map_err(|source| DbError::TimestampParse {
        entity,
        id: id.to_string(),
        timestamp: timestamp.to_string(),
        source,
    })
}

fn parse_date(date: &str, entity: &'static str, id: i64) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|source| DbError::TimestampParse {
        entity,
        id: id.to_string(),
        timestamp: date.to_string(),
        source,
    })
}

fn invalid_row(entity: &'static str, id: i64, err: &ValidationError) -> DbError {
    DbError::InvalidRow {
        entity,
        id: id.to_string(),
        message: err.to_string(),
    }
}

/// Fails with a validation error unless the cow is in the directory.
pub(crate) fn require_cow(conn: &Connection, cow_id: CowId) -> Result<()> {
    let found = conn
        .query_row(
            "SELECT 1 FROM cows WHERE id = ?",
            params![cow_id.get()],
            |_| Ok(()),
        )
        .optional()?;
    found.ok_or_else(|| ValidationError::UnknownCow { id: cow_id }.into())
}

/// Fails with a validation error unless the user is in the directory.
pub(crate) fn require_user(conn: &Connection, user_id: UserId) -> Result<()> {
    let found = conn
        .query_row(
            "SELECT 1 FROM users WHERE id = ?",
            params![user_id.get()],
            |_| Ok(()),
        )
        .optional()?;
    found.ok_or_else(|| ValidationError::UnknownUser { id: user_id }.into())
}

#[derive(Debug)]
pub(crate) struct EventRow {
    id: i64,
    cow_id: i64,
    milker_id: i64,
    batch_id: Option<i64>,
    volume_ml: i64,
    milked_at: String,
    session_number: i64,
    previous_volume_ml: Option<i64>,
    note: Option<String>,
    created_at: String,
    updated_at: String,
}

impl EventRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            cow_id: row.get(1)?,
            milker_id: row.get(2)?,
            batch_id: row.get(3)?,
            volume_ml: row.get(4)?,
            milked_at: row.get(5)?,
            session_number: row.get(6)?,
            previous_volume_ml: row.get(7)?,
            note: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    pub(crate) fn into_event(self) -> Result<MilkingEvent> {
        Ok(MilkingEvent {
            id: self.id.into(),
            cow_id: self.cow_id.into(),
            milker_id: self.milker_id.into(),
            batch_id: self.batch_id.map(Into::into),
            volume: Volume::from_milliliters(self.volume_ml),
            milked_at: parse_local(&self.milked_at, "event", self.id)?,
            session_number: self.session_number,
            previous_volume: self.previous_volume_ml.map(Volume::from_milliliters),
            note: self.note,
            created_at: parse_utc(&self.created_at, "event", self.id)?,
            updated_at: parse_utc(&self.updated_at, "event", self.id)?,
        })
    }
}

#[derive(Debug)]
pub(crate) struct BatchRow {
    id: i64,
    batch_number: String,
    total_volume_ml: i64,
    status: String,
    production_time: String,
    expiry_time: String,
    created_at: String,
    updated_at: String,
}

impl BatchRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            batch_number: row.get(1)?,
            total_volume_ml: row.get(2)?,
            status: row.get(3)?,
            production_time: row.get(4)?,
            expiry_time: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    pub(crate) fn into_batch(self) -> Result<Batch> {
        let status: BatchStatus = self
            .status
            .parse()
            .map_err(|err| invalid_row("batch", self.id, &err))?;
        Ok(Batch {
            id: self.id.into(),
            batch_number: self.batch_number,
            total_volume: Volume::from_milliliters(self.total_volume_ml),
            status,
            production_time: parse_utc(&self.production_time, "batch", self.id)?,
            expiry_time: parse_utc(&self.expiry_time, "batch", self.id)?,
            created_at: parse_utc(&self.created_at, "batch", self.id)?,
            updated_at: parse_utc(&self.updated_at, "batch", self.id)?,
        })
    }
}

#[derive(Debug)]
pub(crate) struct SummaryRow {
    cow_id: i64,
    date: String,
    morning_ml: i64,
    afternoon_ml: i64,
    evening_ml: i64,
    total_ml: i64,
    sessions: i64,
}

impl SummaryRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            cow_id: row.get(0)?,
            date: row.get(1)?,
            morning_ml: row.get(2)?,
            afternoon_ml: row.get(3)?,
            evening_ml: row.get(4)?,
            total_ml: row.get(5)?,
            sessions: row.get(6)?,
        })
    }

    pub(crate) fn into_summary(self) -> Result<DailySummary> {
        let key = SummaryKey {
            cow_id: self.cow_id.into(),
            date: parse_date(&self.date, "summary", self.cow_id)?,
        };
        Ok(DailySummary {
            morning: Volume::from_milliliters(self.morning_ml),
            afternoon: Volume::from_milliliters(self.afternoon_ml),
            evening: Volume::from_milliliters(self.evening_ml),
            total: Volume::from_milliliters(self.total_ml),
            sessions: self.sessions,
            ..DailySummary::empty(key)
        })
    }
}

#[derive(Debug)]
pub(crate) struct NotificationRow {
    id: i64,
    user_id: i64,
    cow_id: i64,
    batch_id: Option<i64>,
    kind: String,
    message: String,
    is_read: bool,
    created_at: String,
}

impl NotificationRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            cow_id: row.get(2)?,
            batch_id: row.get(3)?,
            kind: row.get(4)?,
            message: row.get(5)?,
            is_read: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    pub(crate) fn into_notification(self) -> Result<Notification> {
        let kind: AlertKind = self
            .kind
            .parse()
            .map_err(|err| invalid_row("notification", self.id, &err))?;
        Ok(Notification {
            id: self.id.into(),
            user_id: self.user_id.into(),
            cow_id: self.cow_id.into(),
            batch_id: self.batch_id.map(Into::into),
            kind,
            message: self.message,
            is_read: self.is_read,
            created_at: parse_utc(&self.created_at, "notification", self.id)?,
        })
    }
}
