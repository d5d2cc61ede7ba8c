//! Daily summary maintenance.
//!
//! The `apply_*` functions run inside the caller's transaction. They load the
//! affected row, let `mt_core` do the bucket arithmetic, and write the result back.

use chrono::{DateTime, NaiveDate, Utc};
use mt_core::{
    CowId, DailySummary, Placement, SummaryKey, SummaryPlan, ValidationError, plan_update,
};
use rusqlite::{Connection, OptionalExtension, params};

use crate::Database;
use crate::error::{DbError, Result};
use crate::helpers::{SUMMARY_COLUMNS, SummaryRow, format_date, format_timestamp};

/// Filter for listing summaries. Date bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryFilter {
    pub cow_id: Option<CowId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl SummaryFilter {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if let (Some(start), Some(end)) = (self.from, self.to) {
            if start > end {
                return Err(ValidationError::InvalidDateRange { start, end });
            }
        }
        Ok(())
    }
}

fn summary_key_label(key: SummaryKey) -> String {
    format!("({}, {})", key.cow_id, key.date)
}

pub(crate) fn load_summary(conn: &Connection, key: SummaryKey) -> Result<Option<DailySummary>> {
    let row = conn
        .query_row(
            &format!("SELECT {SUMMARY_COLUMNS} FROM daily_summaries WHERE cow_id = ? AND date = ?"),
            params![key.cow_id.get(), format_date(key.date)],
            SummaryRow::from_row,
        )
        .optional()?;
    row.map(SummaryRow::into_summary).transpose()
}

fn require_summary(conn: &Connection, key: SummaryKey) -> Result<DailySummary> {
    load_summary(conn, key)?.ok_or_else(|| DbError::missing("summary", summary_key_label(key)))
}

/// Writes the summary back, or deletes the row once it is drained.
fn store_summary(conn: &Connection, summary: &DailySummary, now: DateTime<Utc>) -> Result<()> {
    if summary.is_drained() {
        conn.execute(
            "DELETE FROM daily_summaries WHERE cow_id = ? AND date = ?",
            params![summary.cow_id.get(), format_date(summary.date)],
        )?;
        return Ok(());
    }
    conn.execute(
        "
        INSERT INTO daily_summaries
            (cow_id, date, morning_ml, afternoon_ml, evening_ml, total_ml, sessions, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(cow_id, date) DO UPDATE SET
            morning_ml = excluded.morning_ml,
            afternoon_ml = excluded.afternoon_ml,
            evening_ml = excluded.evening_ml,
            total_ml = excluded.total_ml,
            sessions = excluded.sessions,
            updated_at = excluded.updated_at
        ",
        params![
            summary.cow_id.get(),
            format_date(summary.date),
            summary.morning.milliliters(),
            summary.afternoon.milliliters(),
            summary.evening.milliliters(),
            summary.total.milliliters(),
            summary.sessions,
            format_timestamp(now),
        ],
    )?;
    Ok(())
}

/// Credits a new milking to its summary, creating the row on first use.
pub(crate) fn apply_create(
    conn: &Connection,
    placement: &Placement,
    now: DateTime<Utc>,
) -> Result<DailySummary> {
    let mut summary =
        load_summary(conn, placement.key)?.unwrap_or_else(|| DailySummary::empty(placement.key));
    summary.credit(placement.bucket, placement.volume)?;
    store_summary(conn, &summary, now)?;
    Ok(summary)
}

/// Debits a removed milking. Returns `None` when the row was drained and deleted.
pub(crate) fn apply_delete(
    conn: &Connection,
    placement: &Placement,
    now: DateTime<Utc>,
) -> Result<Option<DailySummary>> {
    let mut summary = require_summary(conn, placement.key)?;
    summary.debit(placement.bucket, placement.volume);
    store_summary(conn, &summary, now)?;
    Ok((!summary.is_drained()).then_some(summary))
}

/// Moves an edited milking's volume between buckets or rows.
pub(crate) fn apply_update(
    conn: &Connection,
    old: &Placement,
    new: &Placement,
    now: DateTime<Utc>,
) -> Result<SummaryPlan> {
    let plan = plan_update(old, new);
    match plan {
        SummaryPlan::Unchanged => {}
        SummaryPlan::Move { old, new } => {
            apply_delete(conn, &old, now)?;
            apply_create(conn, &new, now)?;
        }
        SummaryPlan::Adjust { old, new } => {
            let mut summary = require_summary(conn, old.key)?;
            summary.debit(old.bucket, old.volume);
            summary.credit(new.bucket, new.volume)?;
            store_summary(conn, &summary, now)?;
        }
    }
    Ok(plan)
}

impl Database {
    /// Fetches the summary of one cow on one date.
    pub fn get_summary(&self, cow_id: CowId, date: NaiveDate) -> Result<Option<DailySummary>> {
        load_summary(&self.conn, SummaryKey { cow_id, date })
    }

    /// Lists summaries ordered by date then cow.
    pub fn list_summaries(&self, filter: &SummaryFilter) -> Result<Vec<DailySummary>> {
        filter.validate()?;
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {SUMMARY_COLUMNS}
            FROM daily_summaries
            WHERE (?1 IS NULL OR cow_id = ?1)
              AND (?2 IS NULL OR date >= ?2)
              AND (?3 IS NULL OR date <= ?3)
            ORDER BY date ASC, cow_id ASC
            "
        ))?;
        let rows = stmt.query_map(
            params![
                filter.cow_id.map(CowId::get),
                filter.from.map(format_date),
                filter.to.map(format_date),
            ],
            SummaryRow::from_row,
        )?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?.into_summary()?);
        }
        Ok(summaries)
    }

    pub(crate) fn summary_keys_on(&self, date: NaiveDate) -> Result<Vec<SummaryKey>> {
        let mut stmt = self
            .conn
            .prepare("SELECT cow_id FROM daily_summaries WHERE date = ? ORDER BY cow_id ASC")?;
        let rows = stmt.query_map(params![format_date(date)], |row| row.get::<_, i64>(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(SummaryKey {
                cow_id: CowId::new(row?),
                date,
            });
        }
        Ok(keys)
    }
}
