//! Batch lifecycle: open, grow, shrink, re-anchor and delete.
//!
//! Every function here runs inside the transaction of the milking mutation that
//! drives it. Only the expiry sweep moves a batch from fresh to expired.

use chrono::{DateTime, Duration, Utc};
use mt_core::batch::batch_number;
use mt_core::{Anchor, Batch, BatchFate, BatchId, BatchStatus, ValidationError, Volume};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;
use uuid::Uuid;

use crate::Database;
use crate::error::{DbError, Result};
use crate::helpers::{BATCH_COLUMNS, BatchRow, format_timestamp, parse_utc};

pub(crate) fn load_batch(conn: &Connection, id: BatchId) -> Result<Option<Batch>> {
    let row = conn
        .query_row(
            &format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id = ?"),
            params![id.get()],
            BatchRow::from_row,
        )
        .optional()?;
    row.map(BatchRow::into_batch).transpose()
}

/// Loads a batch a new milking wants to join.
pub(crate) fn require_fresh(conn: &Connection, id: BatchId) -> Result<Batch> {
    let batch = load_batch(conn, id)?.ok_or_else(|| DbError::not_found("batch", id))?;
    if batch.status != BatchStatus::Fresh {
        return Err(ValidationError::BatchNotFresh { id }.into());
    }
    Ok(batch)
}

/// Opens a fresh batch holding a single milking's volume.
pub(crate) fn open_batch(
    conn: &Connection,
    anchor: Anchor,
    volume: Volume,
    now: DateTime<Utc>,
) -> Result<BatchId> {
    let suffix = Uuid::new_v4().simple().to_string();
    let number = batch_number(anchor.production_time, &suffix[..8]);
    let now = format_timestamp(now);
    conn.execute(
        "
        INSERT INTO batches
            (batch_number, total_volume_ml, status, production_time, expiry_time, created_at, updated_at)
        VALUES (?, ?, 'fresh', ?, ?, ?, ?)
        ",
        params![
            number,
            volume.milliliters(),
            format_timestamp(anchor.production_time),
            format_timestamp(anchor.expiry_time),
            now,
            now,
        ],
    )?;
    let id = BatchId::new(conn.last_insert_rowid());
    debug!(batch_id = %id, batch_number = %number, "opened batch");
    Ok(id)
}

/// Adds `delta` (possibly negative) to the batch total, flooring at zero.
///
/// Applies to expired batches too, so the total always matches the linked milkings.
pub(crate) fn add_volume(
    conn: &Connection,
    id: BatchId,
    delta: Volume,
    now: DateTime<Utc>,
) -> Result<()> {
    let changed = conn.execute(
        "
        UPDATE batches
        SET total_volume_ml = MAX(total_volume_ml + ?, 0), updated_at = ?
        WHERE id = ?
        ",
        params![delta.milliliters(), format_timestamp(now), id.get()],
    )?;
    if changed == 0 {
        return Err(DbError::missing("batch", id));
    }
    Ok(())
}

fn linked_milking_times(conn: &Connection, id: BatchId) -> Result<Vec<DateTime<Utc>>> {
    let mut stmt =
        conn.prepare("SELECT id, milked_at_utc FROM milking_events WHERE batch_id = ?")?;
    let rows = stmt.query_map(params![id.get()], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut times = Vec::new();
    for row in rows {
        let (event_id, milked_at) = row?;
        times.push(parse_utc(&milked_at, "event", event_id)?);
    }
    Ok(times)
}

fn write_anchor(
    conn: &Connection,
    id: BatchId,
    times: &[DateTime<Utc>],
    window: Duration,
    now: DateTime<Utc>,
) -> Result<Option<Anchor>> {
    let Some(anchor) = Anchor::from_earliest(times.iter().copied(), window) else {
        return Ok(None);
    };
    // Expired anchors are frozen; the status guard makes this a no-op for them.
    conn.execute(
        "
        UPDATE batches
        SET production_time = ?, expiry_time = ?, updated_at = ?
        WHERE id = ? AND status = 'fresh'
        ",
        params![
            format_timestamp(anchor.production_time),
            format_timestamp(anchor.expiry_time),
            format_timestamp(now),
            id.get(),
        ],
    )?;
    Ok(Some(anchor))
}

/// Re-anchors a fresh batch at its earliest linked milking.
pub(crate) fn reanchor(
    conn: &Connection,
    id: BatchId,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<Option<Anchor>> {
    let times = linked_milking_times(conn, id)?;
    write_anchor(conn, id, &times, window, now)
}

/// Decides what happens to a batch after a milking left it, and applies it.
pub(crate) fn settle(
    conn: &Connection,
    id: BatchId,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<BatchFate> {
    let batch = load_batch(conn, id)?.ok_or_else(|| DbError::missing("batch", id))?;
    let times = linked_milking_times(conn, id)?;
    let fate = BatchFate::after_drain(batch.status, batch.total_volume, times.len());
    match fate {
        BatchFate::Delete => {
            conn.execute("DELETE FROM batches WHERE id = ?", params![id.get()])?;
            debug!(batch_id = %id, batch_number = %batch.batch_number, "deleted drained batch");
        }
        BatchFate::Keep => {
            if batch.status == BatchStatus::Fresh {
                write_anchor(conn, id, &times, window, now)?;
            }
        }
    }
    Ok(fate)
}

impl Database {
    /// Fetches a batch by ID.
    pub fn get_batch(&self, id: BatchId) -> Result<Batch> {
        load_batch(&self.conn, id)?.ok_or_else(|| DbError::not_found("batch", id))
    }

    /// Lists batches ordered by production time, optionally by status.
    pub fn list_batches(&self, status: Option<BatchStatus>) -> Result<Vec<Batch>> {
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {BATCH_COLUMNS}
            FROM batches
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY production_time ASC, id ASC
            "
        ))?;
        let rows = stmt.query_map(params![status.map(|s| s.as_str())], BatchRow::from_row)?;
        let mut batches = Vec::new();
        for row in rows {
            batches.push(row?.into_batch()?);
        }
        Ok(batches)
    }
}
