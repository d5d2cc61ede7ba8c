//! Expiry sweep: moves fresh batches past their expiry to expired.
//!
//! The sweep holds no state between runs. A batch is expired by a conditional
//! update, so a second sweep (or one racing an edit) finds nothing to do and
//! sends nothing.

use chrono::{DateTime, Utc};
use mt_core::{Alert, BatchId, CowId};
use rusqlite::{Connection, params};
use tracing::{debug, info, warn};

use crate::Database;
use crate::batches::load_batch;
use crate::error::{DbError, Result};
use crate::helpers::{format_timestamp, immediate};
use crate::herd::HerdDirectory;
use crate::notifications::deliver;

fn due_batches(conn: &Connection, now: &str) -> Result<Vec<BatchId>> {
    let mut stmt = conn.prepare(
        "
        SELECT id
        FROM batches
        WHERE status = 'fresh' AND expiry_time <= ?
        ORDER BY expiry_time ASC, id ASC
        ",
    )?;
    let rows = stmt.query_map(params![now], |row| row.get::<_, i64>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(BatchId::new(row?));
    }
    Ok(ids)
}

fn cows_in_batch(conn: &Connection, id: BatchId) -> Result<Vec<CowId>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT cow_id FROM milking_events WHERE batch_id = ? ORDER BY cow_id ASC",
    )?;
    let rows = stmt.query_map(params![id.get()], |row| row.get::<_, i64>(0))?;
    let mut cows = Vec::new();
    for row in rows {
        cows.push(CowId::new(row?));
    }
    Ok(cows)
}

impl Database {
    /// Expires every fresh batch whose expiry time is at or before `now`.
    ///
    /// Each manager of a cow in an expired batch is notified once for that batch.
    /// Returns the alerts raised by this pass; already-expired batches raise none.
    /// A batch that fails to expire is logged and left fresh for the next pass.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Result<Vec<Alert>> {
        let due = due_batches(&self.conn, &format_timestamp(now))?;
        let mut alerts = Vec::new();
        let mut expired = 0_usize;
        let mut skipped = 0_usize;
        for id in &due {
            match self.expire_batch(*id, now) {
                Ok(Some(raised)) => {
                    expired += 1;
                    alerts.extend(raised);
                }
                Ok(None) => {}
                Err(err) => {
                    skipped += 1;
                    warn!(batch_id = %id, error = %err, "skipping batch expiry");
                }
            }
        }
        info!(
            now = %format_timestamp(now),
            due = due.len(),
            expired,
            skipped,
            alerts = alerts.len(),
            "swept batches"
        );
        Ok(alerts)
    }

    /// Expires one batch in its own transaction. `None` if someone else got there first.
    fn expire_batch(&mut self, id: BatchId, now: DateTime<Utc>) -> Result<Option<Vec<Alert>>> {
        let tx = immediate(&mut self.conn)?;
        let stamp = format_timestamp(now);
        let changed = tx.execute(
            "
            UPDATE batches
            SET status = 'expired', updated_at = ?1
            WHERE id = ?2 AND status = 'fresh' AND expiry_time <= ?1
            ",
            params![stamp, id.get()],
        )?;
        if changed == 0 {
            return Ok(None);
        }

        let batch = load_batch(&tx, id)?.ok_or_else(|| DbError::missing("batch", id))?;
        let cows = cows_in_batch(&tx, id)?;
        let alerts = Alert::for_expired_batch(&HerdDirectory::new(&tx), &batch, &cows, now)?;
        let mut notified = 0;
        for alert in &alerts {
            notified += deliver(&tx, alert)?;
        }
        tx.commit()?;
        debug!(
            batch_id = %id,
            batch_number = %batch.batch_number,
            cows = cows.len(),
            notified,
            "expired batch"
        );
        Ok(Some(alerts))
    }
}
