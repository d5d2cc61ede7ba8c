//! Recording, editing and removing milkings.
//!
//! Each mutation is one `IMMEDIATE` transaction covering the milking row, its
//! batch and its daily summary. Either all three change or none do.

use chrono::{DateTime, Utc};
use mt_core::{
    Anchor, BatchId, EventId, MilkingChanges, MilkingEvent, NewMilking, SummaryKey, Volume,
};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::Database;
use crate::aggregate::{apply_create, apply_delete, apply_update};
use crate::batches::{add_volume, load_batch, open_batch, reanchor, require_fresh, settle};
use crate::error::{DbError, Result};
use crate::helpers::{
    EVENT_COLUMNS, EventRow, format_date, format_local, format_timestamp, immediate, require_cow,
    require_user,
};

/// Hands out the next session number for a (cow, date). Numbers are never reused.
fn next_session_number(conn: &Connection, key: SummaryKey) -> Result<i64> {
    let number = conn.query_row(
        "
        INSERT INTO session_counters (cow_id, date, last_number)
        VALUES (?, ?, 1)
        ON CONFLICT(cow_id, date) DO UPDATE SET last_number = last_number + 1
        RETURNING last_number
        ",
        params![key.cow_id.get(), format_date(key.date)],
        |row| row.get(0),
    )?;
    Ok(number)
}

/// Volume of the latest milking of the same cow and date before `milked_at_utc`.
fn previous_volume(
    conn: &Connection,
    key: SummaryKey,
    milked_at_utc: &str,
    exclude: Option<EventId>,
) -> Result<Option<Volume>> {
    let volume = conn
        .query_row(
            "
            SELECT volume_ml
            FROM milking_events
            WHERE cow_id = ?1 AND milk_date = ?2 AND milked_at_utc < ?3
              AND (?4 IS NULL OR id != ?4)
            ORDER BY milked_at_utc DESC, id DESC
            LIMIT 1
            ",
            params![
                key.cow_id.get(),
                format_date(key.date),
                milked_at_utc,
                exclude.map(EventId::get),
            ],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(volume.map(Volume::from_milliliters))
}

pub(crate) fn load_event(conn: &Connection, id: EventId) -> Result<Option<MilkingEvent>> {
    let row = conn
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM milking_events WHERE id = ?"),
            params![id.get()],
            EventRow::from_row,
        )
        .optional()?;
    row.map(EventRow::into_event).transpose()
}

fn require_event(conn: &Connection, id: EventId) -> Result<MilkingEvent> {
    load_event(conn, id)?.ok_or_else(|| DbError::not_found("event", id))
}

impl Database {
    /// Records a milking: opens (or joins) its batch and credits its daily summary.
    pub fn record(&mut self, milking: &NewMilking) -> Result<MilkingEvent> {
        self.record_at(milking, Utc::now())
    }

    pub(crate) fn record_at(
        &mut self,
        milking: &NewMilking,
        now: DateTime<Utc>,
    ) -> Result<MilkingEvent> {
        milking.volume.require_milking()?;
        let window = self.policy.freshness_window;
        let tx = immediate(&mut self.conn)?;

        require_cow(&tx, milking.cow_id)?;
        require_user(&tx, milking.milker_id)?;
        if let Some(batch_id) = milking.batch_id {
            require_fresh(&tx, batch_id)?;
        }

        let placement = milking.placement();
        let milked_at_utc = milking.milked_at.with_timezone(&Utc);
        let milked_at_text = format_timestamp(milked_at_utc);

        let batch_id = match milking.batch_id {
            Some(batch_id) => {
                add_volume(&tx, batch_id, milking.volume, now)?;
                batch_id
            }
            None => open_batch(&tx, Anchor::at(milked_at_utc, window), milking.volume, now)?,
        };

        let session_number = next_session_number(&tx, placement.key)?;
        let previous = previous_volume(&tx, placement.key, &milked_at_text, None)?;
        let stamp = format_timestamp(now);
        tx.execute(
            "
            INSERT INTO milking_events
                (cow_id, milker_id, batch_id, volume_ml, milked_at, milked_at_utc, milk_date,
                 session_number, previous_volume_ml, note, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                milking.cow_id.get(),
                milking.milker_id.get(),
                batch_id.get(),
                milking.volume.milliliters(),
                format_local(&milking.milked_at),
                milked_at_text,
                format_date(placement.key.date),
                session_number,
                previous.map(Volume::milliliters),
                milking.note,
                stamp,
                stamp,
            ],
        )?;
        let event_id = EventId::new(tx.last_insert_rowid());

        if milking.batch_id.is_some() {
            reanchor(&tx, batch_id, window, now)?;
        }
        let summary = apply_create(&tx, &placement, now)?;

        let event = require_event(&tx, event_id)?;
        tx.commit()?;
        debug!(
            event_id = %event.id,
            batch_id = %batch_id,
            cow_id = %event.cow_id,
            date = %summary.date,
            bucket = %placement.bucket,
            volume = %event.volume,
            session_number,
            "recorded milking"
        );
        Ok(event)
    }

    /// Applies an operator edit to a milking, moving its volume in the batch and summaries.
    pub fn update_event(&mut self, id: EventId, changes: &MilkingChanges) -> Result<MilkingEvent> {
        self.update_event_at(id, changes, Utc::now())
    }

    pub(crate) fn update_event_at(
        &mut self,
        id: EventId,
        changes: &MilkingChanges,
        now: DateTime<Utc>,
    ) -> Result<MilkingEvent> {
        changes.validate()?;
        let window = self.policy.freshness_window;
        let tx = immediate(&mut self.conn)?;

        let old = require_event(&tx, id)?;
        if let Some(cow_id) = changes.cow_id {
            require_cow(&tx, cow_id)?;
        }
        if let Some(milker_id) = changes.milker_id {
            require_user(&tx, milker_id)?;
        }
        let edited = changes.apply_to(&old);
        let old_placement = old.placement();
        let new_placement = edited.placement();

        let plan = apply_update(&tx, &old_placement, &new_placement, now)?;

        let moved_day = old_placement.key != new_placement.key;
        let moved_time = old.milked_at != edited.milked_at;
        let session_number = if moved_day {
            next_session_number(&tx, new_placement.key)?
        } else {
            old.session_number
        };
        let milked_at_text = format_timestamp(edited.milked_at.with_timezone(&Utc));
        let previous = if moved_day || moved_time {
            previous_volume(&tx, new_placement.key, &milked_at_text, Some(id))?
        } else {
            old.previous_volume
        };

        tx.execute(
            "
            UPDATE milking_events
            SET cow_id = ?, milker_id = ?, volume_ml = ?, milked_at = ?, milked_at_utc = ?,
                milk_date = ?, session_number = ?, previous_volume_ml = ?, note = ?, updated_at = ?
            WHERE id = ?
            ",
            params![
                edited.cow_id.get(),
                edited.milker_id.get(),
                edited.volume.milliliters(),
                format_local(&edited.milked_at),
                milked_at_text,
                format_date(new_placement.key.date),
                session_number,
                previous.map(Volume::milliliters),
                edited.note,
                format_timestamp(now),
                id.get(),
            ],
        )?;

        if let Some(batch_id) = old.batch_id {
            if load_batch(&tx, batch_id)?.is_none() {
                return Err(DbError::missing("batch", batch_id));
            }
            let delta = edited.volume.delta(old.volume);
            if delta != Volume::ZERO {
                add_volume(&tx, batch_id, delta, now)?;
            }
            if moved_time {
                reanchor(&tx, batch_id, window, now)?;
            }
        }

        let event = require_event(&tx, id)?;
        tx.commit()?;
        debug!(
            event_id = %id,
            plan = ?plan,
            session_number,
            "updated milking"
        );
        Ok(event)
    }

    /// Removes a milking, debiting its summary and draining its batch.
    pub fn delete_event(&mut self, id: EventId) -> Result<MilkingEvent> {
        self.delete_event_at(id, Utc::now())
    }

    pub(crate) fn delete_event_at(
        &mut self,
        id: EventId,
        now: DateTime<Utc>,
    ) -> Result<MilkingEvent> {
        let window = self.policy.freshness_window;
        let tx = immediate(&mut self.conn)?;

        let event = require_event(&tx, id)?;
        let placement = event.placement();
        let remaining = apply_delete(&tx, &placement, now)?;

        tx.execute("DELETE FROM milking_events WHERE id = ?", params![id.get()])?;

        let fate = match event.batch_id {
            Some(batch_id) => {
                add_volume(&tx, batch_id, Volume::ZERO.delta(event.volume), now)?;
                Some(settle(&tx, batch_id, window, now)?)
            }
            None => None,
        };

        tx.commit()?;
        debug!(
            event_id = %id,
            summary_kept = remaining.is_some(),
            batch_fate = ?fate,
            "deleted milking"
        );
        Ok(event)
    }

    /// Fetches a milking by ID.
    pub fn get_event(&self, id: EventId) -> Result<MilkingEvent> {
        require_event(&self.conn, id)
    }

    /// Lists milkings ordered by time, optionally only those in one batch.
    pub fn list_events(&self, batch: Option<BatchId>) -> Result<Vec<MilkingEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {EVENT_COLUMNS}
            FROM milking_events
            WHERE (?1 IS NULL OR batch_id = ?1)
            ORDER BY milked_at_utc ASC, id ASC
            "
        ))?;
        let rows = stmt.query_map(params![batch.map(BatchId::get)], EventRow::from_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }
        Ok(events)
    }
}
