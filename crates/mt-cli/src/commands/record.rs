//! Record, edit and remove milkings.
//!
//! Each command is one store mutation: the milking, its batch and its daily
//! summary change together or not at all.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::{DateTime, FixedOffset};
use mt_core::{BatchId, CowId, EventId, MilkingChanges, NewMilking, UserId, Volume};
use mt_db::Database;

use super::util::{describe_event, parse_instant};

/// Arguments of `mt record`, as typed on the command line.
#[derive(Debug, Clone)]
pub struct RecordArgs<'a> {
    pub cow_id: CowId,
    pub milker_id: UserId,
    pub volume: Volume,
    pub at: &'a str,
    pub note: Option<&'a str>,
    pub batch_id: Option<BatchId>,
}

impl RecordArgs<'_> {
    /// Builds the store input, resolving `at` against `now`.
    pub fn to_milking(&self, now: DateTime<FixedOffset>) -> Result<NewMilking> {
        let milked_at = parse_instant(self.at, now)?;
        let mut milking = NewMilking::new(self.cow_id, self.milker_id, self.volume, milked_at)?;
        if let Some(note) = self.note {
            milking = milking.with_note(note);
        }
        if let Some(batch_id) = self.batch_id {
            milking = milking.in_batch(batch_id);
        }
        Ok(milking)
    }
}

/// Arguments of `mt edit`. Absent fields stay as they are.
#[derive(Debug, Clone, Default)]
pub struct EditArgs<'a> {
    pub cow_id: Option<CowId>,
    pub milker_id: Option<UserId>,
    pub volume: Option<Volume>,
    pub at: Option<&'a str>,
    pub note: Option<&'a str>,
}

impl EditArgs<'_> {
    pub fn to_changes(&self, now: DateTime<FixedOffset>) -> Result<MilkingChanges> {
        let milked_at = self.at.map(|at| parse_instant(at, now)).transpose()?;
        let changes = MilkingChanges {
            cow_id: self.cow_id,
            milker_id: self.milker_id,
            volume: self.volume,
            milked_at,
            note: self.note.map(str::to_string),
        };
        if changes.is_empty() {
            bail!("nothing to change: pass at least one of --cow, --milker, --volume, --at, --note");
        }
        changes.validate()?;
        Ok(changes)
    }
}

pub fn record<W: Write>(writer: &mut W, db: &mut Database, milking: &NewMilking) -> Result<()> {
    let event = db.record(milking)?;
    writeln!(writer, "Recorded {}", describe_event(&event))?;
    Ok(())
}

pub fn edit<W: Write>(
    writer: &mut W,
    db: &mut Database,
    id: EventId,
    changes: &MilkingChanges,
) -> Result<()> {
    let event = db.update_event(id, changes)?;
    writeln!(writer, "Updated {}", describe_event(&event))?;
    Ok(())
}

pub fn remove<W: Write>(writer: &mut W, db: &mut Database, id: EventId) -> Result<()> {
    let event = db.delete_event(id)?;
    writeln!(writer, "Removed {}", describe_event(&event))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use mt_core::BatchStatus;
    use mt_db::DbError;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-03-04T20:00:00+00:00").unwrap()
    }

    fn setup() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.add_cow("Bessie").unwrap();
        db.add_user("Ana").unwrap();
        db
    }

    fn args(at: &str) -> RecordArgs<'_> {
        RecordArgs {
            cow_id: CowId::new(1),
            milker_id: UserId::new(1),
            volume: Volume::from_liters(10),
            at,
            note: None,
            batch_id: None,
        }
    }

    #[test]
    fn record_prints_the_stored_milking() {
        let mut db = setup();
        let milking = args("2025-03-04T08:00:00+00:00").to_milking(now()).unwrap();

        let mut output = Vec::new();
        record(&mut output, &mut db, &milking).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Recorded event 1: cow 1, 10 L at 2025-03-04 08:00 +00:00 (morning), session 1, batch 1\n"
        );
        assert_eq!(db.list_batches(Some(BatchStatus::Fresh)).unwrap().len(), 1);
    }

    #[test]
    fn record_resolves_relative_time() {
        let milking = args("2 hours ago").to_milking(now()).unwrap();
        assert_eq!(milking.milked_at.to_rfc3339(), "2025-03-04T18:00:00+00:00");
    }

    #[test]
    fn record_carries_note_and_batch() {
        let mut with_extras = args("now");
        with_extras.note = Some("  left quarter sore ");
        with_extras.batch_id = Some(BatchId::new(3));
        let milking = with_extras.to_milking(now()).unwrap();
        assert_eq!(milking.note.as_deref(), Some("left quarter sore"));
        assert_eq!(milking.batch_id, Some(BatchId::new(3)));
    }

    #[test]
    fn zero_volume_is_rejected_before_the_store() {
        let mut zero = args("now");
        zero.volume = Volume::ZERO;
        let err = zero.to_milking(now()).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn edit_then_remove() {
        let mut db = setup();
        let milking = args("2025-03-04T08:00:00+00:00").to_milking(now()).unwrap();
        db.record(&milking).unwrap();

        let changes = EditArgs {
            volume: Some(Volume::from_liters(12)),
            at: Some("2025-03-04T19:00:00+00:00"),
            ..EditArgs::default()
        }
        .to_changes(now())
        .unwrap();

        let mut output = Vec::new();
        edit(&mut output, &mut db, EventId::new(1), &changes).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Updated event 1: cow 1, 12 L at 2025-03-04 19:00 +00:00 (evening), session 1, batch 1\n"
        );

        let mut output = Vec::new();
        remove(&mut output, &mut db, EventId::new(1)).unwrap();
        assert!(String::from_utf8(output).unwrap().starts_with("Removed event 1:"));
        assert!(db.list_events(None).unwrap().is_empty());
    }

    #[test]
    fn empty_edit_is_rejected() {
        let err = EditArgs::default().to_changes(now()).unwrap_err();
        assert!(err.to_string().starts_with("nothing to change"));
    }

    #[test]
    fn remove_unknown_event_is_not_found() {
        let mut db = setup();
        let mut output = Vec::new();
        let err = remove(&mut output, &mut db, EventId::new(42)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::NotFound { entity: "event", .. })
        ));
    }
}
