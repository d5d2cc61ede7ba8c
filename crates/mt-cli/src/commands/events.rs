//! Events command for listing recorded milkings.

use std::io::Write;

use anyhow::Result;
use mt_core::{BatchId, MilkingEvent, TimeBucket};
use mt_db::Database;

use super::util::write_json;

pub fn run<W: Write>(writer: &mut W, db: &Database, batch: Option<BatchId>, json: bool) -> Result<()> {
    let events = db.list_events(batch)?;
    if json {
        return write_json(writer, &events);
    }
    write_table(writer, &events)
}

fn write_table<W: Write>(writer: &mut W, events: &[MilkingEvent]) -> Result<()> {
    if events.is_empty() {
        writeln!(writer, "No milkings recorded.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<4}  {:>4}  {:>6}  {:>9}  {:<23}  {:<9}  {:>7}  {:>5}  Note",
        "ID", "Cow", "Milker", "Litres", "Milked at", "Bucket", "Session", "Batch"
    )?;
    for event in events {
        let batch = event
            .batch_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        let line = format!(
            "{:<4}  {:>4}  {:>6}  {:>9}  {:<23}  {:<9}  {:>7}  {:>5}  {}",
            event.id.get(),
            event.cow_id.get(),
            event.milker_id.get(),
            event.volume.to_string(),
            event.milked_at.format("%Y-%m-%d %H:%M %:z").to_string(),
            TimeBucket::of(&event.milked_at).as_str(),
            event.session_number,
            batch,
            event.note.as_deref().unwrap_or(""),
        );
        writeln!(writer, "{}", line.trim_end())?;
    }
    Ok(())
}
