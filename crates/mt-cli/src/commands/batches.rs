//! Batches command for listing milk batches and their freshness.

use std::io::Write;

use anyhow::Result;
use mt_core::{Batch, BatchStatus};
use mt_db::Database;

use super::util::write_json;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    status: Option<BatchStatus>,
    json: bool,
) -> Result<()> {
    let batches = db.list_batches(status)?;
    if json {
        return write_json(writer, &batches);
    }
    write_table(writer, &batches)
}

fn write_table<W: Write>(writer: &mut W, batches: &[Batch]) -> Result<()> {
    if batches.is_empty() {
        writeln!(writer, "No batches.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<4}  {:<29}  {:<7}  {:>9}  {:<16}  Expires (UTC)",
        "ID", "Number", "Status", "Litres", "Produced (UTC)"
    )?;
    for batch in batches {
        writeln!(
            writer,
            "{:<4}  {:<29}  {:<7}  {:>9}  {:<16}  {}",
            batch.id.get(),
            batch.batch_number,
            batch.status.as_str(),
            batch.total_volume.to_string(),
            batch.production_time.format(TIME_FORMAT).to_string(),
            batch.expiry_time.format(TIME_FORMAT),
        )?;
    }
    Ok(())
}
