//! Summaries command for listing per-cow daily production.

use std::io::Write;

use anyhow::Result;
use mt_core::{DailySummary, Volume};
use mt_db::{Database, SummaryFilter};

use super::util::write_json;

pub fn run<W: Write>(writer: &mut W, db: &Database, filter: &SummaryFilter, json: bool) -> Result<()> {
    let summaries = db.list_summaries(filter)?;
    if json {
        return write_json(writer, &summaries);
    }
    write_table(writer, &summaries)
}

fn write_table<W: Write>(writer: &mut W, summaries: &[DailySummary]) -> Result<()> {
    if summaries.is_empty() {
        writeln!(writer, "No production in range.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<10}  {:>4}  {:>8}  {:>8}  {:>9}  {:>8}  {:>8}",
        "Date", "Cow", "Sessions", "Morning", "Afternoon", "Evening", "Total"
    )?;
    for summary in summaries {
        writeln!(
            writer,
            "{:<10}  {:>4}  {:>8}  {:>8}  {:>9}  {:>8}  {:>8}",
            summary.date.to_string(),
            summary.cow_id.get(),
            summary.sessions,
            summary.morning.to_string(),
            summary.afternoon.to_string(),
            summary.evening.to_string(),
            summary.total.to_string(),
        )?;
    }
    let herd_total: Volume = summaries.iter().map(|s| s.total).sum();
    writeln!(writer, "Herd total: {herd_total} L")?;
    Ok(())
}
