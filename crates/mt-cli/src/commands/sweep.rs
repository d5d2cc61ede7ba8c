//! Sweep command: expires batches past their freshness window.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use mt_db::Database;

use super::util::{write_alerts, write_json};

pub fn run<W: Write>(writer: &mut W, db: &mut Database, now: DateTime<Utc>, json: bool) -> Result<()> {
    let alerts = db.sweep(now)?;
    if json {
        return write_json(writer, &alerts);
    }

    let mut batches: Vec<_> = alerts.iter().filter_map(|alert| alert.batch_id).collect();
    batches.dedup();
    writeln!(
        writer,
        "Swept at {}: {} batch(es) expired, {} alert(s)",
        now.format("%Y-%m-%d %H:%M UTC"),
        batches.len(),
        alerts.len()
    )?;
    write_alerts(writer, &alerts)
}
