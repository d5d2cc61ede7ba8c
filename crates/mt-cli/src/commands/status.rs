//! Status command for showing store counts and the active policy.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use mt_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path) -> Result<()> {
    let stats = db.store_stats()?;
    let policy = db.policy();
    let window = policy.freshness_window.num_minutes();

    writeln!(writer, "Milk tracker status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    if window % 60 == 0 {
        writeln!(writer, "Freshness window: {} h", window / 60)?;
    } else {
        writeln!(writer, "Freshness window: {window} min")?;
    }
    writeln!(
        writer,
        "Production range: {} L to {} L",
        policy.production_range.low, policy.production_range.high
    )?;
    writeln!(writer, "Cows: {}", stats.cows)?;
    writeln!(writer, "Users: {}", stats.users)?;
    writeln!(writer, "Milkings: {}", stats.events)?;
    writeln!(
        writer,
        "Batches: {} fresh, {} expired",
        stats.fresh_batches, stats.expired_batches
    )?;
    writeln!(writer, "Daily summaries: {}", stats.summaries)?;
    writeln!(writer, "Unread notifications: {}", stats.unread_notifications)?;

    Ok(())
}
