//! Daily production checks against the configured range.

use chrono::{DateTime, NaiveDate, Utc};
use mt_core::{Alert, SummaryKey};
use tracing::{info, warn};

use crate::Database;
use crate::aggregate::load_summary;
use crate::error::Result;
use crate::helpers::immediate;
use crate::herd::HerdDirectory;
use crate::notifications::deliver;

impl Database {
    /// Checks every summary of `date` and notifies managers of out-of-range cows.
    pub fn evaluate_production(&mut self, date: NaiveDate) -> Result<Vec<Alert>> {
        self.evaluate_production_at(date, Utc::now())
    }

    /// Like [`Database::evaluate_production`], stamping notifications with `now`.
    ///
    /// Each summary is checked in its own transaction. A row that fails is logged
    /// and skipped; the rest of the pass continues. Summaries are never modified.
    pub fn evaluate_production_at(
        &mut self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>> {
        let keys = self.summary_keys_on(date)?;
        let mut alerts = Vec::new();
        let mut skipped = 0_usize;
        for key in &keys {
            match self.evaluate_summary(*key, now) {
                Ok(Some(alert)) => alerts.push(alert),
                Ok(None) => {}
                Err(err) => {
                    skipped += 1;
                    warn!(cow_id = %key.cow_id, date = %key.date, error = %err, "skipping summary evaluation");
                }
            }
        }
        info!(
            date = %date,
            summaries = keys.len(),
            alerts = alerts.len(),
            skipped,
            "evaluated daily production"
        );
        Ok(alerts)
    }

    fn evaluate_summary(&mut self, key: SummaryKey, now: DateTime<Utc>) -> Result<Option<Alert>> {
        let range = self.policy.production_range;
        let tx = immediate(&mut self.conn)?;
        // The row may have drained away since the keys were listed.
        let Some(summary) = load_summary(&tx, key)? else {
            return Ok(None);
        };
        let alert = Alert::for_summary(&HerdDirectory::new(&tx), &summary, &range, now)?;
        if let Some(alert) = &alert {
            deliver(&tx, alert)?;
        }
        tx.commit()?;
        Ok(alert)
    }
}
