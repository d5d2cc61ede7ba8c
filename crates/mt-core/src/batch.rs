//! Perishable milk batches.
//!
//! A batch is anchored at its earliest linked milking and stays fresh for a fixed
//! window after that. Lifecycle:
//!
//! - `Fresh -> Expired`, only through the expiry sweep
//! - `Fresh -> deleted`, when edits drain it of volume or milkings
//!
//! Expired is terminal: ordinary edits keep its volume bookkeeping but never
//! reactivate, re-anchor or delete it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BatchId, ValidationError, Volume};

/// Freshness state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Fresh,
    Expired,
}

impl BatchStatus {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fresh" => Ok(Self::Fresh),
            "expired" => Ok(Self::Expired),
            _ => Err(ValidationError::InvalidStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// A stored batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub batch_number: String,
    /// Sum of the volumes of the milkings linked to this batch.
    pub total_volume: Volume,
    pub status: BatchStatus,
    pub production_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    /// Whether a sweep at `now` should expire this batch.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == BatchStatus::Fresh && self.expiry_time <= now
    }

    #[must_use]
    pub const fn anchor(&self) -> Anchor {
        Anchor {
            production_time: self.production_time,
            expiry_time: self.expiry_time,
        }
    }
}

/// Production and expiry instants of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub production_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
}

impl Anchor {
    /// Anchors a batch at a single production instant.
    #[must_use]
    pub fn at(production_time: DateTime<Utc>, window: Duration) -> Self {
        Self {
            production_time,
            expiry_time: production_time + window,
        }
    }

    /// Anchors a batch at the earliest of its milkings. `None` when there are none.
    pub fn from_earliest<I>(milked_at: I, window: Duration) -> Option<Self>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        milked_at
            .into_iter()
            .min()
            .map(|earliest| Self::at(earliest, window))
    }
}

/// What happens to a batch after a milking leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFate {
    Keep,
    Delete,
}

impl BatchFate {
    /// A fresh batch left with no volume or no milkings is deleted; expired batches stay.
    #[must_use]
    pub fn after_drain(status: BatchStatus, total: Volume, linked_events: usize) -> Self {
        match status {
            BatchStatus::Fresh if total <= Volume::ZERO || linked_events == 0 => Self::Delete,
            _ => Self::Keep,
        }
    }
}

/// Formats a batch number: `BATCH-<yyyymmddHHMMSS>-<suffix>`.
#[must_use]
pub fn batch_number(production_time: DateTime<Utc>, suffix: &str) -> String {
    format!(
        "BATCH-{}-{suffix}",
        production_time.format("%Y%m%d%H%M%S")
    )
}
