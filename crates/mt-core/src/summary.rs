//! Per-(cow, date) production summaries.
//!
//! Summaries are maintained incrementally: every milking credits its bucket on
//! create and debits it on delete. Debits floor at zero so a bucket can never go
//! negative, and `total` always equals the sum of the three buckets.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::bucket::TimeBucket;
use crate::types::{CowId, ValidationError, Volume};

/// Key of a daily summary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SummaryKey {
    pub cow_id: CowId,
    pub date: NaiveDate,
}

/// Where a milking lands in the summaries: which row, which bucket, how much.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub key: SummaryKey,
    pub bucket: TimeBucket,
    pub volume: Volume,
}

impl Placement {
    /// Places a milking by its local date and hour.
    #[must_use]
    pub fn at(cow_id: CowId, milked_at: &DateTime<FixedOffset>, volume: Volume) -> Self {
        Self {
            key: SummaryKey {
                cow_id,
                date: milked_at.date_naive(),
            },
            bucket: TimeBucket::of(milked_at),
            volume,
        }
    }
}

/// Bucketed daily production of one cow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub cow_id: CowId,
    pub date: NaiveDate,
    pub morning: Volume,
    pub afternoon: Volume,
    pub evening: Volume,
    /// Always `morning + afternoon + evening`.
    pub total: Volume,
    /// Milkings currently counted in the buckets.
    pub sessions: i64,
}

impl DailySummary {
    /// A fresh, all-zero summary for a key.
    #[must_use]
    pub const fn empty(key: SummaryKey) -> Self {
        Self {
            cow_id: key.cow_id,
            date: key.date,
            morning: Volume::ZERO,
            afternoon: Volume::ZERO,
            evening: Volume::ZERO,
            total: Volume::ZERO,
            sessions: 0,
        }
    }

    #[must_use]
    pub const fn key(&self) -> SummaryKey {
        SummaryKey {
            cow_id: self.cow_id,
            date: self.date,
        }
    }

    #[must_use]
    pub const fn bucket(&self, bucket: TimeBucket) -> Volume {
        match bucket {
            TimeBucket::Morning => self.morning,
            TimeBucket::Afternoon => self.afternoon,
            TimeBucket::Evening => self.evening,
        }
    }

    fn bucket_mut(&mut self, bucket: TimeBucket) -> &mut Volume {
        match bucket {
            TimeBucket::Morning => &mut self.morning,
            TimeBucket::Afternoon => &mut self.afternoon,
            TimeBucket::Evening => &mut self.evening,
        }
    }

    /// Adds a milking's volume to its bucket.
    ///
    /// Fails without touching the summary if the bucket or total would overflow.
    pub fn credit(&mut self, bucket: TimeBucket, volume: Volume) -> Result<(), ValidationError> {
        let overflow = || ValidationError::VolumeOverflow {
            cow_id: self.cow_id,
            date: self.date,
        };
        let filled = self.bucket(bucket).checked_add(volume).ok_or_else(overflow)?;
        let total = self.total.checked_add(volume).ok_or_else(overflow)?;
        *self.bucket_mut(bucket) = filled;
        self.total = total;
        self.sessions += 1;
        Ok(())
    }

    /// Removes a milking's volume from its bucket, flooring at zero.
    pub fn debit(&mut self, bucket: TimeBucket, volume: Volume) {
        let slot = self.bucket_mut(bucket);
        *slot = slot.floor_sub(volume);
        self.sessions = (self.sessions - 1).max(0);
        self.retotal();
    }

    /// A drained summary has nothing left and should be deleted.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.total <= Volume::ZERO
    }

    fn retotal(&mut self) {
        self.total = self.morning + self.afternoon + self.evening;
    }
}

/// How an edit to a milking moves volume between summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryPlan {
    /// Cow, date, bucket and volume are all unchanged.
    Unchanged,
    /// Same row: debit the old bucket, credit the new one.
    Adjust { old: Placement, new: Placement },
    /// Different row: delete from the old summary, create into the new one.
    Move { old: Placement, new: Placement },
}

/// Decides how an edit from `old` to `new` touches the summaries.
#[must_use]
pub fn plan_update(old: &Placement, new: &Placement) -> SummaryPlan {
    if old.key != new.key {
        SummaryPlan::Move {
            old: *old,
            new: *new,
        }
    } else if old.bucket != new.bucket || old.volume != new.volume {
        SummaryPlan::Adjust {
            old: *old,
            new: *new,
        }
    } else {
        SummaryPlan::Unchanged
    }
}
