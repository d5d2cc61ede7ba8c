//! Tunable thresholds for freshness and production alerts.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::alert::AlertKind;
use crate::types::{ValidationError, Volume};

/// Acceptable daily production per cow, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRange {
    pub low: Volume,
    pub high: Volume,
}

impl ProductionRange {
    pub fn new(low: Volume, high: Volume) -> Result<Self, ValidationError> {
        if low > high {
            return Err(ValidationError::InvalidPolicy {
                reason: format!("low bound {low} L is above high bound {high} L"),
            });
        }
        Ok(Self { low, high })
    }

    /// Which alert, if any, a daily total raises.
    #[must_use]
    pub fn classify(&self, total: Volume) -> Option<AlertKind> {
        if total < self.low {
            Some(AlertKind::LowProduction)
        } else if total > self.high {
            Some(AlertKind::HighProduction)
        } else {
            None
        }
    }
}

impl Default for ProductionRange {
    fn default() -> Self {
        Self {
            low: Volume::from_liters(15),
            high: Volume::from_liters(25),
        }
    }
}

/// Policy for batch freshness and production alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// How long a batch stays fresh after its earliest milking.
    /// Default: 8 hours.
    pub freshness_window: Duration,

    /// Daily production outside this range raises an alert.
    /// Default: 15 L to 25 L.
    pub production_range: ProductionRange,
}

impl Policy {
    pub fn new(
        freshness_window: Duration,
        production_range: ProductionRange,
    ) -> Result<Self, ValidationError> {
        if freshness_window <= Duration::zero() {
            return Err(ValidationError::InvalidPolicy {
                reason: format!(
                    "freshness window must be positive, got {} minutes",
                    freshness_window.num_minutes()
                ),
            });
        }
        Ok(Self {
            freshness_window,
            production_range,
        })
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            freshness_window: Duration::hours(8),
            production_range: ProductionRange::default(),
        }
    }
}
