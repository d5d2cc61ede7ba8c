//! Time-of-day buckets for daily production.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// The part of the day a milking falls into, chosen by its local hour.
///
/// - morning: `[00:00, 12:00)`
/// - afternoon: `[12:00, 18:00)`
/// - evening: `[18:00, 24:00)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Morning,
    Afternoon,
    Evening,
}

impl TimeBucket {
    /// All buckets in day order.
    pub const ALL: [Self; 3] = [Self::Morning, Self::Afternoon, Self::Evening];

    /// Maps a local hour (0-23) to its bucket.
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            0..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    /// Bucket of an instant, read in the instant's own offset.
    #[must_use]
    pub fn of<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> Self {
        Self::from_hour(timestamp.hour())
    }

    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimeBucket {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(Self::Morning),
            "afternoon" => Ok(Self::Afternoon),
            "evening" => Ok(Self::Evening),
            _ => Err(ValidationError::InvalidBucket {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn hour_boundaries() {
        assert_eq!(TimeBucket::from_hour(0), TimeBucket::Morning);
        assert_eq!(TimeBucket::from_hour(11), TimeBucket::Morning);
        assert_eq!(TimeBucket::from_hour(12), TimeBucket::Afternoon);
        assert_eq!(TimeBucket::from_hour(17), TimeBucket::Afternoon);
        assert_eq!(TimeBucket::from_hour(18), TimeBucket::Evening);
        assert_eq!(TimeBucket::from_hour(23), TimeBucket::Evening);
    }

    #[test]
    fn bucket_uses_local_hour_not_utc() {
        // 05:30 UTC is 12:30 in UTC+7
        let ts = DateTime::parse_from_rfc3339("2025-03-04T12:30:00+07:00").unwrap();
        assert_eq!(TimeBucket::of(&ts), TimeBucket::Afternoon);
        assert_eq!(TimeBucket::of(&ts.to_utc()), TimeBucket::Morning);
    }

    #[test]
    fn bucket_from_str_roundtrip() {
        for bucket in TimeBucket::ALL {
            assert_eq!(bucket.as_str().parse::<TimeBucket>().unwrap(), bucket);
        }
        assert!("noon".parse::<TimeBucket>().is_err());
    }
}
