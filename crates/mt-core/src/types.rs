//! Core type definitions with validation.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
///
/// These are raised before any write happens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A milking must carry some milk.
    #[error("volume must be greater than zero, got {value} L")]
    NonPositiveVolume { value: Volume },

    /// More milk than one milking can hold.
    #[error("volume must be at most {max} L per milking, got {value} L")]
    VolumeTooLarge { value: Volume, max: Volume },

    /// A summary sum left the representable range.
    #[error("volume overflow in summary for cow {cow_id} on {date}")]
    VolumeOverflow { cow_id: CowId, date: NaiveDate },

    /// The volume string could not be parsed as litres.
    #[error("invalid volume: {value:?} (expected litres, e.g. 10 or 7.25)")]
    InvalidVolume { value: String },

    /// The timestamp string could not be parsed as an instant.
    #[error("invalid timestamp: {value:?} (expected RFC 3339, e.g. 2025-03-04T08:00:00+07:00)")]
    InvalidTimestamp { value: String },

    /// The referenced cow does not exist in the directory.
    #[error("unknown cow: {id}")]
    UnknownCow { id: CowId },

    /// The referenced user (milker or manager) does not exist.
    #[error("unknown user: {id}")]
    UnknownUser { id: UserId },

    /// Milkings can only join a batch that is still fresh.
    #[error("batch {id} has expired and cannot take new milkings")]
    BatchNotFresh { id: BatchId },

    /// A date filter whose start lies after its end.
    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Invalid batch status value.
    #[error("invalid batch status: {value}")]
    InvalidStatus { value: String },

    /// Invalid time bucket value.
    #[error("invalid time bucket: {value}")]
    InvalidBucket { value: String },

    /// Invalid alert kind value.
    #[error("invalid alert kind: {value}")]
    InvalidAlertKind { value: String },

    /// Thresholds or freshness window that cannot work together.
    #[error("invalid policy: {reason}")]
    InvalidPolicy { reason: String },
}

/// Generates an integer row ID newtype with common trait implementations.
macro_rules! define_row_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw row ID.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw row ID.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

define_row_id!(
    /// Identifier of a cow in the herd directory.
    CowId
);

define_row_id!(
    /// Identifier of a user: milkers and managers are both users.
    UserId
);

define_row_id!(
    /// Identifier of a recorded milking event.
    EventId
);

define_row_id!(
    /// Identifier of a milk batch.
    BatchId
);

define_row_id!(
    /// Identifier of a stored notification.
    NotificationId
);

const ML_PER_LITER: i64 = 1000;

/// A milk volume, held as an exact number of millilitres.
///
/// Parsed from and displayed as decimal litres with up to three fractional
/// digits. Integer millilitres keep every sum exact, so summaries never drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Volume(i64);

impl Volume {
    /// No milk.
    pub const ZERO: Self = Self(0);

    /// Largest volume a single milking may record.
    pub const MAX_MILKING: Self = Self::from_liters(1000);

    /// Creates a volume from millilitres.
    #[must_use]
    pub const fn from_milliliters(ml: i64) -> Self {
        Self(ml)
    }

    /// Creates a volume from whole litres.
    #[must_use]
    pub const fn from_liters(liters: i64) -> Self {
        Self(liters * ML_PER_LITER)
    }

    /// Returns the volume in millilitres.
    #[must_use]
    pub const fn milliliters(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Subtracts `other`, flooring the result at zero.
    #[must_use]
    pub const fn floor_sub(self, other: Self) -> Self {
        let diff = self.0 - other.0;
        if diff < 0 { Self::ZERO } else { Self(diff) }
    }

    /// Returns `self - other`, which may be negative. Used for batch deltas.
    #[must_use]
    pub const fn delta(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }

    /// Ensures the volume is strictly positive.
    pub fn require_positive(self) -> Result<Self, ValidationError> {
        if self.is_positive() {
            Ok(self)
        } else {
            Err(ValidationError::NonPositiveVolume { value: self })
        }
    }

    /// Checks a single milking's volume: positive and at most [`Volume::MAX_MILKING`].
    pub fn require_milking(self) -> Result<Self, ValidationError> {
        self.require_positive()?;
        if self > Self::MAX_MILKING {
            return Err(ValidationError::VolumeTooLarge {
                value: self,
                max: Self::MAX_MILKING,
            });
        }
        Ok(self)
    }

    /// `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(ml) => Some(Self(ml)),
            None => None,
        }
    }

    /// Litres as a float, for display and JSON only.
    #[allow(
        clippy::cast_precision_loss,
        reason = "herd volumes are far below 2^52 ml"
    )]
    #[must_use]
    pub fn as_liters_f64(self) -> f64 {
        self.0 as f64 / ML_PER_LITER as f64
    }
}

impl Add for Volume {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Volume {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Volume {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / 1000;
        let frac = abs % 1000;
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let digits = format!("{frac:03}");
            write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

impl FromStr for Volume {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidVolume {
            value: s.to_string(),
        };
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
            || frac.len() > 3
        {
            return Err(invalid());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac: i64 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<3}").parse().map_err(|_| invalid())?
        };
        let ml = whole
            .checked_mul(ML_PER_LITER)
            .and_then(|ml| ml.checked_add(frac))
            .ok_or_else(invalid)?;
        Ok(Self(if negative { -ml } else { ml }))
    }
}

impl Serialize for Volume {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.as_liters_f64().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Volume {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let liters = f64::deserialize(deserializer)?;
        format!("{liters:.3}")
            .parse()
            .map_err(serde::de::Error::custom)
    }
}
