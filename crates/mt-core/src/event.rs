//! Milking events and their validated inputs.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::summary::Placement;
use crate::types::{BatchId, CowId, EventId, UserId, ValidationError, Volume};

/// A recorded milking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilkingEvent {
    pub id: EventId,
    pub cow_id: CowId,
    pub milker_id: UserId,
    /// `None` only if the batch row was removed out from under the event.
    pub batch_id: Option<BatchId>,
    pub volume: Volume,
    /// When the cow was milked, in the farm's local offset.
    pub milked_at: DateTime<FixedOffset>,
    /// 1-based ordinal of this milking within its (cow, date).
    pub session_number: i64,
    /// Volume of the preceding milking of the same cow that day. Audit only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_volume: Option<Volume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MilkingEvent {
    #[must_use]
    pub fn placement(&self) -> Placement {
        Placement::at(self.cow_id, &self.milked_at, self.volume)
    }
}

/// Input for recording a new milking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMilking {
    pub cow_id: CowId,
    pub milker_id: UserId,
    pub volume: Volume,
    pub milked_at: DateTime<FixedOffset>,
    pub note: Option<String>,
    /// Join an existing fresh batch instead of opening a new one.
    pub batch_id: Option<BatchId>,
}

impl NewMilking {
    /// Creates a milking input after checking the volume is positive and within the per-milking cap.
    pub fn new(
        cow_id: CowId,
        milker_id: UserId,
        volume: Volume,
        milked_at: DateTime<FixedOffset>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            cow_id,
            milker_id,
            volume: volume.require_milking()?,
            milked_at,
            note: None,
            batch_id: None,
        })
    }

    /// Parses volume (litres) and timestamp (RFC 3339) from raw strings.
    pub fn parse(
        cow_id: CowId,
        milker_id: UserId,
        volume: &str,
        milked_at: &str,
    ) -> Result<Self, ValidationError> {
        Self::new(cow_id, milker_id, volume.parse()?, parse_timestamp(milked_at)?)
    }

    /// Attaches a free-text note. Blank notes are dropped.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = normalize_note(note.into());
        self
    }

    #[must_use]
    pub fn in_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    #[must_use]
    pub fn placement(&self) -> Placement {
        Placement::at(self.cow_id, &self.milked_at, self.volume)
    }
}

/// An operator edit to an existing milking. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MilkingChanges {
    pub cow_id: Option<CowId>,
    pub milker_id: Option<UserId>,
    pub volume: Option<Volume>,
    pub milked_at: Option<DateTime<FixedOffset>>,
    /// `Some("")` clears the note.
    pub note: Option<String>,
}

impl MilkingChanges {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(volume) = self.volume {
            volume.require_milking()?;
        }
        Ok(())
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cow_id.is_none()
            && self.milker_id.is_none()
            && self.volume.is_none()
            && self.milked_at.is_none()
            && self.note.is_none()
    }

    /// Returns the event as it looks after the edit. Bookkeeping fields are untouched.
    #[must_use]
    pub fn apply_to(&self, event: &MilkingEvent) -> MilkingEvent {
        let mut edited = event.clone();
        if let Some(cow_id) = self.cow_id {
            edited.cow_id = cow_id;
        }
        if let Some(milker_id) = self.milker_id {
            edited.milker_id = milker_id;
        }
        if let Some(volume) = self.volume {
            edited.volume = volume;
        }
        if let Some(milked_at) = self.milked_at {
            edited.milked_at = milked_at;
        }
        if let Some(note) = &self.note {
            edited.note = normalize_note(note.clone());
        }
        edited
    }
}

/// Parses an RFC 3339 timestamp, keeping its offset.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, ValidationError> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|_| ValidationError::InvalidTimestamp {
        value: value.to_string(),
    })
}

fn normalize_note(note: String) -> Option<String> {
    let trimmed = note.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == note.len() {
        Some(note)
    } else {
        Some(trimmed.to_string())
    }
}
