//! Core domain logic for the milk tracker.
//!
//! This crate contains the fundamental types and the pure arithmetic behind:
//! - Volumes and time buckets: exact millilitre volumes, morning/afternoon/evening split
//! - Daily summaries: incremental per-(cow, date) credit/debit with a zero floor
//! - Batches: freshness anchoring and the drain-to-delete rule
//! - Alerts: production range checks and notification fan-out
//!
//! Nothing here touches storage; `mt-db` loads rows, applies these functions and persists.

pub mod alert;
pub mod batch;
pub mod bucket;
pub mod event;
pub mod policy;
pub mod summary;
pub mod types;

pub use alert::{Alert, AlertKind, ManagerDirectory, NewNotification, Notification};
pub use batch::{Anchor, Batch, BatchFate, BatchStatus};
pub use bucket::TimeBucket;
pub use event::{MilkingChanges, MilkingEvent, NewMilking, parse_timestamp};
pub use policy::{Policy, ProductionRange};
pub use summary::{DailySummary, Placement, SummaryKey, SummaryPlan, plan_update};
pub use types::{BatchId, CowId, EventId, NotificationId, UserId, ValidationError, Volume};
