//! CLI subcommand implementations.

pub mod batches;
pub mod evaluate;
pub mod events;
pub mod herd;
pub mod notifications;
pub mod record;
pub mod status;
pub mod summaries;
pub mod sweep;
pub mod util;
