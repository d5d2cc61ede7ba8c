//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use mt_core::{BatchId, BatchStatus, CowId, EventId, NotificationId, UserId, Volume};

/// Dairy milk tracker.
///
/// Records milkings, keeps per-cow daily totals and milk batches in step, and
/// notifies cow managers about unusual production and expired milk.
#[derive(Debug, Parser)]
#[command(name = "mt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage cows, users and who manages which cow.
    Herd {
        #[command(subcommand)]
        action: HerdAction,
    },

    /// Record a milking.
    Record {
        #[arg(long)]
        cow: CowId,

        /// The user who milked.
        #[arg(long)]
        milker: UserId,

        /// Volume in litres (e.g. 10.5).
        #[arg(long)]
        volume: Volume,

        /// When the milking happened: RFC 3339, "now", or relative ("2 hours ago").
        #[arg(long)]
        at: String,

        #[arg(long)]
        note: Option<String>,

        /// Join an existing fresh batch instead of opening a new one.
        #[arg(long)]
        batch: Option<BatchId>,
    },

    /// Edit a recorded milking.
    Edit {
        event: EventId,

        #[arg(long)]
        cow: Option<CowId>,

        #[arg(long)]
        milker: Option<UserId>,

        #[arg(long)]
        volume: Option<Volume>,

        #[arg(long)]
        at: Option<String>,

        /// Replace the note. An empty note clears it.
        #[arg(long)]
        note: Option<String>,
    },

    /// Remove a recorded milking.
    Remove { event: EventId },

    /// List recorded milkings.
    Events {
        /// Only milkings in this batch.
        #[arg(long)]
        batch: Option<BatchId>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List milk batches.
    Batches {
        /// Only batches with this status (fresh or expired).
        #[arg(long)]
        status: Option<BatchStatus>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List daily production summaries.
    Summaries {
        #[arg(long)]
        cow: Option<CowId>,

        /// First date, inclusive (YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last date, inclusive (YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check each cow's daily total against the production range.
    Evaluate {
        /// Date to check (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Expire batches past their freshness window and notify managers.
    Sweep {
        /// Instant to sweep at: RFC 3339, "now", or relative ("2 hours ago").
        #[arg(long)]
        now: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List a user's notifications, newest first.
    Notifications {
        #[arg(long)]
        user: UserId,

        /// Only unread notifications.
        #[arg(long)]
        unread: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Mark a notification read.
    Read { notification: NotificationId },

    /// Show store counts and the active policy.
    Status,
}

/// Herd directory actions.
#[derive(Debug, Subcommand)]
pub enum HerdAction {
    /// Add a cow.
    AddCow { name: String },

    /// Add a user (milker or manager).
    AddUser { name: String },

    /// Make a user a manager of a cow.
    Assign { cow: CowId, user: UserId },

    /// List cows and users.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn record_parses_typed_arguments() {
        let cli = Cli::try_parse_from([
            "mt",
            "record",
            "--cow",
            "1",
            "--milker",
            "2",
            "--volume",
            "10.5",
            "--at",
            "2025-03-04T08:00:00+02:00",
            "--batch",
            "7",
        ])
        .unwrap();

        let Some(Commands::Record {
            cow,
            milker,
            volume,
            at,
            note,
            batch,
        }) = cli.command
        else {
            panic!("expected record command");
        };
        assert_eq!(cow, CowId::new(1));
        assert_eq!(milker, UserId::new(2));
        assert_eq!(volume, Volume::from_milliliters(10_500));
        assert_eq!(at, "2025-03-04T08:00:00+02:00");
        assert_eq!(note, None);
        assert_eq!(batch, Some(BatchId::new(7)));
    }

    #[test]
    fn bad_volume_is_rejected_by_the_parser() {
        let result = Cli::try_parse_from([
            "mt", "record", "--cow", "1", "--milker", "2", "--volume", "ten", "--at", "now",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["mt", "status", "-v", "--config", "/tmp/mt.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/mt.toml")));
    }

    #[test]
    fn batches_status_filter_parses() {
        let cli = Cli::try_parse_from(["mt", "batches", "--status", "expired"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Batches {
                status: Some(BatchStatus::Expired),
                json: false
            })
        ));
    }
}
