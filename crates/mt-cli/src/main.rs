use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mt_cli::commands::record::{EditArgs, RecordArgs};
use mt_cli::commands::{
    batches, evaluate, events, herd, notifications, record, status, summaries, sweep, util,
};
use mt_cli::{Cli, Commands, Config, HerdAction};
use mt_db::{Database, SummaryFilter};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    let policy = config.policy().context("invalid policy in configuration")?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?
        .with_policy(policy);
    db.set_busy_timeout(config.busy_timeout())
        .context("failed to set busy timeout")?;
    Ok((db, config))
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Herd { action }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                HerdAction::AddCow { name } => herd::add_cow(&mut out, &mut db, name)?,
                HerdAction::AddUser { name } => herd::add_user(&mut out, &mut db, name)?,
                HerdAction::Assign { cow, user } => herd::assign(&mut out, &mut db, *cow, *user)?,
                HerdAction::List { json } => herd::list(&mut out, &db, *json)?,
            }
        }
        Some(Commands::Record {
            cow,
            milker,
            volume,
            at,
            note,
            batch,
        }) => {
            let milking = RecordArgs {
                cow_id: *cow,
                milker_id: *milker,
                volume: *volume,
                at: at.as_str(),
                note: note.as_deref(),
                batch_id: *batch,
            }
            .to_milking(Local::now().fixed_offset())?;
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            record::record(&mut out, &mut db, &milking)?;
        }
        Some(Commands::Edit {
            event,
            cow,
            milker,
            volume,
            at,
            note,
        }) => {
            let changes = EditArgs {
                cow_id: *cow,
                milker_id: *milker,
                volume: *volume,
                at: at.as_deref(),
                note: note.as_deref(),
            }
            .to_changes(Local::now().fixed_offset())?;
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            record::edit(&mut out, &mut db, *event, &changes)?;
        }
        Some(Commands::Remove { event }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            record::remove(&mut out, &mut db, *event)?;
        }
        Some(Commands::Events { batch, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            events::run(&mut out, &db, *batch, *json)?;
        }
        Some(Commands::Batches { status, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            batches::run(&mut out, &db, *status, *json)?;
        }
        Some(Commands::Summaries {
            cow,
            from,
            to,
            json,
        }) => {
            let filter = SummaryFilter {
                cow_id: *cow,
                from: *from,
                to: *to,
            };
            let (db, _config) = open_database(cli.config.as_deref())?;
            summaries::run(&mut out, &db, &filter, *json)?;
        }
        Some(Commands::Evaluate { date, json }) => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            evaluate::run(&mut out, &mut db, date, *json)?;
        }
        Some(Commands::Sweep { now, json }) => {
            let now = match now {
                Some(now) => util::parse_instant(now, Local::now().fixed_offset())?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            sweep::run(&mut out, &mut db, now, *json)?;
        }
        Some(Commands::Notifications { user, unread, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            notifications::list(&mut out, &db, *user, *unread, *json)?;
        }
        Some(Commands::Read { notification }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            notifications::mark_read(&mut out, &mut db, *notification)?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut out, &db, &config.database_path)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
