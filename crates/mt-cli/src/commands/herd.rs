//! Herd directory commands: cows, users and cow managers.

use std::io::Write;

use anyhow::Result;
use mt_core::{CowId, UserId};
use mt_db::{CowRecord, Database, UserRecord};
use serde::Serialize;

use super::util::write_json;

pub fn add_cow<W: Write>(writer: &mut W, db: &mut Database, name: &str) -> Result<()> {
    let id = db.add_cow(name)?;
    writeln!(writer, "Added cow {id}: {}", name.trim())?;
    Ok(())
}

pub fn add_user<W: Write>(writer: &mut W, db: &mut Database, name: &str) -> Result<()> {
    let id = db.add_user(name)?;
    writeln!(writer, "Added user {id}: {}", name.trim())?;
    Ok(())
}

pub fn assign<W: Write>(
    writer: &mut W,
    db: &mut Database,
    cow_id: CowId,
    user_id: UserId,
) -> Result<()> {
    if db.assign_manager(cow_id, user_id)? {
        writeln!(writer, "User {user_id} now manages cow {cow_id}")?;
    } else {
        writeln!(writer, "User {user_id} already manages cow {cow_id}")?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CowListing {
    #[serde(flatten)]
    cow: CowRecord,
    managers: Vec<UserId>,
}

#[derive(Debug, Serialize)]
struct HerdListing {
    cows: Vec<CowListing>,
    users: Vec<UserRecord>,
}

pub fn list<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let mut cows = Vec::new();
    for cow in db.list_cows()? {
        let managers = db.managers_of(cow.id)?.into_iter().collect();
        cows.push(CowListing { cow, managers });
    }
    let listing = HerdListing {
        cows,
        users: db.list_users()?,
    };

    if json {
        return write_json(writer, &listing);
    }

    writeln!(writer, "Cows:")?;
    if listing.cows.is_empty() {
        writeln!(writer, "  (none)")?;
    }
    for entry in &listing.cows {
        let managers: Vec<String> = entry.managers.iter().map(ToString::to_string).collect();
        let managers = if managers.is_empty() {
            "-".to_string()
        } else {
            managers.join(", ")
        };
        writeln!(
            writer,
            "  {:>4}  {:<20}  managers: {}",
            entry.cow.id.get(),
            entry.cow.name,
            managers
        )?;
    }
    writeln!(writer, "Users:")?;
    if listing.users.is_empty() {
        writeln!(writer, "  (none)")?;
    }
    for user in &listing.users {
        writeln!(writer, "  {:>4}  {}", user.id.get(), user.name)?;
    }
    Ok(())
}
