//! The cow/user directory and who manages which cow.

use std::collections::BTreeSet;

use chrono::Utc;
use mt_core::{CowId, ManagerDirectory, UserId, ValidationError};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::debug;

use crate::Database;
use crate::error::{DbError, Result};
use crate::helpers::{format_timestamp, require_cow, require_user};

/// A cow in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CowRecord {
    pub id: CowId,
    pub name: String,
}

/// A user in the directory. Milkers and managers are both users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
}

/// [`ManagerDirectory`] over the herd tables.
///
/// Borrows a connection, so it also works inside an open transaction.
pub struct HerdDirectory<'c> {
    conn: &'c Connection,
}

impl<'c> HerdDirectory<'c> {
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl ManagerDirectory for HerdDirectory<'_> {
    type Error = DbError;

    fn managers_of(&self, cow_id: CowId) -> Result<BTreeSet<UserId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM cow_managers WHERE cow_id = ? ORDER BY user_id")?;
        let managers = stmt
            .query_map(params![cow_id.get()], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(UserId::new))
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(managers)
    }

    fn cow_name(&self, cow_id: CowId) -> Result<Option<String>> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM cows WHERE id = ?",
                params![cow_id.get()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }
}

fn require_name(name: &str, field: &'static str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field }.into());
    }
    Ok(trimmed.to_string())
}

impl Database {
    /// Adds a cow to the directory.
    pub fn add_cow(&mut self, name: &str) -> Result<CowId> {
        let name = require_name(name, "cow name")?;
        self.conn.execute(
            "INSERT INTO cows (name, created_at) VALUES (?, ?)",
            params![name, format_timestamp(Utc::now())],
        )?;
        let id = CowId::new(self.conn.last_insert_rowid());
        debug!(cow_id = %id, name = %name, "added cow");
        Ok(id)
    }

    /// Adds a user (milker or manager) to the directory.
    pub fn add_user(&mut self, name: &str) -> Result<UserId> {
        let name = require_name(name, "user name")?;
        self.conn.execute(
            "INSERT INTO users (name, created_at) VALUES (?, ?)",
            params![name, format_timestamp(Utc::now())],
        )?;
        let id = UserId::new(self.conn.last_insert_rowid());
        debug!(user_id = %id, name = %name, "added user");
        Ok(id)
    }

    /// Makes a user a manager of a cow. Assigning twice is a no-op.
    pub fn assign_manager(&mut self, cow_id: CowId, user_id: UserId) -> Result<bool> {
        require_cow(&self.conn, cow_id)?;
        require_user(&self.conn, user_id)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO cow_managers (cow_id, user_id) VALUES (?, ?)",
            params![cow_id.get(), user_id.get()],
        )?;
        debug!(cow_id = %cow_id, user_id = %user_id, inserted, "assigned manager");
        Ok(inserted > 0)
    }

    /// Lists cows ordered by ID.
    pub fn list_cows(&self) -> Result<Vec<CowRecord>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM cows ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(CowRecord {
                id: CowId::new(row.get(0)?),
                name: row.get(1)?,
            })
        })?;
        let mut cows = Vec::new();
        for row in rows {
            cows.push(row?);
        }
        Ok(cows)
    }

    /// Lists users ordered by ID.
    pub fn list_users(&self) -> Result<Vec<UserRecord>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM users ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(UserRecord {
                id: UserId::new(row.get(0)?),
                name: row.get(1)?,
            })
        })?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// Managers of a cow, via the same directory the alerts use.
    pub fn managers_of(&self, cow_id: CowId) -> Result<BTreeSet<UserId>> {
        HerdDirectory::new(&self.conn).managers_of(cow_id)
    }
}
