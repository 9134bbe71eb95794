//! Versioned schema migrations.
//!
//! A [`Migrations`] registry maps each migration id to an apply step and an optional rollback
//! step. Steps are SQL files discovered on disk or Rust closures registered at startup. The
//! [`Migrator`] runs them against a connection and records applied ids in a ledger table.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::connection::Connection;
use crate::error::{Error, Result};

mod engine;
mod file;
pub mod template;

pub use crate::error::Direction;
pub use engine::{MigrationFailure, MigrationRecord, MigrationReport, MigrationStatus, Migrator, Stats, Status};
pub use file::{discover, format_timestamp, timestamp_prefix, MigrationFile, MigrationType};

pub type MigrationFn = Box<dyn Fn(&mut dyn Connection) -> Result<()>>;

/// One half of a migration.
pub enum Step {
    Sql(PathBuf),
    Func(MigrationFn),
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Sql(path) => f.debug_tuple("Sql").field(path).finish(),
            Step::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl Step {
    fn run(&self, conn: &mut dyn Connection) -> Result<()> {
        match self {
            Step::Sql(path) => {
                let body = fs::read_to_string(path)?;
                if is_blank_sql(&body) {
                    return Ok(());
                }
                conn.execute_batch(&body)
            }
            Step::Func(f) => f(conn),
        }
    }
}

/// Whitespace and `--` comments only.
fn is_blank_sql(body: &str) -> bool {
    body.lines().map(str::trim).all(|l| l.is_empty() || l.starts_with("--"))
}

#[derive(Debug)]
pub struct Migration {
    pub name: String,
    pub apply: Option<Step>,
    pub rollback: Option<Step>,
}

impl Migration {
    pub fn run(&self, direction: Direction, conn: &mut dyn Connection) -> Result<()> {
        let step = match direction {
            Direction::Up => &self.apply,
            Direction::Down => &self.rollback,
        };
        let step = step.as_ref().ok_or_else(|| Error::MigrationNotFound {
            name: self.name.clone(),
            direction,
        })?;
        step.run(conn).map_err(|e| match e {
            Error::MigrationNotFound { .. } | Error::MigrationError { .. } => e,
            other => Error::MigrationError {
                name: self.name.clone(),
                message: other.to_string(),
            },
        })
    }
}

/// Known migrations, kept in run order.
#[derive(Debug, Default)]
pub struct Migrations {
    entries: IndexMap<String, Migration>,
}

impl Migrations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the SQL files in `folder`.
    pub fn discover(folder: &Path) -> Result<Self> {
        let mut migrations = Self::new();
        for file in discover(folder)? {
            migrations.insert(Migration {
                name: file.name,
                apply: file.up.map(Step::Sql),
                rollback: file.down.map(Step::Sql),
            });
        }
        Ok(migrations)
    }

    /// Register a migration written in Rust.
    pub fn register<U, D>(&mut self, name: impl Into<String>, up: U, down: D)
    where
        U: Fn(&mut dyn Connection) -> Result<()> + 'static,
        D: Fn(&mut dyn Connection) -> Result<()> + 'static,
    {
        self.insert(Migration {
            name: name.into(),
            apply: Some(Step::Func(Box::new(up))),
            rollback: Some(Step::Func(Box::new(down))),
        });
    }

    /// Add or replace a migration, keeping the registry ordered by timestamp then name.
    pub fn insert(&mut self, migration: Migration) {
        self.entries.insert(migration.name.clone(), migration);
        self.entries
            .sort_by(|a, _, b, _| (timestamp_prefix(a), a).cmp(&(timestamp_prefix(b), b)));
    }

    pub fn get(&self, name: &str) -> Option<&Migration> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.entries.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
