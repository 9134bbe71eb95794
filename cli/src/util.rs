use std::fmt::Display;
use std::io::{self, BufRead, Write};

use anyhow::Result;
use colored::Colorize;
use farme_core::config::{get_var_migration_folder, Config, DatabaseConfig, Paths};
use farme_core::migration::Migrations;
use farme_core::Database;

use crate::config::load_config;
use crate::Global;

pub fn success(message: impl Display) {
    eprintln!("{} {message}", "✓".green());
}

pub fn error(message: impl Display) {
    eprintln!("{} {message}", "✗".red());
}

pub fn info(message: impl Display) {
    eprintln!("{} {message}", "ℹ".blue());
}

pub fn warning(message: impl Display) {
    eprintln!("{} {message}", "⚠".yellow());
}

/// Configuration for a command, with `DATABASE_URL` and `MIGRATION_FOLDER` applied.
pub struct Settings {
    pub config: Config,
    pub database: DatabaseConfig,
}

impl Settings {
    pub fn load(global: &Global) -> Result<Self> {
        let config = load_config(global.config.as_deref())?;
        let database = config.database()?.apply_env()?;
        Ok(Self { config, database })
    }

    /// Output paths. The migration folder follows the database settings unless set explicitly.
    pub fn paths(&self) -> Result<Paths> {
        let mut paths = self.config.paths()?;
        if self.config.get("app.paths.migrations").is_none() || get_var_migration_folder().is_some() {
            paths.migrations = self.database.migration.path.clone();
        }
        Ok(paths)
    }

    pub fn open(&self) -> Result<Database> {
        Ok(Database::new(self.database.clone())?)
    }

    pub fn migrations(&self) -> Result<Migrations> {
        Ok(Migrations::discover(&self.database.migration.path)?)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Ask a yes/no question on stderr. Anything but `y`/`yes` is a no.
pub fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}
