use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use farme_core::migration::{Migrator, Status as State};

use crate::util::{info, success, warning, Settings};
use crate::Global;

#[derive(Parser, Debug)]
pub struct Status {}

impl Status {
    pub fn run(self, global: &Global) -> Result<()> {
        let settings = Settings::load(global)?;
        let migrations = settings.migrations()?;
        let mut db = settings.open()?;
        let mut migrator = Migrator::for_database(&mut db, global.connection.as_deref())?;
        let statuses = migrator.status(&migrations)?;
        let stats = migrator.stats(&migrations);

        if statuses.is_empty() {
            info(format!("No migrations found in {}", settings.database.migration.path.display()));
            return Ok(());
        }
        for status in &statuses {
            let label = match status.status {
                State::Applied => "Ran    ".green(),
                State::Pending => "Pending".yellow(),
                State::Missing => "Missing".red(),
            };
            let executed_at = status.executed_at.as_deref().unwrap_or("");
            println!("{label}  {}  {executed_at}", status.name);
        }
        println!();
        println!("Total: {}  Completed: {}  Pending: {}", stats.total, stats.completed, stats.pending);
        if !stats.latest.is_empty() {
            println!("Latest: {}", stats.latest.join(", "));
        }
        if stats.up_to_date {
            success("Database is up to date.");
        } else {
            warning(format!("{} pending migration(s).", stats.pending));
        }
        Ok(())
    }
}
