use anyhow::{Error, Result};
use clap::Parser;
use farme_core::migration::Migrator;

use crate::util::{error, info, success, Settings};
use crate::Global;

#[derive(Parser, Debug)]
pub struct Down {
    /// How many migrations to roll back, newest first.
    #[clap(default_value_t = 1)]
    steps: usize,
}

impl Down {
    pub fn run(self, global: &Global) -> Result<()> {
        let settings = Settings::load(global)?;
        let migrations = settings.migrations()?;
        let mut db = settings.open()?;
        let report = Migrator::for_database(&mut db, global.connection.as_deref())?.rollback(&migrations, self.steps)?;

        for name in &report.completed {
            success(format!("Rolled back: {name}"));
        }
        if let Some(failure) = report.failures.first() {
            error(format!("{}: {}", failure.name, failure.error));
            return Err(Error::msg("Rollback halted."));
        }
        if report.completed.is_empty() {
            info("Nothing to roll back.");
        }
        Ok(())
    }
}
