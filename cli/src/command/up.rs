use anyhow::{Error, Result};
use clap::Parser;
use farme_core::migration::Migrator;

use crate::util::{error, info, success, Settings};
use crate::Global;

#[derive(Parser, Debug)]
pub struct Up {}

impl Up {
    pub fn run(self, global: &Global) -> Result<()> {
        let settings = Settings::load(global)?;
        let migrations = settings.migrations()?;
        let mut db = settings.open()?;
        let report = Migrator::for_database(&mut db, global.connection.as_deref())?.run(&migrations)?;

        for name in &report.completed {
            success(format!("Migrated: {name}"));
        }
        if let Some(failure) = report.failures.first() {
            error(format!("{}: {}", failure.name, failure.error));
            return Err(Error::msg("Migration halted; remaining migrations were not run."));
        }
        if report.completed.is_empty() {
            info("Nothing to migrate.");
        }
        Ok(())
    }
}
