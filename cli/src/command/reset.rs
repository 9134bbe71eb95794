use anyhow::{Error, Result};
use clap::Parser;
use farme_core::migration::Migrator;

use crate::util::{confirm, error, info, success, warning, Settings};
use crate::Global;

#[derive(Parser, Debug)]
pub struct Reset {
    #[clap(long, short)]
    /// Skip the confirmation prompt.
    force: bool,
}

impl Reset {
    pub fn run(self, global: &Global) -> Result<()> {
        if !self.force && !confirm("This will roll back every migration and drop the migrations table. Continue?")? {
            info("Reset cancelled.");
            return Ok(());
        }
        let settings = Settings::load(global)?;
        let migrations = settings.migrations()?;
        let mut db = settings.open()?;
        let mut migrator = Migrator::for_database(&mut db, global.connection.as_deref())?;
        let table = migrator.table().to_string();
        let report = migrator.reset(&migrations)?;

        for name in &report.completed {
            success(format!("Rolled back: {name}"));
        }
        for failure in &report.failures {
            error(format!("{}: {}", failure.name, failure.error));
        }
        success(format!("Dropped table `{table}`"));
        if !report.is_success() {
            warning("Some rollbacks failed; their changes may still be in the database.");
            return Err(Error::msg(format!("{} rollback(s) failed during reset.", report.failures.len())));
        }
        Ok(())
    }
}
