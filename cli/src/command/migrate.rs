use anyhow::{Context, Result};
use clap::Parser;
use farme_core::migration::template;
use time::OffsetDateTime;

use crate::util::{success, Settings};
use crate::Global;

#[derive(Parser, Debug)]
pub struct MakeMigration {
    /// Snake case description, e.g. `create_posts_table` or `add_phone_to_users_table`.
    name: String,

    /// Template to use. `create` forces a create-table migration.
    kind: Option<String>,
}

impl MakeMigration {
    pub fn run(self, global: &Global) -> Result<()> {
        let settings = Settings::load(global)?;
        let folder = &settings.database.migration.path;
        let connection = global.connection.clone().unwrap_or_else(|| settings.database.default.clone());
        let driver = settings
            .database
            .connections
            .get(&connection)
            .map(|c| c.driver.clone())
            .unwrap_or_default();

        let (up, down) = template::create(folder, &self.name, self.kind.as_deref(), &driver, OffsetDateTime::now_utc())
            .context("Failed to create migration")?;
        success(format!("Created migration: {}", up.display()));
        success(format!("Created rollback: {}", down.display()));
        Ok(())
    }
}
