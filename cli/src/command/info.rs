use anyhow::{Context, Result};
use clap::Parser;
use farme_core::inspect;
use farme_core::scaffold::classify;

use crate::util::{info, Settings};
use crate::Global;

#[derive(Parser, Debug)]
pub struct Info {
    /// The table to inspect.
    table: String,
}

impl Info {
    pub fn run(self, global: &Global) -> Result<()> {
        let settings = Settings::load(global)?;
        let mut db = settings.open()?;
        let columns = inspect::try_columns(&mut db, global.connection.as_deref(), &self.table)
            .with_context(|| format!("Failed to inspect table {}", self.table))?;
        if columns.is_empty() {
            info(format!("Table `{}` has no columns or does not exist.", self.table));
            return Ok(());
        }
        eprintln!("Table: {}", self.table);
        for column in &columns {
            let nullable = if column.nullable { "" } else { " NOT NULL" };
            let default = column
                .default_value
                .as_ref()
                .map(|d| format!(" DEFAULT {d}"))
                .unwrap_or_default();
            let key = match (column.is_primary_key, column.is_auto_increment) {
                (true, true) => " PRIMARY KEY AUTO_INCREMENT",
                (true, false) => " PRIMARY KEY",
                _ => "",
            };
            eprintln!(
                "  {}: {}{nullable}{default}{key} ({})",
                column.name,
                column.raw_type,
                classify(column)
            );
        }
        Ok(())
    }
}
