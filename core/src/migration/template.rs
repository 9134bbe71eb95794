//! Skeletons for `make:migration`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use heck::ToTitleCase;
use regex::Regex;
use time::OffsetDateTime;

use super::file::{format_timestamp, MigrationType};
use crate::config::Driver;
use crate::error::Result;
use crate::schema::{drop_table, AlterTable, ColumnDef, ColumnType, TableBuilder};
use crate::value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationKind {
    Create { table: String },
    AddColumn { table: String, column: String },
    RemoveColumn { table: String, column: String },
    Generic,
}

fn alter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:add_(?P<add>.+)_to_(?P<add_table>.+)|remove_(?P<remove>.+)_from_(?P<remove_table>.+))_table$")
            .expect("alter pattern is valid")
    })
}

impl MigrationKind {
    /// Pick a template from the migration name and the optional type argument.
    pub fn infer(name: &str, kind: Option<&str>) -> Self {
        if kind == Some("create") || name.starts_with("create_") {
            let table = name.trim_start_matches("create_").trim_end_matches("_table");
            return MigrationKind::Create { table: table.to_string() };
        }
        if name.starts_with("add_") || name.starts_with("remove_") {
            let captures = alter_regex().captures(name);
            let get = |key: &str, fallback: &str| {
                captures
                    .as_ref()
                    .and_then(|c| c.name(key))
                    .map_or(fallback.to_string(), |m| m.as_str().to_string())
            };
            return if name.starts_with("add_") {
                MigrationKind::AddColumn {
                    column: get("add", "your_column"),
                    table: get("add_table", "your_table"),
                }
            } else {
                MigrationKind::RemoveColumn {
                    column: get("remove", "your_column"),
                    table: get("remove_table", "your_table"),
                }
            };
        }
        MigrationKind::Generic
    }
}

fn header(name: &str, generated_on: &str) -> String {
    format!("-- Migration: {}\n-- Generated on: {generated_on}\n\n", name.to_title_case())
}

fn statements(sql: Vec<String>) -> String {
    sql.into_iter().map(|s| s + ";\n").collect()
}

/// Render the up and down SQL for a new migration.
pub fn render(name: &str, kind: &MigrationKind, driver: &Driver, generated_on: &str) -> Result<(String, String)> {
    let (up, down) = match kind {
        MigrationKind::Create { table } => {
            let up = TableBuilder::create(table)
                .id()
                .string("name")
                .not_null()
                .timestamps()
                .to_sql(driver);
            (statements(up), statements(vec![drop_table(table)]))
        }
        MigrationKind::AddColumn { table, column } => {
            let column_def = ColumnDef::new(column, ColumnType::String(255));
            let up = AlterTable::new(table).add_column(column_def).to_sql(driver)?;
            let down = AlterTable::new(table).drop_column(column).to_sql(driver)?;
            (statements(up), statements(down))
        }
        MigrationKind::RemoveColumn { table, column } => {
            let column_def = ColumnDef::new(column, ColumnType::String(255));
            let up = AlterTable::new(table).drop_column(column).to_sql(driver)?;
            let down = AlterTable::new(table).add_column(column_def).to_sql(driver)?;
            (statements(up), statements(down))
        }
        MigrationKind::Generic => (
            "-- Add your migration logic here\n".to_string(),
            "-- Add your rollback logic here\n".to_string(),
        ),
    };
    let header = header(name, generated_on);
    Ok((format!("{header}{up}"), format!("{header}{down}")))
}

/// Write `<timestamp>_<name>.up.sql` and `.down.sql` into `folder`, returning both paths.
pub fn create(
    folder: &Path,
    name: &str,
    kind: Option<&str>,
    driver: &Driver,
    now: OffsetDateTime,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(folder)?;
    let id = format!("{}_{name}", format_timestamp(now)?);
    let generated_on = value::format_datetime(time::PrimitiveDateTime::new(now.date(), now.time()))?;
    let kind = MigrationKind::infer(name, kind);
    let (up, down) = render(name, &kind, driver, &generated_on)?;
    let up_path = folder.join(format!("{id}.{}", MigrationType::Up.extension()));
    let down_path = folder.join(format!("{id}.{}", MigrationType::Down.extension()));
    fs::write(&up_path, up)?;
    fs::write(&down_path, down)?;
    Ok((up_path, down_path))
}
