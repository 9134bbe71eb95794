use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationType {
    /// A lone `.sql` file: apply only.
    Simple,
    Up,
    Down,
}

impl MigrationType {
    pub fn extension(&self) -> &'static str {
        match self {
            MigrationType::Simple => "sql",
            MigrationType::Up => "up.sql",
            MigrationType::Down => "down.sql",
        }
    }

    /// Split a file name into its migration id and type.
    pub fn parse(file_name: &str) -> Option<(&str, MigrationType)> {
        if let Some(stem) = file_name.strip_suffix(".up.sql") {
            Some((stem, MigrationType::Up))
        } else if let Some(stem) = file_name.strip_suffix(".down.sql") {
            Some((stem, MigrationType::Down))
        } else {
            file_name.strip_suffix(".sql").map(|stem| (stem, MigrationType::Simple))
        }
    }
}

/// A migration found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub name: String,
    pub timestamp: Option<String>,
    pub up: Option<PathBuf>,
    pub down: Option<PathBuf>,
}

impl MigrationFile {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            timestamp: timestamp_prefix(name).map(str::to_string),
            up: None,
            down: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.up.as_deref().or(self.down.as_deref())
    }
}

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4}_\d{2}_\d{2}_\d{6})_").expect("timestamp pattern is valid"))
}

/// The `YYYY_MM_DD_HHMMSS` prefix of a migration id, if it has one.
pub fn timestamp_prefix(name: &str) -> Option<&str> {
    timestamp_regex()
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn format_timestamp(dt: OffsetDateTime) -> Result<String> {
    Ok(dt.format(format_description!("[year]_[month]_[day]_[hour][minute][second]"))?)
}

/// Migrations in `folder`, ordered by timestamp prefix then name. A missing folder has none.
pub fn discover(folder: &Path) -> Result<Vec<MigrationFile>> {
    if !folder.exists() {
        return Ok(Vec::new());
    }
    let mut found: Vec<MigrationFile> = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        let Some((name, kind)) = MigrationType::parse(&file_name) else {
            continue;
        };
        let index = match found.iter().position(|m| m.name == name) {
            Some(i) => i,
            None => {
                found.push(MigrationFile::new(name));
                found.len() - 1
            }
        };
        let migration = &mut found[index];
        match kind {
            MigrationType::Simple | MigrationType::Up => migration.up = Some(entry.path()),
            MigrationType::Down => migration.down = Some(entry.path()),
        }
    }
    found.sort_by(|a, b| (&a.timestamp, &a.name).cmp(&(&b.timestamp, &b.name)));
    Ok(found)
}
