use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::{Direction, Migrations};
use crate::connection::{Connection, Database};
use crate::error::{Error, Result};
use crate::schema::{drop_table, TableBuilder};
use crate::value::Value;

/// A row of the ledger table.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRecord {
    pub id: i64,
    pub migration: String,
    pub executed_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Applied,
    Pending,
    /// Recorded in the ledger but no longer registered.
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStatus {
    pub name: String,
    pub status: Status,
    pub executed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// The three most recent available migrations.
    pub latest: Vec<String>,
    pub up_to_date: bool,
}

#[derive(Debug)]
pub struct MigrationFailure {
    pub name: String,
    pub error: Error,
}

/// What a run, rollback or reset did.
#[derive(Debug)]
pub struct MigrationReport {
    pub direction: Direction,
    pub completed: Vec<String>,
    pub failures: Vec<MigrationFailure>,
}

impl MigrationReport {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            completed: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The completed ids, or the first failure.
    pub fn into_result(self) -> Result<Vec<String>> {
        let MigrationReport { completed, failures, .. } = self;
        match failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(completed),
        }
    }
}

/// Applies and reverts migrations on one connection, tracking them in a ledger table.
pub struct Migrator<'c> {
    conn: &'c mut dyn Connection,
    table: String,
}

impl<'c> Migrator<'c> {
    pub fn new(conn: &'c mut dyn Connection, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
        }
    }

    /// A migrator over a named connection, using the configured ledger table.
    pub fn for_database(db: &'c mut Database, connection: Option<&str>) -> Result<Self> {
        let table = db.config().migration.table.clone();
        let conn = db.connection(connection)?;
        Ok(Self { conn, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table if it does not exist.
    pub fn ensure_table(&mut self) -> Result<()> {
        TableBuilder::create(&self.table)
            .if_not_exists()
            .id()
            .string("migration")
            .not_null()
            .unique()
            .datetime("executed_at")
            .use_current()
            .execute(self.conn)
    }

    /// Applied ids in the order they ran. A missing or unreadable ledger reads as empty.
    pub fn applied(&mut self) -> Vec<String> {
        let sql = format!("SELECT migration FROM {} ORDER BY id", self.table);
        match self.conn.fetch_all(&sql, &[]) {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|row| row.get("migration").and_then(Value::to_text))
                .collect(),
            Err(e) => {
                debug!(error = %e, table = %self.table, "could not read migration ledger");
                Vec::new()
            }
        }
    }

    pub fn records(&mut self) -> Result<Vec<MigrationRecord>> {
        let sql = format!("SELECT id, migration, executed_at FROM {} ORDER BY id", self.table);
        let rows = self.conn.fetch_all(&sql, &[])?;
        Ok(rows
            .into_iter()
            .map(|row| MigrationRecord {
                id: row.get("id").and_then(Value::as_i64).unwrap_or_default(),
                migration: row.get("migration").and_then(Value::to_text).unwrap_or_default(),
                executed_at: row.get("executed_at").and_then(Value::to_text).unwrap_or_default(),
            })
            .collect())
    }

    /// `executed_at` is filled by the column default.
    fn record(&mut self, name: &str) -> Result<()> {
        let p: Vec<String> = self.conn.driver().placeholder().take(1).collect();
        let sql = format!("INSERT INTO {} (migration) VALUES ({})", self.table, p[0]);
        self.conn.execute(&sql, &[name.into()])?;
        Ok(())
    }

    fn forget(&mut self, name: &str) -> Result<()> {
        let p: Vec<String> = self.conn.driver().placeholder().take(1).collect();
        let sql = format!("DELETE FROM {} WHERE migration = {}", self.table, p[0]);
        self.conn.execute(&sql, &[name.into()])?;
        Ok(())
    }

    /// Registered migrations that have not been applied, in run order.
    pub fn pending(&mut self, migrations: &Migrations) -> Vec<String> {
        let applied: HashSet<String> = self.applied().into_iter().collect();
        migrations
            .names()
            .filter(|name| !applied.contains(*name))
            .map(str::to_string)
            .collect()
    }

    /// Apply every pending migration in order, stopping at the first failure.
    pub fn run(&mut self, migrations: &Migrations) -> Result<MigrationReport> {
        self.ensure_table()?;
        let mut report = MigrationReport::new(Direction::Up);
        for name in self.pending(migrations) {
            let Some(migration) = migrations.get(&name) else {
                continue;
            };
            let result = migration
                .run(Direction::Up, self.conn)
                .and_then(|_| self.record(&name));
            match result {
                Ok(()) => {
                    info!(migration = %name, "applied");
                    report.completed.push(name);
                }
                Err(error) => {
                    warn!(migration = %name, %error, "migration failed");
                    report.failures.push(MigrationFailure { name, error });
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Revert the last `steps` applied migrations, newest first, stopping at the first failure.
    pub fn rollback(&mut self, migrations: &Migrations, steps: usize) -> Result<MigrationReport> {
        let mut report = MigrationReport::new(Direction::Down);
        let applied = self.applied();
        for name in applied.into_iter().rev().take(steps) {
            match self.revert(migrations, &name) {
                Ok(()) => {
                    info!(migration = %name, "rolled back");
                    report.completed.push(name);
                }
                Err(error) => {
                    warn!(migration = %name, %error, "rollback failed");
                    report.failures.push(MigrationFailure { name, error });
                    break;
                }
            }
        }
        Ok(report)
    }

    fn revert(&mut self, migrations: &Migrations, name: &str) -> Result<()> {
        let migration = migrations.get(name).ok_or_else(|| Error::MigrationNotFound {
            name: name.to_string(),
            direction: Direction::Down,
        })?;
        migration.run(Direction::Down, self.conn)?;
        self.forget(name)
    }

    /// Revert everything that was applied, continuing past failures, then drop the ledger table.
    pub fn reset(&mut self, migrations: &Migrations) -> Result<MigrationReport> {
        let mut report = MigrationReport::new(Direction::Down);
        for name in self.applied().into_iter().rev() {
            match self.revert(migrations, &name) {
                Ok(()) => report.completed.push(name),
                Err(error) => {
                    warn!(migration = %name, %error, "rollback failed during reset");
                    report.failures.push(MigrationFailure { name, error });
                }
            }
        }
        self.conn.execute_batch(&drop_table(&self.table))?;
        info!(table = %self.table, "dropped migration table");
        Ok(report)
    }

    /// Every registered migration with its state, followed by ledger rows that match nothing.
    pub fn status(&mut self, migrations: &Migrations) -> Result<Vec<MigrationStatus>> {
        self.ensure_table()?;
        let records = self.records()?;
        let mut statuses: Vec<MigrationStatus> = migrations
            .names()
            .map(|name| {
                let record = records.iter().find(|r| r.migration == name);
                MigrationStatus {
                    name: name.to_string(),
                    status: if record.is_some() { Status::Applied } else { Status::Pending },
                    executed_at: record.map(|r| r.executed_at.clone()),
                }
            })
            .collect();
        statuses.extend(
            records
                .into_iter()
                .filter(|r| migrations.get(&r.migration).is_none())
                .map(|r| MigrationStatus {
                    name: r.migration,
                    status: Status::Missing,
                    executed_at: Some(r.executed_at),
                }),
        );
        Ok(statuses)
    }

    pub fn stats(&mut self, migrations: &Migrations) -> Stats {
        let applied: HashSet<String> = self.applied().into_iter().collect();
        let total = migrations.len();
        let pending = migrations.names().filter(|n| !applied.contains(*n)).count();
        let names: Vec<&str> = migrations.names().collect();
        let latest = names[names.len().saturating_sub(3)..]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Stats {
            total,
            completed: applied.len(),
            pending,
            latest,
            up_to_date: pending == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Driver;
    use crate::connection::mock::{open, row, MockConnector};
    use assert_matches::assert_matches;

    fn registry() -> Migrations {
        let mut migrations = Migrations::new();
        migrations.register(
            "2024_01_01_000000_create_users_table",
            |c| c.execute_batch("CREATE TABLE users (id INTEGER)"),
            |c| c.execute_batch("DROP TABLE users"),
        );
        migrations.register(
            "2024_01_02_000000_create_posts_table",
            |c| c.execute_batch("CREATE TABLE posts (id INTEGER)"),
            |c| c.execute_batch("DROP TABLE posts"),
        );
        migrations
    }

    fn ledger(names: &[&str]) -> Vec<crate::value::Row> {
        names.iter().map(|n| row([("migration", Value::from(*n))])).collect()
    }

    #[test]
    fn test_run_applies_pending_in_order() -> Result<()> {
        let mock = MockConnector::new(Driver::Sqlite);
        mock.push_rows(ledger(&["2024_01_01_000000_create_users_table"]));
        let mut conn = open(&mock)?;
        let mut migrator = Migrator::new(conn.as_mut(), "migrations");
        let report = migrator.run(&registry())?;
        assert!(report.is_success());
        assert_eq!(report.completed, vec!["2024_01_02_000000_create_posts_table"]);

        let sql = mock.sql();
        assert!(sql[0].starts_with("CREATE TABLE IF NOT EXISTS migrations"));
        assert_eq!(sql[1], "SELECT migration FROM migrations ORDER BY id");
        assert_eq!(sql[2], "CREATE TABLE posts (id INTEGER)");
        assert_eq!(sql[3], "INSERT INTO migrations (migration) VALUES (?)");
        assert_eq!(mock.calls()[3].params[0], Value::from("2024_01_02_000000_create_posts_table"));
        Ok(())
    }

    #[test]
    fn test_run_halts_on_failure() -> Result<()> {
        let mock = MockConnector::new(Driver::Postgres);
        mock.fail_when("CREATE TABLE users");
        let mut conn = open(&mock)?;
        let mut migrator = Migrator::new(conn.as_mut(), "migrations");
        let report = migrator.run(&registry())?;
        assert!(report.completed.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_matches!(&report.failures[0].error, Error::MigrationError { name, .. } if name == "2024_01_01_000000_create_users_table");
        assert!(!mock.sql().iter().any(|s| s.contains("posts")));
        Ok(())
    }

    #[test]
    fn test_rollback_newest_first() -> Result<()> {
        let mock = MockConnector::new(Driver::Postgres);
        mock.push_rows(ledger(&[
            "2024_01_01_000000_create_users_table",
            "2024_01_02_000000_create_posts_table",
        ]));
        let mut conn = open(&mock)?;
        let mut migrator = Migrator::new(conn.as_mut(), "migrations");
        let report = migrator.rollback(&registry(), 1)?;
        assert_eq!(report.completed, vec!["2024_01_02_000000_create_posts_table"]);
        let sql = mock.sql();
        assert_eq!(sql[1], "DROP TABLE posts");
        assert_eq!(sql[2], "DELETE FROM migrations WHERE migration = $1");
        Ok(())
    }

    #[test]
    fn test_rollback_unknown_migration() -> Result<()> {
        let mock = MockConnector::new(Driver::Sqlite);
        mock.push_rows(ledger(&["2023_12_31_000000_gone"]));
        let mut conn = open(&mock)?;
        let report = Migrator::new(conn.as_mut(), "migrations").rollback(&registry(), 1)?;
        assert_matches!(
            report.into_result(),
            Err(Error::MigrationNotFound { direction: Direction::Down, name }) if name == "2023_12_31_000000_gone"
        );
        Ok(())
    }

    #[test]
    fn test_reset_continues_and_drops_ledger() -> Result<()> {
        let mock = MockConnector::new(Driver::Sqlite);
        mock.push_rows(ledger(&[
            "2024_01_01_000000_create_users_table",
            "2024_01_02_000000_create_posts_table",
        ]));
        mock.fail_when("DROP TABLE posts");
        let mut conn = open(&mock)?;
        let report = Migrator::new(conn.as_mut(), "migrations").reset(&registry())?;
        assert_eq!(report.completed, vec!["2024_01_01_000000_create_users_table"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(mock.sql().last().map(String::as_str), Some("DROP TABLE IF EXISTS migrations"));
        Ok(())
    }

    #[test]
    fn test_status_and_stats() -> Result<()> {
        let mock = MockConnector::new(Driver::Sqlite);
        mock.push_rows(vec![
            row([
                ("id", Value::Int(1)),
                ("migration", "2024_01_01_000000_create_users_table".into()),
                ("executed_at", "2024-01-01 10:00:00".into()),
            ]),
            row([
                ("id", Value::Int(2)),
                ("migration", "2023_06_01_000000_removed".into()),
                ("executed_at", "2024-01-01 10:00:01".into()),
            ]),
        ]);
        mock.push_rows(ledger(&["2024_01_01_000000_create_users_table"]));
        let mut conn = open(&mock)?;
        let mut migrator = Migrator::new(conn.as_mut(), "migrations");
        let migrations = registry();

        let statuses = migrator.status(&migrations)?;
        let states: Vec<Status> = statuses.iter().map(|s| s.status).collect();
        assert_eq!(states, vec![Status::Applied, Status::Pending, Status::Missing]);
        assert_eq!(statuses[0].executed_at.as_deref(), Some("2024-01-01 10:00:00"));

        let stats = migrator.stats(&migrations);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 1);
        assert!(!stats.up_to_date);
        assert_eq!(stats.latest.len(), 2);
        Ok(())
    }

    #[test]
    fn test_unreadable_ledger_is_empty() -> Result<()> {
        let mock = MockConnector::new(Driver::MySql);
        mock.fail_when("SELECT migration");
        let mut conn = open(&mock)?;
        assert!(Migrator::new(conn.as_mut(), "migrations").applied().is_empty());
        Ok(())
    }
}
