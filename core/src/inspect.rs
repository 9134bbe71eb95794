//! Column introspection across MySQL, PostgreSQL and SQLite.
//!
//! Introspection is best effort: any failure is logged at debug level and reported as an
//! empty column list or a missing table, so callers can fall back to defaults.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Driver;
use crate::connection::Database;
use crate::error::Result;
use crate::value::{Row, Value};

/// Normalized metadata about one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// The declared type, e.g. `varchar(255)`, `INTEGER`, `character varying`.
    pub raw_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub max_length: Option<u64>,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
}

impl ColumnDescriptor {
    /// A nullable, keyless column.
    pub fn new(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_type: raw_type.into(),
            nullable: true,
            default_value: None,
            max_length: None,
            is_primary_key: false,
            is_auto_increment: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn max_length(mut self, length: u64) -> Self {
        self.max_length = Some(length);
        self
    }

    /// Primary key with auto increment. Implies NOT NULL.
    pub fn increments(mut self) -> Self {
        self.is_primary_key = true;
        self.is_auto_increment = true;
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    /// The lowercased declared type.
    pub fn type_lower(&self) -> String {
        self.raw_type.to_ascii_lowercase()
    }

    /// `max_length` if reported, otherwise the `(n)` in the declared type.
    pub fn declared_length(&self) -> Option<u64> {
        if self.max_length.is_some() {
            return self.max_length;
        }
        let open = self.raw_type.find('(')?;
        let close = self.raw_type[open..].find(')')? + open;
        self.raw_type[open + 1..close].split(',').next()?.trim().parse().ok()
    }
}

/// Columns of `table` in ordinal order. Empty when the table is missing or introspection fails.
pub fn columns(db: &mut Database, connection: Option<&str>, table: &str) -> Vec<ColumnDescriptor> {
    try_columns(db, connection, table).unwrap_or_else(|e| {
        warn!(table, error = %e, "column introspection failed");
        Vec::new()
    })
}

pub fn try_columns(db: &mut Database, connection: Option<&str>, table: &str) -> Result<Vec<ColumnDescriptor>> {
    let conn = db.connection(connection)?;
    let rows = match conn.driver().clone() {
        Driver::MySql => conn.fetch_all(MYSQL_COLUMNS, &[table.into()])?,
        Driver::Postgres => conn.fetch_all(POSTGRES_COLUMNS, &[table.into()])?,
        Driver::Sqlite => {
            let rows = conn.fetch_all(SQLITE_COLUMNS, &[table.into()])?;
            return Ok(rows.iter().map(sqlite_descriptor).collect());
        }
        Driver::Unsupported(name) => {
            debug!(driver = %name, "introspection is not supported for this driver");
            return Ok(Vec::new());
        }
    };
    Ok(rows.iter().map(information_schema_descriptor).collect())
}

/// Whether `table` exists. False on any failure.
pub fn table_exists(db: &mut Database, connection: Option<&str>, table: &str) -> bool {
    let result = db.connection(connection).and_then(|conn| {
        let sql = match conn.driver() {
            Driver::MySql => MYSQL_TABLE_EXISTS,
            Driver::Postgres => POSTGRES_TABLE_EXISTS,
            Driver::Sqlite => SQLITE_TABLE_EXISTS,
            Driver::Unsupported(_) => return Ok(false),
        };
        let rows = conn.fetch_all(sql, &[table.into()])?;
        Ok(count(&rows) > 0)
    });
    result.unwrap_or_else(|e| {
        warn!(table, error = %e, "table lookup failed");
        false
    })
}

const MYSQL_COLUMNS: &str = "SELECT COLUMN_NAME AS name, COLUMN_TYPE AS type, IS_NULLABLE AS nullable, \
COLUMN_DEFAULT AS default_value, CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS max_length, \
COLUMN_KEY AS key_type, EXTRA AS extra \
FROM information_schema.COLUMNS \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
ORDER BY ORDINAL_POSITION";

const POSTGRES_COLUMNS: &str = "SELECT c.column_name::text AS name, c.data_type::text AS type, \
c.is_nullable::text AS nullable, c.column_default::text AS default_value, \
c.character_maximum_length::bigint AS max_length, \
CASE WHEN EXISTS (\
SELECT 1 FROM information_schema.table_constraints tc \
JOIN information_schema.key_column_usage k \
ON k.constraint_name = tc.constraint_name AND k.table_schema = tc.table_schema AND k.table_name = tc.table_name \
WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = c.table_schema \
AND tc.table_name = c.table_name AND k.column_name = c.column_name\
) THEN 'PRI' ELSE '' END AS key_type, \
CASE WHEN c.column_default LIKE 'nextval(%' OR c.is_identity = 'YES' THEN 'auto_increment' ELSE '' END AS extra \
FROM information_schema.columns c \
WHERE c.table_catalog = current_database() AND c.table_schema = current_schema() AND c.table_name = $1 \
ORDER BY c.ordinal_position";

const SQLITE_COLUMNS: &str = "SELECT name, type, \"notnull\" AS not_null, dflt_value, pk FROM pragma_table_info(?)";

const MYSQL_TABLE_EXISTS: &str =
    "SELECT COUNT(*) AS count FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

const POSTGRES_TABLE_EXISTS: &str =
    "SELECT COUNT(*) AS count FROM information_schema.tables WHERE table_catalog = current_database() AND table_name = $1";

const SQLITE_TABLE_EXISTS: &str = "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?";

fn text(row: &Row, key: &str) -> Option<String> {
    row.get(key).and_then(Value::to_text)
}

fn count(rows: &[Row]) -> i64 {
    rows.first()
        .and_then(|r| r.values().next())
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

fn information_schema_descriptor(row: &Row) -> ColumnDescriptor {
    let is_primary_key = text(row, "key_type").is_some_and(|k| k == "PRI");
    ColumnDescriptor {
        name: text(row, "name").unwrap_or_default(),
        raw_type: text(row, "type").unwrap_or_default(),
        nullable: text(row, "nullable").is_some_and(|n| n.eq_ignore_ascii_case("YES")),
        default_value: text(row, "default_value"),
        max_length: row.get("max_length").and_then(Value::as_i64).and_then(|n| u64::try_from(n).ok()),
        is_primary_key,
        is_auto_increment: text(row, "extra").is_some_and(|e| e.to_ascii_lowercase().contains("auto_increment")),
    }
}

// SQLite reports the primary key ordinal in `pk`; an INTEGER PRIMARY KEY is a rowid alias and
// always auto-assigned.
fn sqlite_descriptor(row: &Row) -> ColumnDescriptor {
    let pk = row.get("pk").and_then(Value::as_i64).unwrap_or(0) > 0;
    ColumnDescriptor {
        name: text(row, "name").unwrap_or_default(),
        raw_type: text(row, "type").unwrap_or_default(),
        nullable: row.get("not_null").and_then(Value::as_i64).unwrap_or(0) == 0,
        default_value: text(row, "dflt_value"),
        max_length: None,
        is_primary_key: pk,
        is_auto_increment: pk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::{row, MockConnector};

    #[test]
    fn test_declared_length() {
        assert_eq!(ColumnDescriptor::new("title", "varchar(120)").declared_length(), Some(120));
        assert_eq!(ColumnDescriptor::new("price", "decimal(8,2)").declared_length(), Some(8));
        assert_eq!(ColumnDescriptor::new("body", "text").declared_length(), None);
        assert_eq!(
            ColumnDescriptor::new("code", "character varying").max_length(16).declared_length(),
            Some(16)
        );
    }

    #[test]
    fn test_mysql_columns() {
        let mock = MockConnector::new(Driver::MySql);
        mock.push_rows(vec![
            row([
                ("name", "id".into()),
                ("type", "int(11)".into()),
                ("nullable", "NO".into()),
                ("default_value", Value::Null),
                ("max_length", Value::Null),
                ("key_type", "PRI".into()),
                ("extra", "auto_increment".into()),
            ]),
            row([
                ("name", "title".into()),
                ("type", "varchar(255)".into()),
                ("nullable", "YES".into()),
                ("default_value", Value::Null),
                ("max_length", Value::Int(255)),
                ("key_type", "".into()),
                ("extra", "".into()),
            ]),
        ]);
        let mut db = mock.database();
        let columns = columns(&mut db, None, "posts");
        assert_eq!(columns.len(), 2);
        assert!(columns[0].is_primary_key && columns[0].is_auto_increment && !columns[0].nullable);
        assert_eq!(columns[1].max_length, Some(255));
        assert!(columns[1].nullable);
        assert_eq!(mock.calls()[0].params, vec![Value::from("posts")]);
    }

    #[test]
    fn test_sqlite_columns() {
        let mock = MockConnector::new(Driver::Sqlite);
        mock.push_rows(vec![
            row([
                ("name", "id".into()),
                ("type", "INTEGER".into()),
                ("not_null", Value::Int(0)),
                ("dflt_value", Value::Null),
                ("pk", Value::Int(1)),
            ]),
            row([
                ("name", "published".into()),
                ("type", "BOOLEAN".into()),
                ("not_null", Value::Int(1)),
                ("dflt_value", "0".into()),
                ("pk", Value::Int(0)),
            ]),
        ]);
        let mut db = mock.database();
        let columns = columns(&mut db, None, "posts");
        assert!(columns[0].is_primary_key && columns[0].is_auto_increment);
        assert!(!columns[1].nullable);
        assert_eq!(columns[1].default_value.as_deref(), Some("0"));
    }

    #[test]
    fn test_failures_degrade_to_empty() {
        let mock = MockConnector::new(Driver::Postgres);
        mock.fail_when("information_schema");
        let mut db = mock.database();
        assert!(columns(&mut db, None, "posts").is_empty());
        assert!(!table_exists(&mut db, None, "posts"));
    }

    #[test]
    fn test_table_exists() {
        let mock = MockConnector::new(Driver::Sqlite);
        mock.push_rows(vec![row([("count", Value::Int(1))])]);
        mock.push_rows(vec![row([("count", Value::Int(0))])]);
        let mut db = mock.database();
        assert!(table_exists(&mut db, None, "posts"));
        assert!(!table_exists(&mut db, None, "ghosts"));
    }

    #[test]
    fn test_unknown_connection_is_missing() {
        let mut db = MockConnector::new(Driver::Sqlite).database();
        assert!(!table_exists(&mut db, Some("reporting"), "posts"));
        assert!(columns(&mut db, Some("reporting"), "posts").is_empty());
    }
}
