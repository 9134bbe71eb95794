//! Dialect-aware DDL for migrations: CREATE TABLE, ALTER TABLE and DROP TABLE.

use crate::config::Driver;
use crate::connection::Connection;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Auto-incrementing integer primary key.
    Increments,
    String(u32),
    Text,
    Integer,
    BigInteger,
    Float,
    Decimal(u8, u8),
    Boolean,
    Date,
    DateTime,
    Timestamp,
    Json,
    /// A type written out verbatim, e.g. one read back from introspection.
    Raw(String),
}

impl ColumnType {
    pub fn to_sql(&self, driver: &Driver) -> String {
        use ColumnType::*;
        match self {
            Increments => match driver {
                Driver::MySql => "INT UNSIGNED".to_string(),
                Driver::Postgres => "SERIAL".to_string(),
                _ => "INTEGER".to_string(),
            },
            String(len) => format!("VARCHAR({len})"),
            Text => "TEXT".to_string(),
            Integer => "INTEGER".to_string(),
            BigInteger => "BIGINT".to_string(),
            Float => match driver {
                Driver::Sqlite => "REAL".to_string(),
                Driver::Postgres => "DOUBLE PRECISION".to_string(),
                _ => "DOUBLE".to_string(),
            },
            Decimal(precision, scale) => format!("DECIMAL({precision},{scale})"),
            Boolean => "BOOLEAN".to_string(),
            Date => "DATE".to_string(),
            DateTime => match driver {
                Driver::Postgres => "TIMESTAMP".to_string(),
                _ => "DATETIME".to_string(),
            },
            Timestamp => "TIMESTAMP".to_string(),
            Json => match driver {
                Driver::MySql => "JSON".to_string(),
                Driver::Postgres => "JSONB".to_string(),
                _ => "TEXT".to_string(),
            },
            Raw(sql) => sql.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    CurrentTimestamp,
    /// A literal, rendered as a quoted string.
    Literal(String),
    /// An SQL expression, rendered verbatim.
    Expression(String),
}

impl DefaultValue {
    fn to_sql(&self) -> String {
        match self {
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
            DefaultValue::Literal(s) => format!("'{}'", s.replace('\'', "''")),
            DefaultValue::Expression(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub unique: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            nullable: ty != ColumnType::Increments,
            ty,
            default: None,
            unique: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn to_sql(&self, driver: &Driver) -> String {
        let ty = self.ty.to_sql(driver);
        if self.ty == ColumnType::Increments {
            return match driver {
                Driver::MySql => format!("{} {ty} NOT NULL AUTO_INCREMENT PRIMARY KEY", self.name),
                Driver::Postgres => format!("{} {ty} PRIMARY KEY", self.name),
                _ => format!("{} {ty} PRIMARY KEY AUTOINCREMENT", self.name),
            };
        }
        let mut sql = format!("{} {ty}", self.name);
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl Index {
    fn new(table: &str, columns: &[&str], unique: bool) -> Self {
        let suffix = if unique { "unique" } else { "index" };
        Self {
            name: format!("{table}_{}_{suffix}", columns.join("_")),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique,
        }
    }

    fn to_sql(&self, table: &str) -> String {
        let unique = if self.unique { "UNIQUE " } else { "" };
        format!("CREATE {unique}INDEX {} ON {table} ({})", self.name, self.columns.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
    pub on_delete: Option<String>,
}

/// A CREATE TABLE statement under construction. Modifiers such as [`not_null`](Self::not_null)
/// apply to the most recently added column.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct TableBuilder {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    pub if_not_exists: bool,
}

impl TableBuilder {
    pub fn create(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            if_not_exists: false,
        }
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    fn add(self, name: &str, ty: ColumnType) -> Self {
        self.column(ColumnDef::new(name, ty))
    }

    /// An `id` auto-incrementing primary key.
    pub fn id(self) -> Self {
        self.increments("id")
    }

    pub fn increments(self, name: &str) -> Self {
        self.add(name, ColumnType::Increments)
    }

    /// A `VARCHAR(255)` column.
    pub fn string(self, name: &str) -> Self {
        self.string_len(name, 255)
    }

    pub fn string_len(self, name: &str, len: u32) -> Self {
        self.add(name, ColumnType::String(len))
    }

    pub fn text(self, name: &str) -> Self {
        self.add(name, ColumnType::Text)
    }

    pub fn integer(self, name: &str) -> Self {
        self.add(name, ColumnType::Integer)
    }

    pub fn big_integer(self, name: &str) -> Self {
        self.add(name, ColumnType::BigInteger)
    }

    pub fn float(self, name: &str) -> Self {
        self.add(name, ColumnType::Float)
    }

    pub fn decimal(self, name: &str, precision: u8, scale: u8) -> Self {
        self.add(name, ColumnType::Decimal(precision, scale))
    }

    pub fn boolean(self, name: &str) -> Self {
        self.add(name, ColumnType::Boolean)
    }

    pub fn date(self, name: &str) -> Self {
        self.add(name, ColumnType::Date)
    }

    pub fn datetime(self, name: &str) -> Self {
        self.add(name, ColumnType::DateTime)
    }

    pub fn timestamp(self, name: &str) -> Self {
        self.add(name, ColumnType::Timestamp)
    }

    pub fn json(self, name: &str) -> Self {
        self.add(name, ColumnType::Json)
    }

    /// `created_at` and `updated_at`, both defaulting to the current time.
    pub fn timestamps(self) -> Self {
        self.datetime("created_at")
            .use_current()
            .datetime("updated_at")
            .use_current()
    }

    fn modify_last(mut self, f: impl FnOnce(ColumnDef) -> ColumnDef) -> Self {
        if let Some(last) = self.columns.pop() {
            self.columns.push(f(last));
        }
        self
    }

    pub fn nullable(self) -> Self {
        self.modify_last(ColumnDef::nullable)
    }

    pub fn not_null(self) -> Self {
        self.modify_last(ColumnDef::not_null)
    }

    /// Default to a literal value.
    pub fn default(self, value: impl Into<String>) -> Self {
        let value = DefaultValue::Literal(value.into());
        self.modify_last(|c| c.default(value))
    }

    /// Default to an SQL expression, written verbatim.
    pub fn default_expr(self, sql: impl Into<String>) -> Self {
        let value = DefaultValue::Expression(sql.into());
        self.modify_last(|c| c.default(value))
    }

    pub fn use_current(self) -> Self {
        self.modify_last(|c| c.default(DefaultValue::CurrentTimestamp))
    }

    pub fn unique(self) -> Self {
        self.modify_last(ColumnDef::unique)
    }

    pub fn index(mut self, columns: &[&str]) -> Self {
        let index = Index::new(&self.table, columns, false);
        self.indexes.push(index);
        self
    }

    pub fn unique_index(mut self, columns: &[&str]) -> Self {
        let index = Index::new(&self.table, columns, true);
        self.indexes.push(index);
        self
    }

    pub fn foreign(mut self, column: &str, references_table: &str, references_column: &str) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.to_string(),
            references_table: references_table.to_string(),
            references_column: references_column.to_string(),
            on_delete: None,
        });
        self
    }

    /// Set the ON DELETE action of the most recent foreign key, e.g. `CASCADE`.
    pub fn on_delete(mut self, action: &str) -> Self {
        if let Some(fk) = self.foreign_keys.last_mut() {
            fk.on_delete = Some(action.to_string());
        }
        self
    }

    /// The CREATE TABLE statement followed by any CREATE INDEX statements.
    pub fn to_sql(&self, driver: &Driver) -> Vec<String> {
        let mut lines: Vec<String> = self.columns.iter().map(|c| c.to_sql(driver)).collect();
        for fk in &self.foreign_keys {
            let mut line = format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                fk.column, fk.references_table, fk.references_column
            );
            if let Some(action) = &fk.on_delete {
                line.push_str(&format!(" ON DELETE {action}"));
            }
            lines.push(line);
        }
        let if_not_exists = if self.if_not_exists { "IF NOT EXISTS " } else { "" };
        let mut statements = vec![format!(
            "CREATE TABLE {if_not_exists}{} (\n    {}\n)",
            self.table,
            lines.join(",\n    ")
        )];
        statements.extend(self.indexes.iter().map(|i| i.to_sql(&self.table)));
        statements
    }

    pub fn execute(&self, conn: &mut dyn Connection) -> Result<()> {
        for statement in self.to_sql(conn.driver()) {
            conn.execute_batch(&statement)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterOp {
    AddColumn(ColumnDef),
    DropColumn(String),
    RenameColumn { from: String, to: String },
    ModifyColumn(ColumnDef),
    AddIndex(Index),
    DropIndex(String),
}

/// A sequence of ALTER TABLE operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct AlterTable {
    pub table: String,
    pub ops: Vec<AlterOp>,
}

impl AlterTable {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ops: Vec::new(),
        }
    }

    pub fn add_column(mut self, column: ColumnDef) -> Self {
        self.ops.push(AlterOp::AddColumn(column));
        self
    }

    pub fn drop_column(mut self, name: &str) -> Self {
        self.ops.push(AlterOp::DropColumn(name.to_string()));
        self
    }

    pub fn rename_column(mut self, from: &str, to: &str) -> Self {
        self.ops.push(AlterOp::RenameColumn {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    pub fn modify_column(mut self, column: ColumnDef) -> Self {
        self.ops.push(AlterOp::ModifyColumn(column));
        self
    }

    pub fn index(mut self, columns: &[&str]) -> Self {
        let index = Index::new(&self.table, columns, false);
        self.ops.push(AlterOp::AddIndex(index));
        self
    }

    pub fn drop_index(mut self, name: &str) -> Self {
        self.ops.push(AlterOp::DropIndex(name.to_string()));
        self
    }

    /// One statement per operation. SQLite cannot modify a column in place.
    pub fn to_sql(&self, driver: &Driver) -> Result<Vec<String>> {
        let table = &self.table;
        self.ops
            .iter()
            .map(|op| {
                Ok(match op {
                    AlterOp::AddColumn(c) => format!("ALTER TABLE {table} ADD COLUMN {}", c.to_sql(driver)),
                    AlterOp::DropColumn(name) => format!("ALTER TABLE {table} DROP COLUMN {name}"),
                    AlterOp::RenameColumn { from, to } => {
                        format!("ALTER TABLE {table} RENAME COLUMN {from} TO {to}")
                    }
                    AlterOp::ModifyColumn(c) => match driver {
                        Driver::MySql => format!("ALTER TABLE {table} MODIFY COLUMN {}", c.to_sql(driver)),
                        Driver::Postgres => {
                            let null = if c.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
                            format!(
                                "ALTER TABLE {table} ALTER COLUMN {name} TYPE {ty}, ALTER COLUMN {name} {null}",
                                name = c.name,
                                ty = c.ty.to_sql(driver),
                            )
                        }
                        _ => {
                            return Err(Error::query(format!(
                                "{} cannot modify column {} in place",
                                driver.name(),
                                c.name
                            )))
                        }
                    },
                    AlterOp::AddIndex(index) => index.to_sql(table),
                    AlterOp::DropIndex(name) => match driver {
                        Driver::MySql => format!("DROP INDEX {name} ON {table}"),
                        _ => format!("DROP INDEX {name}"),
                    },
                })
            })
            .collect()
    }

    pub fn execute(&self, conn: &mut dyn Connection) -> Result<()> {
        for statement in self.to_sql(conn.driver())? {
            conn.execute_batch(&statement)?;
        }
        Ok(())
    }
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {table}")
}
