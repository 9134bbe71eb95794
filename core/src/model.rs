//! A table-bound ORM layer over [`QueryExpression`].
//!
//! A [`Model`] is described by a [`ModelConfig`]: table, primary key, mass-assignable
//! (`fillable`) columns, hidden columns, per-column casts, timestamp handling and relations.
//! Rows stay untyped [`Row`]s; casts normalize their values on the way out.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use tracing::debug;

use crate::connection::Database;
use crate::error::{Error, Result};
use crate::query_builder::{Page, QueryExpression};
use crate::value::{self, Row, Value};

/// How a column's value is normalized when a row is cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    Int,
    Float,
    Bool,
    Json,
    Date,
    DateTime,
}

impl Cast {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cast::Int => "int",
            Cast::Float => "float",
            Cast::Bool => "boolean",
            Cast::Json => "json",
            Cast::Date => "date",
            Cast::DateTime => "datetime",
        }
    }

    /// Coerce one value. Nulls are left alone.
    pub fn apply(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(value);
        }
        Ok(match self {
            Cast::Int => Value::Int(value.as_i64().or_else(|| value.as_f64().map(|f| f as i64)).unwrap_or(0)),
            Cast::Float => Value::Float(value.as_f64().unwrap_or(0.0)),
            Cast::Bool => Value::Bool(value.as_bool().unwrap_or(false)),
            Cast::Json => match value {
                Value::Json(_) => value,
                other => match other.as_str() {
                    Some(s) => serde_json::from_str(s).map(Value::Json).unwrap_or(Value::Null),
                    None => Value::Null,
                },
            },
            Cast::Date => match value.as_datetime() {
                Some(dt) => Value::Text(value::format_date(dt.date())?),
                None => value,
            },
            Cast::DateTime => match value.as_datetime() {
                Some(dt) => Value::Text(value::format_datetime(dt)?),
                None => value,
            },
        })
    }
}

impl fmt::Display for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cast {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "int" | "integer" => Cast::Int,
            "float" | "double" | "real" => Cast::Float,
            "bool" | "boolean" => Cast::Bool,
            "json" | "array" => Cast::Json,
            "date" => Cast::Date,
            "datetime" | "timestamp" => Cast::DateTime,
            other => return Err(Error::ConfigError(format!("Unknown cast: {other}"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// This table holds `foreign_key`, pointing at `owner_key` of `table`.
    BelongsTo {
        table: String,
        foreign_key: String,
        owner_key: String,
    },
    /// `table` holds `foreign_key`, pointing at this table's primary key.
    HasMany { table: String, foreign_key: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    pub timestamps: bool,
    pub created_at: String,
    pub updated_at: String,
    pub connection: Option<String>,
    pub fillable: Vec<String>,
    pub hidden: Vec<String>,
    pub casts: IndexMap<String, Cast>,
    pub relations: IndexMap<String, Relation>,
}

impl ModelConfig {
    /// A model named `name` over the table `<name>s`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: format!("{}s", name.to_lowercase()),
            name,
            primary_key: "id".to_string(),
            timestamps: true,
            created_at: "created_at".to_string(),
            updated_at: "updated_at".to_string(),
            connection: None,
            fillable: Vec::new(),
            hidden: Vec::new(),
            casts: IndexMap::new(),
            relations: IndexMap::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn timestamp_columns(mut self, created_at: impl Into<String>, updated_at: impl Into<String>) -> Self {
        self.created_at = created_at.into();
        self.updated_at = updated_at.into();
        self
    }

    pub fn connection(mut self, name: impl Into<String>) -> Self {
        self.connection = Some(name.into());
        self
    }

    /// Columns that `create` and `update` accept. Anything else in the input is dropped.
    pub fn fillable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fillable = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Columns removed from cast rows.
    pub fn hidden<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn cast(mut self, column: impl Into<String>, cast: Cast) -> Self {
        self.casts.insert(column.into(), cast);
        self
    }

    pub fn belongs_to(mut self, name: impl Into<String>, table: &str, foreign_key: &str, owner_key: &str) -> Self {
        self.relations.insert(
            name.into(),
            Relation::BelongsTo {
                table: table.to_string(),
                foreign_key: foreign_key.to_string(),
                owner_key: owner_key.to_string(),
            },
        );
        self
    }

    pub fn has_many(mut self, name: impl Into<String>, table: &str, foreign_key: &str) -> Self {
        self.relations.insert(
            name.into(),
            Relation::HasMany {
                table: table.to_string(),
                foreign_key: foreign_key.to_string(),
            },
        );
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    config: ModelConfig,
}

impl Model {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// A fresh query over this model's table and connection.
    pub fn query(&self) -> QueryExpression {
        let query = QueryExpression::table(&self.config.table);
        match &self.config.connection {
            Some(name) => query.connection(name),
            None => query,
        }
    }

    pub fn find(&self, db: &mut Database, id: impl Into<Value>) -> Result<Option<Row>> {
        self.query()
            .where_(&self.config.primary_key, id)
            .first(db)?
            .map(|row| self.cast(row))
            .transpose()
    }

    pub fn find_or_fail(&self, db: &mut Database, id: impl Into<Value>) -> Result<Row> {
        let id = id.into();
        self.find(db, id.clone())?
            .ok_or_else(|| Error::query(format!("No {} found with ID: {}", self.config.name, id)))
    }

    pub fn find_by(&self, db: &mut Database, column: &str, value: impl Into<Value>) -> Result<Option<Row>> {
        self.query()
            .where_(column, value)
            .first(db)?
            .map(|row| self.cast(row))
            .transpose()
    }

    pub fn all(&self, db: &mut Database) -> Result<Vec<Row>> {
        self.cast_all(self.query().get(db)?)
    }

    /// A query with one equality condition per entry.
    pub fn where_<I, K, V>(&self, conditions: I) -> QueryExpression
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.query().where_all(conditions)
    }

    fn fill(&self, data: Row) -> Row {
        data.into_iter()
            .filter(|(column, _)| self.config.fillable.contains(column))
            .collect()
    }

    /// Insert the fillable subset of `data` and return the stored row.
    pub fn create(&self, db: &mut Database, data: Row) -> Result<Option<Row>> {
        let mut data = self.fill(data);
        if self.config.timestamps {
            let now = Value::DateTime(value::now_utc());
            data.insert(self.config.created_at.clone(), now.clone());
            data.insert(self.config.updated_at.clone(), now);
        }
        let connection = self.config.connection.as_deref();
        let id = db.insert(connection, &self.config.table, &data, &self.config.primary_key)?;
        debug!(model = %self.config.name, ?id, "created");
        match id {
            Some(id) => self.find(db, id),
            None => Ok(None),
        }
    }

    /// Update the fillable subset of `data` on one row and return it.
    pub fn update(&self, db: &mut Database, id: impl Into<Value>, data: Row) -> Result<Option<Row>> {
        let id = id.into();
        let mut data = self.fill(data);
        if self.config.timestamps {
            data.insert(self.config.updated_at.clone(), Value::DateTime(value::now_utc()));
        }
        let affected = self
            .query()
            .where_(&self.config.primary_key, id.clone())
            .update(db, &data)?;
        if affected == 0 {
            return Ok(None);
        }
        self.find(db, id)
    }

    pub fn delete(&self, db: &mut Database, id: impl Into<Value>) -> Result<u64> {
        self.query().where_(&self.config.primary_key, id).delete(db)
    }

    /// Update when `data` carries a non-blank primary key, create otherwise.
    pub fn save(&self, db: &mut Database, mut data: Row) -> Result<Option<Row>> {
        match data.shift_remove(&self.config.primary_key) {
            Some(id) if !id.is_blank() => self.update(db, id, data),
            _ => self.create(db, data),
        }
    }

    /// A query that left-joins the named `belongs_to` relations. Unknown names and `has_many`
    /// relations are skipped. The select list defaults to this table's columns.
    pub fn with(&self, relations: &[&str]) -> QueryExpression {
        let table = &self.config.table;
        let mut query = self.query().select([format!("{table}.*")]);
        for name in relations {
            match self.config.relations.get(*name) {
                Some(Relation::BelongsTo {
                    table: related,
                    foreign_key,
                    owner_key,
                }) => {
                    query = query.left_join(related, &format!("{table}.{foreign_key}"), &format!("{related}.{owner_key}"));
                }
                Some(Relation::HasMany { .. }) => {}
                None => debug!(relation = %name, model = %self.config.name, "unknown relation"),
            }
        }
        query
    }

    /// Drop hidden columns and apply casts.
    pub fn cast(&self, row: Row) -> Result<Row> {
        row.into_iter()
            .filter(|(column, _)| !self.config.hidden.contains(column))
            .map(|(column, value)| {
                let value = match self.config.casts.get(&column) {
                    Some(cast) => cast.apply(value)?,
                    None => value,
                };
                Ok((column, value))
            })
            .collect()
    }

    fn cast_all(&self, rows: Vec<Row>) -> Result<Vec<Row>> {
        rows.into_iter().map(|row| self.cast(row)).collect()
    }

    pub fn count(&self, db: &mut Database, conditions: &Row) -> Result<u64> {
        self.where_(conditions).count(db)
    }

    /// One page of cast rows, newest primary key first.
    pub fn paginate(&self, db: &mut Database, page: u64, per_page: u64, conditions: &Row) -> Result<Page> {
        let mut page = self
            .where_(conditions)
            .order_desc(&self.config.primary_key)
            .paginate(db, page, per_page)?;
        page.data = self.cast_all(std::mem::take(&mut page.data))?;
        Ok(page)
    }

    /// Visit matching rows in primary-key order, `size` at a time. Stops when `f` returns an error.
    pub fn chunk<F>(&self, db: &mut Database, size: u64, conditions: &Row, mut f: F) -> Result<()>
    where
        F: FnMut(Vec<Row>) -> Result<()>,
    {
        if size == 0 {
            return Err(Error::query("chunk size must be greater than zero"));
        }
        let base = self.where_(conditions).order_asc(&self.config.primary_key);
        let mut offset = 0;
        loop {
            let rows = base.clone().limit_offset(size, offset).get(db)?;
            let fetched = rows.len() as u64;
            if fetched == 0 {
                break;
            }
            f(self.cast_all(rows)?)?;
            if fetched < size {
                break;
            }
            offset += size;
        }
        Ok(())
    }

    /// Run raw SQL with `?` placeholders on this model's connection.
    pub fn raw(&self, db: &mut Database, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        db.query(self.config.connection.as_deref(), sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Driver;
    use crate::connection::mock::{row, MockConnector};
    use assert_matches::assert_matches;

    fn posts() -> Model {
        Model::new(
            ModelConfig::new("post")
                .fillable(["title", "published"])
                .hidden(["secret"])
                .cast("id", Cast::Int)
                .cast("published", Cast::Bool)
                .cast("created_at", Cast::DateTime)
                .belongs_to("author", "users", "user_id", "id")
                .has_many("comments", "comments", "post_id"),
        )
    }

    #[test]
    fn test_defaults() {
        let config = ModelConfig::new("Post");
        assert_eq!(config.table, "posts");
        assert_eq!(config.primary_key, "id");
        assert!(config.timestamps);
    }

    #[test]
    fn test_cast_row() -> Result<()> {
        let cast = posts().cast(row([
            ("id", "7".into()),
            ("published", Value::Int(1)),
            ("secret", "hunter2".into()),
            ("created_at", "2024-03-05T14:30:00".into()),
            ("title", Value::Null),
        ]))?;
        assert_eq!(cast["id"], Value::Int(7));
        assert_eq!(cast["published"], Value::Bool(true));
        assert_eq!(cast["created_at"], Value::from("2024-03-05 14:30:00"));
        assert_eq!(cast["title"], Value::Null);
        assert!(!cast.contains_key("secret"));
        Ok(())
    }

    #[test]
    fn test_cast_values() -> Result<()> {
        assert_eq!(Cast::Json.apply(r#"{"a":1}"#.into())?, Value::Json(serde_json::json!({"a": 1})));
        assert_eq!(Cast::Json.apply("not json".into())?, Value::Null);
        assert_eq!(Cast::Date.apply("2024-03-05 14:30:00".into())?, Value::from("2024-03-05"));
        let stamped = value::parse_datetime("2024-03-05 14:30:00").map(Value::DateTime).unwrap();
        assert_eq!(Cast::DateTime.apply(stamped)?, Value::from("2024-03-05 14:30:00"));
        assert_eq!(Cast::Float.apply("2.5".into())?, Value::Float(2.5));
        assert_eq!(Cast::Int.apply("abc".into())?, Value::Int(0));
        assert_eq!("boolean".parse::<Cast>()?, Cast::Bool);
        Ok(())
    }

    #[test]
    fn test_create_filters_and_stamps() -> Result<()> {
        let mock = MockConnector::new(Driver::Sqlite);
        let mut db = mock.database();
        posts().create(
            &mut db,
            row([("title", "Hello".into()), ("is_admin", Value::Bool(true))]),
        )?;
        let insert = &mock.calls()[0];
        assert_eq!(
            insert.sql,
            "INSERT INTO posts (title, created_at, updated_at) VALUES (?, ?, ?)"
        );
        assert_eq!(insert.params[0], Value::from("Hello"));
        assert_matches!(insert.params[1], Value::DateTime(_));
        assert_eq!(insert.params[1], insert.params[2]);
        assert_eq!(mock.calls()[1].sql, "SELECT * FROM posts WHERE id = ? LIMIT 1");
        Ok(())
    }

    #[test]
    fn test_save_dispatches_on_primary_key() -> Result<()> {
        let mock = MockConnector::new(Driver::MySql);
        let mut db = mock.database();
        posts().save(&mut db, row([("id", Value::Int(4)), ("title", "Edited".into())]))?;
        assert!(mock.sql()[0].starts_with("UPDATE posts SET title = ?, updated_at = ? WHERE id = ?"));
        posts().save(&mut db, row([("id", "".into()), ("title", "New".into())]))?;
        assert!(mock.sql().iter().any(|s| s.starts_with("INSERT INTO posts")));
        Ok(())
    }

    #[test]
    fn test_find_or_fail() {
        let mut db = MockConnector::new(Driver::Sqlite).database();
        assert_matches!(
            posts().find_or_fail(&mut db, 3),
            Err(Error::QueryError(m)) if m == "No post found with ID: 3"
        );
    }

    #[test]
    fn test_with_joins_belongs_to_only() {
        let q = posts().with(&["author", "comments", "missing"]);
        assert_eq!(
            q.to_sql(),
            "SELECT posts.* FROM posts LEFT JOIN users ON posts.user_id = users.id"
        );
    }

    #[test]
    fn test_paginate_orders_newest_first() -> Result<()> {
        let mock = MockConnector::new(Driver::Sqlite);
        mock.push_rows(vec![row([("count", Value::Int(3))])]);
        mock.push_rows(vec![row([("id", Value::Int(3))]), row([("id", Value::Int(2))])]);
        let mut db = mock.database();
        let page = posts().paginate(&mut db, 1, 2, &Row::new())?;
        assert_eq!(page.total, 3);
        assert_eq!(page.last_page, 2);
        assert_eq!(page.data.len(), 2);
        assert_eq!(
            mock.sql()[1],
            "SELECT * FROM posts ORDER BY id DESC LIMIT 2 OFFSET 0"
        );
        Ok(())
    }

    #[test]
    fn test_chunk() -> Result<()> {
        let mock = MockConnector::new(Driver::Sqlite);
        mock.push_rows(vec![row([("id", Value::Int(1))]), row([("id", Value::Int(2))])]);
        mock.push_rows(vec![row([("id", Value::Int(3))])]);
        let mut db = mock.database();
        let mut seen = Vec::new();
        posts().chunk(&mut db, 2, &Row::new(), |rows| {
            seen.push(rows.len());
            Ok(())
        })?;
        assert_eq!(seen, vec![2, 1]);
        assert_eq!(mock.sql().len(), 2);
        Ok(())
    }
}
