use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use tracing::debug;

use crate::config::Driver;
use crate::connection::Database;
use crate::error::{Error, Result};
use crate::query_builder::util::bind_named_placeholders;
use crate::query_builder::page::{self, Page};
use crate::value::{Row, Value};

/// Comparison operators accepted by `where_op`, `having_op` and the `*_join_op` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "=" | "==" => Operator::Eq,
            "!=" | "<>" => Operator::NotEq,
            "<" => Operator::Lt,
            "<=" => Operator::Lte,
            ">" => Operator::Gt,
            ">=" => Operator::Gte,
            "LIKE" => Operator::Like,
            "NOT LIKE" => Operator::NotLike,
            other => return Err(Error::query(format!("Unsupported operator: {other}"))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("ASC"),
            Direction::Desc => f.write_str("DESC"),
        }
    }
}

/// Start a query against `name` on the default connection.
pub fn table(name: impl Into<String>) -> QueryExpression {
    QueryExpression::table(name)
}

/// An immutable description of a query. Every builder method consumes the expression and
/// returns an extended copy, so a base expression can be cloned and refined independently.
///
/// Values never appear in the SQL text. Each one is stored under a generated `:param_<n>` name
/// and rewritten to the connection's positional placeholder style when the query executes.
/// Identifiers (tables, columns, raw join columns) are emitted as given and must be trusted.
#[derive(Debug, Clone, PartialEq, Default)]
#[must_use]
pub struct QueryExpression {
    pub table: String,
    pub connection: Option<String>,
    pub select: Vec<String>,
    pub wheres: Vec<String>,
    pub joins: Vec<String>,
    pub orders: Vec<String>,
    pub groups: Vec<String>,
    pub havings: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub params: IndexMap<String, Value>,
}

impl QueryExpression {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            ..Self::default()
        }
    }

    /// Run against a named connection instead of the default one.
    pub fn connection(mut self, name: impl Into<String>) -> Self {
        self.connection = Some(name.into());
        self
    }

    /// Replace the select list. An empty list selects `*`.
    ///
    /// # Arguments
    /// * `columns` - Examples: `["id", "title"]`, `["posts.*", "users.name AS author"]`
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    fn bind(&mut self, value: Value) -> String {
        let name = format!("param_{}", self.params.len());
        self.params.insert(name.clone(), value);
        format!(":{name}")
    }

    /// Add `column = value`.
    pub fn where_(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_op(column, Operator::Eq, value)
    }

    /// Add `column <op> value`.
    pub fn where_op(mut self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        let placeholder = self.bind(value.into());
        self.wheres.push(format!("{column} {op} {placeholder}"));
        self
    }

    /// Add one equality condition per entry.
    pub fn where_all<I, K, V>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        conditions
            .into_iter()
            .fold(self, |q, (column, value)| q.where_(column.as_ref(), value))
    }

    /// Add `column IN (...)`. An empty list adds nothing.
    pub fn where_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_list(column, "IN", values)
    }

    /// Add `column NOT IN (...)`. An empty list adds nothing.
    pub fn where_not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_list(column, "NOT IN", values)
    }

    fn where_list<I, V>(mut self, column: &str, keyword: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let placeholders: Vec<String> = values.into_iter().map(|v| self.bind(v.into())).collect();
        if !placeholders.is_empty() {
            self.wheres.push(format!("{column} {keyword} ({})", placeholders.join(", ")));
        }
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.wheres.push(format!("{column} IS NULL"));
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        self.wheres.push(format!("{column} IS NOT NULL"));
        self
    }

    pub fn where_like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.where_op(column, Operator::Like, pattern)
    }

    fn push_join(mut self, kind: &str, table: &str, first: &str, op: Operator, second: &str) -> Self {
        self.joins.push(format!("{kind} {table} ON {first} {op} {second}"));
        self
    }

    /// Add `INNER JOIN table ON first = second`. Both sides are column references.
    pub fn join(self, table: &str, first: &str, second: &str) -> Self {
        self.push_join("INNER JOIN", table, first, Operator::Eq, second)
    }

    pub fn join_op(self, table: &str, first: &str, op: Operator, second: &str) -> Self {
        self.push_join("INNER JOIN", table, first, op, second)
    }

    pub fn left_join(self, table: &str, first: &str, second: &str) -> Self {
        self.push_join("LEFT JOIN", table, first, Operator::Eq, second)
    }

    pub fn left_join_op(self, table: &str, first: &str, op: Operator, second: &str) -> Self {
        self.push_join("LEFT JOIN", table, first, op, second)
    }

    pub fn right_join(self, table: &str, first: &str, second: &str) -> Self {
        self.push_join("RIGHT JOIN", table, first, Operator::Eq, second)
    }

    pub fn right_join_op(self, table: &str, first: &str, op: Operator, second: &str) -> Self {
        self.push_join("RIGHT JOIN", table, first, op, second)
    }

    /// Add an ORDER BY clause to the query.
    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.orders.push(format!("{column} {direction}"));
        self
    }

    pub fn order_asc(self, column: &str) -> Self {
        self.order_by(column, Direction::Asc)
    }

    pub fn order_desc(self, column: &str) -> Self {
        self.order_by(column, Direction::Desc)
    }

    /// Add columns to the GROUP BY clause.
    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Add `column = value` to the HAVING clause.
    pub fn having(self, column: &str, value: impl Into<Value>) -> Self {
        self.having_op(column, Operator::Eq, value)
    }

    pub fn having_op(mut self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        let placeholder = self.bind(value.into());
        self.havings.push(format!("{column} {op} {placeholder}"));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set limit and offset in one call.
    pub fn limit_offset(self, limit: u64, offset: u64) -> Self {
        self.limit(limit).offset(offset)
    }

    fn where_sql(&self) -> String {
        if self.wheres.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.wheres.join(" AND "))
        }
    }

    /// The SELECT statement with named placeholders.
    pub fn to_sql(&self) -> String {
        let columns = if self.select.is_empty() {
            "*".to_string()
        } else {
            self.select.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {}", self.table);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        sql.push_str(&self.where_sql());
        if !self.groups.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.groups.join(", ")));
        }
        if !self.havings.is_empty() {
            sql.push_str(&format!(" HAVING {}", self.havings.join(" AND ")));
        }
        if !self.orders.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.orders.join(", ")));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = self.offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }
        sql
    }

    /// The UPDATE statement with named placeholders. Assigned values are bound as `:set_<column>`.
    pub fn update_sql(&self, data: &Row) -> Result<(String, IndexMap<String, Value>)> {
        if self.wheres.is_empty() {
            return Err(Error::query(format!(
                "missing WHERE: refusing to UPDATE every row of {}",
                self.table
            )));
        }
        if data.is_empty() {
            return Err(Error::query(format!("No columns given to UPDATE on {}", self.table)));
        }
        let mut params = IndexMap::with_capacity(data.len() + self.params.len());
        let assignments: Vec<String> = data
            .iter()
            .map(|(column, value)| {
                params.insert(format!("set_{column}"), value.clone());
                format!("{column} = :set_{column}")
            })
            .collect();
        params.extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        let sql = format!("UPDATE {} SET {}{}", self.table, assignments.join(", "), self.where_sql());
        Ok((sql, params))
    }

    /// The DELETE statement with named placeholders.
    pub fn delete_sql(&self) -> Result<String> {
        if self.wheres.is_empty() {
            return Err(Error::query(format!(
                "missing WHERE: refusing to DELETE every row of {}",
                self.table
            )));
        }
        Ok(format!("DELETE FROM {}{}", self.table, self.where_sql()))
    }

    /// Positional SQL and its arguments for `driver`.
    pub fn compile(&self, driver: &Driver) -> Result<(String, Vec<Value>)> {
        bind_named_placeholders(&self.to_sql(), &self.params, &mut driver.placeholder())
    }

    /// Fetch every matching row.
    pub fn get(&self, db: &mut Database) -> Result<Vec<Row>> {
        let conn = db.connection(self.connection.as_deref())?;
        let (sql, args) = self.compile(conn.driver())?;
        debug!(%sql, "select");
        conn.fetch_all(&sql, &args)
    }

    /// Fetch the first matching row. Does not mutate `self`.
    pub fn first(&self, db: &mut Database) -> Result<Option<Row>> {
        let rows = self.clone().limit(1).get(db)?;
        Ok(rows.into_iter().next())
    }

    /// Count matching rows. Ordering, limit and offset are ignored.
    pub fn count(&self, db: &mut Database) -> Result<u64> {
        let mut counting = self.clone().select(["COUNT(*) AS count"]);
        counting.orders.clear();
        counting.limit = None;
        counting.offset = None;
        let row = counting.first(db)?;
        let count = row
            .as_ref()
            .and_then(|r| r.get("count").or_else(|| r.values().next()))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(count.max(0) as u64)
    }

    pub fn exists(&self, db: &mut Database) -> Result<bool> {
        Ok(self.count(db)? > 0)
    }

    /// Fetch one page. `page` is clamped to at least 1.
    pub fn paginate(&self, db: &mut Database, page: u64, per_page: u64) -> Result<Page> {
        if per_page == 0 {
            return Err(Error::query("per_page must be greater than zero"));
        }
        let page = page.max(1);
        let total = self.count(db)?;
        let offset = page::offset(page, per_page);
        let data = self.clone().limit_offset(per_page, offset).get(db)?;
        Ok(Page::new(data, page, per_page, total))
    }

    /// Update matching rows, returning the number affected. Requires at least one condition.
    pub fn update(&self, db: &mut Database, data: &Row) -> Result<u64> {
        let (sql, params) = self.update_sql(data)?;
        let conn = db.connection(self.connection.as_deref())?;
        let (sql, args) = bind_named_placeholders(&sql, &params, &mut conn.driver().placeholder())?;
        debug!(%sql, "update");
        Ok(conn.execute(&sql, &args)?.rows_affected)
    }

    /// Delete matching rows, returning the number affected. Requires at least one condition.
    pub fn delete(&self, db: &mut Database) -> Result<u64> {
        let sql = self.delete_sql()?;
        let conn = db.connection(self.connection.as_deref())?;
        let (sql, args) = bind_named_placeholders(&sql, &self.params, &mut conn.driver().placeholder())?;
        debug!(%sql, "delete");
        Ok(conn.execute(&sql, &args)?.rows_affected)
    }
}
