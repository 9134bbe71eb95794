use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::{ConnectionConfig, DatabaseConfig, Driver};
use crate::error::{Error, Result};
use crate::query_builder::util::replace_placeholders;
use crate::query_builder::QueryExpression;
use crate::value::{Row, Value};

mod driver;

pub use driver::SqlxConnector;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// An open handle to one database. Statements use the driver's positional placeholder style.
pub trait Connection {
    fn driver(&self) -> &Driver;

    fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult>;

    /// Run one or more `;`-separated statements without parameters.
    fn execute_batch(&mut self, sql: &str) -> Result<()>;

    fn begin(&mut self) -> Result<()> {
        self.execute_batch("BEGIN")
    }

    fn commit(&mut self) -> Result<()> {
        self.execute_batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.execute_batch("ROLLBACK")
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Opens connections from their configuration.
pub trait Connector {
    fn open(&self, name: &str, config: &ConnectionConfig) -> Result<Box<dyn Connection>>;
}

/// Registry of named connections. Handles are opened lazily on first use and cached until
/// closed or until the registry is reconfigured.
pub struct Database {
    config: DatabaseConfig,
    connector: Box<dyn Connector>,
    connections: IndexMap<String, Box<dyn Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("open", &self.connections.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Database {
    /// A registry backed by sqlx.
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        Ok(Self::with_connector(config, SqlxConnector::new()?))
    }

    pub fn with_connector(config: DatabaseConfig, connector: impl Connector + 'static) -> Self {
        Self {
            config,
            connector: Box::new(connector),
            connections: IndexMap::new(),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Replace every connection definition. Open handles are closed.
    pub fn configure(&mut self, config: DatabaseConfig) {
        self.close_all();
        self.config = config;
    }

    pub fn resolve_name(&self, name: Option<&str>) -> String {
        name.unwrap_or(&self.config.default).to_string()
    }

    /// The driver a connection is configured with, without opening it.
    pub fn driver(&self, name: Option<&str>) -> Result<Driver> {
        let name = self.resolve_name(name);
        self.config
            .connections
            .get(&name)
            .map(|c| c.driver.clone())
            .ok_or_else(|| Error::connection(name, "connection is not configured"))
    }

    /// Get the named connection (or the default), opening it on first use.
    pub fn connection(&mut self, name: Option<&str>) -> Result<&mut dyn Connection> {
        let name = self.resolve_name(name);
        if !self.connections.contains_key(&name) {
            let config = self
                .config
                .connections
                .get(&name)
                .ok_or_else(|| Error::connection(name.clone(), "connection is not configured"))?;
            debug!(connection = %name, driver = config.driver.name(), "opening connection");
            let conn = self.connector.open(&name, config).map_err(|e| match e {
                Error::ConnectionError { .. } => e,
                other => Error::connection(name.clone(), other),
            })?;
            self.connections.insert(name.clone(), conn);
        }
        self.connections
            .get_mut(&name)
            .map(|c| -> &mut dyn Connection { c.as_mut() })
            .ok_or_else(|| Error::connection(name, "connection was not cached"))
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    pub fn close(&mut self, name: &str) {
        if let Some(conn) = self.connections.shift_remove(name) {
            if let Err(e) = conn.close() {
                warn!(connection = name, error = %e, "failed to close connection");
            }
        }
    }

    pub fn close_all(&mut self) {
        for (name, conn) in self.connections.drain(..) {
            if let Err(e) = conn.close() {
                warn!(connection = %name, error = %e, "failed to close connection");
            }
        }
    }

    /// Run a raw query with `?` placeholders, rewritten for the connection's driver.
    pub fn query(&mut self, connection: Option<&str>, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let conn = self.connection(connection)?;
        let sql = positional(conn.driver(), sql, params)?;
        debug!(%sql, "query");
        conn.fetch_all(&sql, params)
    }

    /// Run a raw statement with `?` placeholders, rewritten for the connection's driver.
    pub fn execute(&mut self, connection: Option<&str>, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let conn = self.connection(connection)?;
        let sql = positional(conn.driver(), sql, params)?;
        debug!(%sql, "execute");
        conn.execute(&sql, params)
    }

    pub fn find(&mut self, connection: Option<&str>, table: &str, id: impl Into<Value>, id_column: &str) -> Result<Option<Row>> {
        let query = on(QueryExpression::table(table), connection).where_(id_column, id);
        query.first(self)
    }

    pub fn find_all(
        &mut self,
        connection: Option<&str>,
        table: &str,
        conditions: &Row,
        order_by: Option<&str>,
    ) -> Result<Vec<Row>> {
        let mut query = on(QueryExpression::table(table), connection).where_all(conditions);
        if let Some(order) = order_by {
            query.orders.push(order.to_string());
        }
        query.get(self)
    }

    /// Insert one row, returning the generated key when the driver reports one.
    pub fn insert(&mut self, connection: Option<&str>, table: &str, data: &Row, id_column: &str) -> Result<Option<i64>> {
        if data.is_empty() {
            return Err(Error::query(format!("No columns given to INSERT into {table}")));
        }
        let conn = self.connection(connection)?;
        let driver = conn.driver().clone();
        let mut gen = driver.placeholder();
        let columns: Vec<&str> = data.keys().map(String::as_str).collect();
        let placeholders: Vec<String> = columns.iter().filter_map(|_| gen.next()).collect();
        let args: Vec<Value> = data.values().cloned().collect();
        let mut sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        debug!(%sql, "insert");
        if driver == Driver::Postgres {
            sql.push_str(&format!(" RETURNING {id_column}"));
            let rows = conn.fetch_all(&sql, &args)?;
            return Ok(rows.first().and_then(|r| r.values().next()).and_then(Value::as_i64));
        }
        Ok(conn.execute(&sql, &args)?.last_insert_id)
    }

    pub fn update(
        &mut self,
        connection: Option<&str>,
        table: &str,
        data: &Row,
        id: impl Into<Value>,
        id_column: &str,
    ) -> Result<u64> {
        on(QueryExpression::table(table), connection)
            .where_(id_column, id)
            .update(self, data)
    }

    pub fn delete(&mut self, connection: Option<&str>, table: &str, id: impl Into<Value>, id_column: &str) -> Result<u64> {
        on(QueryExpression::table(table), connection)
            .where_(id_column, id)
            .delete(self)
    }

    pub fn begin(&mut self, connection: Option<&str>) -> Result<()> {
        self.connection(connection)?.begin()
    }

    pub fn commit(&mut self, connection: Option<&str>) -> Result<()> {
        self.connection(connection)?.commit()
    }

    pub fn rollback(&mut self, connection: Option<&str>) -> Result<()> {
        self.connection(connection)?.rollback()
    }

    /// Run `f` inside a transaction, committing on success and rolling back on error.
    pub fn transaction<T>(
        &mut self,
        connection: Option<&str>,
        f: impl FnOnce(&mut Database) -> Result<T>,
    ) -> Result<T> {
        self.begin(connection)?;
        match f(self) {
            Ok(value) => {
                self.commit(connection)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback(connection) {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.close_all();
    }
}

fn on(query: QueryExpression, connection: Option<&str>) -> QueryExpression {
    match connection {
        Some(name) => query.connection(name),
        None => query,
    }
}

fn positional(driver: &Driver, sql: &str, params: &[Value]) -> Result<String> {
    let (sql, placeholder_count) = replace_placeholders(sql, &mut driver.placeholder())?;
    if placeholder_count != params.len() {
        return Err(Error::query(format!(
            "Failing to build query. {} placeholders were found in the query, but {} arguments were provided.",
            placeholder_count,
            params.len(),
        )));
    }
    Ok(sql)
}

#[cfg(test)]
pub(crate) mod mock {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;

    /// A statement the mock saw, with its arguments.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Call {
        pub sql: String,
        pub params: Vec<Value>,
    }

    #[derive(Debug, Default)]
    pub struct Script {
        pub calls: Vec<Call>,
        pub results: VecDeque<Vec<Row>>,
        pub fail_when: Vec<String>,
        pub opened: usize,
    }

    /// A connector whose connections record statements and replay queued result sets.
    #[derive(Clone, Default)]
    pub struct MockConnector {
        pub driver: Driver,
        pub script: Rc<RefCell<Script>>,
    }

    impl MockConnector {
        pub fn new(driver: Driver) -> Self {
            Self {
                driver,
                script: Rc::default(),
            }
        }

        pub fn push_rows(&self, rows: Vec<Row>) {
            self.script.borrow_mut().results.push_back(rows);
        }

        /// Fail any statement containing `needle`.
        pub fn fail_when(&self, needle: &str) {
            self.script.borrow_mut().fail_when.push(needle.to_string());
        }

        pub fn calls(&self) -> Vec<Call> {
            self.script.borrow().calls.clone()
        }

        pub fn sql(&self) -> Vec<String> {
            self.calls().into_iter().map(|c| c.sql).collect()
        }

        pub fn database(&self) -> Database {
            let mut config = DatabaseConfig::default();
            config.connections.insert(
                "main".to_string(),
                ConnectionConfig {
                    driver: self.driver.clone(),
                    ..ConnectionConfig::default()
                },
            );
            Database::with_connector(config, self.clone())
        }
    }

    impl Connector for MockConnector {
        fn open(&self, _name: &str, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
            self.script.borrow_mut().opened += 1;
            Ok(Box::new(MockConnection {
                driver: config.driver.clone(),
                script: self.script.clone(),
            }))
        }
    }

    pub struct MockConnection {
        driver: Driver,
        script: Rc<RefCell<Script>>,
    }

    impl MockConnection {
        fn record(&mut self, sql: &str, params: &[Value]) -> Result<()> {
            let mut script = self.script.borrow_mut();
            script.calls.push(Call {
                sql: sql.to_string(),
                params: params.to_vec(),
            });
            if script.fail_when.iter().any(|needle| sql.contains(needle.as_str())) {
                return Err(Error::query(format!("scripted failure: {sql}")));
            }
            Ok(())
        }
    }

    impl Connection for MockConnection {
        fn driver(&self) -> &Driver {
            &self.driver
        }

        fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
            self.record(sql, params)?;
            Ok(self.script.borrow_mut().results.pop_front().unwrap_or_default())
        }

        fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult> {
            self.record(sql, params)?;
            Ok(ExecResult {
                rows_affected: 1,
                last_insert_id: Some(1),
            })
        }

        fn execute_batch(&mut self, sql: &str) -> Result<()> {
            self.record(sql, &[])
        }
    }

    /// A single connection speaking the mock's dialect.
    pub fn open(mock: &MockConnector) -> Result<Box<dyn Connection>> {
        let config = ConnectionConfig {
            driver: mock.driver.clone(),
            ..ConnectionConfig::default()
        };
        mock.open("main", &config)
    }

    pub fn row<const N: usize>(pairs: [(&str, Value); N]) -> Row {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{row, MockConnector};
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_connection_is_cached() -> Result<()> {
        let mock = MockConnector::new(Driver::Sqlite);
        let mut db = mock.database();
        db.connection(None)?;
        db.connection(Some("main"))?;
        assert_eq!(mock.script.borrow().opened, 1);
        assert!(db.is_open("main"));
        db.close("main");
        assert!(!db.is_open("main"));
        db.connection(None)?;
        assert_eq!(mock.script.borrow().opened, 2);
        Ok(())
    }

    #[test]
    fn test_unknown_connection() {
        let mut db = MockConnector::new(Driver::Sqlite).database();
        assert_matches!(db.connection(Some("reporting")).err(), Some(Error::ConnectionError { name, .. }) if name == "reporting");
    }

    #[test]
    fn test_configure_replaces_definitions() -> Result<()> {
        let mock = MockConnector::new(Driver::Sqlite);
        let mut db = mock.database();
        db.connection(None)?;
        db.configure(DatabaseConfig::default());
        assert!(!db.is_open("main"));
        assert_matches!(db.connection(None).err(), Some(Error::ConnectionError { .. }));
        Ok(())
    }

    #[test]
    fn test_query_rewrites_for_postgres() -> Result<()> {
        let mock = MockConnector::new(Driver::Postgres);
        let mut db = mock.database();
        db.query(None, "SELECT * FROM users WHERE id = ? AND status = ?", &[1.into(), "active".into()])?;
        assert_eq!(mock.sql(), vec!["SELECT * FROM users WHERE id = $1 AND status = $2"]);
        Ok(())
    }

    #[test]
    fn test_query_checks_argument_count() {
        let mut db = MockConnector::new(Driver::MySql).database();
        assert_matches!(db.query(None, "SELECT * FROM users WHERE id = ?", &[]), Err(Error::QueryError(_)));
    }

    #[test]
    fn test_insert_returning_on_postgres() -> Result<()> {
        let mock = MockConnector::new(Driver::Postgres);
        mock.push_rows(vec![row([("id", Value::Int(42))])]);
        let mut db = mock.database();
        let id = db.insert(None, "posts", &row([("title", "Hi".into())]), "id")?;
        assert_eq!(id, Some(42));
        assert_eq!(mock.sql(), vec!["INSERT INTO posts (title) VALUES ($1) RETURNING id"]);
        Ok(())
    }

    #[test]
    fn test_find_and_delete() -> Result<()> {
        let mock = MockConnector::new(Driver::MySql);
        let mut db = mock.database();
        db.find(None, "posts", 3, "id")?;
        db.delete(None, "posts", 3, "id")?;
        let calls = mock.calls();
        assert_eq!(calls[0].sql, "SELECT * FROM posts WHERE id = ? LIMIT 1");
        assert_eq!(calls[1].sql, "DELETE FROM posts WHERE id = ?");
        assert_eq!(calls[1].params, vec![Value::Int(3)]);
        Ok(())
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mock = MockConnector::new(Driver::Sqlite);
        let mut db = mock.database();
        let result: Result<()> = db.transaction(None, |db| {
            db.execute(None, "UPDATE accounts SET balance = 0", &[])?;
            Err(Error::query("boom"))
        });
        assert!(result.is_err());
        assert_eq!(mock.sql(), vec!["BEGIN", "UPDATE accounts SET balance = 0", "ROLLBACK"]);
    }
}
