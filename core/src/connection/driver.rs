use std::sync::Arc;

use sqlx::{Column, Connection as _, Executor, Row as _, TypeInfo, ValueRef};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use tokio::runtime::Runtime;
use tracing::debug;

use super::{Connection, Connector, ExecResult};
use crate::config::{ConnectionConfig, Driver};
use crate::error::{Error, Result};
use crate::value::{self, Row, Value};

/// Opens sqlx connections and drives them on a private current-thread runtime.
pub struct SqlxConnector {
    runtime: Arc<Runtime>,
}

impl SqlxConnector {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }
}

impl Connector for SqlxConnector {
    fn open(&self, name: &str, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        let dsn = config.dsn().map_err(|e| Error::connection(name, e))?;
        config.ensure_sqlite_dir()?;
        let failed = |e: sqlx::Error| Error::connection(name, format!("Database connection failed: {e}"));
        let inner = match &config.driver {
            #[cfg(feature = "sqlite")]
            Driver::Sqlite => Inner::Sqlite(
                self.runtime
                    .block_on(sqlx::SqliteConnection::connect(&dsn))
                    .map_err(failed)?,
            ),
            #[cfg(feature = "mysql")]
            Driver::MySql => Inner::MySql(
                self.runtime
                    .block_on(sqlx::MySqlConnection::connect(&dsn))
                    .map_err(failed)?,
            ),
            #[cfg(feature = "postgres")]
            Driver::Postgres => Inner::Postgres(
                self.runtime
                    .block_on(sqlx::PgConnection::connect(&dsn))
                    .map_err(failed)?,
            ),
            #[allow(unreachable_patterns)]
            other => {
                return Err(Error::connection(
                    name,
                    format!("Unsupported database driver: {}", other.name()),
                ))
            }
        };
        Ok(Box::new(SqlxConnection {
            driver: config.driver.clone(),
            inner,
            runtime: self.runtime.clone(),
        }))
    }
}

enum Inner {
    #[cfg(feature = "sqlite")]
    Sqlite(sqlx::SqliteConnection),
    #[cfg(feature = "mysql")]
    MySql(sqlx::MySqlConnection),
    #[cfg(feature = "postgres")]
    Postgres(sqlx::PgConnection),
}

pub struct SqlxConnection {
    driver: Driver,
    inner: Inner,
    runtime: Arc<Runtime>,
}

/// Bind every parameter in order. Timestamps go out as `TIMESTAMP` values with `native`, and
/// as `YYYY-MM-DD HH:MM:SS` text with `text` (SQLite has no timestamp type).
macro_rules! bind_values {
    ($query:expr, $params:expr, native) => {
        bind_values!(@fold $query, $params, |dt: &PrimitiveDateTime| Ok::<_, Error>(*dt))
    };
    ($query:expr, $params:expr, text) => {
        bind_values!(@fold $query, $params, |dt: &PrimitiveDateTime| value::format_datetime(*dt))
    };
    (@fold $query:expr, $params:expr, $datetime:expr) => {{
        let datetime = $datetime;
        $params.iter().try_fold($query, |query, value| {
            Ok::<_, Error>(match value {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::Int(i) => query.bind(*i),
                Value::Float(f) => query.bind(*f),
                Value::Text(s) => query.bind(s.clone()),
                Value::Bytes(b) => query.bind(b.clone()),
                Value::Json(j) => query.bind(j.clone()),
                Value::DateTime(dt) => query.bind(datetime(dt)?),
            })
        })
    }};
}

/// Decode a row by trying each listed Rust type in turn against every non-null column.
macro_rules! decode_row {
    ($row:expr, [$($ty:ty),+ $(,)?]) => {{
        let row = $row;
        let mut out = Row::with_capacity(row.len());
        for (i, column) in row.columns().iter().enumerate() {
            let value = if row.try_get_raw(i)?.is_null() {
                Value::Null
            } else {
                'decode: {
                    $(
                        if let Ok(v) = row.try_get::<$ty, _>(i) {
                            break 'decode Decoded::into_value(v)?;
                        }
                    )+
                    return Err(Error::query(format!(
                        "Unsupported column type {} for {}",
                        column.type_info().name(),
                        column.name()
                    )));
                }
            };
            out.insert(column.name().to_string(), value);
        }
        Ok(out)
    }};
}

impl Connection for SqlxConnection {
    fn driver(&self) -> &Driver {
        &self.driver
    }

    fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let runtime = self.runtime.clone();
        match &mut self.inner {
            #[cfg(feature = "sqlite")]
            Inner::Sqlite(conn) => {
                let query = bind_values!(sqlx::query(sql), params, text)?;
                let rows = runtime.block_on(query.fetch_all(conn))?;
                rows.iter().map(|row| decode_row!(row, [i64, f64, String, Vec<u8>])).collect()
            }
            #[cfg(feature = "mysql")]
            Inner::MySql(conn) => {
                let query = bind_values!(sqlx::query(sql), params, native)?;
                let rows = runtime.block_on(query.fetch_all(conn))?;
                rows.iter()
                    .map(|row| {
                        decode_row!(
                            row,
                            [
                                i64,
                                u64,
                                f64,
                                f32,
                                String,
                                sqlx::types::Decimal,
                                PrimitiveDateTime,
                                OffsetDateTime,
                                Date,
                                Time,
                                serde_json::Value,
                                Vec<u8>,
                            ]
                        )
                    })
                    .collect()
            }
            #[cfg(feature = "postgres")]
            Inner::Postgres(conn) => {
                let query = bind_values!(sqlx::query(sql), params, native)?;
                let rows = runtime.block_on(query.fetch_all(conn))?;
                rows.iter()
                    .map(|row| {
                        decode_row!(
                            row,
                            [
                                i64,
                                i32,
                                i16,
                                f64,
                                f32,
                                bool,
                                String,
                                sqlx::types::Decimal,
                                PrimitiveDateTime,
                                OffsetDateTime,
                                Date,
                                Time,
                                serde_json::Value,
                                Vec<u8>,
                            ]
                        )
                    })
                    .collect()
            }
        }
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let runtime = self.runtime.clone();
        match &mut self.inner {
            #[cfg(feature = "sqlite")]
            Inner::Sqlite(conn) => {
                let query = bind_values!(sqlx::query(sql), params, text)?;
                let result = runtime.block_on(query.execute(conn))?;
                Ok(ExecResult {
                    rows_affected: result.rows_affected(),
                    last_insert_id: Some(result.last_insert_rowid()),
                })
            }
            #[cfg(feature = "mysql")]
            Inner::MySql(conn) => {
                let query = bind_values!(sqlx::query(sql), params, native)?;
                let result = runtime.block_on(query.execute(conn))?;
                Ok(ExecResult {
                    rows_affected: result.rows_affected(),
                    last_insert_id: i64::try_from(result.last_insert_id()).ok(),
                })
            }
            #[cfg(feature = "postgres")]
            Inner::Postgres(conn) => {
                let query = bind_values!(sqlx::query(sql), params, native)?;
                let result = runtime.block_on(query.execute(conn))?;
                Ok(ExecResult {
                    rows_affected: result.rows_affected(),
                    last_insert_id: None,
                })
            }
        }
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        debug!(%sql, "batch");
        let runtime = self.runtime.clone();
        match &mut self.inner {
            #[cfg(feature = "sqlite")]
            Inner::Sqlite(conn) => {
                runtime.block_on(conn.execute(sql))?;
            }
            #[cfg(feature = "mysql")]
            Inner::MySql(conn) => {
                runtime.block_on(conn.execute(sql))?;
            }
            #[cfg(feature = "postgres")]
            Inner::Postgres(conn) => {
                runtime.block_on(conn.execute(sql))?;
            }
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let SqlxConnection { inner, runtime, .. } = *self;
        match inner {
            #[cfg(feature = "sqlite")]
            Inner::Sqlite(conn) => runtime.block_on(conn.close())?,
            #[cfg(feature = "mysql")]
            Inner::MySql(conn) => runtime.block_on(conn.close())?,
            #[cfg(feature = "postgres")]
            Inner::Postgres(conn) => runtime.block_on(conn.close())?,
        }
        Ok(())
    }
}

/// Conversion from a decoded driver type into a [`Value`].
trait Decoded {
    fn into_value(self) -> Result<Value>;
}

macro_rules! decoded_as {
    ($variant:ident: $($ty:ty),+) => {
        $(
            impl Decoded for $ty {
                fn into_value(self) -> Result<Value> {
                    Ok(Value::$variant(self.into()))
                }
            }
        )+
    };
}

decoded_as!(Int: i64, i32, i16);
decoded_as!(Float: f64, f32);
decoded_as!(Bool: bool);
decoded_as!(Text: String);
decoded_as!(Bytes: Vec<u8>);
decoded_as!(Json: serde_json::Value);

impl Decoded for u64 {
    fn into_value(self) -> Result<Value> {
        Ok(Value::Int(i64::try_from(self).unwrap_or(i64::MAX)))
    }
}

impl Decoded for sqlx::types::Decimal {
    fn into_value(self) -> Result<Value> {
        Ok(Value::Text(self.to_string()))
    }
}

impl Decoded for PrimitiveDateTime {
    fn into_value(self) -> Result<Value> {
        Ok(Value::Text(value::format_datetime(self)?))
    }
}

impl Decoded for OffsetDateTime {
    fn into_value(self) -> Result<Value> {
        let utc = self.to_offset(time::UtcOffset::UTC);
        Ok(Value::Text(value::format_datetime(PrimitiveDateTime::new(utc.date(), utc.time()))?))
    }
}

impl Decoded for Date {
    fn into_value(self) -> Result<Value> {
        Ok(Value::Text(value::format_date(self)?))
    }
}

impl Decoded for Time {
    fn into_value(self) -> Result<Value> {
        Ok(Value::Text(self.format(time::macros::format_description!("[hour]:[minute]:[second]"))?))
    }
}
