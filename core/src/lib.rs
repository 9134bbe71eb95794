pub use self::connection::{Connection, Connector, Database, ExecResult};
pub use self::error::{Error, Result};
pub use self::query_builder::{table, Direction, Operator, Page, QueryExpression};
pub use self::value::{Row, Value};

mod error;
pub mod config;
pub mod connection;
pub mod inspect;
pub mod migration;
pub mod model;
pub mod query_builder;
pub mod scaffold;
pub mod schema;
pub mod value;
