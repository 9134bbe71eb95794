use std::env::var;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::query_builder::Placeholder;

pub const DEFAULT_CONNECTION: &str = "main";
pub const MIGRATION_TABLE: &str = "migrations";
const MIGRATION_FOLDER: &str = "database/migrations";

/// Overrides the configured migration folder.
pub fn get_var_migration_folder() -> Option<PathBuf> {
    var("MIGRATION_FOLDER").ok().map(PathBuf::from)
}

/// Overrides the default connection with a full URL.
pub fn get_var_database_url() -> Option<String> {
    var("DATABASE_URL").ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Driver {
    MySql,
    Postgres,
    #[default]
    Sqlite,
    Unsupported(String),
}

impl From<String> for Driver {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Driver::MySql,
            "pgsql" | "postgres" | "postgresql" => Driver::Postgres,
            "sqlite" | "sqlite3" => Driver::Sqlite,
            _ => Driver::Unsupported(s),
        }
    }
}

impl From<Driver> for String {
    fn from(d: Driver) -> Self {
        d.name().to_string()
    }
}

impl Driver {
    pub fn name(&self) -> &str {
        match self {
            Driver::MySql => "mysql",
            Driver::Postgres => "pgsql",
            Driver::Sqlite => "sqlite",
            Driver::Unsupported(s) => s,
        }
    }

    pub fn placeholder(&self) -> Placeholder {
        match self {
            Driver::Postgres => Placeholder::dollar_sign(),
            _ => Placeholder::question_mark(),
        }
    }

    /// Quote an identifier for this dialect.
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Driver::MySql => format!("`{}`", ident.replace('`', "``")),
            _ => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    fn from_scheme(scheme: &str) -> Self {
        match scheme {
            "postgres" | "postgresql" => Driver::Postgres,
            other => Driver::from(other.to_string()),
        }
    }
}

/// One named connection definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub driver: Driver,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub charset: Option<String>,
    /// A complete connection URL. Takes precedence over the discrete fields.
    pub url: Option<String>,
}

impl ConnectionConfig {
    pub fn sqlite(database: impl Into<String>) -> Self {
        Self {
            driver: Driver::Sqlite,
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::ConfigError(format!("Invalid database url: {e}")))?;
        Ok(Self {
            driver: Driver::from_scheme(parsed.scheme()),
            url: Some(url.to_string()),
            ..Self::default()
        })
    }

    /// Build the driver-specific connection string.
    pub fn dsn(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        match &self.driver {
            Driver::Sqlite => {
                if self.database.is_empty() || self.database == ":memory:" {
                    Ok("sqlite::memory:".to_string())
                } else {
                    Ok(format!("sqlite://{}?mode=rwc", self.database))
                }
            }
            Driver::MySql => self.network_dsn("mysql", 3306),
            Driver::Postgres => self.network_dsn("postgres", 5432),
            Driver::Unsupported(name) => Err(Error::ConfigError(format!("Unsupported database driver: {name}"))),
        }
    }

    fn network_dsn(&self, scheme: &str, default_port: u16) -> Result<String> {
        let invalid = |what: &str| Error::ConfigError(format!("Invalid {what} for {scheme} connection"));
        let mut url = Url::parse(&format!("{scheme}://localhost")).map_err(|_| invalid("scheme"))?;
        url.set_host(Some(self.host.as_deref().unwrap_or("localhost")))
            .map_err(|_| invalid("host"))?;
        url.set_port(Some(self.port.unwrap_or(default_port)))
            .map_err(|_| invalid("port"))?;
        if let Some(username) = &self.username {
            url.set_username(username).map_err(|_| invalid("username"))?;
        }
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password)).map_err(|_| invalid("password"))?;
        }
        url.set_path(&self.database);
        if let (Driver::MySql, Some(charset)) = (&self.driver, &self.charset) {
            url.query_pairs_mut().append_pair("charset", charset);
        }
        Ok(url.to_string())
    }

    /// SQLite creates the file itself, but not its parent directory.
    pub(crate) fn ensure_sqlite_dir(&self) -> Result<()> {
        if self.driver != Driver::Sqlite || self.url.is_some() || self.database.is_empty() || self.database == ":memory:" {
            return Ok(());
        }
        if let Some(parent) = Path::new(&self.database).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub table: String,
    pub path: PathBuf,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            table: MIGRATION_TABLE.to_string(),
            path: PathBuf::from(MIGRATION_FOLDER),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub default: String,
    pub connections: IndexMap<String, ConnectionConfig>,
    pub migration: MigrationConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default: DEFAULT_CONNECTION.to_string(),
            connections: IndexMap::new(),
            migration: MigrationConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// A config with a single default connection.
    pub fn single(connection: ConnectionConfig) -> Self {
        let mut config = Self::default();
        config.connections.insert(DEFAULT_CONNECTION.to_string(), connection);
        config
    }

    /// Point the default connection at `url`, creating it if absent.
    pub fn with_database_url(mut self, url: &str) -> Result<Self> {
        let connection = ConnectionConfig::from_url(url)?;
        self.connections.insert(self.default.clone(), connection);
        Ok(self)
    }

    pub fn with_migration_folder(mut self, path: PathBuf) -> Self {
        self.migration.path = path;
        self
    }

    /// Apply `DATABASE_URL` and `MIGRATION_FOLDER` when they are set.
    pub fn apply_env(self) -> Result<Self> {
        let config = match get_var_database_url() {
            Some(url) => self.with_database_url(&url)?,
            None => self,
        };
        Ok(match get_var_migration_folder() {
            Some(path) => config.with_migration_folder(path),
            None => config,
        })
    }
}

/// Where generated artifacts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub models: PathBuf,
    pub controllers: PathBuf,
    pub templates: PathBuf,
    pub migrations: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            models: PathBuf::from("src/models"),
            controllers: PathBuf::from("src/controllers"),
            templates: PathBuf::from("templates"),
            migrations: PathBuf::from(MIGRATION_FOLDER),
        }
    }
}

impl Paths {
    /// Resolve every path against `root`.
    pub fn rooted(&self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            models: root.join(&self.models),
            controllers: root.join(&self.controllers),
            templates: root.join(&self.templates),
            migrations: root.join(&self.migrations),
        }
    }
}

/// Application configuration, read from a toml file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    raw: toml::Table,
}

impl Config {
    pub fn parse(s: &str) -> Result<Self> {
        Ok(Self { raw: toml::from_str(s)? })
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Look up a value by dot path, e.g. `database.migration.table`.
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        let mut parts = key.split('.');
        let mut current = self.raw.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.clone().try_into().ok())
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get_as(key).unwrap_or(default)
    }

    pub fn database(&self) -> Result<DatabaseConfig> {
        match self.get("database") {
            Some(section) => section
                .clone()
                .try_into()
                .map_err(|e: toml::de::Error| Error::ConfigError(format!("Invalid [database] section: {e}"))),
            None => Ok(DatabaseConfig::default()),
        }
    }

    /// Output paths. `migrations` follows `database.migration.path` unless set explicitly.
    pub fn paths(&self) -> Result<Paths> {
        let mut paths: Paths = match self.get("app.paths") {
            Some(section) => section
                .clone()
                .try_into()
                .map_err(|e: toml::de::Error| Error::ConfigError(format!("Invalid [app.paths] section: {e}")))?,
            None => Paths::default(),
        };
        if self.get("app.paths.migrations").is_none() {
            paths.migrations = self.database()?.migration.path;
        }
        Ok(paths)
    }
}
