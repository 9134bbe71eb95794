use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which half of a migration was being resolved or executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("Migration"),
            Direction::Down => f.write_str("Rollback"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    TokenizationError(#[from] sqlparser::tokenizer::TokenizerError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    TimeFormatError(#[from] time::error::Format),

    #[error("Database connection '{name}' failed: {message}")]
    ConnectionError { name: String, message: String },

    #[error("{0}")]
    QueryError(String),

    #[error("Migration {name} failed: {message}")]
    MigrationError { name: String, message: String },

    #[error("{direction} function not found: {name}")]
    MigrationNotFound { name: String, direction: Direction },

    #[error("{0}")]
    ConfigError(String),
}

impl Error {
    pub(crate) fn query(message: impl Into<String>) -> Self {
        Error::QueryError(message.into())
    }

    pub(crate) fn connection(name: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::ConnectionError {
            name: name.into(),
            message: message.to_string(),
        }
    }
}
