//! Error types for the BigQuery-on-SQLite shim

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: Table {0}")]
    NotFound(String),

    /// SQLite rejected a rewritten statement.
    ///
    /// `statement` is the text as submitted by the caller, `rewritten` is
    /// what actually reached SQLite.
    #[error("{message} (statement: {statement}; rewritten: {rewritten}; sqlite {sqlite_version})")]
    Operational {
        statement: String,
        rewritten: String,
        message: String,
        sqlite_version: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Missing value for parameter '{0}'")]
    MissingParameter(String),

    #[error("Invalid table reference: {0}")]
    InvalidTableReference(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Hex error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Syntax errors arrive as `SqlInputError`, everything else as `SqliteFailure`.
fn backend_code(source: &rusqlite::Error) -> Option<rusqlite::ErrorCode> {
    match source {
        rusqlite::Error::SqliteFailure(error, _) => Some(error.code),
        rusqlite::Error::SqlInputError { error, .. } => Some(error.code),
        _ => None,
    }
}

impl Error {
    /// Wrap a failure of the backend while running a rewritten statement.
    pub fn operational(statement: &str, rewritten: &str, source: rusqlite::Error) -> Self {
        Error::Operational {
            statement: statement.to_string(),
            rewritten: rewritten.to_string(),
            message: source.to_string(),
            sqlite_version: rusqlite::version().to_string(),
            source,
        }
    }

    /// SQLite's primary result code, when the error came from the backend.
    pub fn sqlite_error_code(&self) -> Option<rusqlite::ErrorCode> {
        match self {
            Error::Operational { source, .. } | Error::Sqlite(source) => backend_code(source),
            _ => None,
        }
    }

    /// Return BigQuery-compatible error reason
    pub fn reason(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "notFound",
            Error::Operational { .. } => "invalidQuery",
            Error::MissingParameter(_) => "invalidQuery",
            Error::InvalidTableReference(_) => "invalid",
            Error::Codec(_) => "invalid",
            Error::Bincode(_) => "invalid",
            Error::Hex(_) => "invalid",
            Error::Sqlite(_) => "backendError",
            Error::Json(_) => "invalid",
            Error::Io(_) => "backendError",
            Error::Internal(_) => "internalError",
        }
    }

    /// Return SQL State
    pub fn sql_state(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "42S02",
            Error::Operational { .. } => "42000",
            Error::MissingParameter(_) => "07002",
            Error::InvalidTableReference(_) => "42602",
            Error::Codec(_) => "22000",
            Error::Bincode(_) => "22000",
            Error::Hex(_) => "22000",
            Error::Sqlite(_) => "58000",
            Error::Json(_) => "22000",
            Error::Io(_) => "58030",
            Error::Internal(_) => "XX000",
        }
    }
}
