use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while talking to the remote database or decoding its replies
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote error (status {status}): {message}")]
    Remote {
        status: u16,
        message: String,
    },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl QueryError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Remote error reported inside a response body rather than by status code
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            status: 200,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(error: reqwest::Error) -> Self {
        QueryError::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(error: serde_json::Error) -> Self {
        QueryError::Decode(error.to_string())
    }
}

/// Row-level formatting failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SerializationError {
    #[error("Row {row}: timestamp must be an integer or RFC3339 string, found {found}")]
    Timestamp {
        row: usize,
        found: String,
    },

    #[error("Row {row}: tag '{column}' must be a string, found {found}")]
    TagValue {
        row: usize,
        column: String,
        found: String,
    },

    #[error("Row {row}: string field '{field}' holds a {found} value")]
    StringField {
        row: usize,
        field: String,
        found: String,
    },
}

/// Export errors scoped to a single measurement job or the merge step
#[derive(Debug, Error, Clone)]
pub enum ExportError {
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Serialization error on measurement '{measurement}': {source}")]
    Serialization {
        measurement: String,
        #[source]
        source: SerializationError,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Merge error: {0}")]
    Merge(String),

    #[error("Worker panicked: {0}")]
    WorkerPanic(String),
}

impl From<std::io::Error> for ExportError {
    fn from(error: std::io::Error) -> Self {
        ExportError::Io(error.to_string())
    }
}

impl From<csv::Error> for ExportError {
    fn from(error: csv::Error) -> Self {
        ExportError::Csv(error.to_string())
    }
}

/// Startup validation errors; these are the only failures that change the exit code
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("database required")]
    MissingDatabase,

    #[error("invalid dir {path}: {reason}")]
    InvalidDir {
        path: PathBuf,
        reason: String,
    },

    #[error("invalid worker count {requested}, must be between 1 and {max}")]
    InvalidWorkers {
        requested: usize,
        max: usize,
    },

    #[error("invalid range '{0}', expected 'start,end' started from 1")]
    InvalidRange(String),

    #[error("invalid time bounds: start {start} is after end {end}")]
    InvalidTimeBounds {
        start: i64,
        end: i64,
    },

    #[error("merge is only supported for line protocol output")]
    MergeRequiresLineProtocol,

    #[error("invalid format '{0}', expected 'line' or 'csv'")]
    InvalidFormat(String),
}
