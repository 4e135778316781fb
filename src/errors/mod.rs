mod error;

pub use error::{ConfigError, ExportError, QueryError, SerializationError};

/// Result type for query client operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for configuration validation
pub type ConfigResult<T> = Result<T, ConfigError>;
