use crate::domains::export::types::{CastOverrides, ExportFormat, ExportSettings, TimeRange};
use crate::errors::{ConfigError, ConfigResult};
use crate::validation::MeasurementRange;
use std::fmt;
use std::path::PathBuf;

/// Upper bound on workers, as a multiple of the available cores
pub const MAX_WORKERS_PER_CORE: usize = 2;

/// How to reach the database
#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Use https and skip certificate verification
    pub ssl: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8086,
            username: String::new(),
            password: String::new(),
            ssl: false,
        }
    }
}

impl ConnectionConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ssl", &self.ssl)
            .finish()
    }
}

/// Everything a run needs, built once at startup and never mutated
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub connection: ConnectionConfig,
    pub database: String,
    /// Explicit names or wildcard patterns; empty means every measurement
    pub measurements: Vec<String>,
    /// Window over the full measurement list; only used when `measurements` is empty
    pub range: Option<MeasurementRange>,
    pub output_dir: PathBuf,
    pub workers: usize,
    pub merge: bool,
    pub format: ExportFormat,
    pub time_range: TimeRange,
    pub cast_overrides: CastOverrides,
}

impl ExportConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            connection: ConnectionConfig::default(),
            database: database.into(),
            measurements: Vec::new(),
            range: None,
            output_dir: PathBuf::from("export"),
            workers: 1,
            merge: false,
            format: ExportFormat::LineProtocol,
            time_range: TimeRange::default(),
            cast_overrides: CastOverrides::default(),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.validate_with_cpus(num_cpus::get())
    }

    pub fn validate_with_cpus(&self, cpus: usize) -> ConfigResult<()> {
        if self.database.is_empty() {
            return Err(ConfigError::MissingDatabase);
        }
        let max = cpus.max(1) * MAX_WORKERS_PER_CORE;
        if self.workers == 0 || self.workers > max {
            return Err(ConfigError::InvalidWorkers {
                requested: self.workers,
                max,
            });
        }
        if let (Some(start), Some(end)) = (self.time_range.start, self.time_range.end) {
            if start > end {
                return Err(ConfigError::InvalidTimeBounds { start, end });
            }
        }
        if self.merge && self.format != ExportFormat::LineProtocol {
            return Err(ConfigError::MergeRequiresLineProtocol);
        }
        Ok(())
    }

    /// Create the output directory if it does not exist yet
    pub fn prepare_output_dir(&self) -> ConfigResult<()> {
        let invalid = |reason: String| ConfigError::InvalidDir {
            path: self.output_dir.clone(),
            reason,
        };
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(invalid("not a directory".to_string()));
        }
        std::fs::create_dir_all(&self.output_dir).map_err(|e| invalid(e.to_string()))
    }

    /// The read-only slice of the config shared by every export job
    pub fn settings(&self) -> ExportSettings {
        ExportSettings {
            database: self.database.clone(),
            output_dir: self.output_dir.clone(),
            format: self.format,
            merge: self.merge,
            time_range: self.time_range,
            cast_overrides: self.cast_overrides.clone(),
        }
    }
}
