use crate::errors::ConfigError;
use crate::types::FieldType;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Export formats supported by the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    LineProtocol,
    Csv,
}

impl ExportFormat {
    /// Get file extension for this format
    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::LineProtocol => "txt",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "line" | "lp" | "line-protocol" | "txt" => Ok(ExportFormat::LineProtocol),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(ConfigError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::LineProtocol => f.write_str("line"),
            ExportFormat::Csv => f.write_str("csv"),
        }
    }
}

/// Field names the user wants forced from string to another type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CastOverrides {
    pub boolean: BTreeSet<String>,
    pub float: BTreeSet<String>,
    pub integer: BTreeSet<String>,
}

impl CastOverrides {
    pub fn new<I, S>(boolean: I, float: I, integer: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            boolean: boolean.into_iter().map(Into::into).collect(),
            float: float.into_iter().map(Into::into).collect(),
            integer: integer.into_iter().map(Into::into).collect(),
        }
    }

    /// Requested type for a field; float wins over integer, integer over boolean
    pub fn override_for(&self, field: &str) -> Option<FieldType> {
        if self.float.contains(field) {
            Some(FieldType::Float)
        } else if self.integer.contains(field) {
            Some(FieldType::Integer)
        } else if self.boolean.contains(field) {
            Some(FieldType::Boolean)
        } else {
            None
        }
    }
}

/// Optional export window in epoch seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl TimeRange {
    pub fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    /// `where` predicate for the select query, empty when unbounded
    pub fn where_clause(&self) -> Option<String> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(format!("where time >= {}s and time <= {}s", start, end)),
            (Some(start), None) => Some(format!("where time >= {}s", start)),
            (None, Some(end)) => Some(format!("where time <= {}s", end)),
            (None, None) => None,
        }
    }
}

/// Settings shared read-only by every job of a run
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub database: String,
    pub output_dir: PathBuf,
    pub format: ExportFormat,
    pub merge: bool,
    pub time_range: TimeRange,
    pub cast_overrides: CastOverrides,
}

impl ExportSettings {
    pub fn output_path(&self, measurement: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", measurement, self.format.file_extension()))
    }
}

/// One measurement to export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    /// Zero-based position in the resolved measurement list
    pub position: usize,
    pub measurement: String,
}

impl ExportJob {
    pub fn new(position: usize, measurement: impl Into<String>) -> Self {
        Self {
            position,
            measurement: measurement.into(),
        }
    }
}

/// Lifecycle of one export job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    FetchingMetadata,
    Querying,
    Serializing,
    Writing,
    Done,
    Failed(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed(_))
    }
}

/// Export statistics for one measurement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub rows_written: usize,
    pub bytes_written: usize,
    pub duration_ms: u64,
}

/// What a finished job produced; `output` is `None` when there was no data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOutcome {
    pub stats: ExportStats,
    pub output: Option<PathBuf>,
}

/// Final state of one job after the pool has drained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub position: usize,
    pub measurement: String,
    pub status: JobStatus,
    pub outcome: Option<ExportOutcome>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Done
    }

    pub fn output(&self) -> Option<&PathBuf> {
        self.outcome.as_ref().and_then(|o| o.output.as_ref())
    }
}

/// Summary returned to the caller after a whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Size of the resolved measurement list before range selection
    pub total_measurements: usize,
    pub reports: Vec<JobReport>,
    pub merged: Option<PathBuf>,
}

impl RunSummary {
    pub fn failed(&self) -> impl Iterator<Item = &JobReport> {
        self.reports.iter().filter(|r| !r.succeeded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("line".parse::<ExportFormat>().unwrap(), ExportFormat::LineProtocol);
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("parquet".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Csv.file_extension(), "csv");
        assert_eq!(ExportFormat::LineProtocol.file_extension(), "txt");
    }

    #[test]
    fn test_time_range_where_clause() {
        assert_eq!(TimeRange::default().where_clause(), None);
        assert_eq!(
            TimeRange::new(Some(10), Some(20)).where_clause().unwrap(),
            "where time >= 10s and time <= 20s"
        );
        assert_eq!(TimeRange::new(Some(10), None).where_clause().unwrap(), "where time >= 10s");
        assert_eq!(TimeRange::new(None, Some(20)).where_clause().unwrap(), "where time <= 20s");
    }

    #[test]
    fn test_cast_override_precedence() {
        let overrides = CastOverrides::new(vec!["a", "b"], vec!["a"], vec!["b", "c"]);
        assert_eq!(overrides.override_for("a"), Some(FieldType::Float));
        assert_eq!(overrides.override_for("b"), Some(FieldType::Integer));
        assert_eq!(overrides.override_for("c"), Some(FieldType::Integer));
        assert_eq!(overrides.override_for("d"), None);
        assert_eq!(CastOverrides::default().override_for("a"), None);
    }
}
