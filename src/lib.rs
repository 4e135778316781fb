//! Export measurements of an InfluxDB 1.x database to line protocol or CSV.

pub mod backend;
pub mod config;
pub mod domains;
pub mod errors;
pub mod types;
pub mod validation;

pub use config::{ConnectionConfig, ExportConfig};
pub use domains::export::{ExportService, RunSummary};
