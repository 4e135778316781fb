pub mod csv_record;
pub mod layout;
pub mod line_protocol;
pub mod measurements;
pub mod merge;
pub mod queue_manager;
pub mod reconcile;
pub mod service;
pub mod types;
pub mod writer;
pub mod writers;

pub use queue_manager::ExportQueueManager;
pub use reconcile::{reconcile, Reconciliation};
pub use service::{ExportService, MeasurementExporter};
pub use types::{ExportFormat, ExportJob, ExportSettings, ExportStats, JobReport, JobStatus, RunSummary};
pub use writer::{ExportWriter, WriterFactory};
