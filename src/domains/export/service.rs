use crate::backend::{parse_series, QueryClient, NANOSECOND_PRECISION};
use crate::config::ExportConfig;
use crate::domains::export::layout::ColumnLayout;
use crate::domains::export::measurements::{resolve_measurements, select_jobs};
use crate::domains::export::merge::merge_files;
use crate::domains::export::queue_manager::ExportQueueManager;
use crate::domains::export::reconcile::{reconcile, Reconciliation};
use crate::domains::export::types::{
    ExportJob, ExportOutcome, ExportSettings, ExportStats, JobStatus, RunSummary, TimeRange,
};
use crate::domains::export::writer::{ExportWriter, WriterFactory};
use crate::errors::ExportResult;
use crate::types::{FieldKeyMap, TagKeySet};
use crate::validation::escape_identifier;
use log::{debug, error, info, warn};
use reqwest::Method;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Metadata of one measurement, fetched before its data
#[derive(Debug, Clone)]
pub struct MeasurementSchema {
    pub tag_keys: TagKeySet,
    pub field_keys: FieldKeyMap,
    pub reconciliation: Reconciliation,
}

/// `select <clauses> from "<measurement>"` plus the optional time predicate
pub fn select_statement(measurement: &str, reconciliation: &Reconciliation, time_range: &TimeRange) -> String {
    let mut statement = format!(
        "select {} from \"{}\"",
        reconciliation.select_clause(),
        escape_identifier(measurement)
    );
    if let Some(predicate) = time_range.where_clause() {
        statement.push(' ');
        statement.push_str(&predicate);
    }
    statement
}

/// Exports a single measurement; shared by every worker of a run
pub struct MeasurementExporter {
    client: Arc<dyn QueryClient>,
    settings: Arc<ExportSettings>,
    writer: Box<dyn ExportWriter>,
}

impl MeasurementExporter {
    pub fn new(client: Arc<dyn QueryClient>, settings: Arc<ExportSettings>) -> Self {
        let writer = WriterFactory::create_writer(settings.format, &settings.database, settings.merge);
        Self {
            client,
            settings,
            writer,
        }
    }

    pub async fn fetch_schema(&self, measurement: &str) -> ExportResult<MeasurementSchema> {
        let database = &self.settings.database;
        let tag_keys: TagKeySet = self
            .client
            .tag_keys(database, measurement)
            .await?
            .into_iter()
            .collect();
        let field_keys = self.client.field_keys(database, measurement).await?;
        let reconciliation = reconcile(&field_keys, &self.settings.cast_overrides);
        Ok(MeasurementSchema {
            tag_keys,
            field_keys,
            reconciliation,
        })
    }

    /// Run one job through metadata, query, serialization and writing.
    ///
    /// Publishes every intermediate state on `status`; the terminal state is
    /// left to the caller, which also owns error reporting.
    pub async fn export(&self, job: &ExportJob, status: &watch::Sender<JobStatus>) -> ExportResult<ExportOutcome> {
        let started = Instant::now();
        let measurement = job.measurement.as_str();
        let database = &self.settings.database;

        status.send_replace(JobStatus::FetchingMetadata);
        let schema = self.fetch_schema(measurement).await?;

        status.send_replace(JobStatus::Querying);
        let statement = select_statement(measurement, &schema.reconciliation, &self.settings.time_range);
        let body = self
            .client
            .query(Method::GET, database, &statement, NANOSECOND_PRECISION)
            .await?;
        let mut series = parse_series(&body)?;
        if series.is_empty() {
            info!("select empty data from {} on {}", database, measurement);
            return Ok(ExportOutcome {
                stats: ExportStats {
                    duration_ms: started.elapsed().as_millis() as u64,
                    ..ExportStats::default()
                },
                output: None,
            });
        }
        if series.len() > 1 {
            debug!("{} returned {} series, exporting the first", measurement, series.len());
        }
        let series = series.swap_remove(0);

        status.send_replace(JobStatus::Serializing);
        let layout = ColumnLayout::new(
            &series.columns,
            &schema.tag_keys,
            &schema.reconciliation.field_types,
            schema.field_keys.len(),
            schema.reconciliation.cast_column_count(),
        );
        let Some(rendered) = self.writer.render(measurement, &series, &layout)? else {
            return Ok(ExportOutcome {
                stats: ExportStats {
                    duration_ms: started.elapsed().as_millis() as u64,
                    ..ExportStats::default()
                },
                output: None,
            });
        };

        debug!("{} rendered {} rows as {}", measurement, rendered.rows, self.writer.format());

        status.send_replace(JobStatus::Writing);
        let path = self.settings.output_path(measurement);
        tokio::fs::write(&path, &rendered.bytes).await?;

        Ok(ExportOutcome {
            stats: ExportStats {
                rows_written: rendered.rows,
                bytes_written: rendered.bytes.len(),
                duration_ms: started.elapsed().as_millis() as u64,
            },
            output: Some(path),
        })
    }
}

/// Drives a whole run: measurement resolution, the worker pool and the merge
pub struct ExportService {
    client: Arc<dyn QueryClient>,
    config: ExportConfig,
}

impl ExportService {
    pub fn new(client: Arc<dyn QueryClient>, config: ExportConfig) -> Self {
        Self { client, config }
    }

    /// Fails only when the measurement list cannot be resolved; per-job
    /// failures end up in the summary.
    pub async fn run(&self) -> ExportResult<RunSummary> {
        let config = &self.config;
        let measurements = resolve_measurements(self.client.as_ref(), &config.database, &config.measurements)
            .await
            .map_err(|e| {
                error!("unable to resolve measurements of {}: {}", config.database, e);
                e
            })?;

        let range = if config.measurements.is_empty() { config.range } else { None };
        let jobs = select_jobs(&measurements, range);
        if jobs.is_empty() {
            warn!("no measurement selected from {}", config.database);
        }

        let exporter = Arc::new(MeasurementExporter::new(
            self.client.clone(),
            Arc::new(config.settings()),
        ));
        let pool = ExportQueueManager::new(config.workers);
        let reports = pool.run(exporter, jobs, measurements.len()).await;

        info!("{}/{} measurements export done", reports.len(), measurements.len());

        let mut merged = None;
        if config.merge {
            let files: Vec<PathBuf> = reports.iter().filter_map(|r| r.output().cloned()).collect();
            match merge_files(&config.output_dir, &config.database, &files).await {
                Ok(path) => merged = Some(path),
                Err(e) => error!("{}", e),
            }
        }

        Ok(RunSummary {
            total_measurements: measurements.len(),
            reports,
            merged,
        })
    }
}
