use crate::domains::export::service::MeasurementExporter;
use crate::domains::export::types::{ExportJob, ExportOutcome, JobReport, JobStatus};
use crate::errors::ExportError;
use log::{error, info};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// Handle for tracking one export job
pub struct JobHandle {
    pub position: usize,
    pub measurement: String,
    status_receiver: watch::Receiver<JobStatus>,
}

impl JobHandle {
    pub fn status(&self) -> JobStatus {
        self.status_receiver.borrow().clone()
    }

    fn into_report(self, outcome: Option<ExportOutcome>) -> JobReport {
        let mut status = self.status();
        if !status.is_terminal() {
            status = JobStatus::Failed(ExportError::WorkerPanic(self.measurement.clone()).to_string());
        }
        JobReport {
            position: self.position,
            measurement: self.measurement,
            status,
            outcome,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Fixed-size worker pool; every job runs on its own task behind a semaphore
pub struct ExportQueueManager {
    semaphore: Arc<Semaphore>,
}

impl ExportQueueManager {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Run every job to completion and return the reports in submission order.
    ///
    /// `total` is the size of the full measurement list, used for progress lines.
    pub async fn run(
        &self,
        exporter: Arc<MeasurementExporter>,
        jobs: Vec<ExportJob>,
        total: usize,
    ) -> Vec<JobReport> {
        let mut join_set = JoinSet::new();
        let mut handles = Vec::with_capacity(jobs.len());

        for (slot, job) in jobs.into_iter().enumerate() {
            let (tx, rx) = watch::channel(JobStatus::Pending);
            handles.push(JobHandle {
                position: job.position,
                measurement: job.measurement.clone(),
                status_receiver: rx,
            });

            let semaphore = self.semaphore.clone();
            let exporter = exporter.clone();
            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        tx.send_replace(JobStatus::Failed("worker pool closed".to_string()));
                        return (slot, None);
                    }
                };

                let outcome = match exporter.export(&job, &tx).await {
                    Ok(outcome) => {
                        tx.send_replace(JobStatus::Done);
                        Some(outcome)
                    }
                    Err(e) => {
                        error!("export {} failed: {}", job.measurement, e);
                        tx.send_replace(JobStatus::Failed(e.to_string()));
                        None
                    }
                };
                info!("{}/{}: {} processed", job.position + 1, total, job.measurement);
                (slot, outcome)
            });
        }

        let mut outcomes: HashMap<usize, ExportOutcome> = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, Some(outcome))) => {
                    outcomes.insert(slot, outcome);
                }
                Ok((_, None)) => {}
                Err(e) if e.is_panic() => {
                    let payload = e.into_panic();
                    error!("export worker panicked: {}", panic_message(payload.as_ref()));
                }
                Err(e) => error!("export worker stopped: {}", e),
            }
        }

        handles
            .into_iter()
            .enumerate()
            .map(|(slot, handle)| handle.into_report(outcomes.remove(&slot)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::QueryClient;
    use crate::config::ExportConfig;
    use crate::errors::{QueryError, QueryResult};
    use async_trait::async_trait;
    use reqwest::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Every measurement has no data; tracks how many queries overlap
    #[derive(Default)]
    struct SlowClient {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl QueryClient for SlowClient {
        async fn query(&self, _: Method, _: &str, statement: &str, _: &str) -> QueryResult<Vec<u8>> {
            if statement.contains("panics") {
                panic!("boom");
            }
            if statement.contains("unreachable") {
                return Err(QueryError::Transport("connection refused".to_string()));
            }
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(br#"{"results":[{"statement_id":0}]}"#.to_vec())
        }
    }

    fn exporter_with(client: Arc<SlowClient>, dir: &std::path::Path) -> Arc<MeasurementExporter> {
        let mut config = ExportConfig::new("telegraf");
        config.output_dir = dir.to_path_buf();
        Arc::new(MeasurementExporter::new(client, Arc::new(config.settings())))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let tmp = tempfile::tempdir().unwrap();
        let client = Arc::new(SlowClient::default());
        let exporter = exporter_with(client.clone(), tmp.path());
        let jobs: Vec<ExportJob> = (0..8).map(|i| ExportJob::new(i, format!("m{}", i))).collect();

        let pool = ExportQueueManager::new(2);
        let reports = pool.run(exporter, jobs, 8).await;

        assert_eq!(reports.len(), 8);
        assert!(reports.iter().all(|r| r.succeeded()));
        assert!(client.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_reports_keep_submission_order_and_isolate_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let exporter = exporter_with(Arc::new(SlowClient::default()), tmp.path());
        let jobs = vec![
            ExportJob::new(0, "panics"),
            ExportJob::new(1, "unreachable"),
            ExportJob::new(2, "fine"),
        ];

        let reports = ExportQueueManager::new(3).run(exporter, jobs, 3).await;
        let positions: Vec<usize> = reports.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);

        assert_eq!(
            reports[0].status,
            JobStatus::Failed("Worker panicked: panics".to_string())
        );
        assert!(matches!(reports[1].status, JobStatus::Failed(ref m) if m.contains("connection refused")));
        assert!(reports[2].succeeded());
        assert_eq!(reports[2].output(), None);
    }
}
