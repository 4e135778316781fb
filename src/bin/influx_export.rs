//! Export InfluxDB measurements to line protocol or CSV files.
//!
//! Usage:
//!   influx-export --database telegraf --measurements 'cpu*,mem' --dir export --workers 4

use clap::Parser;
use influx_export::backend::HttpQueryClient;
use influx_export::config::{ConnectionConfig, ExportConfig};
use influx_export::domains::export::types::{CastOverrides, ExportFormat, TimeRange};
use influx_export::errors::ConfigResult;
use influx_export::validation::{split_list, MeasurementRange};
use influx_export::ExportService;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host
    #[arg(long, env = "INFLUX_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(long, env = "INFLUX_PORT", default_value_t = 8086)]
    port: u16,

    /// Database to export
    #[arg(long, env = "INFLUX_DATABASE", default_value = "")]
    database: String,

    /// Comma separated measurements, wildcards allowed; all measurements when empty
    #[arg(long, env = "INFLUX_MEASUREMENTS")]
    measurements: Option<String>,

    /// 1-based inclusive window over all measurements, e.g. `1,10` or `5,`
    #[arg(long, env = "INFLUX_RANGE")]
    range: Option<String>,

    #[arg(long, env = "INFLUX_USERNAME", default_value = "")]
    username: String,

    #[arg(long, env = "INFLUX_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Use https and skip certificate verification
    #[arg(long, env = "INFLUX_SSL")]
    ssl: bool,

    /// Output directory
    #[arg(long, env = "INFLUX_DIR", default_value = "export")]
    dir: PathBuf,

    /// Number of concurrent exports
    #[arg(long, alias = "cpu", env = "INFLUX_WORKERS", default_value_t = 1)]
    workers: usize,

    /// Merge every line protocol file into merge.txt
    #[arg(long, env = "INFLUX_MERGE")]
    merge: bool,

    /// Output format: line or csv
    #[arg(long, env = "INFLUX_FORMAT", default_value = "line")]
    format: String,

    /// Start time in epoch seconds
    #[arg(long, env = "INFLUX_START")]
    start: Option<i64>,

    /// End time in epoch seconds
    #[arg(long, env = "INFLUX_END")]
    end: Option<i64>,

    /// Comma separated string fields to export as boolean
    #[arg(long, env = "INFLUX_BOOLEAN_FIELDS")]
    boolean_fields: Option<String>,

    /// Comma separated string fields to export as float
    #[arg(long, env = "INFLUX_FLOAT_FIELDS")]
    float_fields: Option<String>,

    /// Comma separated string fields to export as integer
    #[arg(long, env = "INFLUX_INTEGER_FIELDS")]
    integer_fields: Option<String>,
}

fn list(value: &Option<String>) -> Vec<String> {
    value.as_deref().map(split_list).unwrap_or_default()
}

fn build_config(args: Args) -> ConfigResult<ExportConfig> {
    let measurements = list(&args.measurements);
    // range only applies to the full measurement list
    let range = match args.range.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() && measurements.is_empty() => Some(MeasurementRange::parse(raw)?),
        _ => None,
    };

    let config = ExportConfig {
        connection: ConnectionConfig {
            host: args.host,
            port: args.port,
            username: args.username,
            password: args.password,
            ssl: args.ssl,
        },
        database: args.database,
        measurements,
        range,
        output_dir: args.dir,
        workers: args.workers,
        merge: args.merge,
        format: args.format.parse::<ExportFormat>()?,
        time_range: TimeRange::new(args.start, args.end),
        cast_overrides: CastOverrides::new(
            list(&args.boolean_fields),
            list(&args.float_fields),
            list(&args.integer_fields),
        ),
    };
    config.validate()?;
    config.prepare_output_dir()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match build_config(Args::parse()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let client = match HttpQueryClient::new(&config.connection) {
        Ok(client) => client,
        Err(e) => {
            error!("unable to create client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "exporting {} from {} to {} as {} with {} workers",
        config.database,
        client.base_url(),
        config.output_dir.display(),
        config.format,
        config.workers
    );

    let service = ExportService::new(Arc::new(client), config);
    match service.run().await {
        Ok(summary) => {
            for report in summary.failed() {
                warn!("{} not exported: {:?}", report.measurement, report.status);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
