use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use powerview_ingest::config::{PipelineConfig, Settings, DEFAULT_FILE_PATTERN};
use powerview_ingest::ingestion::{
    CompositeObserver, FileObserver, IngestionObserver, IngestionPipeline, TracingObserver,
};
use powerview_ingest::report::BatchSummary;
use powerview_ingest::sink::mover::{DEFAULT_ERROR_DIR, DEFAULT_SUCCESS_DIR};
use powerview_ingest::sink::report::DEFAULT_META_COLLECTION;
use powerview_ingest::sink::{DirectoryMover, JsonReportSink, LineProtocolDirSink, TimeSeriesSink};
use powerview_ingest::types::Point;
use powerview_ingest::{IngestError, IngestResult, SinkError};

const DEFAULT_REPORT_DIR: &str = "reports";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Ingest PowerView TSV exports into a time-series store.
#[derive(Debug, Parser)]
#[command(name = "powerview-ingest", version, about)]
struct Cli {
    /// Watched folder: <data>/<company>/<campaign>/<device_master_sn>/<file>.tsv
    #[arg(short = 'd', long, env = "POWERVIEW_DATA")]
    data_folder: Option<PathBuf>,

    /// Process this file only (must live under the data folder).
    #[arg(short = 't', long)]
    tsv_file: Option<PathBuf>,

    /// Parse and report without writing, moving or persisting anything.
    #[arg(long)]
    dry_run: bool,

    /// Folder receiving the JSON reports.
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Collection receiving one summary point per file.
    #[arg(long, env = "TSV_META_BUCKET")]
    meta_bucket: Option<String>,

    #[arg(long, env = "INFLUXDB_HOST")]
    influx_url: Option<String>,

    #[arg(long, env = "INFLUXDB_ADMIN_TOKEN", hide_env_values = true)]
    influx_token: Option<String>,

    #[arg(long, env = "INFLUXDB_ORG")]
    influx_org: Option<String>,

    /// Write line protocol files into this folder instead of InfluxDB.
    #[arg(long)]
    lp_dir: Option<PathBuf>,

    /// TOML settings file. Command-line values take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Append one line per file outcome to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match run(cli) {
        Ok(summary) => {
            match serde_json::to_string_pretty(&summary) {
                Ok(json) => println!("{json}"),
                Err(e) => error!(%e, "could not render run summary"),
            }
            if summary.all_succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            error!(%e, "ingestion aborted");
            eprintln!("error: {e}");
            match e {
                IngestError::Configuration { .. } => ExitCode::from(2),
                _ => ExitCode::from(1),
            }
        }
    }
}

fn init_tracing(verbose: u8, format: LogFormat) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(stderr.json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry().with(filter).with(stderr).init(),
    }
}

fn run(cli: Cli) -> IngestResult<BatchSummary> {
    let settings = match &cli.config {
        Some(path) => Settings::from_toml_path(path)?,
        None => Settings::default(),
    };

    let root = cli
        .data_folder
        .or(settings.data_folder)
        .ok_or_else(|| IngestError::Configuration {
            message: "no data folder given (use --data-folder or POWERVIEW_DATA)".to_string(),
        })?;
    let success_dir = settings.success_dir.unwrap_or_else(|| DEFAULT_SUCCESS_DIR.to_string());
    let error_dir = settings.error_dir.unwrap_or_else(|| DEFAULT_ERROR_DIR.to_string());

    let mut config = PipelineConfig::new(&root)
        .dry_run(cli.dry_run)
        .with_file_pattern(settings.file_pattern.unwrap_or_else(|| DEFAULT_FILE_PATTERN.to_string()))
        .with_terminal_dirs(&success_dir, &error_dir);
    if let Some(target) = cli.tsv_file {
        config = config.with_target(target);
    }

    let store: Arc<dyn TimeSeriesSink> = if cli.dry_run {
        Arc::new(DisabledSink)
    } else if let Some(dir) = cli.lp_dir.or(settings.lp_dir) {
        info!(dir = %dir.display(), "writing line protocol files");
        Arc::new(LineProtocolDirSink::new(dir))
    } else {
        influx_sink(
            cli.influx_url.or(settings.influx.url),
            cli.influx_token.or(settings.influx.token),
            cli.influx_org.or(settings.influx.org),
            settings.influx.batch_size,
        )?
    };

    let report_dir = cli
        .report_dir
        .or(settings.report_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_DIR));
    let meta_bucket = cli
        .meta_bucket
        .or(settings.meta_bucket)
        .unwrap_or_else(|| DEFAULT_META_COLLECTION.to_string());
    let reports = JsonReportSink::new(report_dir).with_meta(store.clone(), meta_bucket);

    let mut observers: Vec<Arc<dyn IngestionObserver>> = vec![Arc::new(TracingObserver)];
    if let Some(log_file) = cli.log_file.or(settings.log_file) {
        observers.push(Arc::new(FileObserver::new(log_file)));
    }

    IngestionPipeline::new(
        config,
        store,
        Arc::new(DirectoryMover::new(success_dir, error_dir)),
        Arc::new(reports),
    )
    .with_observer(Arc::new(CompositeObserver::new(observers)))
    .run()
}

#[cfg(feature = "influx")]
fn influx_sink(
    url: Option<String>,
    token: Option<String>,
    org: Option<String>,
    batch_size: Option<usize>,
) -> IngestResult<Arc<dyn TimeSeriesSink>> {
    use powerview_ingest::sink::{InfluxSettings, InfluxSink};

    let (Some(url), Some(token), Some(org)) = (url, token, org) else {
        return Err(IngestError::Configuration {
            message: "InfluxDB url, token and org are required (or use --lp-dir / --dry-run)"
                .to_string(),
        });
    };
    let mut settings = InfluxSettings::new(url, token, org);
    if let Some(n) = batch_size.filter(|n| *n > 0) {
        settings.batch_size = n;
    }
    info!(url = %settings.url, org = %settings.org, "writing to InfluxDB");
    Ok(Arc::new(InfluxSink::new(settings)))
}

#[cfg(not(feature = "influx"))]
fn influx_sink(
    _url: Option<String>,
    _token: Option<String>,
    _org: Option<String>,
    _batch_size: Option<usize>,
) -> IngestResult<Arc<dyn TimeSeriesSink>> {
    Err(IngestError::Configuration {
        message: "built without the `influx` feature; use --lp-dir or --dry-run".to_string(),
    })
}

/// Store used in dry-run mode, where the pipeline never writes.
struct DisabledSink;

impl TimeSeriesSink for DisabledSink {
    fn ensure_collection(&self, _name: &str) -> Result<(), SinkError> {
        Err(SinkError::Protocol("store disabled in dry-run".to_string()))
    }

    fn write(&self, _collection: &str, _points: &[Point]) -> Result<(), SinkError> {
        Err(SinkError::Protocol("store disabled in dry-run".to_string()))
    }
}
