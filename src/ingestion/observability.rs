use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use tracing::{error, info, warn};

use crate::error::{IngestError, SinkError};
use crate::report::RunReport;

use super::format::FileFormat;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (file routed to the error folder).
    Error,
    /// Critical error (configuration, relocation, store transport or local I/O failures).
    Critical,
}

impl IngestionSeverity {
    /// Classify a file-level error.
    pub fn for_error(e: &IngestError) -> Self {
        match e {
            IngestError::Configuration { .. }
            | IngestError::Move { .. }
            | IngestError::Io(_)
            | IngestError::Sink(SinkError::Transport(_) | SinkError::Io(_)) => Self::Critical,
            IngestError::Csv(err) => match err.kind() {
                csv::ErrorKind::Io(_) => Self::Critical,
                _ => Self::Error,
            },
            IngestError::Json(_)
            | IngestError::UnknownFormat { .. }
            | IngestError::MalformedHeader { .. }
            | IngestError::NoValidPoints { .. }
            | IngestError::Sink(SinkError::Status { .. } | SinkError::Protocol(_)) => Self::Error,
        }
    }
}

/// Context about one file going through the pipeline.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    pub path: PathBuf,
    /// `None` until detection succeeded.
    pub format: Option<FileFormat>,
    pub dry_run: bool,
}

/// Observer interface for per-file outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called when a file ends in the success state.
    fn on_success(&self, _ctx: &IngestionContext, _report: &RunReport) {}

    /// Called when a file fails.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, report: &RunReport) {
        for o in &self.observers {
            o.on_success(ctx, report);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Emits outcomes as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestionContext, report: &RunReport) {
        info!(
            path = %ctx.path.display(),
            format = ?ctx.format,
            dry_run = ctx.dry_run,
            points = report.nb_points,
            invalid_timestamps = report.nb_invalid_timestamps,
            invalid_values = report.nb_invalid_values,
            "file ingested"
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        match severity {
            IngestionSeverity::Info | IngestionSeverity::Warning => {
                warn!(path = %ctx.path.display(), ?severity, %error, "file ingestion issue")
            }
            IngestionSeverity::Error | IngestionSeverity::Critical => {
                error!(path = %ctx.path.display(), format = ?ctx.format, ?severity, %error, "file ingestion failed")
            }
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        error!(alert = true, path = %ctx.path.display(), ?severity, %error, "ingestion alert");
    }
}

/// Appends ingestion events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{} {line}", Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_success(&self, ctx: &IngestionContext, report: &RunReport) {
        self.append_line(&format!(
            "ok format={} path={} points={} invalid_ts={} invalid_values={} dry_run={}",
            format_label(ctx.format),
            ctx.path.display(),
            report.nb_points,
            report.nb_invalid_timestamps,
            report.nb_invalid_values,
            ctx.dry_run
        ));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        self.append_line(&format!(
            "fail severity={:?} format={} path={} err={}",
            severity,
            format_label(ctx.format),
            ctx.path.display(),
            error
        ));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        self.append_line(&format!(
            "ALERT severity={:?} format={} path={} err={}",
            severity,
            format_label(ctx.format),
            ctx.path.display(),
            error
        ));
    }
}

fn format_label(format: Option<FileFormat>) -> &'static str {
    format.map_or("unknown", FileFormat::id)
}
