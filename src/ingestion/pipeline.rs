//! The ingestion pipeline: discovery, per-file processing and relocation.
//!
//! Each file moves through
//! `Discovered → Parsing → {WriteSucceeded | WriteFailed} → {MovedSuccess | MovedError}`.
//!
//! - Row-level problems are counted in the report and never decide the outcome.
//! - A file fails when detection or mapping fails, when no valid point remains, or when the
//!   store rejects the write.
//! - In dry-run mode the file is parsed and a report is computed, but the store, the mover and
//!   the report sink are never called.
//! - In batch mode every file is processed independently; one failure never stops the run.
//! - A file that disappears between discovery and relocation was committed by a concurrent
//!   run: it is reported as already handled and no report is persisted for it.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::error::{IngestError, IngestResult};
use crate::report::{BatchSummary, ChannelStats, FileStatus, RunReport};
use crate::sink::{FileMover, ReportSink, TimeSeriesSink};
use crate::types::{FileState, PathContext, Point, SourceFile};

use super::format::{detect_format, MAX_HEADER_LINES};
use super::mapping::map_channels;
use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, TracingObserver};
use super::points::PointBuilder;
use super::rows::{parse_row, RowCounters};

/// Orchestrates one ingestion run over a data folder or a single target file.
pub struct IngestionPipeline {
    config: PipelineConfig,
    sink: Arc<dyn TimeSeriesSink>,
    mover: Arc<dyn FileMover>,
    reports: Arc<dyn ReportSink>,
    observer: Arc<dyn IngestionObserver>,
}

impl fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IngestionPipeline {
    /// Create a pipeline. Outcomes are reported through [`TracingObserver`] until
    /// [`Self::with_observer`] replaces it.
    pub fn new(
        config: PipelineConfig,
        sink: Arc<dyn TimeSeriesSink>,
        mover: Arc<dyn FileMover>,
        reports: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            config,
            sink,
            mover,
            reports,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the outcome observer.
    pub fn with_observer(mut self, observer: Arc<dyn IngestionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run over the configured target file, or over every discovered file.
    ///
    /// Returns an error only for configuration problems: an invalid root/target, or a target
    /// file that does not follow the path contract. File-level failures end up in the
    /// returned [`BatchSummary`].
    pub fn run(&self) -> IngestResult<BatchSummary> {
        let started = Instant::now();
        self.config.validate()?;

        let root = self.config.root.clone();
        let paths = match &self.config.target {
            Some(target) => vec![target.clone()],
            None => discover_files(&self.config)?,
        };
        info!(
            root = %root.display(),
            files = paths.len(),
            dry_run = self.config.dry_run,
            "starting ingestion run"
        );

        let mut summary = BatchSummary::new(root.clone(), self.config.dry_run);
        for path in paths {
            let mut file = match SourceFile::discover(&root, &path) {
                Ok(file) => file,
                Err(e) => {
                    let ctx = IngestionContext {
                        path: path.clone(),
                        format: None,
                        dry_run: self.config.dry_run,
                    };
                    self.notify_failure(&ctx, &e);
                    if self.config.target.is_some() {
                        return Err(e);
                    }
                    summary.record_skipped();
                    continue;
                }
            };
            let report = self.process_file(&mut file);
            summary.record(report);
        }

        summary.finish(started.elapsed());
        if !self.config.dry_run {
            if let Err(e) = self.reports.publish_run_summary(&summary) {
                warn!(root = %root.display(), %e, "could not publish run summary");
            }
        }
        info!(
            status = summary.status(),
            total = summary.nb_files_total,
            success = summary.nb_files_success,
            failed = summary.nb_files_failed,
            skipped = summary.nb_files_skipped,
            already_handled = summary.nb_files_already_handled,
            points = summary.nb_points_total,
            duration_s = summary.duration_s,
            "ingestion run complete"
        );
        Ok(summary)
    }

    /// Drive one file to its terminal state and return its report.
    pub fn process_file(&self, file: &mut SourceFile) -> RunReport {
        let dry_run = self.config.dry_run;
        let mut report = RunReport::new(file, dry_run);
        debug!(path = %file.path.display(), dry_run, "processing file");

        if !dry_run {
            file.advance(FileState::Parsing);
        }

        let mut failure = match self.ingest(file, &mut report) {
            Ok(()) => {
                report.status = FileStatus::Success;
                None
            }
            Err(e) => {
                report.fail(&e);
                Some(e)
            }
        };

        let ctx = IngestionContext {
            path: file.path.clone(),
            format: report.format,
            dry_run,
        };

        if !dry_run {
            if failure.as_ref().is_some_and(|e| vanished(e, &file.path)) {
                return self.already_handled(file, report);
            }
            if let Err(e) = self.relocate(file, &mut report) {
                if vanished(&e, &file.path) {
                    return self.already_handled(file, report);
                }
                error!(
                    path = %file.path.display(),
                    state = %file.state(),
                    %e,
                    "file left in place, manual intervention required"
                );
                report.fail(&e);
                failure = Some(e);
            }
            self.publish(&report);
        }

        match &failure {
            None => self.observer.on_success(&ctx, &report),
            Some(e) => self.notify_failure(&ctx, e),
        }
        report
    }

    fn already_handled(&self, file: &SourceFile, mut report: RunReport) -> RunReport {
        info!(
            path = %file.path.display(),
            state = %file.state(),
            "file left the watched folder during processing, already handled by another run"
        );
        report.status = FileStatus::AlreadyHandled;
        report.error = Some("file no longer in the watched folder".to_string());
        report
    }

    fn ingest(&self, file: &mut SourceFile, report: &mut RunReport) -> IngestResult<()> {
        let points = parse_source(&file.path, &file.context, report)?;
        if !self.config.dry_run {
            file.format = report.format;
        }
        if points.is_empty() {
            return Err(IngestError::NoValidPoints {
                rows: report.nb_rows,
            });
        }
        if self.config.dry_run {
            return Ok(());
        }

        let collection = &file.context.company;
        self.sink.ensure_collection(collection)?;
        self.sink.write(collection, &points)?;
        debug!(collection = %collection, points = points.len(), "points written");
        Ok(())
    }

    fn relocate(&self, file: &mut SourceFile, report: &mut RunReport) -> IngestResult<()> {
        let success = report.is_success();
        file.advance(if success {
            FileState::WriteSucceeded
        } else {
            FileState::WriteFailed
        });

        let moved = if success {
            self.mover.move_to_success(&file.path)
        } else {
            self.mover.move_to_error(&file.path)
        };
        let dest = moved.map_err(|source| IngestError::Move {
            path: file.path.clone(),
            source,
        })?;

        file.advance(if success {
            FileState::MovedSuccess
        } else {
            FileState::MovedError
        });
        debug!(from = %file.path.display(), to = %dest.display(), "file relocated");
        report.relocated_to = Some(dest);
        Ok(())
    }

    fn publish(&self, report: &RunReport) {
        match self.reports.persist(report) {
            Ok(path) => debug!(report = %path.display(), "report persisted"),
            Err(e) => error!(file = %report.file_path.display(), %e, "could not persist report"),
        }
        if let Err(e) = self.reports.publish_summary(report) {
            warn!(file = %report.file_path.display(), %e, "could not publish file summary");
        }
    }

    fn notify_failure(&self, ctx: &IngestionContext, e: &IngestError) {
        let severity = IngestionSeverity::for_error(e);
        self.observer.on_failure(ctx, severity, e);
        if severity >= self.config.alert_at_or_above {
            self.observer.on_alert(ctx, severity, e);
        }
    }
}

/// List candidate files under the configured root, sorted.
///
/// Terminal folders and hidden entries are pruned; only file names matching
/// [`PipelineConfig::file_pattern`] are kept.
pub fn discover_files(config: &PipelineConfig) -> IngestResult<Vec<PathBuf>> {
    let pattern = glob::Pattern::new(&config.file_pattern).map_err(|e| {
        IngestError::configuration(format!("invalid file pattern '{}': {e}", config.file_pattern))
    })?;

    let walker = WalkDir::new(&config.root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            if name.starts_with('.') {
                return false;
            }
            !(e.file_type().is_dir() && config.is_terminal_dir(&name))
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(%e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && pattern.matches(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    debug!(root = %config.root.display(), files = files.len(), "discovery finished");
    Ok(files)
}

/// Parse a file into points, filling the parsing-related fields of `report`.
///
/// Fails on unreadable files, unknown formats and malformed headers. Row-level problems are
/// only counted.
pub fn parse_source(path: &Path, context: &PathContext, report: &mut RunReport) -> IngestResult<Vec<Point>> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);

    let head: Vec<&str> = text.lines().take(MAX_HEADER_LINES).collect();
    let header = detect_format(&head)?;
    report.format = Some(header.format);
    report.format_metadata = header.metadata();
    report.declared_timezone = header.declared_timezone().map(str::to_string);
    if let Some(tz) = header.declared_timezone() {
        if !tz.eq_ignore_ascii_case("utc") {
            warn!(
                path = %path.display(),
                timezone = tz,
                "header declares a non-UTC timezone; timestamps are still read as UTC"
            );
        }
    }

    let channels = map_channels(&header)?;
    report.nb_channels = channels.len();
    if let Some(first) = channels.first() {
        if first.master_sn != context.device_master_sn {
            warn!(
                path = %path.display(),
                header = %first.master_sn,
                folder = %context.device_master_sn,
                "master serial in header differs from device folder"
            );
        }
    }

    let mut stats: Vec<ChannelStats> = channels
        .iter()
        .map(ChannelStats::new)
        .collect();

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut builder = PointBuilder::new(&channels, context, &file_name);
    let mut counters = RowCounters::default();

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(skip_lines(&text, header.data_start).as_bytes());

    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let samples = parse_row(&record, &channels, &mut counters);
        for s in samples.iter().filter(|s| !s.valid) {
            stats[s.channel].record_invalid();
        }
        if let Some(ts) = samples.iter().find(|s| s.valid).map(|s| s.timestamp) {
            report.observe_timestamp(ts);
        }
        builder.push(samples);
    }

    for (idx, value) in builder.values() {
        stats[idx].record_value(value);
    }
    report.apply_counters(&counters);
    report.channels = channels
        .iter()
        .zip(stats)
        .map(|(c, s)| (c.channel_id.clone(), s))
        .collect();

    let points = builder.finish();
    report.nb_points = points.len();
    Ok(points)
}

/// A read or move that failed because the source is gone.
fn vanished(e: &IngestError, path: &Path) -> bool {
    let not_found = match e {
        IngestError::Io(err) | IngestError::Move { source: err, .. } => {
            err.kind() == io::ErrorKind::NotFound
        }
        _ => false,
    };
    not_found && !path.exists()
}

fn skip_lines(text: &str, n: usize) -> &str {
    let mut rest = text;
    for _ in 0..n {
        match rest.find('\n') {
            Some(i) => rest = &rest[i + 1..],
            None => return "",
        }
    }
    rest
}
