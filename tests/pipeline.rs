use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use powerview_ingest::config::PipelineConfig;
use powerview_ingest::ingestion::{
    discover_files, IngestionContext, IngestionObserver, IngestionPipeline, IngestionSeverity,
};
use powerview_ingest::report::{BatchSummary, FileStatus, RunReport};
use powerview_ingest::sink::{DirectoryMover, FileMover, JsonReportSink, LineProtocolDirSink, ReportSink, TimeSeriesSink};
use powerview_ingest::types::{Point, SourceFile};
use powerview_ingest::{IngestError, IngestResult, SinkError};

const V002: &str = "tests/fixtures/T302_V002_three_phase.tsv";
const V003: &str = "tests/fixtures/T302_V003_single_phase.tsv";
const UNKNOWN: &str = "tests/fixtures/unknown_format.tsv";

#[derive(Default)]
struct RecordingSink {
    collections: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, Vec<Point>)>>,
    fail_writes: bool,
}

impl RecordingSink {
    fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.collections.lock().unwrap().len() + self.writes.lock().unwrap().len()
    }

    fn points(&self) -> usize {
        self.writes.lock().unwrap().iter().map(|(_, p)| p.len()).sum()
    }
}

impl TimeSeriesSink for RecordingSink {
    fn ensure_collection(&self, name: &str) -> Result<(), SinkError> {
        self.collections.lock().unwrap().push(name.to_string());
        Ok(())
    }

    fn write(&self, collection: &str, points: &[Point]) -> Result<(), SinkError> {
        if self.fail_writes {
            return Err(SinkError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        self.writes
            .lock()
            .unwrap()
            .push((collection.to_string(), points.to_vec()));
        Ok(())
    }
}

/// Delegates to a real mover (or refuses) and counts calls.
struct CountingMover {
    inner: DirectoryMover,
    calls: Mutex<usize>,
    refuse: bool,
    /// Remove the file first, as a concurrent run committing it would.
    lose_race: bool,
}

impl CountingMover {
    fn new() -> Self {
        Self {
            inner: DirectoryMover::default(),
            calls: Mutex::new(0),
            refuse: false,
            lose_race: false,
        }
    }

    fn losing_race() -> Self {
        Self {
            lose_race: true,
            ..Self::new()
        }
    }

    fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn relocate(&self, path: &Path, success: bool) -> io::Result<PathBuf> {
        *self.calls.lock().unwrap() += 1;
        if self.refuse {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only share"));
        }
        if self.lose_race {
            fs::remove_file(path)?;
        }
        if success {
            self.inner.move_to_success(path)
        } else {
            self.inner.move_to_error(path)
        }
    }
}

impl FileMover for CountingMover {
    fn move_to_success(&self, path: &Path) -> io::Result<PathBuf> {
        self.relocate(path, true)
    }

    fn move_to_error(&self, path: &Path) -> io::Result<PathBuf> {
        self.relocate(path, false)
    }
}

#[derive(Default)]
struct RecordingReports {
    persisted: Mutex<Vec<RunReport>>,
    summaries: Mutex<usize>,
    runs: Mutex<Vec<BatchSummary>>,
}

impl RecordingReports {
    fn calls(&self) -> usize {
        self.persisted.lock().unwrap().len()
            + *self.summaries.lock().unwrap()
            + self.runs.lock().unwrap().len()
    }
}

impl ReportSink for RecordingReports {
    fn persist(&self, report: &RunReport) -> IngestResult<PathBuf> {
        self.persisted.lock().unwrap().push(report.clone());
        Ok(PathBuf::from(format!("{}.report.json", report.file_name)))
    }

    fn publish_summary(&self, _report: &RunReport) -> Result<(), SinkError> {
        *self.summaries.lock().unwrap() += 1;
        Err(SinkError::Transport("meta store unreachable".to_string()))
    }

    fn publish_run_summary(&self, summary: &BatchSummary) -> Result<(), SinkError> {
        self.runs.lock().unwrap().push(summary.clone());
        Err(SinkError::Transport("meta store unreachable".to_string()))
    }
}

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<usize>,
    failures: Mutex<Vec<IngestionSeverity>>,
    alerts: Mutex<Vec<IngestionSeverity>>,
}

impl IngestionObserver for RecordingObserver {
    fn on_success(&self, _ctx: &IngestionContext, _report: &RunReport) {
        *self.successes.lock().unwrap() += 1;
    }

    fn on_failure(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

struct Harness {
    sink: Arc<RecordingSink>,
    mover: Arc<CountingMover>,
    reports: Arc<RecordingReports>,
    observer: Arc<RecordingObserver>,
}

impl Harness {
    fn new() -> Self {
        Self::with(RecordingSink::default(), CountingMover::new())
    }

    fn with(sink: RecordingSink, mover: CountingMover) -> Self {
        Self {
            sink: Arc::new(sink),
            mover: Arc::new(mover),
            reports: Arc::new(RecordingReports::default()),
            observer: Arc::new(RecordingObserver::default()),
        }
    }

    fn pipeline(&self, config: PipelineConfig) -> IngestionPipeline {
        IngestionPipeline::new(config, self.sink.clone(), self.mover.clone(), self.reports.clone())
            .with_observer(self.observer.clone())
    }
}

/// Copy a fixture to `<root>/company1/campaign1/<device>/<name>`.
fn place(root: &Path, fixture: &str, device: &str, name: &str) -> PathBuf {
    let dir = root.join("company1").join("campaign1").join(device);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::copy(fixture, &path).unwrap();
    path
}

#[test]
fn batch_run_writes_points_and_relocates_to_success() {
    let root = tempfile::tempdir().unwrap();
    let v2 = place(root.path(), V002, "02001084", "T302_251012_031720.tsv");
    let v3 = place(root.path(), V003, "02001171", "T302_251013_031720.tsv");
    let h = Harness::new();

    let summary = h.pipeline(PipelineConfig::new(root.path())).run().unwrap();

    assert_eq!(summary.nb_files_total, 2);
    assert_eq!(summary.nb_files_success, 2);
    assert!(summary.all_succeeded());
    assert_eq!(summary.nb_points_total, 11 + 6);
    assert_eq!(h.sink.points(), 17);
    assert!(h.sink.writes.lock().unwrap().iter().all(|(c, _)| c == "company1"));

    assert!(!v2.exists());
    assert!(!v3.exists());
    assert!(v2.parent().unwrap().join("success/T302_251012_031720.tsv").exists());
    assert!(v3.parent().unwrap().join("success/T302_251013_031720.tsv").exists());

    let persisted = h.reports.persisted.lock().unwrap();
    assert_eq!(persisted.len(), 2);
    assert!(persisted.iter().all(|r| r.status == FileStatus::Success && r.relocated_to.is_some()));
    assert_eq!(*h.observer.successes.lock().unwrap(), 2);
}

#[test]
fn summary_publish_failure_does_not_fail_the_file() {
    let root = tempfile::tempdir().unwrap();
    place(root.path(), V003, "02001171", "a.tsv");
    let h = Harness::new();

    let summary = h.pipeline(PipelineConfig::new(root.path())).run().unwrap();

    assert!(summary.all_succeeded());
    assert_eq!(*h.reports.summaries.lock().unwrap(), 1);
    assert_eq!(h.reports.runs.lock().unwrap().len(), 1);
}

#[test]
fn run_summary_is_published_once_per_run() {
    let root = tempfile::tempdir().unwrap();
    place(root.path(), V002, "02001084", "a.tsv");
    place(root.path(), UNKNOWN, "02001084", "b.tsv");
    let h = Harness::new();

    let summary = h.pipeline(PipelineConfig::new(root.path())).run().unwrap();

    let runs = h.reports.runs.lock().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].nb_files_total, 2);
    assert_eq!(runs[0].nb_files_failed, 1);
    assert_eq!(runs[0].status(), "partial");
    assert_eq!(runs[0].files, summary.files);
}

#[test]
fn row_level_problems_are_counted_not_fatal() {
    let root = tempfile::tempdir().unwrap();
    place(root.path(), V002, "02001084", "a.tsv");
    let h = Harness::new();

    let summary = h.pipeline(PipelineConfig::new(root.path())).run().unwrap();
    let report = &summary.files[0];

    assert_eq!(report.status, FileStatus::Success);
    assert_eq!(report.nb_rows, 4);
    assert_eq!(report.nb_invalid_timestamps, 1);
    assert_eq!(report.nb_invalid_values, 1);
    assert_eq!(report.nb_points, 11);
    assert_eq!(report.nb_channels, 4);
    assert_eq!(report.channels["M02001084_Ch2_M02001084"].nb_invalid_values, 1);
    assert_eq!(
        report.first_timestamp.unwrap().to_rfc3339(),
        "2025-08-03T03:20:00+00:00"
    );
    assert_eq!(
        report.last_timestamp.unwrap().to_rfc3339(),
        "2025-08-03T03:40:00+00:00"
    );

    let writes = h.sink.writes.lock().unwrap();
    let point = &writes[0].1[0];
    assert_eq!(point.measurement, "campaign");
    assert_eq!(point.tags["campaign"], "campaign1");
    assert_eq!(point.tags["device_type"], "three_phase");
}

#[test]
fn v003_metadata_lands_in_the_report() {
    let root = tempfile::tempdir().unwrap();
    place(root.path(), V003, "02001171", "a.tsv");
    let h = Harness::new();

    let summary = h.pipeline(PipelineConfig::new(root.path())).run().unwrap();
    let report = &summary.files[0];

    assert_eq!(report.format_metadata["master"], "02001171");
    assert_eq!(report.declared_timezone.as_deref(), Some("UTC"));
    let ids: Vec<&str> = report.channels.keys().map(String::as_str).collect();
    assert_eq!(
        ids,
        vec!["M02001171_Ch1", "M02001171_S04000466_Ch1", "M02001171_U1"]
    );
}

#[test]
fn dry_run_has_no_side_effects_and_is_repeatable() {
    let root = tempfile::tempdir().unwrap();
    let v2 = place(root.path(), V002, "02001084", "a.tsv");
    let bad = place(root.path(), UNKNOWN, "02001084", "b.tsv");
    let h = Harness::new();
    let config = PipelineConfig::new(root.path()).dry_run(true);

    let first = h.pipeline(config.clone()).run().unwrap();
    let second = h.pipeline(config).run().unwrap();

    assert_eq!(h.sink.calls(), 0);
    assert_eq!(h.mover.calls(), 0);
    assert_eq!(h.reports.calls(), 0);
    assert!(v2.exists());
    assert!(bad.exists());
    assert!(!v2.parent().unwrap().join("success").exists());

    assert_eq!(first.files, second.files);
    assert_eq!(first.nb_files_success, 1);
    assert_eq!(first.nb_files_failed, 1);
    assert!(first.files.iter().all(|r| r.dry_run && r.relocated_to.is_none()));
    assert_eq!(first.files[0].nb_points, 11);
}

#[test]
fn unknown_format_goes_to_error_and_the_batch_continues() {
    let root = tempfile::tempdir().unwrap();
    let bad = place(root.path(), UNKNOWN, "02001084", "a.tsv");
    let good = place(root.path(), V002, "02001084", "b.tsv");
    let h = Harness::new();

    let summary = h.pipeline(PipelineConfig::new(root.path())).run().unwrap();

    assert_eq!(summary.nb_files_success, 1);
    assert_eq!(summary.nb_files_failed, 1);
    assert!(!summary.all_succeeded());

    let failed = summary.files.iter().find(|r| r.file_name == "a.tsv").unwrap();
    assert_eq!(failed.status, FileStatus::Error);
    assert!(failed.error.as_deref().unwrap().contains("unknown"));
    assert!(bad.parent().unwrap().join("error/a.tsv").exists());
    assert!(good.parent().unwrap().join("success/b.tsv").exists());
    assert_eq!(*h.observer.failures.lock().unwrap(), vec![IngestionSeverity::Error]);
    assert!(h.observer.alerts.lock().unwrap().is_empty());
}

#[test]
fn file_without_valid_rows_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("company1/campaign1/02001084");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("a.tsv"),
        "02001084\t02001084\nMV_T302_V002\tPh 1 V\nnot a date\t1.0\n03/08/25 03:20:00\tx\n",
    )
    .unwrap();
    let h = Harness::new();

    let summary = h.pipeline(PipelineConfig::new(root.path())).run().unwrap();
    let report = &summary.files[0];

    assert_eq!(report.status, FileStatus::Error);
    assert_eq!(report.nb_rows, 2);
    assert!(report.error.as_deref().unwrap().contains("no valid points"));
    assert_eq!(h.sink.calls(), 0);
    assert!(dir.join("error/a.tsv").exists());
}

#[test]
fn store_failure_routes_the_file_to_error() {
    let root = tempfile::tempdir().unwrap();
    let path = place(root.path(), V002, "02001084", "a.tsv");
    let h = Harness::with(RecordingSink::failing(), CountingMover::new());

    let summary = h.pipeline(PipelineConfig::new(root.path())).run().unwrap();
    let report = &summary.files[0];

    assert_eq!(report.status, FileStatus::Error);
    assert!(report.error.as_deref().unwrap().contains("500"));
    assert!(path.parent().unwrap().join("error/a.tsv").exists());
    assert_eq!(h.reports.persisted.lock().unwrap().len(), 1);
}

#[test]
fn move_failure_leaves_the_file_in_place_and_alerts() {
    let root = tempfile::tempdir().unwrap();
    let path = place(root.path(), V002, "02001084", "a.tsv");
    let h = Harness::with(RecordingSink::default(), CountingMover::refusing());

    let summary = h.pipeline(PipelineConfig::new(root.path())).run().unwrap();
    let report = &summary.files[0];

    assert!(path.exists());
    assert_eq!(report.status, FileStatus::Error);
    assert!(report.relocated_to.is_none());
    assert!(report.error.as_deref().unwrap().contains("read-only share"));
    assert_eq!(*h.observer.alerts.lock().unwrap(), vec![IngestionSeverity::Critical]);
}

#[test]
fn relocated_files_are_not_rediscovered() {
    let root = tempfile::tempdir().unwrap();
    place(root.path(), V002, "02001084", "a.tsv");
    place(root.path(), UNKNOWN, "02001084", "b.tsv");
    let config = PipelineConfig::new(root.path());
    assert_eq!(discover_files(&config).unwrap().len(), 2);

    let h = Harness::new();
    h.pipeline(config.clone()).run().unwrap();

    assert!(discover_files(&config).unwrap().is_empty());
    let again = h.pipeline(config).run().unwrap();
    assert_eq!(again.nb_files_total, 0);
    assert_eq!(h.mover.calls(), 2);
}

#[test]
fn discovery_ignores_hidden_and_non_matching_files() {
    let root = tempfile::tempdir().unwrap();
    let keep = place(root.path(), V002, "02001084", "a.tsv");
    place(root.path(), V002, "02001084", ".partial.tsv");
    place(root.path(), V002, "02001084", "notes.txt");

    let files = discover_files(&PipelineConfig::new(root.path())).unwrap();
    assert_eq!(files, vec![keep]);
}

#[test]
fn shallow_path_is_skipped_in_batch_mode() {
    let root = tempfile::tempdir().unwrap();
    let shallow = root.path().join("company1").join("stray.tsv");
    fs::create_dir_all(shallow.parent().unwrap()).unwrap();
    fs::copy(V002, &shallow).unwrap();
    place(root.path(), V002, "02001084", "a.tsv");
    let h = Harness::new();

    let summary = h.pipeline(PipelineConfig::new(root.path())).run().unwrap();

    assert_eq!(summary.nb_files_total, 2);
    assert_eq!(summary.nb_files_skipped, 1);
    assert_eq!(summary.nb_files_success, 1);
    assert!(shallow.exists());
    assert_eq!(h.reports.persisted.lock().unwrap().len(), 1);
    assert_eq!(*h.observer.alerts.lock().unwrap(), vec![IngestionSeverity::Critical]);
}

#[test]
fn shallow_target_is_a_configuration_error() {
    let root = tempfile::tempdir().unwrap();
    let shallow = root.path().join("company1").join("stray.tsv");
    fs::create_dir_all(shallow.parent().unwrap()).unwrap();
    fs::copy(V002, &shallow).unwrap();
    let h = Harness::new();

    let err = h
        .pipeline(PipelineConfig::new(root.path()).with_target(&shallow))
        .run()
        .unwrap_err();

    assert!(matches!(err, IngestError::Configuration { .. }));
    assert!(shallow.exists());
    assert_eq!(h.mover.calls(), 0);
}

#[test]
fn target_mode_processes_only_that_file() {
    let root = tempfile::tempdir().unwrap();
    let target = place(root.path(), V002, "02001084", "a.tsv");
    let other = place(root.path(), V003, "02001171", "b.tsv");
    let h = Harness::new();

    let summary = h
        .pipeline(PipelineConfig::new(root.path()).with_target(&target))
        .run()
        .unwrap();

    assert_eq!(summary.nb_files_total, 1);
    assert_eq!(summary.files[0].file_name, "a.tsv");
    assert!(other.exists());
}

#[test]
fn real_adapters_write_line_protocol_reports_and_summaries() {
    let work = tempfile::tempdir().unwrap();
    let root = work.path().join("data");
    place(&root, V003, "02001171", "T302_251013_031720.tsv");

    let lp = Arc::new(LineProtocolDirSink::new(work.path().join("lp")));
    let reports = JsonReportSink::new(work.path().join("reports")).with_meta(lp.clone(), "powerview_meta");
    let pipeline = IngestionPipeline::new(
        PipelineConfig::new(&root),
        lp.clone(),
        Arc::new(DirectoryMover::default()),
        Arc::new(reports),
    );

    let summary = pipeline.run().unwrap();
    assert!(summary.all_succeeded());

    let data = fs::read_to_string(lp.collection_path("company1")).unwrap();
    assert_eq!(data.lines().count(), 6);
    assert!(data.lines().all(|l| l.starts_with("campaign,")));
    assert!(data.contains("M02001171_U1_V=230.1"));

    let meta = fs::read_to_string(lp.collection_path("powerview_meta")).unwrap();
    assert!(meta.starts_with("ingest_file,"));
    assert!(meta.contains("status=success"));

    let report_path = work
        .path()
        .join("reports/company1/campaign1/02001171/T302_251013_031720.report.json");
    let report: RunReport = serde_json::from_slice(&fs::read(report_path).unwrap()).unwrap();
    assert_eq!(report.status, FileStatus::Success);
    assert_eq!(report.nb_points, 6);
    assert!(report.relocated_to.unwrap().ends_with("success/T302_251013_031720.tsv"));

    let meta_lines: Vec<&str> = meta.lines().collect();
    assert_eq!(meta_lines.len(), 2);
    assert!(meta_lines[1].starts_with("ingest_run,status=success "));
    assert!(meta_lines[1].contains("nb_files_success=1i"));
}

#[test]
fn same_file_name_on_two_devices_keeps_both_reports() {
    let work = tempfile::tempdir().unwrap();
    let root = work.path().join("data");
    place(&root, V002, "02001084", "T302_251012_031720.tsv");
    place(&root, UNKNOWN, "02001085", "T302_251012_031720.tsv");

    let reports_dir = work.path().join("reports");
    let pipeline = IngestionPipeline::new(
        PipelineConfig::new(&root),
        Arc::new(RecordingSink::default()),
        Arc::new(DirectoryMover::default()),
        Arc::new(JsonReportSink::new(&reports_dir)),
    );
    let summary = pipeline.run().unwrap();
    assert_eq!(summary.nb_files_success, 1);
    assert_eq!(summary.nb_files_failed, 1);

    let campaign = reports_dir.join("company1/campaign1");
    let ok: RunReport = serde_json::from_slice(
        &fs::read(campaign.join("02001084/T302_251012_031720.report.json")).unwrap(),
    )
    .unwrap();
    let failed: RunReport = serde_json::from_slice(
        &fs::read(campaign.join("02001085/T302_251012_031720.report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(ok.status, FileStatus::Success);
    assert_eq!(failed.status, FileStatus::Error);
}

#[test]
fn already_relocated_target_is_rejected() {
    let work = tempfile::tempdir().unwrap();
    let root = work.path().join("data");
    let path = place(&root, V002, "02001084", "a.tsv");
    let lp = Arc::new(LineProtocolDirSink::new(work.path().join("lp")));
    let pipeline = |config: PipelineConfig| {
        IngestionPipeline::new(
            config,
            lp.clone(),
            Arc::new(DirectoryMover::default()),
            Arc::new(JsonReportSink::new(work.path().join("reports"))),
        )
    };

    pipeline(PipelineConfig::new(&root)).run().unwrap();
    let relocated = path.parent().unwrap().join("success/a.tsv");
    let lines_before = fs::read_to_string(lp.collection_path("company1")).unwrap().lines().count();

    let err = pipeline(PipelineConfig::new(&root).with_target(&relocated))
        .run()
        .unwrap_err();

    assert!(matches!(err, IngestError::Configuration { .. }));
    assert!(relocated.exists());
    assert!(!relocated.parent().unwrap().join("success/a.tsv").exists());
    let lines_after = fs::read_to_string(lp.collection_path("company1")).unwrap().lines().count();
    assert_eq!(lines_after, lines_before);
}

#[test]
fn file_gone_before_parsing_is_already_handled() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("company1/campaign1/02001084/a.tsv");
    let mut file = SourceFile::discover(root.path(), &path).unwrap();
    let h = Harness::new();

    let report = h.pipeline(PipelineConfig::new(root.path())).process_file(&mut file);

    assert_eq!(report.status, FileStatus::AlreadyHandled);
    assert_eq!(h.mover.calls(), 0);
    assert_eq!(h.reports.calls(), 0);
    assert!(h.observer.failures.lock().unwrap().is_empty());
}

#[test]
fn file_gone_before_relocation_is_not_reported_again() {
    let root = tempfile::tempdir().unwrap();
    let path = place(root.path(), V002, "02001084", "a.tsv");
    let h = Harness::with(RecordingSink::default(), CountingMover::losing_race());

    let summary = h.pipeline(PipelineConfig::new(root.path())).run().unwrap();

    assert_eq!(summary.nb_files_already_handled, 1);
    assert_eq!(summary.nb_files_failed, 0);
    assert!(summary.all_succeeded());
    assert_eq!(summary.files[0].status, FileStatus::AlreadyHandled);
    assert!(!path.parent().unwrap().join("error").exists());
    assert!(h.reports.persisted.lock().unwrap().is_empty());
    assert_eq!(*h.reports.summaries.lock().unwrap(), 0);
    assert!(h.observer.alerts.lock().unwrap().is_empty());
}

#[test]
fn channel_stats_follow_deduplicated_points() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("company1/campaign1/02001084");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("a.tsv"),
        "02001084\t02001084\t04000466\n\
         MV_T302_V002\tPh 1 V\tVoie1 W\n\
         03/08/25 03:20:00\t240.0\t10.0\n\
         03/08/25 03:20:00\t242.0\t12.0\n\
         03/08/25 03:30:00\t244.0\t14.0\n",
    )
    .unwrap();
    let h = Harness::new();

    let summary = h.pipeline(PipelineConfig::new(root.path()).dry_run(true)).run().unwrap();
    let report = &summary.files[0];

    assert_eq!(report.nb_points, 4);
    let per_channel: usize = report.channels.values().map(|c| c.nb_points).sum();
    assert_eq!(per_channel, report.nb_points);

    let master = &report.channels["M02001084_Ch1_M02001084"];
    assert_eq!(master.min, Some(242.0));
    assert_eq!(master.mean, Some(243.0));
    assert_eq!(master.channel_type, "master");
    assert_eq!(master.channel_name, "Ph 1");
    assert_eq!(master.channel_number, 1);
    assert_eq!(master.device_master_sn, "02001084");

    let slave = &report.channels["S04000466_Ch1_M02001084"];
    assert_eq!(slave.channel_type, "slave");
    assert_eq!(slave.device_sn, "04000466");
    assert_eq!(slave.unit, "W");
}
