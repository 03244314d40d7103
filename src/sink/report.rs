//! JSON report persistence plus summary publishing to a meta collection.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::error::{IngestResult, SinkError};
use crate::report::{BatchSummary, RunReport};

use super::{ReportSink, TimeSeriesSink};

/// Default meta collection for summary points.
pub const DEFAULT_META_COLLECTION: &str = "powerview_meta";

/// Writes `<dir>/<collection>/<campaign>/<device_master_sn>/<file_stem>.report.json` and, when
/// a store is attached, one summary point per report and one per run into the meta collection.
///
/// An existing document is never overwritten: a re-delivered file gets
/// `<file_stem>.1.report.json`, `<file_stem>.2.report.json`, ...
pub struct JsonReportSink {
    dir: PathBuf,
    meta: Option<Arc<dyn TimeSeriesSink>>,
    meta_collection: String,
}

impl std::fmt::Debug for JsonReportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonReportSink")
            .field("dir", &self.dir)
            .field("meta_set", &self.meta.is_some())
            .field("meta_collection", &self.meta_collection)
            .finish()
    }
}

impl JsonReportSink {
    /// Report documents only; summaries are dropped.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            meta: None,
            meta_collection: DEFAULT_META_COLLECTION.to_string(),
        }
    }

    /// Publish summaries to `collection` through `sink`.
    pub fn with_meta(mut self, sink: Arc<dyn TimeSeriesSink>, collection: impl Into<String>) -> Self {
        self.meta = Some(sink);
        self.meta_collection = collection.into();
        self
    }

    /// Preferred location of the document for `report`.
    pub fn report_path(&self, report: &RunReport) -> PathBuf {
        self.report_dir(report).join(format!("{}.report.json", report_stem(report)))
    }

    fn report_dir(&self, report: &RunReport) -> PathBuf {
        self.dir
            .join(&report.collection)
            .join(&report.campaign)
            .join(&report.device_master_sn)
    }

    fn free_report_path(&self, report: &RunReport) -> PathBuf {
        let preferred = self.report_path(report);
        if !preferred.exists() {
            return preferred;
        }
        let dir = self.report_dir(report);
        let stem = report_stem(report);
        (1..)
            .map(|n| dir.join(format!("{stem}.{n}.report.json")))
            .find(|p| !p.exists())
            .unwrap_or(preferred)
    }
}

fn report_stem(report: &RunReport) -> String {
    Path::new(&report.file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.file_name.clone())
}

impl ReportSink for JsonReportSink {
    fn persist(&self, report: &RunReport) -> IngestResult<PathBuf> {
        fs::create_dir_all(self.report_dir(report))?;
        let path = self.free_report_path(report);
        let json = serde_json::to_vec_pretty(report)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    fn publish_summary(&self, report: &RunReport) -> Result<(), SinkError> {
        let Some(meta) = &self.meta else {
            return Ok(());
        };
        meta.ensure_collection(&self.meta_collection)?;
        meta.write(&self.meta_collection, &[report.summary_point(Utc::now())])
    }

    fn publish_run_summary(&self, summary: &BatchSummary) -> Result<(), SinkError> {
        let Some(meta) = &self.meta else {
            return Ok(());
        };
        meta.ensure_collection(&self.meta_collection)?;
        meta.write(&self.meta_collection, &[summary.run_point(Utc::now())])
    }
}
