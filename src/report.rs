//! Per-file run reports and batch summaries.
//!
//! [`RunReport`] is the durable JSON document written for each processed file. Every field
//! beyond the identity of the file is optional or defaulted on read, and unknown fields are
//! ignored, so documents written by newer versions stay readable.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingestion::format::FileFormat;
use crate::ingestion::rows::RowCounters;
use crate::types::{ChannelDescriptor, Point, SourceFile};

/// Measurement name of the per-file summary point written to the meta collection.
pub const SUMMARY_MEASUREMENT: &str = "ingest_file";
/// Measurement name of the per-run summary point written to the meta collection.
pub const RUN_MEASUREMENT: &str = "ingest_run";

/// Terminal outcome of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Success,
    Error,
    /// The file left the watched folder while this run was processing it.
    AlreadyHandled,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::AlreadyHandled => "already_handled",
        }
    }
}

/// Value statistics for one channel of one file.
///
/// `nb_points` counts the points actually built for the channel, after duplicate
/// (timestamp, channel) pairs collapsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelStats {
    pub column: usize,
    pub device_master_sn: String,
    pub device_sn: String,
    /// `master` or `slave`.
    pub channel_type: String,
    pub channel_number: usize,
    pub channel_name: String,
    pub unit: String,
    pub nb_points: usize,
    pub nb_invalid_values: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    #[serde(skip)]
    sum: f64,
}

impl ChannelStats {
    pub(crate) fn new(channel: &ChannelDescriptor) -> Self {
        Self {
            column: channel.column,
            device_master_sn: channel.master_sn.clone(),
            device_sn: channel.device_sn.clone(),
            channel_type: channel.device_role.as_str().to_string(),
            channel_number: channel.number,
            channel_name: channel.name.clone(),
            unit: channel.unit.clone(),
            ..Self::default()
        }
    }

    pub(crate) fn record_invalid(&mut self) {
        self.nb_invalid_values += 1;
    }

    pub(crate) fn record_value(&mut self, v: f64) {
        self.nb_points += 1;
        self.sum += v;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
        self.mean = Some(self.sum / self.nb_points as f64);
    }
}

/// Report for one processed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub file_path: PathBuf,
    pub file_name: String,
    /// Target collection (the company folder).
    pub collection: String,
    pub campaign: String,
    pub device_master_sn: String,
    pub status: FileStatus,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FileFormat>,
    #[serde(default)]
    pub nb_rows: usize,
    #[serde(default)]
    pub nb_channels: usize,
    #[serde(default)]
    pub nb_points: usize,
    #[serde(default)]
    pub nb_invalid_timestamps: usize,
    #[serde(default)]
    pub nb_invalid_values: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub format_metadata: BTreeMap<String, String>,
    /// Timezone declared by the header. Advisory: timestamps are always read as UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_timezone: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channels: BTreeMap<String, ChannelStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relocated_to: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    /// Fresh report for a discovered file, marked as an error until proven otherwise.
    pub fn new(file: &SourceFile, dry_run: bool) -> Self {
        Self {
            file_path: file.path.clone(),
            file_name: file.file_name(),
            collection: file.context.company.clone(),
            campaign: file.context.campaign.clone(),
            device_master_sn: file.context.device_master_sn.clone(),
            status: FileStatus::Error,
            dry_run,
            format: None,
            nb_rows: 0,
            nb_channels: 0,
            nb_points: 0,
            nb_invalid_timestamps: 0,
            nb_invalid_values: 0,
            first_timestamp: None,
            last_timestamp: None,
            format_metadata: BTreeMap::new(),
            declared_timezone: None,
            channels: BTreeMap::new(),
            relocated_to: None,
            error: None,
        }
    }

    pub(crate) fn apply_counters(&mut self, counters: &RowCounters) {
        self.nb_rows = counters.rows;
        self.nb_invalid_timestamps = counters.invalid_timestamps;
        self.nb_invalid_values = counters.invalid_values;
    }

    pub(crate) fn observe_timestamp(&mut self, ts: DateTime<Utc>) {
        self.first_timestamp = Some(self.first_timestamp.map_or(ts, |t| t.min(ts)));
        self.last_timestamp = Some(self.last_timestamp.map_or(ts, |t| t.max(ts)));
    }

    pub(crate) fn fail(&mut self, cause: impl ToString) {
        self.status = FileStatus::Error;
        self.error = Some(cause.to_string());
    }

    /// Whether the file ended in the success state.
    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Success
    }

    /// Condensed summary point for the meta collection.
    pub fn summary_point(&self, at: DateTime<Utc>) -> Point {
        let mut point = Point::new(SUMMARY_MEASUREMENT, at)
            .tag("status", self.status.as_str())
            .tag("collection", self.collection.as_str())
            .tag("campaign", self.campaign.as_str())
            .tag("device_master_sn", self.device_master_sn.as_str())
            .tag("file_name", self.file_name.as_str())
            .field("nb_rows", self.nb_rows)
            .field("nb_channels", self.nb_channels)
            .field("nb_points", self.nb_points)
            .field("nb_invalid_timestamps", self.nb_invalid_timestamps)
            .field("nb_invalid_values", self.nb_invalid_values);
        if let Some(format) = self.format {
            point = point.tag("format", format.id());
        }
        if let Some(err) = &self.error {
            point = point.field("error", err.as_str());
        }
        point
    }
}

/// Outcome of a whole invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub root: PathBuf,
    pub dry_run: bool,
    pub nb_files_total: usize,
    pub nb_files_success: usize,
    pub nb_files_failed: usize,
    /// Files that violated the path contract; left untouched.
    pub nb_files_skipped: usize,
    /// Files relocated by a concurrent run before this one could finish them.
    #[serde(default)]
    pub nb_files_already_handled: usize,
    pub nb_points_total: usize,
    pub duration_s: f64,
    pub files: Vec<RunReport>,
}

impl BatchSummary {
    pub(crate) fn new(root: PathBuf, dry_run: bool) -> Self {
        Self {
            root,
            dry_run,
            nb_files_total: 0,
            nb_files_success: 0,
            nb_files_failed: 0,
            nb_files_skipped: 0,
            nb_files_already_handled: 0,
            nb_points_total: 0,
            duration_s: 0.0,
            files: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, report: RunReport) {
        self.nb_files_total += 1;
        match report.status {
            FileStatus::Success => {
                self.nb_files_success += 1;
                self.nb_points_total += report.nb_points;
            }
            FileStatus::Error => self.nb_files_failed += 1,
            FileStatus::AlreadyHandled => self.nb_files_already_handled += 1,
        }
        self.files.push(report);
    }

    pub(crate) fn record_skipped(&mut self) {
        self.nb_files_total += 1;
        self.nb_files_skipped += 1;
    }

    pub(crate) fn finish(&mut self, elapsed: Duration) {
        self.duration_s = elapsed.as_secs_f64();
    }

    /// Whether every processed file succeeded. Files handled by a concurrent run do not count
    /// against the run.
    pub fn all_succeeded(&self) -> bool {
        self.nb_files_failed == 0 && self.nb_files_skipped == 0
    }

    /// `success`, `partial` (some files succeeded, some did not) or `error`.
    pub fn status(&self) -> &'static str {
        if self.all_succeeded() {
            "success"
        } else if self.nb_files_success > 0 {
            "partial"
        } else {
            "error"
        }
    }

    /// Run-level point for the meta collection.
    pub fn run_point(&self, at: DateTime<Utc>) -> Point {
        Point::new(RUN_MEASUREMENT, at)
            .tag("status", self.status())
            .field("nb_files_total", self.nb_files_total)
            .field("nb_files_success", self.nb_files_success)
            .field("nb_files_failed", self.nb_files_failed)
            .field("nb_files_skipped", self.nb_files_skipped)
            .field("nb_files_already_handled", self.nb_files_already_handled)
            .field("nb_points_total", self.nb_points_total)
            .field("duration_s", self.duration_s)
            .field("base_folder", self.root.display().to_string())
    }
}
