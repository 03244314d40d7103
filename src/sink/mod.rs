//! Collaborator seams of the pipeline: the time-series store, file relocation and report
//! persistence.
//!
//! The pipeline only talks to these traits. Concrete adapters:
//!
//! - [`InfluxSink`] (feature `influx`): InfluxDB v2 HTTP API
//! - [`LineProtocolDirSink`]: line-protocol files on local disk
//! - [`DirectoryMover`]: `success/` and `error/` folders next to each file
//! - [`JsonReportSink`]: JSON report documents plus a summary point in a meta collection

#[cfg(feature = "influx")]
pub mod influx;
pub mod line_protocol;
pub mod lp_dir;
pub mod mover;
pub mod report;

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{IngestResult, SinkError};
use crate::report::{BatchSummary, RunReport};
use crate::types::Point;

#[cfg(feature = "influx")]
pub use influx::{InfluxSettings, InfluxSink};
pub use lp_dir::LineProtocolDirSink;
pub use mover::DirectoryMover;
pub use report::JsonReportSink;

/// A time-series store organised in named collections (buckets).
pub trait TimeSeriesSink: Send + Sync {
    /// Make sure `name` exists, creating it if needed.
    fn ensure_collection(&self, name: &str) -> Result<(), SinkError>;

    /// Write points into `collection`.
    fn write(&self, collection: &str, points: &[Point]) -> Result<(), SinkError>;
}

/// Moves processed files out of the watched tree.
///
/// Both methods return the new location of the file.
pub trait FileMover: Send + Sync {
    fn move_to_success(&self, path: &Path) -> io::Result<PathBuf>;

    fn move_to_error(&self, path: &Path) -> io::Result<PathBuf>;
}

/// Destination of per-file reports.
pub trait ReportSink: Send + Sync {
    /// Store the report as a durable document; returns where it was written.
    fn persist(&self, report: &RunReport) -> IngestResult<PathBuf>;

    /// Publish a condensed summary of the report to the meta collection.
    fn publish_summary(&self, report: &RunReport) -> Result<(), SinkError>;

    /// Publish the run-level summary to the meta collection. Called once at the end of a
    /// non-dry run.
    fn publish_run_summary(&self, summary: &BatchSummary) -> Result<(), SinkError>;
}
