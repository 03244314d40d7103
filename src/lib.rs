//! `powerview-ingest` turns PowerView measurement exports dropped into a watched folder into
//! time-series points, writes them to a store and relocates every file to a success or error
//! folder while producing a JSON run report.
//!
//! The primary entrypoint is [`ingestion::IngestionPipeline`], built from a
//! [`config::PipelineConfig`] and three collaborators:
//!
//! - a [`sink::TimeSeriesSink`] (InfluxDB v2 with the `influx` feature, or line-protocol files)
//! - a [`sink::FileMover`] (`success/` and `error/` folders next to each file)
//! - a [`sink::ReportSink`] (JSON documents plus a summary point in a meta collection)
//!
//! ## Folder layout
//!
//! Files are expected at `<root>/<company>/<campaign>/<device_master_sn>/<file>.tsv`. The
//! company folder names the target collection (bucket). After processing, a file lives in
//! `<root>/<company>/<campaign>/<device_master_sn>/success/` or `.../error/`, and discovery
//! never looks into those folders again.
//!
//! ## File formats
//!
//! - **`MV_T302_V002`**: one line of device serials, then one line of labels starting with the
//!   format id.
//! - **`MV_T302_V003`**: a `[Header]` block of `key=value` lines closed by `[Data]`, then one
//!   line of labels.
//!
//! Data rows are tab separated; column 0 is a `DD/MM/YY HH:MM:SS` timestamp read as UTC.
//!
//! ## Quick example: dry run over a folder
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use powerview_ingest::config::PipelineConfig;
//! use powerview_ingest::ingestion::IngestionPipeline;
//! use powerview_ingest::sink::{DirectoryMover, JsonReportSink, LineProtocolDirSink};
//!
//! # fn main() -> Result<(), powerview_ingest::IngestError> {
//! let config = PipelineConfig::new("/srv/powerview/data").dry_run(true);
//! let pipeline = IngestionPipeline::new(
//!     config,
//!     Arc::new(LineProtocolDirSink::new("/tmp/lp")),
//!     Arc::new(DirectoryMover::default()),
//!     Arc::new(JsonReportSink::new("/srv/powerview/reports")),
//! );
//! let summary = pipeline.run()?;
//! println!("files={} points={}", summary.nb_files_total, summary.nb_points_total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Parsing a single line
//!
//! ```rust
//! use powerview_ingest::ingestion::{detect_format, map_channels, parse_line, RowCounters};
//!
//! let header = detect_format(&[
//!     "02001084\t02001084\t02001084",
//!     "MV_T302_V002\tPh 1 V\tPh 1 A",
//! ])
//! .unwrap();
//! let channels = map_channels(&header).unwrap();
//!
//! let mut counters = RowCounters::default();
//! let samples = parse_line("03/08/25 03:20:00\t242.25\tnope", &channels, &mut counters);
//! assert_eq!(samples.len(), 2);
//! assert!(samples[0].valid);
//! assert!(!samples[1].valid);
//! assert_eq!(counters.invalid_values, 1);
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: detection, mapping, row parsing, point building and the pipeline
//! - [`sink`]: store, mover and report adapters
//! - [`report`]: per-file reports and batch summaries
//! - [`types`]: channel, sample, point and file lifecycle types
//! - [`config`]: pipeline options and the settings file
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod ingestion;
pub mod report;
pub mod sink;
pub mod types;

pub use error::{IngestError, IngestResult, SinkError};
