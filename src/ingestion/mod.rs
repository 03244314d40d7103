//! Ingestion of PowerView measurement exports.
//!
//! Most callers should build an [`IngestionPipeline`] (from [`pipeline`]) and call
//! [`IngestionPipeline::run`], which:
//!
//! - discovers files under `<root>/<company>/<campaign>/<device_master_sn>/`
//! - detects the header format and maps header columns to channels
//! - turns every data row into points and writes them to a [`crate::sink::TimeSeriesSink`]
//! - relocates each file to its success/error folder and persists a [`crate::report::RunReport`]
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]
//!
//! The individual stages are also available on their own:
//! - [`format`]: header detection
//! - [`mapping`]: channel mapping
//! - [`rows`]: row parsing
//! - [`points`]: point construction

pub mod format;
pub mod mapping;
pub mod observability;
pub mod pipeline;
pub mod points;
pub mod rows;

pub use format::{detect_format, FileFormat, FileHeader, HeaderLines};
pub use mapping::map_channels;
pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity, TracingObserver,
};
pub use pipeline::{discover_files, parse_source, IngestionPipeline};
pub use points::{field_key, PointBuilder};
pub use rows::{parse_line, parse_row, RowCounters};
