use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Error type returned by the ingestion pipeline and its stages.
///
/// Row-level problems (bad timestamps, non-numeric cells) are not errors: they are counted
/// by [`crate::ingestion::rows::RowCounters`] and never surface here.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TSV reader error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Report (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed root/target path or settings. Fatal for the input, no relocation attempted.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The file header does not match any known format variant.
    #[error("unknown format: {found}")]
    UnknownFormat { found: String },

    /// Header labels are missing or ambiguous.
    #[error("malformed header: {message}")]
    MalformedHeader { message: String },

    /// Parsing finished without a single valid sample.
    #[error("no valid points after parsing {rows} data rows")]
    NoValidPoints { rows: usize },

    /// Time-series store failure (collection creation or write).
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Relocation failed; the file is left where it was.
    #[error("failed to move '{}': {source}", path.display())]
    Move {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn malformed_header(message: impl Into<String>) -> Self {
        Self::MalformedHeader {
            message: message.into(),
        }
    }
}

/// Errors raised by [`crate::sink::TimeSeriesSink`] implementations.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The store answered with a non-success HTTP status.
    #[error("store returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The store could not be reached (DNS, connect, TLS, broken pipe...).
    #[error("store transport error: {0}")]
    Transport(String),

    /// The store answered with a payload that could not be understood.
    #[error("unexpected store response: {0}")]
    Protocol(String),

    /// Local I/O error for file-backed sinks.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
