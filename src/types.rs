//! Core value types flowing through the ingestion pipeline.
//!
//! A [`SourceFile`] is discovered on disk, its header is mapped to [`ChannelDescriptor`]s,
//! each data row becomes a set of [`Sample`]s and those are grouped into [`Point`]s for the
//! time-series store.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};
use crate::ingestion::format::FileFormat;

/// Measurement name shared by every channel point, whatever the source file.
pub const MEASUREMENT: &str = "campaign";

/// Electrical topology of the device set that produced a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Only phase 1 (or no phase marker at all) appears in the labels.
    SinglePhase,
    /// Phase 2 and/or 3 markers appear in the labels.
    ThreePhase,
}

impl DeviceType {
    /// Tag value used in points and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SinglePhase => "single_phase",
            Self::ThreePhase => "three_phase",
        }
    }
}

/// Role of a device in a measurement session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Master,
    Slave,
}

impl DeviceRole {
    /// Tag value used in points and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Slave => "slave",
        }
    }

    pub(crate) fn prefix(self) -> char {
        match self {
            Self::Master => 'M',
            Self::Slave => 'S',
        }
    }
}

/// One measured column of a file, derived from its header lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// Zero-based column index in a data row (column 0 is the timestamp).
    pub column: usize,
    /// Stable channel identifier, unique within one file.
    pub channel_id: String,
    /// Unit, taken from the trailing token of the label (e.g. `V`, `W`).
    pub unit: String,
    /// Raw header cell.
    pub label: String,
    /// Label without unit and device prefix (e.g. `Ph 1`, `Voie1`).
    pub name: String,
    /// 1-based channel number within its device.
    pub number: usize,
    /// Topology of the device set.
    pub device_type: DeviceType,
    /// Master or slave.
    pub device_role: DeviceRole,
    /// Serial number of the session master.
    pub master_sn: String,
    /// Serial number of the device that owns this column.
    pub device_sn: String,
}

impl ChannelDescriptor {
    /// Field key for this channel's values, see [`crate::ingestion::points::field_key`].
    pub fn field_key(&self) -> String {
        crate::ingestion::points::field_key(&self.channel_id, &self.unit)
    }
}

/// One timestamped value for one channel.
///
/// Invalid samples keep their slot so callers can attribute the failure to a channel, but
/// carry no usable value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    /// Index into the channel mapping the sample was parsed with.
    pub channel: usize,
    pub value: f64,
    pub valid: bool,
}

/// A field value in a [`Point`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    String(String),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        Self::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// A time-series point: one measurement, one timestamp, tags and fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub measurement: String,
    pub timestamp: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Point {
    /// Create an empty point.
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            timestamp,
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    /// Add (or replace) a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add (or replace) a field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Metadata carried by the directory layout `<root>/<company>/<campaign>/<device_master_sn>/<file>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathContext {
    /// Client name, also the target collection.
    pub company: String,
    pub campaign: String,
    pub device_master_sn: String,
}

impl PathContext {
    /// Extract the context of `path` relative to `root`.
    ///
    /// Fails with [`IngestError::Configuration`] when `path` is not under `root` or is
    /// shallower than `company/campaign/device/file`.
    pub fn from_path(root: &Path, path: &Path) -> IngestResult<Self> {
        let relative = path.strip_prefix(root).map_err(|_| {
            IngestError::configuration(format!(
                "'{}' is not under the data folder '{}'",
                path.display(),
                root.display()
            ))
        })?;

        let parts: Vec<&str> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();

        if parts.len() < 4 {
            return Err(IngestError::configuration(format!(
                "invalid path structure '{}': expected <company>/<campaign>/<device_master_sn>/<file>",
                relative.display()
            )));
        }

        Ok(Self {
            company: parts[0].to_string(),
            campaign: parts[1].to_string(),
            device_master_sn: parts[2].to_string(),
        })
    }
}

/// Lifecycle state of a [`SourceFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    Discovered,
    Parsing,
    WriteSucceeded,
    WriteFailed,
    MovedSuccess,
    MovedError,
}

impl FileState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: FileState) -> bool {
        use FileState::*;
        matches!(
            (self, next),
            (Discovered, Parsing)
                | (Parsing, WriteSucceeded)
                | (Parsing, WriteFailed)
                | (WriteSucceeded, MovedSuccess)
                | (WriteFailed, MovedError)
        )
    }

    /// Whether the file has reached its relocation target.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::MovedSuccess | Self::MovedError)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discovered => "discovered",
            Self::Parsing => "parsing",
            Self::WriteSucceeded => "write_succeeded",
            Self::WriteFailed => "write_failed",
            Self::MovedSuccess => "moved_success",
            Self::MovedError => "moved_error",
        };
        f.write_str(s)
    }
}

/// A measurement file picked up by discovery.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub context: PathContext,
    pub format: Option<FileFormat>,
    state: FileState,
}

impl SourceFile {
    /// Build a discovered file, validating the path contract against `root`.
    pub fn discover(root: &Path, path: impl Into<PathBuf>) -> IngestResult<Self> {
        let path = path.into();
        let context = PathContext::from_path(root, &path)?;
        Ok(Self {
            path,
            context,
            format: None,
            state: FileState::Discovered,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> FileState {
        self.state
    }

    /// File name component, lossily converted.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub(crate) fn advance(&mut self, next: FileState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal file state transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }
}
