//! Header format detection.
//!
//! Two variants are known:
//!
//! - [`FileFormat::MvT302V002`]: plain two-line header. Line 1 holds one device serial per
//!   column (column 0 is the master), line 2 starts with the format id followed by one label
//!   per data column.
//! - [`FileFormat::MvT302V003`]: a bracket-delimited `key=value` metadata block closed by a
//!   `[Data]` section, followed by one label line.
//!
//! Detection only looks at the first [`MAX_HEADER_LINES`] lines of a file.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};

/// Upper bound on the number of leading lines inspected during detection.
pub const MAX_HEADER_LINES: usize = 64;

const DATA_SECTION: &str = "[data]";

/// Supported file format variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    #[serde(rename = "MV_T302_V002")]
    MvT302V002,
    #[serde(rename = "MV_T302_V003")]
    MvT302V003,
}

impl FileFormat {
    /// Identifier as written in file headers.
    pub fn id(self) -> &'static str {
        match self {
            Self::MvT302V002 => "MV_T302_V002",
            Self::MvT302V003 => "MV_T302_V003",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for FileFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "MV_T302_V002" => Ok(Self::MvT302V002),
            "MV_T302_V003" => Ok(Self::MvT302V003),
            other => Err(IngestError::UnknownFormat {
                found: other.to_string(),
            }),
        }
    }
}

/// Format-specific header lines, ready for channel mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLines {
    /// Device-serial line plus label line (cells split on tabs, including column 0).
    TwoLine {
        serials: Vec<String>,
        labels: Vec<String>,
    },
    /// Parsed metadata block (lowercased keys) plus label line.
    MetadataBlock {
        metadata: BTreeMap<String, String>,
        labels: Vec<String>,
    },
}

/// Result of format detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub format: FileFormat,
    pub lines: HeaderLines,
    /// Number of leading lines consumed by the header; data rows start here.
    pub data_start: usize,
}

impl FileHeader {
    /// Metadata block entries, empty for two-line headers.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        match &self.lines {
            HeaderLines::TwoLine { .. } => BTreeMap::new(),
            HeaderLines::MetadataBlock { metadata, .. } => metadata.clone(),
        }
    }

    /// Timezone declared in the header, if any. Advisory only: timestamps are read as UTC.
    pub fn declared_timezone(&self) -> Option<&str> {
        match &self.lines {
            HeaderLines::TwoLine { .. } => None,
            HeaderLines::MetadataBlock { metadata, .. } => {
                metadata.get("timezone").map(String::as_str)
            }
        }
    }
}

/// Classify the leading lines of a file.
///
/// `lines` may be the whole file; only the first [`MAX_HEADER_LINES`] are looked at.
pub fn detect_format(lines: &[&str]) -> IngestResult<FileHeader> {
    let lines: Vec<&str> = lines
        .iter()
        .take(MAX_HEADER_LINES)
        .enumerate()
        .map(|(i, l)| clean_line(l, i == 0))
        .collect();

    let first = match lines.first() {
        Some(l) => *l,
        None => {
            return Err(IngestError::UnknownFormat {
                found: "<empty file>".to_string(),
            });
        }
    };

    if is_section(first) {
        detect_metadata_block(&lines)
    } else {
        detect_two_line(&lines)
    }
}

fn detect_two_line(lines: &[&str]) -> IngestResult<FileHeader> {
    let second = lines.get(1).copied().unwrap_or_default();
    let labels = split_cells(second);
    let found = labels.first().cloned().unwrap_or_default();

    match found.parse::<FileFormat>()? {
        FileFormat::MvT302V002 => Ok(FileHeader {
            format: FileFormat::MvT302V002,
            lines: HeaderLines::TwoLine {
                serials: split_cells(lines[0]),
                labels,
            },
            data_start: 2,
        }),
        other => Err(IngestError::UnknownFormat {
            found: format!("{other} declared in a two-line header"),
        }),
    }
}

fn detect_metadata_block(lines: &[&str]) -> IngestResult<FileHeader> {
    let mut metadata = BTreeMap::new();
    let mut data_idx = None;

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case(DATA_SECTION) {
            data_idx = Some(idx);
            break;
        }
        if trimmed.is_empty() || is_section(trimmed) || trimmed.starts_with(['#', ';']) {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            metadata.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let data_idx = data_idx.ok_or_else(|| IngestError::UnknownFormat {
        found: "metadata block without [Data] section".to_string(),
    })?;

    let declared = metadata
        .get("format")
        .cloned()
        .unwrap_or_else(|| "<metadata block without Format key>".to_string());

    match declared.parse::<FileFormat>()? {
        FileFormat::MvT302V003 => {
            let labels = lines
                .get(data_idx + 1)
                .map(|l| split_cells(l))
                .unwrap_or_default();
            Ok(FileHeader {
                format: FileFormat::MvT302V003,
                lines: HeaderLines::MetadataBlock { metadata, labels },
                data_start: data_idx + 2,
            })
        }
        other => Err(IngestError::UnknownFormat {
            found: format!("{other} declared in a metadata block"),
        }),
    }
}

fn clean_line(line: &str, first: bool) -> &str {
    let line = if first {
        line.trim_start_matches('\u{feff}')
    } else {
        line
    };
    line.trim_end_matches(['\r', '\n'])
}

fn is_section(line: &str) -> bool {
    let t = line.trim();
    t.len() > 2 && t.starts_with('[') && t.ends_with(']')
}

pub(crate) fn split_cells(line: &str) -> Vec<String> {
    line.split('\t').map(|c| c.trim().to_string()).collect()
}
