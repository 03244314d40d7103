//! File-backed [`TimeSeriesSink`]: appends line protocol to `<dir>/<collection>.lp`.
//!
//! Useful for offline runs and for replaying into a store later with its own tooling.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SinkError;
use crate::types::Point;

use super::TimeSeriesSink;
use super::line_protocol::encode_points;

#[derive(Debug, Clone)]
pub struct LineProtocolDirSink {
    dir: PathBuf,
}

impl LineProtocolDirSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// File holding the lines of `collection`.
    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.lp"))
    }
}

impl TimeSeriesSink for LineProtocolDirSink {
    fn ensure_collection(&self, name: &str) -> Result<(), SinkError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(SinkError::Protocol(format!("invalid collection name '{name}'")));
        }
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn write(&self, collection: &str, points: &[Point]) -> Result<(), SinkError> {
        let body = encode_points(points);
        if body.is_empty() {
            return Ok(());
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.collection_path(collection))?;
        f.write_all(body.as_bytes())?;
        Ok(())
    }
}
