//! Relocation of processed files into terminal folders next to them.
//!
//! `<dir>/<file>` moves to `<dir>/<success_dir>/<file>` or `<dir>/<error_dir>/<file>`. The move
//! is a single `rename`, so on one filesystem a concurrent discovery sees the file either in
//! the watched folder or in its terminal folder, never both. A name already taken in the
//! terminal folder gets a numeric suffix (`file.1.tsv`, `file.2.tsv`, ...).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::FileMover;

/// Default name of the success folder.
pub const DEFAULT_SUCCESS_DIR: &str = "success";
/// Default name of the error folder.
pub const DEFAULT_ERROR_DIR: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMover {
    success_dir: String,
    error_dir: String,
}

impl Default for DirectoryMover {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_DIR, DEFAULT_ERROR_DIR)
    }
}

impl DirectoryMover {
    pub fn new(success_dir: impl Into<String>, error_dir: impl Into<String>) -> Self {
        Self {
            success_dir: success_dir.into(),
            error_dir: error_dir.into(),
        }
    }

    fn relocate(&self, path: &Path, area: &str) -> io::Result<PathBuf> {
        let (parent, name) = match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => (parent, name),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("'{}' has no parent folder", path.display()),
                ));
            }
        };
        if !path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("'{}' is no longer in the watched folder", path.display()),
            ));
        }

        let dir = parent.join(area);
        fs::create_dir_all(&dir)?;
        let target = free_target(&dir, Path::new(name));
        fs::rename(path, &target)?;
        Ok(target)
    }
}

impl FileMover for DirectoryMover {
    fn move_to_success(&self, path: &Path) -> io::Result<PathBuf> {
        self.relocate(path, &self.success_dir)
    }

    fn move_to_error(&self, path: &Path) -> io::Result<PathBuf> {
        self.relocate(path, &self.error_dir)
    }
}

fn free_target(dir: &Path, name: &Path) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| dir.join(format!("{stem}.{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
