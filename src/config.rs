//! Run configuration.
//!
//! [`PipelineConfig`] is built once (by the binary or by an embedding program) and handed to
//! [`crate::ingestion::IngestionPipeline`]; nothing in the library reads the environment.
//! [`Settings`] is the optional TOML settings file understood by the binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{IngestError, IngestResult};
use crate::ingestion::observability::IngestionSeverity;
use crate::sink::mover::{DEFAULT_ERROR_DIR, DEFAULT_SUCCESS_DIR};

/// Default glob applied to file names during discovery.
pub const DEFAULT_FILE_PATTERN: &str = "*.tsv";

/// Options controlling one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Watched data folder: `<root>/<company>/<campaign>/<device_master_sn>/<file>`.
    pub root: PathBuf,
    /// Process only this file instead of walking `root`.
    pub target: Option<PathBuf>,
    /// Parse and report without touching the store, the files or the report folder.
    pub dry_run: bool,
    /// Glob matched against file names during discovery.
    pub file_pattern: String,
    /// Name of the per-folder success area.
    pub success_dir: String,
    /// Name of the per-folder error area.
    pub error_dir: String,
    /// Severity at which observers get `on_alert`.
    pub alert_at_or_above: IngestionSeverity,
}

impl PipelineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            target: None,
            dry_run: false,
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            success_dir: DEFAULT_SUCCESS_DIR.to_string(),
            error_dir: DEFAULT_ERROR_DIR.to_string(),
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }

    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = pattern.into();
        self
    }

    pub fn with_terminal_dirs(mut self, success: impl Into<String>, error: impl Into<String>) -> Self {
        self.success_dir = success.into();
        self.error_dir = error.into();
        self
    }

    pub fn with_alert_threshold(mut self, severity: IngestionSeverity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    /// Whether `name` is one of the terminal folder names.
    pub fn is_terminal_dir(&self, name: &str) -> bool {
        name == self.success_dir || name == self.error_dir
    }

    /// Check the root/target layout and the discovery pattern.
    pub fn validate(&self) -> IngestResult<()> {
        if !self.root.is_dir() {
            return Err(IngestError::configuration(format!(
                "data folder '{}' does not exist",
                self.root.display()
            )));
        }
        if self.success_dir.is_empty() || self.error_dir.is_empty() || self.success_dir == self.error_dir {
            return Err(IngestError::configuration(
                "success and error folder names must be distinct and non-empty",
            ));
        }
        glob::Pattern::new(&self.file_pattern).map_err(|e| {
            IngestError::configuration(format!("invalid file pattern '{}': {e}", self.file_pattern))
        })?;

        if let Some(target) = &self.target {
            if !target.is_file() {
                return Err(IngestError::configuration(format!(
                    "target file '{}' does not exist",
                    target.display()
                )));
            }
            let Ok(relative) = target.strip_prefix(&self.root) else {
                return Err(IngestError::configuration(format!(
                    "target file '{}' is not under the data folder '{}'",
                    target.display(),
                    self.root.display()
                )));
            };
            if self.in_terminal_dir(relative) {
                return Err(IngestError::configuration(format!(
                    "target file '{}' was already relocated to a terminal folder",
                    target.display()
                )));
            }
        }
        Ok(())
    }

    /// Whether any folder of `relative` (file name excluded) is a terminal folder.
    pub fn in_terminal_dir(&self, relative: &Path) -> bool {
        relative
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .any(|c| self.is_terminal_dir(&c.as_os_str().to_string_lossy()))
    }
}

/// Optional settings file for the binary. Command-line values take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_folder: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub meta_bucket: Option<String>,
    pub file_pattern: Option<String>,
    pub success_dir: Option<String>,
    pub error_dir: Option<String>,
    pub lp_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub influx: InfluxSection,
}

/// `[influx]` table of the settings file.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InfluxSection {
    pub url: Option<String>,
    pub token: Option<String>,
    pub org: Option<String>,
    pub batch_size: Option<usize>,
}

impl std::fmt::Debug for InfluxSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxSection")
            .field("url", &self.url)
            .field("token_set", &self.token.is_some())
            .field("org", &self.org)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Settings {
    /// Load a TOML settings file.
    pub fn from_toml_path(path: impl AsRef<Path>) -> IngestResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            IngestError::configuration(format!("cannot read settings '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
            .map_err(|e| IngestError::configuration(format!("invalid settings '{}': {e}", path.display())))
    }

    /// Parse TOML settings text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
