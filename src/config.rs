use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::error::ScanError;

/// Overrides the default config location (~/.config/safesort.json).
pub const CONFIG_ENV: &str = "SAFESORT_CONFIG";
const DEFAULT_BATCH_SIZE: usize = 4;
const DEFAULT_THRESHOLD: f32 = 0.4;

/// Where the safe/unsafe folders and the log file are written.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `<root>/safe`, `<root>/unsafe`, console output only
    Minimal,
    /// Same folders plus `<root>/logs/classification_log_<stamp>.txt`
    Intermediate,
    /// `<root>/scan/<input name>_<stamp>/{safe,unsafe}` with the log inside
    #[default]
    Session,
}

/// What to do when the classifier result carries no "unsafe" probability.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingLabel {
    /// Count the file as an error
    #[default]
    Error,
    /// Treat the probability as 0
    Safe,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Directory to scan. Prompted for interactively when absent.
    pub input_path: Option<PathBuf>,
    pub batch_size: usize,
    /// Files whose unsafe probability is strictly greater than this are unsafe.
    pub threshold: f32,
    pub recursive: bool,
    pub layout: Layout,
    pub output_root: PathBuf,
    pub missing_label: MissingLabel,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            input_path: None,
            batch_size: DEFAULT_BATCH_SIZE,
            threshold: DEFAULT_THRESHOLD,
            recursive: true,
            layout: Layout::default(),
            output_root: PathBuf::from("."),
            missing_label: MissingLabel::default(),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.batch_size == 0 {
            return Err(ScanError::Config(
                "batch_size must be a positive integer".into(),
            ));
        }
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(ScanError::Config(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self
            .input_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(ScanError::Config("input_path must not be empty".into()));
        }
        if self.output_root.as_os_str().is_empty() {
            return Err(ScanError::Config("output_root must not be empty".into()));
        }
        Ok(())
    }

    /// The directory to scan; only valid once `input_path` has been filled in.
    pub fn input_dir(&self) -> Result<&Path, ScanError> {
        self.input_path
            .as_deref()
            .ok_or_else(|| ScanError::Config("no input directory configured".into()))
    }
}

/// Resolve config path: env var → ~/.config/safesort.json
pub fn config_path() -> Result<PathBuf, ScanError> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let home = dirs::home_dir().ok_or_else(|| {
        ScanError::Config(format!(
            "Unable to locate the home directory for ~/.config/safesort.json; set {CONFIG_ENV}"
        ))
    })?;
    Ok(home.join(".config").join("safesort.json"))
}

/// A missing file means defaults; a malformed one is an error.
pub fn load_config_from(path: &Path) -> Result<ScanConfig, ScanError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("No config at {}, using defaults", path.display());
            return Ok(ScanConfig::default());
        }
        Err(err) => return Err(ScanError::from(err)),
    };

    serde_json::from_str(&contents).map_err(|err| {
        ScanError::Config(format!(
            "Failed to parse safesort config {}: {err}",
            path.display()
        ))
    })
}
