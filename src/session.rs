use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::info;

use crate::config::Layout;
use crate::error::ScanError;

const SAFE_DIR: &str = "safe";
const UNSAFE_DIR: &str = "unsafe";
const SCAN_DIR: &str = "scan";
const LOGS_DIR: &str = "logs";

/// Terminal routing for a classified image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Safe,
    Unsafe,
}

impl Disposition {
    /// Strictly greater than: a probability equal to the threshold is safe.
    pub fn from_probability(probability: f32, threshold: f32) -> Self {
        if probability > threshold {
            Disposition::Unsafe
        } else {
            Disposition::Safe
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Safe => write!(f, "SAFE"),
            Disposition::Unsafe => write!(f, "UNSAFE"),
        }
    }
}

/// Folders a single run writes into.
#[derive(Debug, Clone)]
pub struct OutputDirs {
    /// Session folder, or the output root for the flat layouts.
    pub root: PathBuf,
    pub safe: PathBuf,
    pub unsafe_dir: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl OutputDirs {
    pub fn dir_for(&self, disposition: Disposition) -> &Path {
        match disposition {
            Disposition::Safe => &self.safe,
            Disposition::Unsafe => &self.unsafe_dir,
        }
    }

    /// Creates the folders for `layout` under `output_root`. Existing folders
    /// are reused.
    pub fn prepare(
        layout: Layout,
        output_root: &Path,
        input_dir: &Path,
        now: DateTime<Local>,
    ) -> Result<Self, ScanError> {
        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let log_name = format!("classification_log_{stamp}.txt");

        let (root, log_file) = match layout {
            Layout::Minimal => (output_root.to_path_buf(), None),
            Layout::Intermediate => {
                let logs = output_root.join(LOGS_DIR);
                fs::create_dir_all(&logs)?;
                (output_root.to_path_buf(), Some(logs.join(log_name)))
            }
            Layout::Session => {
                let session = output_root
                    .join(SCAN_DIR)
                    .join(format!("{}_{stamp}", session_label(input_dir)));
                let log_file = session.join(log_name);
                (session, Some(log_file))
            }
        };

        let safe = root.join(SAFE_DIR);
        let unsafe_dir = root.join(UNSAFE_DIR);
        fs::create_dir_all(&safe)?;
        fs::create_dir_all(&unsafe_dir)?;
        info!("Output folders ready under {}", root.display());

        Ok(Self {
            root,
            safe,
            unsafe_dir,
            log_file,
        })
    }
}

/// Last component of the input directory, resolving `.` and `..` when needed.
fn session_label(input_dir: &Path) -> String {
    input_dir
        .file_name()
        .map(|name| name.to_os_string())
        .or_else(|| {
            fs::canonicalize(input_dir)
                .ok()
                .and_then(|p| p.file_name().map(|name| name.to_os_string()))
        })
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .expect("unambiguous time")
    }

    #[test]
    fn equal_to_threshold_is_safe() {
        assert_eq!(Disposition::from_probability(0.5, 0.5), Disposition::Safe);
        assert_eq!(Disposition::from_probability(0.51, 0.5), Disposition::Unsafe);
        assert_eq!(Disposition::from_probability(0.0, 0.0), Disposition::Safe);
        assert_eq!(Disposition::from_probability(1.0, 1.0), Disposition::Safe);
    }

    #[test]
    fn session_layout_is_namespaced_by_input_and_time() {
        let out = TempDir::new().expect("tempdir");
        let dirs = OutputDirs::prepare(
            Layout::Session,
            out.path(),
            Path::new("/data/holiday"),
            fixed_time(),
        )
        .expect("prepare");

        let session = out.path().join("scan").join("holiday_20240309_140507");
        assert_eq!(dirs.root, session);
        assert!(session.join("safe").is_dir());
        assert!(session.join("unsafe").is_dir());
        assert_eq!(
            dirs.log_file,
            Some(session.join("classification_log_20240309_140507.txt"))
        );
        assert_eq!(dirs.dir_for(Disposition::Unsafe), session.join("unsafe"));
    }

    #[test]
    fn intermediate_layout_keeps_logs_apart() {
        let out = TempDir::new().expect("tempdir");
        let dirs = OutputDirs::prepare(
            Layout::Intermediate,
            out.path(),
            Path::new("img"),
            fixed_time(),
        )
        .expect("prepare");

        assert_eq!(dirs.safe, out.path().join("safe"));
        assert!(out.path().join("logs").is_dir());
        assert_eq!(
            dirs.log_file,
            Some(out.path().join("logs/classification_log_20240309_140507.txt"))
        );
    }

    #[test]
    fn minimal_layout_has_no_log_file() {
        let out = TempDir::new().expect("tempdir");
        let dirs =
            OutputDirs::prepare(Layout::Minimal, out.path(), Path::new("img"), fixed_time())
                .expect("prepare");
        assert!(dirs.log_file.is_none());
        assert!(out.path().join("unsafe").is_dir());
        assert!(!out.path().join("logs").exists());
    }

    #[test]
    fn current_directory_input_uses_resolved_name() {
        let label = session_label(Path::new("."));
        assert!(!label.is_empty());
        assert_ne!(label, ".");
    }
}
