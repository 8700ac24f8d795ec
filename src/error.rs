use std::fmt;
use std::io;
use std::path::PathBuf;

/// Failures that end a whole run. Reported once by `main`.
#[derive(Debug)]
pub enum ScanError {
    Config(String),
    Io(io::Error),
    Classifier(anyhow::Error),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Config(err) => write!(f, "{err}"),
            ScanError::Io(err) => write!(f, "Filesystem error: {err}"),
            ScanError::Classifier(err) => write!(f, "Classifier error: {err:#}"),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<io::Error> for ScanError {
    fn from(value: io::Error) -> Self {
        ScanError::Io(value)
    }
}

impl From<anyhow::Error> for ScanError {
    fn from(value: anyhow::Error) -> Self {
        ScanError::Classifier(value)
    }
}

/// Failures confined to a single image. Counted and logged, never fatal.
#[derive(Debug)]
pub enum FileError {
    NotClassified,
    MissingLabel(&'static str),
    InvalidProbability(f32),
    NoFileName(PathBuf),
    Copy {
        destination: PathBuf,
        source: io::Error,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotClassified => write!(f, "no classification returned"),
            FileError::MissingLabel(label) => {
                write!(f, "classifier result has no `{label}` probability")
            }
            FileError::InvalidProbability(p) => {
                write!(f, "probability {p} is outside [0, 1]")
            }
            FileError::NoFileName(path) => {
                write!(f, "cannot derive a file name from {}", path.display())
            }
            FileError::Copy {
                destination,
                source,
            } => write!(f, "copy to {} failed: {source}", destination.display()),
        }
    }
}

impl std::error::Error for FileError {}
