use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Probability per label for one image, e.g. `{"safe": 0.92, "unsafe": 0.08}`.
pub type LabelScores = BTreeMap<String, f32>;

/// Label the organizer routes on.
pub const UNSAFE_LABEL: &str = "unsafe";
pub const SAFE_LABEL: &str = "safe";

/// Pluggable image classifier for NSFW detection
pub trait Classifier: Send + Sync {
    /// Classify a batch of image files.
    ///
    /// Entries come back in processing order. A path the backend could not
    /// read may be left out; an `Err` means the whole batch failed.
    fn classify(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, LabelScores)>>;
}

mod nsfw;

pub use nsfw::NsfwClassifier;
