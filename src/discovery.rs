use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

/// Extensions accepted as images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tiff", "webp"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Collects every image file under `dir`, sorted by path.
///
/// A missing or non-directory `dir` is not an error here: the caller reports
/// "no images found" and the run ends with an empty tally.
pub fn discover_images(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    if !dir.is_dir() {
        warn!("Input directory {} does not exist or is not a directory", dir.display());
        return Vec::new();
    }

    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping unreadable entry under {}: {}", dir.display(), err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_image_file(path))
        .collect();

    images.sort();
    debug!("Discovered {} images under {}", images.len(), dir.display());
    images
}
