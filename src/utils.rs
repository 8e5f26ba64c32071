// SPDX-License-Identifier: MIT OR Apache-2.0

//! Utility functions for artgrep

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The name of the default index directory
pub const INDEX_DIR: &str = ".artgrep";

/// Image file extensions accepted by the scanner (lowercase, no dot)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Check whether a path has an image extension (case-insensitive)
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Convert a filesystem timestamp to UTC, clamping pre-epoch times to the epoch
pub fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time.max(SystemTime::UNIX_EPOCH))
}

/// Pick the index directory: CLI flag, then config, then ./.artgrep
pub fn resolve_index_dir(cli_value: Option<&str>, configured: PathBuf) -> PathBuf {
    cli_value.map(PathBuf::from).unwrap_or(configured)
}

/// Make a path absolute without requiring it to exist
pub fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn image_extension_matching_ignores_case() {
        assert!(is_image_path(Path::new("a/b/photo.JPG")));
        assert!(is_image_path(Path::new("sketch.webp")));
        assert!(is_image_path(Path::new("x.Jpeg")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("raw.tiff")));
        assert!(!is_image_path(Path::new("jpg")));
    }

    #[test]
    fn system_time_converts_to_utc() {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(86_400);
        let utc = system_time_to_utc(time);
        assert_eq!(utc.to_rfc3339(), "1970-01-02T00:00:00+00:00");
    }

    #[test]
    fn cli_index_dir_wins() {
        let configured = PathBuf::from("configured");
        assert_eq!(
            resolve_index_dir(Some("flag"), configured.clone()),
            PathBuf::from("flag")
        );
        assert_eq!(resolve_index_dir(None, configured.clone()), configured);
    }
}
