// SPDX-License-Identifier: MPL-2.0

//! Output locations for photos and videos
//!
//! Files are named `<prefix>_<YYYYMMDD_HHMMSS>.<ext>`. A second capture
//! within the same second gets a numeric suffix instead of overwriting.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix for still image files
pub const PHOTO_PREFIX: &str = "photo";

/// Prefix for recording files
pub const VIDEO_PREFIX: &str = "video";

/// Timestamp layout used in file names
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Default directory for photos
pub fn default_photos_dir() -> PathBuf {
    dirs::picture_dir().unwrap_or_else(|| home_dir().join("Pictures"))
}

/// Default directory for videos
pub fn default_videos_dir() -> PathBuf {
    dirs::video_dir().unwrap_or_else(|| home_dir().join("Movies"))
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// File name for a capture taken at `when`
pub fn timestamped_name(prefix: &str, extension: &str, when: DateTime<Local>) -> String {
    format!("{}_{}.{}", prefix, when.format(TIMESTAMP_FORMAT), extension)
}

/// Free path in `dir` for a capture taken at `when`
pub fn timestamped_path(
    dir: &Path,
    prefix: &str,
    extension: &str,
    when: DateTime<Local>,
) -> PathBuf {
    let candidate = dir.join(timestamped_name(prefix, extension, when));
    if !candidate.exists() {
        return candidate;
    }
    let stem = format!("{}_{}", prefix, when.format(TIMESTAMP_FORMAT));
    (1u32..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, extension)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Create `dir` (and parents) if missing
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        debug!(path = %dir.display(), "Creating output directory");
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_timestamped_name_format() {
        assert_eq!(
            timestamped_name(PHOTO_PREFIX, "jpg", fixed_time()),
            "photo_20240309_140507.jpg"
        );
        assert_eq!(
            timestamped_name(VIDEO_PREFIX, "mp4", fixed_time()),
            "video_20240309_140507.mp4"
        );
    }

    #[test]
    fn test_collision_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let first = timestamped_path(dir.path(), PHOTO_PREFIX, "jpg", fixed_time());
        std::fs::write(&first, b"x").unwrap();
        let second = timestamped_path(dir.path(), PHOTO_PREFIX, "jpg", fixed_time());
        assert_ne!(first, second);
        assert!(second.ends_with("photo_20240309_140507_1.jpg"));
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
