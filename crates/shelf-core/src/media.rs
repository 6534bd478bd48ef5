//! Video file recognition.
//!
//! The library only indexes files whose extension appears in
//! [`VIDEO_EXTENSIONS`]. Matching is case-insensitive.

use std::path::Path;

/// Extensions (lowercase, without the dot) treated as video files.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "flv", "wmv", "ts", "rmvb", "webm", "m2ts",
];

/// Return the lowercase extension of `path` if it names a known video file.
pub fn video_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    VIDEO_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Returns `true` when `path` has a known video extension.
pub fn is_video_file(path: &Path) -> bool {
    video_extension(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_extensions() {
        for ext in VIDEO_EXTENSIONS {
            let name = format!("episode.{ext}");
            assert!(is_video_file(Path::new(&name)), "{name} should be video");
        }
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(
            video_extension(Path::new("/lib/Show/EP01.MKV")).as_deref(),
            Some("mkv")
        );
    }

    #[test]
    fn rejects_non_video() {
        assert!(!is_video_file(Path::new("/lib/Show/poster.jpg")));
        assert!(!is_video_file(Path::new("/lib/Show/subs.ass")));
        assert!(!is_video_file(Path::new("/lib/Show/noext")));
        assert!(!is_video_file(Path::new("/lib/Show/episode.mkv.part")));
    }
}
