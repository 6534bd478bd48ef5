//! Output types for the filename classifier.

use serde::{Deserialize, Serialize};

/// Structured guess extracted from a video file path.
///
/// Only `title`, `season`, and `extension` are always populated. The
/// episode number is absent when no marker could be found; such files are
/// still indexed.
///
/// # Examples
///
/// ```
/// use shelf_parser::classify;
///
/// let p = classify("/lib/Frieren/Season 1/[Group] Frieren - 03 [1080p].mkv");
/// assert_eq!(p.title, "Frieren");
/// assert_eq!(p.season, 1);
/// assert_eq!(p.episode, Some(3.0));
/// assert_eq!(p.group.as_deref(), Some("Group"));
/// assert_eq!(p.resolution.as_deref(), Some("1080p"));
/// assert_eq!(p.extension, "mkv");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEpisode {
    /// Title guessed from the filename, tags stripped.
    pub title: String,

    /// Season number; 1 unless the filename says otherwise, 0 for specials.
    pub season: u32,

    /// Episode number. Fractional for recap/half episodes such as `12.5`.
    pub episode: Option<f64>,

    /// Lowercased resolution tag, e.g. `"1080p"`, `"4k"`.
    pub resolution: Option<String>,

    /// Subtitle/release group from a leading `[Group]` tag.
    pub group: Option<String>,

    /// Lowercased file extension without the dot.
    pub extension: String,

    /// Uppercased video codec tag, e.g. `"HEVC"`, `"X264"`.
    pub video_codec: Option<String>,

    /// Uppercased audio codec tag, e.g. `"FLAC"`, `"AAC"`.
    pub audio_codec: Option<String>,

    /// `"10bit"` or `"8bit"` when tagged.
    pub bit_depth: Option<String>,

    /// Source tag as written, e.g. `"WebRip"`, `"BDRip"`.
    pub source: Option<String>,
}

impl ParsedEpisode {
    /// Create a `ParsedEpisode` with season 1 and no episode.
    pub fn new(title: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            season: 1,
            episode: None,
            resolution: None,
            group: None,
            extension: extension.into(),
            video_codec: None,
            audio_codec: None,
            bit_depth: None,
            source: None,
        }
    }
}
