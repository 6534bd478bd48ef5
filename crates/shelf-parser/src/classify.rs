//! Filename heuristics.
//!
//! Episode markers are tried in priority order:
//!
//! 1. `S<season>E<episode>`
//! 2. an explicit `Season N` / `SN` marker, with the episode taken from a
//!    following ` - NN` or trailing number
//! 3. ` - <number>` (fractional numbers allowed)
//! 4. a 1–3 digit bracketed number that is not a resolution, year or codec
//! 5. a bare trailing number once all tags are stripped
//!
//! Anything else leaves the episode unset.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::ParsedEpisode;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("classifier regex should compile")
}

static GROUP: Lazy<Regex> = Lazy::new(|| re(r"^\[([^\]]+)\]"));
static RESOLUTION: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)\b(2160p|1080p|720p|480p|360p|4k|fhd|hd|3840x2160|1920x1080|1280x720)\b")
});
static VIDEO_CODEC: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(h\.?264|h\.?265|x264|x265|av1|hevc|avc|vp9)\b"));
static AUDIO_CODEC: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(flac|aacx[234]|aac|eac3|ac3|dts-hd|dts|truehd|opus|mp3)\b"));
static BIT_DEPTH: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(10-?bit|8-?bit|hi10p|ma10p)\b"));
static SOURCE: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(web-?rip|bd-?rip|web-?dl|blu-?ray|dvd-?rip|hdtv)\b"));

static SXXEYY: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bS(\d{1,2})\s*E(\d{1,4}(?:\.\d+)?)(?:v\d+)?\b"));
static SEASON_MARKER: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(?:season\s*(\d{1,2})|S(\d{1,2}))\b"));
static DASH_EPISODE: Lazy<Regex> =
    Lazy::new(|| re(r"\s-\s(\d{1,4}(?:\.\d+)?)(?:v\d+)?(?:\s|END|\[|\(|$)"));
static BRACKET_EPISODE: Lazy<Regex> = Lazy::new(|| re(r"\[(\d{1,3})(?:v\d+)?\]"));
static TRAILING_NUMBER: Lazy<Regex> = Lazy::new(|| re(r"\s(\d{1,3})(?:v\d+)?$"));
static SPECIAL: Lazy<Regex> = Lazy::new(|| re(r"(?i)\b(ova|oad|specials?)\b"));

static LEADING_TAG: Lazy<Regex> = Lazy::new(|| re(r"^\s*(?:\[[^\]]*\]|【[^】]*】)"));
static TRAILING_TAG: Lazy<Regex> =
    Lazy::new(|| re(r"\s*(?:\[[^\]]*\]|\([^)]*\)|【[^】]*】)\s*$"));

/// Classify a video file path into a [`ParsedEpisode`].
///
/// Pure and deterministic: only the final path component is inspected, the
/// filesystem is never touched. Directory context (season folders) is the
/// caller's concern.
pub fn classify(path: impl AsRef<Path>) -> ParsedEpisode {
    let path = path.as_ref();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let raw_stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = normalize(&raw_stem);

    let mut parsed = ParsedEpisode::new(fallback_title(&stem), extension);
    extract_tags(&stem, &mut parsed);

    if let Some(caps) = SXXEYY.captures(&stem) {
        parsed.season = caps[1].parse().unwrap_or(1);
        parsed.episode = caps[2].parse().ok();
        parsed.title = title_before(&stem, caps.get_match().start());
        return parsed;
    }

    if let Some(caps) = SEASON_MARKER.captures(&stem) {
        let marker = caps.get_match();
        let season = caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse().ok());
        if let Some(season) = season {
            parsed.season = season;
            let rest = format!("{} {}", &stem[..marker.start()], &stem[marker.end()..]);
            parsed.episode = episode_and_title(&rest).map(|(episode, _)| episode);
            parsed.title = title_before(&stem, marker.start());
            return parsed;
        }
    }

    if let Some((episode, title)) = episode_and_title(&stem) {
        parsed.episode = Some(episode);
        parsed.title = title;
        return parsed;
    }

    if SPECIAL.is_match(&stem) {
        parsed.season = 0;
    }
    parsed
}

/// Returns `false` for numbers that are almost certainly not episodes:
/// zero, common resolutions, years, and codec markers.
pub fn is_likely_episode(num: u32) -> bool {
    !matches!(num, 0 | 480 | 720 | 1080 | 2160 | 264 | 265 | 1900..=2100)
}

/// Underscores become spaces; dot-separated scene names become spaced.
fn normalize(stem: &str) -> String {
    let s = stem.replace('_', " ");
    if !s.contains(' ') && s.matches('.').count() >= 2 {
        s.replace('.', " ")
    } else {
        s
    }
}

fn extract_tags(stem: &str, parsed: &mut ParsedEpisode) {
    parsed.group = GROUP
        .captures(stem)
        .map(|c| c[1].trim().to_string())
        .filter(|g| !g.is_empty());
    parsed.resolution = RESOLUTION
        .captures(stem)
        .map(|c| c[1].to_ascii_lowercase());
    parsed.video_codec = VIDEO_CODEC
        .captures(stem)
        .map(|c| c[1].to_ascii_uppercase());
    parsed.audio_codec = AUDIO_CODEC
        .captures(stem)
        .map(|c| c[1].to_ascii_uppercase());
    parsed.bit_depth = BIT_DEPTH.captures(stem).map(|c| {
        if c[1].contains("10") {
            "10bit".to_string()
        } else {
            "8bit".to_string()
        }
    });
    parsed.source = SOURCE.captures(stem).map(|c| c[1].to_string());
}

/// Rules 3 to 5: ` - NN`, a bracketed number, then a bare trailing number.
/// Returns the episode and the title preceding its marker.
fn episode_and_title(stem: &str) -> Option<(f64, String)> {
    if let Some(caps) = DASH_EPISODE.captures(stem) {
        if let Ok(episode) = caps[1].parse() {
            return Some((episode, title_before(stem, caps.get_match().start())));
        }
    }

    for caps in BRACKET_EPISODE.captures_iter(stem) {
        let Ok(num) = caps[1].parse::<u32>() else {
            continue;
        };
        if is_likely_episode(num) {
            return Some((f64::from(num), title_before(stem, caps.get_match().start())));
        }
    }

    let stripped = strip_tags(stem);
    let caps = TRAILING_NUMBER.captures(stripped)?;
    let num = caps[1].parse::<u32>().ok()?;
    is_likely_episode(num)
        .then(|| (f64::from(num), title_before(stripped, caps.get_match().start())))
}

/// Title from the text preceding an episode marker, or the whole stem when
/// nothing but tags precedes it.
fn title_before(stem: &str, idx: usize) -> String {
    let title = trim_open_bracket(strip_tags(&stem[..idx]));
    if title.is_empty() {
        fallback_title(stem)
    } else {
        title.to_string()
    }
}

fn fallback_title(stem: &str) -> String {
    let title = strip_tags(stem);
    if title.is_empty() {
        stem.trim().to_string()
    } else {
        title.to_string()
    }
}

/// Drop an opening bracket whose tag runs past the cut, as in
/// `[Show S2][07]` cut before `S2`.
fn trim_open_bracket(s: &str) -> &str {
    for (open, close) in [('[', ']'), ('【', '】'), ('(', ')')] {
        if let Some(rest) = s.strip_prefix(open) {
            if !rest.contains(close) {
                return rest.trim_start();
            }
        }
    }
    s
}

/// Strip leading and trailing bracket/parenthesis tags and separators.
fn strip_tags(s: &str) -> &str {
    let mut s = s.trim();
    loop {
        let before = s.len();
        if let Some(m) = LEADING_TAG.find(s) {
            s = s[m.end()..].trim_start();
        }
        if let Some(m) = TRAILING_TAG.find(s) {
            s = s[..m.start()].trim_end();
        }
        s = s.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '_');
        if s.len() == before {
            return s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_episode_with_group_and_resolution() {
        let p = classify("/lib/Frieren/Season 1/[Group] Frieren - 03 [1080p].mkv");
        assert_eq!(p.title, "Frieren");
        assert_eq!(p.season, 1);
        assert_eq!(p.episode, Some(3.0));
        assert_eq!(p.group.as_deref(), Some("Group"));
        assert_eq!(p.resolution.as_deref(), Some("1080p"));
        assert_eq!(p.extension, "mkv");
    }

    #[test]
    fn sxxeyy_marker() {
        let p = classify("/lib/ShowX/ShowX S02E05.mkv");
        assert_eq!(p.title, "ShowX");
        assert_eq!(p.season, 2);
        assert_eq!(p.episode, Some(5.0));
    }

    #[test]
    fn sxxeyy_lowercase_with_tags() {
        let p = classify("[Sub] Some Show s1e12 [720p][HEVC].mp4");
        assert_eq!(p.title, "Some Show");
        assert_eq!(p.season, 1);
        assert_eq!(p.episode, Some(12.0));
        assert_eq!(p.resolution.as_deref(), Some("720p"));
        assert_eq!(p.video_codec.as_deref(), Some("HEVC"));
    }

    #[test]
    fn dotted_scene_name() {
        let p = classify("Show.Name.S03E07.1080p.WEB-DL.x264.mkv");
        assert_eq!(p.title, "Show Name");
        assert_eq!(p.season, 3);
        assert_eq!(p.episode, Some(7.0));
        assert_eq!(p.source.as_deref(), Some("WEB-DL"));
        assert_eq!(p.video_codec.as_deref(), Some("X264"));
    }

    #[test]
    fn fractional_dash_episode() {
        let p = classify("[Group] Title - 12.5 [1080p].mkv");
        assert_eq!(p.episode, Some(12.5));
        assert_eq!(p.title, "Title");
    }

    #[test]
    fn dash_episode_with_version_suffix() {
        let p = classify("[Group] Title - 05v2 (BD 1080p).mkv");
        assert_eq!(p.episode, Some(5.0));
        assert_eq!(p.title, "Title");
    }

    #[test]
    fn bracket_episode() {
        let p = classify("[Group][Title][07][1080p].mkv");
        assert_eq!(p.episode, Some(7.0));
        assert_eq!(p.group.as_deref(), Some("Group"));
    }

    #[test]
    fn bracket_resolution_is_not_an_episode() {
        let p = classify("[Group] Title [1080].mkv");
        assert_eq!(p.episode, None);
        let p = classify("[Group] Title [720][08].mkv");
        assert_eq!(p.episode, Some(8.0));
    }

    #[test]
    fn bracket_year_is_not_an_episode() {
        let p = classify("[Group] Title [2024].mkv");
        assert_eq!(p.episode, None);
        assert_eq!(p.title, "Title");
    }

    #[test]
    fn bracket_codec_marker_is_not_an_episode() {
        let p = classify("[Group] Title [264][03].mkv");
        assert_eq!(p.episode, Some(3.0));
    }

    #[test]
    fn explicit_season_marker() {
        let p = classify("[Group] Title Season 2 - 04 [1080p].mkv");
        assert_eq!(p.season, 2);
        assert_eq!(p.episode, Some(4.0));
        assert_eq!(p.title, "Title");

        let p = classify("Title S2 11.mkv");
        assert_eq!(p.season, 2);
        assert_eq!(p.episode, Some(11.0));
    }

    #[test]
    fn season_marker_with_bracket_episode() {
        let p = classify("[Group] Title Season 2 [07][1080p].mkv");
        assert_eq!(p.season, 2);
        assert_eq!(p.episode, Some(7.0));
        assert_eq!(p.title, "Title");
    }

    #[test]
    fn season_marker_inside_title_tag() {
        let p = classify("[Nekomoe kissaten][Shingeki no Kyojin S2][07][1080p].mkv");
        assert_eq!(p.season, 2);
        assert_eq!(p.episode, Some(7.0));
        assert_eq!(p.title, "Shingeki no Kyojin");
        assert_eq!(p.group.as_deref(), Some("Nekomoe kissaten"));
    }

    #[test]
    fn trailing_number() {
        let p = classify("Naruto 01.mkv");
        assert_eq!(p.title, "Naruto");
        assert_eq!(p.episode, Some(1.0));
    }

    #[test]
    fn no_episode_marker() {
        let p = classify("/lib/Movie/Some Movie (2019).mkv");
        assert_eq!(p.episode, None);
        assert_eq!(p.season, 1);
        assert_eq!(p.title, "Some Movie");
    }

    #[test]
    fn special_without_episode_is_season_zero() {
        let p = classify("[Group] Title OVA [1080p].mkv");
        assert_eq!(p.season, 0);
        assert_eq!(p.episode, None);
    }

    #[test]
    fn technical_tags() {
        let p = classify("[Group] Title - 01 [WebRip 1080p HEVC-10bit AAC].mkv");
        assert_eq!(p.source.as_deref(), Some("WebRip"));
        assert_eq!(p.bit_depth.as_deref(), Some("10bit"));
        assert_eq!(p.audio_codec.as_deref(), Some("AAC"));
        assert_eq!(p.resolution.as_deref(), Some("1080p"));
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(classify("EP01.MKV").extension, "mkv");
    }

    #[test]
    fn title_never_empty() {
        let p = classify("[Group][1080p].mkv");
        assert!(!p.title.is_empty());
    }

    #[test]
    fn likely_episode_filter() {
        assert!(is_likely_episode(7));
        assert!(is_likely_episode(1100));
        for n in [0, 480, 720, 1080, 2160, 264, 265, 1999, 2024] {
            assert!(!is_likely_episode(n), "{n} should be rejected");
        }
    }
}
