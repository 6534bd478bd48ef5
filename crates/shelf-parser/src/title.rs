//! Search-title cleaning.
//!
//! Series titles come from folder names, which routinely carry release
//! tags and season markers that metadata providers do not understand.

use once_cell::sync::Lazy;
use regex::Regex;

static BRACKETED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\]]*\]|\([^)]*\)|【[^】]*】").expect("bracket regex should compile")
});
static SEASON_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:season\s*\d+|s\d{1,2}|part\s*\d+)\b|第\s*\d+\s*[季期]")
        .expect("season text regex should compile")
});
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

/// Reduce a raw series title to a provider-friendly search query.
///
/// Removes every bracketed or parenthesised tag and any season marker
/// (`Season 2`, `S2`, `Part 2`, `第2季`), collapses whitespace and trims
/// surrounding dashes. If nothing is left, the raw input is returned.
///
/// ```
/// use shelf_parser::clean_title;
///
/// assert_eq!(clean_title("[Group] Spy x Family Season 2 (2023)"), "Spy x Family");
/// assert_eq!(clean_title("[1080p]"), "[1080p]");
/// ```
pub fn clean_title(raw: &str) -> String {
    let s = BRACKETED.replace_all(raw, " ");
    let s = SEASON_TEXT.replace_all(&s, " ");
    let s = WHITESPACE.replace_all(&s, " ");
    let s = s.trim_matches(|c: char| c == '-' || c.is_whitespace());
    if s.is_empty() {
        raw.to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_seasons() {
        assert_eq!(clean_title("Frieren"), "Frieren");
        assert_eq!(clean_title("[Group] Frieren [1080p]"), "Frieren");
        assert_eq!(clean_title("Attack on Titan S3 - Part 2"), "Attack on Titan");
        assert_eq!(clean_title("Mushoku Tensei 第2季"), "Mushoku Tensei");
    }

    #[test]
    fn keeps_inner_dashes() {
        assert_eq!(clean_title("Re:Zero - Starting Life"), "Re:Zero - Starting Life");
    }

    #[test]
    fn falls_back_to_raw() {
        assert_eq!(clean_title("(2020)"), "(2020)");
        assert_eq!(clean_title("Season 1"), "Season 1");
    }
}
