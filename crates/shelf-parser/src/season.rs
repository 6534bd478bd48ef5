//! Season folder detection.

use once_cell::sync::Lazy;
use regex::Regex;

static SEASON_FOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:season\s*(\d+)|s(\d+)|specials|ova)$")
        .expect("season folder regex should compile")
});

/// Season number encoded by a directory name such as `Season 2`, `S02`,
/// `Specials` or `OVA` (the latter two map to season 0).
///
/// Returns `None` when the name is not a season folder, meaning the
/// directory is itself a series root.
pub fn season_from_folder(name: &str) -> Option<u32> {
    let caps = SEASON_FOLDER.captures(name.trim())?;
    match caps.get(1).or_else(|| caps.get(2)) {
        Some(num) => num.as_str().parse().ok(),
        None => Some(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_season_folders() {
        assert_eq!(season_from_folder("Season 2"), Some(2));
        assert_eq!(season_from_folder("season 10"), Some(10));
        assert_eq!(season_from_folder("Season2"), Some(2));
        assert_eq!(season_from_folder("S02"), Some(2));
        assert_eq!(season_from_folder("s1"), Some(1));
    }

    #[test]
    fn specials_are_season_zero() {
        assert_eq!(season_from_folder("Specials"), Some(0));
        assert_eq!(season_from_folder("OVA"), Some(0));
        assert_eq!(season_from_folder("ova"), Some(0));
    }

    #[test]
    fn series_folders_are_not_seasons() {
        assert_eq!(season_from_folder("Frieren"), None);
        assert_eq!(season_from_folder("Season 2 Extras"), None);
        assert_eq!(season_from_folder("ShowX S02"), None);
        assert_eq!(season_from_folder(""), None);
    }
}
