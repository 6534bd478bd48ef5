//! shelf-parser: filename and folder heuristics for anime/TV libraries.
//!
//! Turns a video path into a structured `(title, season, episode)` guess
//! plus release tags, recognises season folders, and cleans titles for
//! metadata searches. Everything here is pure; no I/O.
//!
//! # Quick start
//!
//! ```
//! use shelf_parser::{classify, season_from_folder};
//!
//! let p = classify("/lib/ShowX/ShowX S02E05.mkv");
//! assert_eq!(p.title, "ShowX");
//! assert_eq!(p.season, 2);
//! assert_eq!(p.episode, Some(5.0));
//!
//! assert_eq!(season_from_folder("Season 2"), Some(2));
//! assert_eq!(season_from_folder("Specials"), Some(0));
//! ```

mod classify;
mod season;
mod title;
pub mod types;

pub use classify::{classify, is_likely_episode};
pub use season::season_from_folder;
pub use title::clean_title;
pub use types::ParsedEpisode;
