//! Local series assets: a `tvshow.nfo` file and a poster image next to the
//! episodes.
//!
//! Both are optional. Values found here only fill fields that no provider
//! supplied.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use shelf_db::models::MetadataFields;
use tracing::{debug, warn};

const NFO_FILE: &str = "tvshow.nfo";
const POSTER_STEMS: &[&str] = &["poster", "cover", "folder"];
const POSTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Kodi-style `tvshow.nfo`. Provider ids appear either as
/// `<uniqueid type="...">` or as dedicated `<bangumiid>`/`<tmdbid>` elements.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TvShowNfo {
    title: Option<String>,
    originaltitle: Option<String>,
    plot: Option<String>,
    bangumiid: Option<String>,
    tmdbid: Option<String>,
    anilistid: Option<String>,
    #[serde(rename = "uniqueid")]
    unique_ids: Vec<UniqueId>,
}

#[derive(Debug, Deserialize)]
struct UniqueId {
    #[serde(rename = "@type", default)]
    kind: String,
    #[serde(rename = "$text", default)]
    value: String,
}

/// Read whatever local metadata sits in `series_dir`.
pub async fn read_local_assets(series_dir: &Path) -> MetadataFields {
    let mut fields = match tokio::fs::read_to_string(series_dir.join(NFO_FILE)).await {
        Ok(xml) => parse_nfo(&xml).unwrap_or_else(|e| {
            warn!(dir = %series_dir.display(), error = %e, "Ignoring unreadable tvshow.nfo");
            MetadataFields::default()
        }),
        Err(_) => MetadataFields::default(),
    };
    if let Some(poster) = find_poster(series_dir).await {
        fields.cover_image = Some(poster.to_string_lossy().into_owned());
    }
    if fields != MetadataFields::default() {
        debug!(dir = %series_dir.display(), "Found local series assets");
    }
    fields
}

/// Extract title, plot and provider ids from Kodi-style NFO XML.
pub fn parse_nfo(xml: &str) -> Result<MetadataFields, quick_xml::DeError> {
    let nfo: TvShowNfo = quick_xml::de::from_str(xml)?;

    let mut fields = MetadataFields {
        title: text(nfo.title),
        title_native: text(nfo.originaltitle),
        synopsis: text(nfo.plot),
        bangumi_id: id(nfo.bangumiid.as_deref()),
        tmdb_id: id(nfo.tmdbid.as_deref()),
        anilist_id: id(nfo.anilistid.as_deref()),
        ..Default::default()
    };
    for unique in &nfo.unique_ids {
        let slot = match unique.kind.to_ascii_lowercase().as_str() {
            "bangumi" | "bangumiid" => &mut fields.bangumi_id,
            "tmdb" | "tmdbid" => &mut fields.tmdb_id,
            "anilist" | "anilistid" => &mut fields.anilist_id,
            _ => continue,
        };
        if slot.is_none() {
            *slot = id(Some(&unique.value));
        }
    }
    Ok(fields)
}

fn text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn id(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok()).filter(|n| *n > 0)
}

async fn find_poster(series_dir: &Path) -> Option<PathBuf> {
    for stem in POSTER_STEMS {
        for ext in POSTER_EXTENSIONS {
            let candidate = series_dir.join(format!("{stem}.{ext}"));
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const NFO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tvshow>
  <title>Frieren</title>
  <originaltitle>葬送のフリーレン</originaltitle>
  <plot>An elf mage &amp; her party.</plot>
  <uniqueid type="bangumi" default="true">400602</uniqueid>
  <uniqueid type="tmdb">209867</uniqueid>
  <uniqueid type="imdb">tt22248376</uniqueid>
</tvshow>"#;

    #[test]
    fn parses_nfo_fields() {
        let f = parse_nfo(NFO).unwrap();
        assert_eq!(f.title.as_deref(), Some("Frieren"));
        assert_eq!(f.title_native.as_deref(), Some("葬送のフリーレン"));
        assert_eq!(f.synopsis.as_deref(), Some("An elf mage & her party."));
        assert_eq!(f.bangumi_id, Some(400602));
        assert_eq!(f.tmdb_id, Some(209867));
        assert_eq!(f.anilist_id, None);
    }

    #[test]
    fn empty_tags_are_ignored() {
        let f = parse_nfo("<tvshow><title></title><plot>  </plot></tvshow>").unwrap();
        assert_eq!(f, MetadataFields::default());
    }

    #[test]
    fn dedicated_id_elements_and_cdata() {
        let f = parse_nfo(
            "<tvshow><title>Frieren</title><bangumiid>400602</bangumiid>\
             <tmdbid>209867</tmdbid><id>424536</id>\
             <plot><![CDATA[An elf & her party]]></plot></tvshow>",
        )
        .unwrap();
        assert_eq!(f.title.as_deref(), Some("Frieren"));
        assert_eq!(f.bangumi_id, Some(400602));
        assert_eq!(f.tmdb_id, Some(209867));
        assert_eq!(f.synopsis.as_deref(), Some("An elf & her party"));
    }

    #[test]
    fn interleaved_unique_ids() {
        let f = parse_nfo(
            r#"<tvshow>
  <uniqueid type="tmdb">209867</uniqueid>
  <title>Frieren</title>
  <uniqueid type="anilist">154587</uniqueid>
</tvshow>"#,
        )
        .unwrap();
        assert_eq!(f.tmdb_id, Some(209867));
        assert_eq!(f.anilist_id, Some(154587));
    }

    #[test]
    fn malformed_nfo_is_an_error() {
        assert!(parse_nfo("<tvshow><title>Frieren</tvshow>").is_err());
    }

    #[tokio::test]
    async fn malformed_nfo_still_finds_poster() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tvshow.nfo"), "<tvshow><title>").unwrap();
        std::fs::write(dir.path().join("poster.jpg"), b"jpg").unwrap();

        let f = read_local_assets(dir.path()).await;
        assert_eq!(f.title, None);
        assert!(f.cover_image.unwrap().ends_with("poster.jpg"));
    }

    #[tokio::test]
    async fn reads_nfo_and_poster() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tvshow.nfo"), NFO).unwrap();
        std::fs::write(dir.path().join("folder.png"), b"png").unwrap();

        let f = read_local_assets(dir.path()).await;
        assert_eq!(f.title.as_deref(), Some("Frieren"));
        assert!(f.cover_image.unwrap().ends_with("folder.png"));
    }

    #[tokio::test]
    async fn missing_assets_yield_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_local_assets(dir.path()).await, MetadataFields::default());
    }
}
