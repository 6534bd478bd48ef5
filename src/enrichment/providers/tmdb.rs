//! TMDB (The Movie Database) metadata provider.
//!
//! Implements [`MetadataProvider`] against the TMDB v3 REST API:
//! `search/tv` picks the best title match, `tv/{id}` supplies the series
//! fields and its season list, and `tv/{id}/season/{n}` supplies episode
//! names and stills.
//!
//! Requests are rate limited at 4 per second via [`governor`], HTTP 429 is
//! retried (max 3 times) honouring `Retry-After`, and every request times
//! out after 30 seconds.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde::Deserialize;
use shelf_db::models::MetadataFields;
use tracing::{debug, warn};

use crate::enrichment::provider::{EpisodeMetadata, MetadataProvider, SeriesMetadata};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const REQUESTS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(4) {
    Some(n) => n,
    None => unreachable!(),
};

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvSearchResult {
    id: i64,
    name: Option<String>,
    original_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetail {
    id: i64,
    name: Option<String>,
    original_name: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    #[serde(default)]
    seasons: Vec<TmdbSeasonSummary>,
}

#[derive(Debug, Deserialize)]
struct TmdbSeasonSummary {
    season_number: u32,
}

#[derive(Debug, Deserialize)]
struct TmdbSeasonDetail {
    #[serde(default)]
    episodes: Vec<TmdbEpisode>,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisode {
    episode_number: u32,
    name: Option<String>,
    still_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// TMDB metadata provider.
///
/// # Examples
///
/// ```no_run
/// use animeshelf::enrichment::providers::TmdbProvider;
///
/// let provider = TmdbProvider::new("your-api-key".into(), "en-US".into());
/// ```
pub struct TmdbProvider {
    client: reqwest::Client,
    api_key: String,
    language: String,
    base_url: String,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl TmdbProvider {
    /// Create a provider talking to the public TMDB API.
    ///
    /// `language` is a TMDB language tag such as `"en-US"` or `"ja-JP"`.
    pub fn new(api_key: String, language: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key,
            language,
            base_url: TMDB_BASE_URL.to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_second(REQUESTS_PER_SECOND)),
        }
    }

    /// Point the provider at a different API root (a mirror or a test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Execute a GET request with rate limiting and 429-retry logic.
    async fn get(&self, url: &str) -> anyhow::Result<reqwest::Response> {
        let mut retries = 0u32;
        loop {
            self.rate_limiter.until_ready().await;

            let resp = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("TMDB request failed: {}", self.redact(url)))?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                warn!(
                    retry = retries,
                    wait_secs = wait,
                    "TMDB returned 429, backing off"
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            let resp = resp
                .error_for_status()
                .with_context(|| format!("TMDB request returned error: {}", self.redact(url)))?;

            return Ok(resp);
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> anyhow::Result<T> {
        self.get(url)
            .await?
            .json()
            .await
            .with_context(|| format!("failed to parse TMDB response: {}", self.redact(url)))
    }

    /// Build a full API URL with the API key and language query parameters.
    fn url(&self, path: &str, extra_params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}{path}?api_key={}&language={}",
            self.base_url, self.api_key, self.language
        );
        for (key, value) in extra_params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoded(value));
        }
        url
    }

    fn redact(&self, url: &str) -> String {
        if self.api_key.is_empty() {
            url.to_string()
        } else {
            url.replace(&self.api_key, "***")
        }
    }

    /// Score a search hit against the query title.
    fn confidence(query: &str, result: &TmdbTvSearchResult) -> f64 {
        [result.name.as_deref(), result.original_name.as_deref()]
            .into_iter()
            .flatten()
            .map(|name| {
                if name == query {
                    1.0
                } else if name.eq_ignore_ascii_case(query) {
                    0.8
                } else if name.to_lowercase().contains(&query.to_lowercase()) {
                    0.4
                } else {
                    0.1
                }
            })
            .fold(0.0, f64::max)
    }

    async fn search(&self, title: &str) -> anyhow::Result<i64> {
        let url = self.url("/search/tv", &[("query", title)]);
        debug!(title, "TMDB search TV");

        let body: TmdbSearchResponse<TmdbTvSearchResult> = self.get_json(&url).await?;

        // Ties keep TMDB's own (popularity) order.
        let mut best: Option<(f64, i64)> = None;
        for hit in &body.results {
            let score = Self::confidence(title, hit);
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, hit.id));
            }
        }
        best.map(|(_, id)| id)
            .ok_or_else(|| anyhow!("no TMDB match for {title:?}"))
    }

    async fn season_episodes(&self, tv_id: i64, season: u32) -> anyhow::Result<Vec<EpisodeMetadata>> {
        let url = self.url(&format!("/tv/{tv_id}/season/{season}"), &[]);
        let detail: TmdbSeasonDetail = self.get_json(&url).await?;
        Ok(detail
            .episodes
            .into_iter()
            .map(|ep| EpisodeMetadata {
                season,
                episode: f64::from(ep.episode_number),
                title: ep.name.filter(|n| !n.is_empty()),
                image: ep.still_path.map(|p| image_url(&p)),
            })
            .collect())
    }
}

/// Minimal percent-encoding for query parameter values.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0x0f) as usize]));
            }
        }
    }
    out
}

const HEX: [u8; 16] = *b"0123456789ABCDEF";

/// Convert a TMDB image path fragment to a full URL.
fn image_url(path: &str) -> String {
    format!("{TMDB_IMAGE_BASE}{path}")
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn enrich(&self, title: &str) -> anyhow::Result<SeriesMetadata> {
        let tv_id = self.search(title).await?;

        let url = self.url(&format!("/tv/{tv_id}"), &[]);
        debug!(tv_id, "TMDB get TV detail");
        let detail: TmdbTvDetail = self.get_json(&url).await?;

        let english = self.language.starts_with("en");
        let fields = MetadataFields {
            title_en: if english { detail.name.clone() } else { None },
            title: detail.name,
            title_native: detail.original_name,
            synopsis: detail.overview.filter(|o| !o.is_empty()),
            cover_image: detail.poster_path.map(|p| image_url(&p)),
            tmdb_id: Some(detail.id),
            ..Default::default()
        };

        let mut episodes = Vec::new();
        for season in detail.seasons.iter().map(|s| s.season_number) {
            match self.season_episodes(tv_id, season).await {
                Ok(eps) => episodes.extend(eps),
                Err(e) => warn!(tv_id, season, error = %e, "Failed to fetch TMDB season"),
            }
        }

        Ok(SeriesMetadata { fields, episodes })
    }
}
