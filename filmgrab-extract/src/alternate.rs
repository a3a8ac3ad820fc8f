//! Third-party metadata lookup, the last resort in the cascade.
//!
//! Disabled unless `alternate_source.enabled` is set. Lookup failures never
//! fail the pipeline; they simply produce no candidate.

use crate::cascade::{PosterStrategy, absorb};
use crate::normalize::PlaceholderPolicy;
use anyhow::{Context, Result};
use async_trait::async_trait;
use filmgrab_common::{Candidate, StrategyId};
use filmgrab_config::AlternateSourceSettings;
use filmgrab_drivers::film_browser::page::{PageError, RenderedPage};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Looks up a poster URL by film title.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn poster_for(&self, title: &str, year: Option<&str>) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    poster_path: Option<String>,
}

/// TMDB movie search.
pub struct TmdbLookup {
    http: reqwest::Client,
    endpoint: String,
    image_base: String,
    api_key: String,
}

impl TmdbLookup {
    pub fn new(settings: &AlternateSourceSettings, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("building TMDB http client")?;
        Ok(Self {
            http,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            image_base: settings.image_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// `None` when the source is disabled or has no key.
    pub fn from_settings(settings: &AlternateSourceSettings) -> Option<Self> {
        if !settings.enabled {
            return None;
        }
        let key = settings.api_key.clone().filter(|k| !k.trim().is_empty())?;
        match Self::new(settings, key) {
            Ok(lookup) => Some(lookup),
            Err(e) => {
                warn!(target: "extract.alternate", error = %e, "alternate source unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl MetadataLookup for TmdbLookup {
    async fn poster_for(&self, title: &str, year: Option<&str>) -> Result<Option<String>> {
        let url = format!("{}/search/movie", self.endpoint);
        let mut query = vec![("api_key", self.api_key.as_str()), ("query", title)];
        if let Some(y) = year {
            query.push(("year", y));
        }

        let resp: SearchResponse = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .context("TMDB search request")?
            .error_for_status()
            .context("TMDB search status")?
            .json()
            .await
            .context("TMDB search body")?;

        let poster = resp
            .results
            .into_iter()
            .next()
            .and_then(|hit| hit.poster_path)
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}{}", self.image_base, p));
        debug!(target: "extract.alternate", %title, ?poster, "TMDB search");
        Ok(poster)
    }
}

fn title_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>.+?)\s*\((?P<year>\d{4})\)").expect("title regex compiles")
    })
}

/// Split a film page title into name and optional release year.
///
/// `"Pierrot le Fou (1965) directed by Jean-Luc Godard • Letterboxd"`
/// becomes `("Pierrot le Fou", Some("1965"))`.
pub fn parse_page_title(raw: &str) -> Option<(String, Option<String>)> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '\u{200e}' | '\u{200f}' | '\u{feff}'))
        .collect();
    let cleaned = cleaned.trim();

    if let Some(caps) = title_year_re().captures(cleaned) {
        let name = caps["name"].trim().to_string();
        if !name.is_empty() {
            return Some((name, Some(caps["year"].to_string())));
        }
    }

    let name = cleaned
        .split(['•', '|'])
        .next()
        .unwrap_or_default()
        .trim();
    let name = name.strip_suffix("- Letterboxd").unwrap_or(name).trim();
    if name.is_empty() || name.eq_ignore_ascii_case("letterboxd") {
        return None;
    }
    Some((name.to_string(), None))
}

/// Poster via [`MetadataLookup`], keyed by the page title.
pub struct AlternateSourceStrategy {
    lookup: Arc<dyn MetadataLookup>,
    policy: Arc<PlaceholderPolicy>,
}

impl AlternateSourceStrategy {
    pub fn new(lookup: Arc<dyn MetadataLookup>, policy: Arc<PlaceholderPolicy>) -> Self {
        Self { lookup, policy }
    }
}

#[async_trait]
impl PosterStrategy for AlternateSourceStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::AlternateSource
    }

    async fn locate(&self, page: &dyn RenderedPage) -> Result<Option<Candidate>, PageError> {
        let raw = absorb(page.title().await, self.id())?;
        let Some((name, year)) = parse_page_title(&raw) else {
            debug!(target: "extract.alternate", title = %raw, "no usable page title");
            return Ok(None);
        };

        match self.lookup.poster_for(&name, year.as_deref()).await {
            Ok(Some(url)) if !self.policy.is_placeholder(&url) => {
                Ok(Some(Candidate::new(url, self.id())))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(target: "extract.alternate", %name, error = %e, "lookup failed");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_with_year() {
        let parsed = parse_page_title(
            "\u{200e}Pierrot le Fou (1965) directed by Jean-Luc Godard • Reviews, film + cast • Letterboxd",
        );
        assert_eq!(
            parsed,
            Some(("Pierrot le Fou".to_string(), Some("1965".to_string())))
        );
    }

    #[test]
    fn title_without_year() {
        assert_eq!(
            parse_page_title("Stalker • Letterboxd"),
            Some(("Stalker".to_string(), None))
        );
        assert_eq!(
            parse_page_title("Stalker - Letterboxd"),
            Some(("Stalker".to_string(), None))
        );
    }

    #[test]
    fn site_only_title_is_rejected() {
        assert_eq!(parse_page_title("Letterboxd"), None);
        assert_eq!(parse_page_title("  "), None);
    }

    #[test]
    fn disabled_source_builds_nothing() {
        let settings = AlternateSourceSettings::default();
        assert!(TmdbLookup::from_settings(&settings).is_none());

        let keyless = AlternateSourceSettings {
            enabled: true,
            api_key: Some("  ".into()),
            ..AlternateSourceSettings::default()
        };
        assert!(TmdbLookup::from_settings(&keyless).is_none());
    }
}
