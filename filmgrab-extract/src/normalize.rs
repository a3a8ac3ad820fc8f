//! Pure helpers: placeholder classification, URL canonicalisation, text
//! trimming.

use filmgrab_config::ExtractionSettings;
use regex::{Captures, Regex};
use std::sync::OnceLock;
use tracing::warn;
use url::Url;

/// Outcome of classifying a candidate value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Usable,
    Empty,
    Placeholder { pattern: String },
}

/// Rules deciding whether an image reference is placeholder artwork.
///
/// Matching is case-insensitive. Allow-listed substrings win over patterns.
#[derive(Debug, Clone)]
pub struct PlaceholderPolicy {
    patterns: Vec<String>,
    allowlist: Vec<String>,
    recognizers: Vec<String>,
}

impl PlaceholderPolicy {
    pub fn new(patterns: &[String], allowlist: &[String], recognizers: &[String]) -> Self {
        let lower = |items: &[String]| {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            patterns: lower(patterns),
            allowlist: lower(allowlist),
            recognizers: lower(recognizers),
        }
    }

    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        Self::new(
            &settings.placeholder_patterns,
            &settings.placeholder_allowlist,
            &settings.recognizer_patterns,
        )
    }

    pub fn classify(&self, value: &str) -> Verdict {
        let value = value.trim();
        if value.is_empty() {
            return Verdict::Empty;
        }
        let lower = value.to_lowercase();
        if self.allowlist.iter().any(|a| lower.contains(a.as_str())) {
            return Verdict::Usable;
        }
        match self.patterns.iter().find(|p| lower.contains(p.as_str())) {
            Some(p) => Verdict::Placeholder { pattern: p.clone() },
            None => Verdict::Usable,
        }
    }

    /// `true` when `value` is empty or placeholder artwork.
    ///
    /// Rejections of values that otherwise look like real poster hosting are
    /// reported so that over-broad patterns show up in diagnostics.
    pub fn is_placeholder(&self, value: &str) -> bool {
        match self.classify(value) {
            Verdict::Usable => false,
            Verdict::Empty => true,
            Verdict::Placeholder { pattern } => {
                if self.is_recognized(value) {
                    warn!(
                        target: "extract.cascade",
                        %value,
                        %pattern,
                        "poster-like value rejected as placeholder; check pattern policy"
                    );
                }
                true
            }
        }
    }

    /// `true` when `value` contains a poster-hosting recogniser substring.
    pub fn is_recognized(&self, value: &str) -> bool {
        let lower = value.to_lowercase();
        self.recognizers.iter().any(|r| lower.contains(r.as_str()))
    }
}

/// Make `value` absolute against `origin`.
///
/// Protocol-relative (`//host/x`) gains `https:`; root-relative (`/x`) is
/// prefixed with the origin. Anything else is returned trimmed but unchanged.
pub fn absolutize(value: &str, origin: &str) -> String {
    let value = value.trim();
    if value.starts_with("//") {
        format!("https:{value}")
    } else if value.starts_with('/') {
        format!("{}{value}", origin.trim_end_matches('/'))
    } else {
        value.to_string()
    }
}

/// `true` for `http(s)` URLs with a host.
pub fn is_absolute_http(value: &str) -> bool {
    match Url::parse(value) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.has_host(),
        Err(_) => false,
    }
}

/// Collapse internal whitespace runs and trim the ends.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

// thumbnail dimension -> large rendition dimension
const UPSCALE_RULES: [(&str, &str); 6] = [
    ("230", "2000"),
    ("345", "3000"),
    ("125", "2000"),
    ("187", "3000"),
    ("1000", "2000"),
    ("1500", "3000"),
];

fn dimension_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"-0-(?P<w>\d+)-0-(?P<h>\d+)-").expect("dimension regex compiles")
    })
}

fn upscale_dimension(dim: &str) -> &str {
    UPSCALE_RULES
        .iter()
        .find(|(from, _)| *from == dim)
        .map_or(dim, |&(_, to)| to)
}

/// Rewrite the `-0-W-0-H-` thumbnail dimension token to the large
/// rendition. The rest of the URL, film ids included, is untouched, as are
/// tokens that already name a large rendition.
pub fn upscale(url: &str) -> String {
    dimension_token_re()
        .replace(url, |caps: &Captures<'_>| {
            format!(
                "-0-{}-0-{}-",
                upscale_dimension(&caps["w"]),
                upscale_dimension(&caps["h"])
            )
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PlaceholderPolicy {
        PlaceholderPolicy::from_settings(&ExtractionSettings::default())
    }

    #[test]
    fn empty_and_whitespace_are_placeholders() {
        let p = policy();
        assert_eq!(p.classify(""), Verdict::Empty);
        assert!(p.is_placeholder("   "));
    }

    #[test]
    fn known_patterns_are_rejected_case_insensitively() {
        let p = policy();
        assert!(p.is_placeholder("https://s.ltrbxd.com/static/img/empty-poster-230.png"));
        assert!(p.is_placeholder("/static/Default-Poster.jpg"));
        assert_eq!(
            p.classify("https://x/no-poster.svg"),
            Verdict::Placeholder {
                pattern: "no-poster".into()
            }
        );
    }

    #[test]
    fn allowlist_overrides_patterns() {
        let p = policy();
        let v = "https://a.ltrbxd.com/resized/film-poster/placeholder-fix-0-230-0-345.jpg";
        assert_eq!(p.classify(v), Verdict::Usable);
    }

    #[test]
    fn ordinary_images_are_usable() {
        let p = policy();
        assert!(!p.is_placeholder("https://a.ltrbxd.com/resized/sm/upload/ab/cd/poster.jpg"));
        assert!(!p.is_placeholder("/film/poster.jpg"));
    }

    #[test]
    fn recognizers_match_poster_hosting() {
        let p = policy();
        assert!(p.is_recognized("https://a.ltrbxd.com/resized/x.jpg"));
        assert!(p.is_recognized("https://cdn/x-image-150.jpg"));
        assert!(!p.is_recognized("https://cdn/avatar.png"));
    }

    #[test]
    fn absolutize_rules() {
        let origin = "https://letterboxd.com";
        assert_eq!(
            absolutize("//a.ltrbxd.com/p.jpg", origin),
            "https://a.ltrbxd.com/p.jpg"
        );
        assert_eq!(
            absolutize("/film/poster.jpg", origin),
            "https://letterboxd.com/film/poster.jpg"
        );
        assert_eq!(
            absolutize("/film/poster.jpg", "https://letterboxd.com/"),
            "https://letterboxd.com/film/poster.jpg"
        );
        assert_eq!(
            absolutize(" https://cdn/x.jpg ", origin),
            "https://cdn/x.jpg"
        );
        assert_eq!(absolutize("poster.jpg", origin), "poster.jpg");
    }

    #[test]
    fn absolute_http_check() {
        assert!(is_absolute_http("https://letterboxd.com/film/x/"));
        assert!(!is_absolute_http("poster.jpg"));
        assert!(!is_absolute_http("data:image/png;base64,AAAA"));
        assert!(!is_absolute_http("/film/poster.jpg"));
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  A  young\n\tman  "), "A young man");
        assert_eq!(clean_text("\n \n"), "");
    }

    #[test]
    fn upscale_rewrites_thumbnail_tokens() {
        assert_eq!(
            upscale("https://a.ltrbxd.com/resized/film-poster-0-230-0-345-crop.jpg"),
            "https://a.ltrbxd.com/resized/film-poster-0-2000-0-3000-crop.jpg"
        );
        assert_eq!(
            upscale("https://a.ltrbxd.com/x-0-2000-0-3000-crop.jpg"),
            "https://a.ltrbxd.com/x-0-2000-0-3000-crop.jpg"
        );
        assert_eq!(upscale(""), "");
    }

    #[test]
    fn upscale_leaves_film_ids_alone() {
        assert_eq!(
            upscale("https://a.ltrbxd.com/resized/film-poster/5/1/2/3/0/51230-la-chinoise-0-230-0-345-crop.jpg"),
            "https://a.ltrbxd.com/resized/film-poster/5/1/2/3/0/51230-la-chinoise-0-2000-0-3000-crop.jpg"
        );
        assert_eq!(
            upscale("https://a.ltrbxd.com/resized/sm/upload/12/5/125-poster.jpg"),
            "https://a.ltrbxd.com/resized/sm/upload/12/5/125-poster.jpg"
        );
    }
}
