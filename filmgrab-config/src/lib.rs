//! Typed runtime settings for filmgrab with YAML + environment overlays.
//!
//! Every field has a built-in default, so an invocation with no sources at
//! all runs with the stock policy. Sources are layered in the order they are
//! added; `FILMGRAB__`-prefixed environment variables (double underscore as
//! the nesting separator, e.g. `FILMGRAB__BROWSER__WEBDRIVER_URL`) are always
//! consulted. String values may reference `${VAR}` and are expanded before
//! the typed structs are materialised.
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use url::Url;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_ORIGIN: &str = "https://letterboxd.com";
pub const DEFAULT_SENTINEL: &str = "https://watchlistpicker.com/noimagefound.jpg";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Load(#[from] ConfigError),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilmgrabSettings {
    pub browser: BrowserSettings,
    pub timeouts: TimeoutSettings,
    pub extraction: ExtractionSettings,
    pub alternate_source: AlternateSourceSettings,
}

/// How the browser engine is reached and configured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserSettings {
    /// WebDriver endpoint (Chromedriver by default).
    pub webdriver_url: String,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
    /// Treat certificate errors as non-fatal.
    pub accept_insecure_certs: bool,
    /// Launch with web security disabled so CSP does not block page scripts.
    pub bypass_csp: bool,
    /// Skip image decoding; `src` attributes are still present in the DOM.
    pub disable_images: bool,
    /// Extra launch arguments appended after the built-in ones.
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_insecure_certs: true,
            bypass_csp: true,
            disable_images: false,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Budget for a whole invocation.
    pub overall_ms: u64,
    /// Budget for browser start plus page load.
    pub navigation_ms: u64,
    /// How long to wait for a poster element to appear after load.
    pub poster_wait_ms: u64,
    /// Pause after scrolling so lazy loaders can swap in real sources.
    pub settle_ms: u64,
    /// Grace period for ending the browser session.
    pub close_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            overall_ms: 20_000,
            navigation_ms: 10_000,
            poster_wait_ms: 10_000,
            settle_ms: 1_000,
            close_ms: 2_000,
        }
    }
}

impl TimeoutSettings {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn poster_wait(&self) -> Duration {
        Duration::from_millis(self.poster_wait_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn close(&self) -> Duration {
        Duration::from_millis(self.close_ms)
    }
}

/// One DOM probe: a CSS selector and the attribute to read from each match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttrProbe {
    pub selector: String,
    pub attribute: String,
}

impl AttrProbe {
    pub fn new(selector: &str, attribute: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

/// Overview probe: text content, or an attribute when `attribute` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextProbe {
    pub selector: String,
    #[serde(default)]
    pub attribute: Option<String>,
}

impl TextProbe {
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: None,
        }
    }

    pub fn attribute(selector: &str, attribute: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: Some(attribute.to_string()),
        }
    }
}

/// Extraction policy: selectors, placeholder rules, URL canonicalisation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Origin prepended to root-relative poster paths.
    pub origin: String,
    /// Poster reported when nothing usable was found.
    pub sentinel: String,
    pub poster_probes: Vec<AttrProbe>,
    pub overview_probes: Vec<TextProbe>,
    /// Case-insensitive substrings marking placeholder artwork.
    pub placeholder_patterns: Vec<String>,
    /// Substrings that exempt a value from placeholder rejection.
    pub placeholder_allowlist: Vec<String>,
    /// Substrings identifying poster hosting, used by the broad scan.
    pub recognizer_patterns: Vec<String>,
    /// Fraction of document height to scroll to before the retry pass.
    pub scroll_fraction: f64,
    /// Read `og:image` when the DOM strategies come up empty.
    pub meta_image_fallback: bool,
    /// Rewrite thumbnail dimensions to the large rendition.
    pub upscale_posters: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            sentinel: DEFAULT_SENTINEL.to_string(),
            poster_probes: vec![
                AttrProbe::new(
                    r#"section.poster-list a[data-js-trigger="postermodal"]"#,
                    "href",
                ),
                AttrProbe::new(".film-poster img", "src"),
                AttrProbe::new(".poster img", "src"),
                AttrProbe::new(r#"img[src*="image-150"]"#, "src"),
                AttrProbe::new(r#"img[src*="image-230"]"#, "src"),
            ],
            overview_probes: vec![
                TextProbe::text(".film-text p"),
                TextProbe::text(".review .body-text p"),
                TextProbe::text(".film-overview p"),
                TextProbe::text(".film-overview"),
                TextProbe::text("[data-testid='film-overview']"),
                TextProbe::attribute("meta[name='description']", "content"),
            ],
            placeholder_patterns: strings(&[
                "empty-poster",
                "placeholder",
                "default-poster",
                "no-poster",
                "blank-poster",
            ]),
            placeholder_allowlist: strings(&["a.ltrbxd.com/resized"]),
            recognizer_patterns: strings(&[
                "ltrbxd.com/resized",
                "image-150",
                "image-230",
                "film-poster",
            ]),
            scroll_fraction: 0.5,
            meta_image_fallback: true,
            upscale_posters: false,
        }
    }
}

/// Third-party metadata lookup used as the last resort. Off by default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlternateSourceSettings {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub endpoint: String,
    pub image_base: String,
    pub timeout_ms: u64,
}

impl Default for AlternateSourceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            endpoint: "https://api.themoviedb.org/3".to_string(),
            image_base: "https://image.tmdb.org/t/p/w500".to_string(),
            timeout_ms: 3_000,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl FilmgrabSettings {
    /// Reject settings the pipeline cannot honour.
    ///
    /// ```
    /// use filmgrab_config::FilmgrabSettings;
    ///
    /// let mut settings = FilmgrabSettings::default();
    /// assert!(settings.validate().is_ok());
    ///
    /// settings.timeouts.navigation_ms = settings.timeouts.overall_ms + 1;
    /// assert!(settings.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), SettingsError> {
        let t = &self.timeouts;
        if t.overall_ms == 0 {
            return Err(invalid("timeouts.overall_ms", "must be non-zero"));
        }
        if t.navigation_ms == 0 {
            return Err(invalid("timeouts.navigation_ms", "must be non-zero"));
        }
        if t.navigation_ms > t.overall_ms {
            return Err(invalid(
                "timeouts.navigation_ms",
                format!("{} exceeds overall budget {}", t.navigation_ms, t.overall_ms),
            ));
        }
        if t.close_ms == 0 {
            return Err(invalid("timeouts.close_ms", "must be non-zero"));
        }

        let x = &self.extraction;
        absolute_url("extraction.origin", &x.origin)?;
        absolute_url("extraction.sentinel", &x.sentinel)?;
        if !(0.0..=1.0).contains(&x.scroll_fraction) {
            return Err(invalid(
                "extraction.scroll_fraction",
                format!("{} is outside 0..=1", x.scroll_fraction),
            ));
        }
        if x.poster_probes.is_empty() {
            return Err(invalid("extraction.poster_probes", "must not be empty"));
        }

        let b = &self.browser;
        if b.viewport_width == 0 || b.viewport_height == 0 {
            return Err(invalid("browser.viewport", "dimensions must be non-zero"));
        }

        let has_key = self
            .alternate_source
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if self.alternate_source.enabled && !has_key {
            return Err(invalid(
                "alternate_source.api_key",
                "required when the alternate source is enabled",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn absolute_url(field: &'static str, raw: &str) -> Result<(), SettingsError> {
    match Url::parse(raw) {
        Ok(u) if u.has_host() => Ok(()),
        Ok(_) => Err(invalid(field, format!("`{raw}` has no host"))),
        Err(e) => Err(invalid(field, format!("`{raw}`: {e}"))),
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct SettingsLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    /// Start from the built-in defaults with `FILMGRAB__` env overrides.
    ///
    /// ```
    /// use filmgrab_config::{SettingsLoader, DEFAULT_SENTINEL};
    ///
    /// let settings = SettingsLoader::new()
    ///     .with_yaml_str("timeouts:\n  overall_ms: 15000")
    ///     .load()
    ///     .expect("valid settings");
    ///
    /// assert_eq!(settings.timeouts.overall_ms, 15_000);
    /// assert_eq!(settings.timeouts.navigation_ms, 10_000);
    /// assert_eq!(settings.extraction.sentinel, DEFAULT_SENTINEL);
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder();
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Allow tests and library callers to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// Environment overrides are applied last so they win over files, then
    /// `${VAR}` placeholders are expanded.
    ///
    /// ```
    /// use filmgrab_config::SettingsLoader;
    ///
    /// unsafe { std::env::set_var("TMDB_TOKEN_DOC", "from-env"); }
    ///
    /// let settings = SettingsLoader::new()
    ///     .with_yaml_str(r#"
    /// alternate_source:
    ///   enabled: true
    ///   api_key: "${TMDB_TOKEN_DOC}"
    /// "#)
    ///     .load()
    ///     .expect("valid settings");
    ///
    /// assert!(settings.alternate_source.enabled);
    /// assert_eq!(settings.alternate_source.api_key.as_deref(), Some("from-env"));
    ///
    /// unsafe { std::env::remove_var("TMDB_TOKEN_DOC"); }
    /// ```
    pub fn load(self) -> Result<FilmgrabSettings, SettingsError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("FILMGRAB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: FilmgrabSettings =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("HOST", Some("cdn.example")), ("SIZE", Some("230"))], || {
            let mut v = json!([
                "https://$HOST/x",
                { "pattern": "image-${SIZE}" },
                42,
                true,
                null
            ]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!(["https://cdn.example/x", { "pattern": "image-230" }, 42, true, null])
            );
        });
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST_FILMGRAB}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST_FILMGRAB}"));
    }

    #[test]
    fn defaults_match_stock_policy() {
        let s = FilmgrabSettings::default();
        assert_eq!(s.browser.viewport_width, 1920);
        assert_eq!(s.browser.viewport_height, 1080);
        assert!(s.browser.accept_insecure_certs);
        assert_eq!(s.extraction.poster_probes.len(), 5);
        assert_eq!(s.extraction.poster_probes[0].attribute, "href");
        assert!(s
            .extraction
            .poster_probes
            .iter()
            .skip(1)
            .all(|p| p.attribute == "src"));
        assert!(s.timeouts.navigation_ms < s.timeouts.overall_ms);
        assert!(!s.alternate_source.enabled);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn relative_sentinel_is_rejected() {
        let mut s = FilmgrabSettings::default();
        s.extraction.sentinel = "/noimagefound.jpg".into();
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("extraction.sentinel"));
    }

    #[test]
    fn enabled_alternate_source_needs_key() {
        let mut s = FilmgrabSettings::default();
        s.alternate_source.enabled = true;
        assert!(s.validate().is_err());
        s.alternate_source.api_key = Some("k".into());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn blank_alternate_source_key_is_rejected() {
        let mut s = FilmgrabSettings::default();
        s.alternate_source.enabled = true;
        s.alternate_source.api_key = Some("   ".into());
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("alternate_source.api_key"));
    }

    #[test]
    fn zero_close_grace_is_rejected() {
        let mut s = FilmgrabSettings::default();
        s.timeouts.close_ms = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn scroll_fraction_out_of_range() {
        let mut s = FilmgrabSettings::default();
        s.extraction.scroll_fraction = 1.5;
        assert!(s.validate().is_err());
    }
}
