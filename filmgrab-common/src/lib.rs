//! Common types and utilities shared across filmgrab crates.
//!
//! This crate defines the extraction data model, the shared error taxonomy
//! and the observability helpers used throughout the workspace. It is
//! intentionally lightweight so every crate can depend on it without
//! introducing heavy transitive costs.
//!
//! # Overview
//!
//! - [`ExtractionRequest`]: immutable input to one invocation
//! - [`Candidate`] and [`StrategyId`]: ephemeral cascade output
//! - [`ExtractionResult`]: the single record emitted per invocation
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`FilmgrabError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! A failure record always carries the sentinel and an error:
//!
//! ```rust
//! use filmgrab_common::{ExtractionResult, FilmgrabError};
//!
//! let sentinel = "https://watchlistpicker.com/noimagefound.jpg";
//! let rec = ExtractionResult::failure(sentinel, &FilmgrabError::Timeout(20_000));
//! assert!(!rec.success);
//! assert_eq!(rec.poster, sentinel);
//! assert_eq!(rec.overview, "");
//! assert_eq!(rec.error.as_deref(), Some("timed out after 20000ms"));
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod observability;

/// Input to a single extraction run. Created once from caller input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Film detail page to render.
    pub url: String,
    /// Budget for the whole pipeline, navigation included.
    pub timeout_ms: u64,
}

impl ExtractionRequest {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            url: url.into(),
            timeout_ms,
        }
    }
}

/// Identifies which strategy produced a candidate. Diagnostics only; never
/// part of the emitted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    SelectorList,
    BroadScan,
    ScrollRetry,
    MetaImage,
    AlternateSource,
}

impl StrategyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::SelectorList => "selector_list",
            StrategyId::BroadScan => "broad_scan",
            StrategyId::ScrollRetry => "scroll_retry",
            StrategyId::MetaImage => "meta_image",
            StrategyId::AlternateSource => "alternate_source",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A poster reference produced by a strategy, prior to normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub value: String,
    pub source: StrategyId,
}

impl Candidate {
    pub fn new(value: impl Into<String>, source: StrategyId) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }
}

/// The record emitted on the result channel. Exactly one per invocation.
///
/// `poster` is always an absolute URL or the sentinel. A failed run carries
/// an `error` and an empty `overview`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub poster: String,
    pub overview: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl ExtractionResult {
    /// Successful run. An empty overview is still a success.
    pub fn success(poster: impl Into<String>, overview: impl Into<String>) -> Self {
        Self {
            poster: poster.into(),
            overview: overview.into(),
            success: true,
            error: None,
        }
    }

    /// Failed run: sentinel poster, empty overview, error description.
    pub fn failure(sentinel: impl Into<String>, err: &FilmgrabError) -> Self {
        Self {
            poster: sentinel.into(),
            overview: String::new(),
            success: false,
            error: Some(err.to_string()),
        }
    }

    /// Render as the single JSON line written to the result channel.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Record emitted when the invocation itself is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentFailure {
    pub error: String,
}

impl ArgumentFailure {
    pub const URL_REQUIRED: &'static str = "URL argument required";

    pub fn url_required() -> Self {
        Self {
            error: Self::URL_REQUIRED.to_string(),
        }
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Error types used across the filmgrab system.
///
/// Per-probe failures are not represented here; they are swallowed by the
/// extraction cascade and never reach the result record.
#[derive(thiserror::Error, Debug)]
pub enum FilmgrabError {
    /// The browser engine failed to start or the page could not be reached.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Any other unexpected failure while the session was open.
    #[error("pipeline failed: {0}")]
    Pipeline(#[from] anyhow::Error),

    /// The overall invocation budget (in milliseconds) was exhausted.
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// Settings were incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenient alias for results that use [`FilmgrabError`].
pub type Result<T> = std::result::Result<T, FilmgrabError>;
