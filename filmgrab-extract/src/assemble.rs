use crate::normalize::{PlaceholderPolicy, absolutize, is_absolute_http, upscale};
use filmgrab_common::{Candidate, ExtractionResult, FilmgrabError};
use filmgrab_config::ExtractionSettings;
use tracing::{info, warn};

/// Builds the single record an invocation emits.
pub struct ResultAssembler {
    origin: String,
    sentinel: String,
    upscale: bool,
    policy: PlaceholderPolicy,
}

impl ResultAssembler {
    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        Self {
            origin: settings.origin.clone(),
            sentinel: settings.sentinel.clone(),
            upscale: settings.upscale_posters,
            policy: PlaceholderPolicy::from_settings(settings),
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Canonicalise the winning candidate, falling back to the sentinel.
    pub fn resolve_poster(&self, candidate: Option<&Candidate>) -> String {
        let Some(candidate) = candidate else {
            return self.sentinel.clone();
        };

        let mut poster = absolutize(&candidate.value, &self.origin);
        if self.upscale {
            poster = upscale(&poster);
        }

        if self.policy.is_placeholder(&poster) {
            info!(target: "extract.assemble", %poster, "normalized poster is a placeholder");
            return self.sentinel.clone();
        }
        if !is_absolute_http(&poster) {
            warn!(
                target: "extract.assemble",
                %poster,
                source = %candidate.source,
                "poster is not an absolute URL"
            );
            return self.sentinel.clone();
        }
        poster
    }

    /// Record for a run that reached the end of the pipeline.
    pub fn assemble(&self, candidate: Option<Candidate>, overview: String) -> ExtractionResult {
        let poster = self.resolve_poster(candidate.as_ref());
        info!(target: "extract.assemble", %poster, overview_chars = overview.chars().count(), "resolved poster");
        ExtractionResult::success(poster, overview)
    }

    /// Record for a run that failed anywhere upstream.
    pub fn failure(&self, err: &FilmgrabError) -> ExtractionResult {
        ExtractionResult::failure(self.sentinel.clone(), err)
    }
}
