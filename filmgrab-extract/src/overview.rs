use crate::normalize::clean_text;
use filmgrab_config::TextProbe;
use filmgrab_drivers::film_browser::page::{PageError, RenderedPage};
use tracing::debug;

/// Finds the synopsis text: the first non-empty probe result wins.
pub struct OverviewExtractor {
    probes: Vec<TextProbe>,
}

impl OverviewExtractor {
    pub fn new(probes: Vec<TextProbe>) -> Self {
        Self { probes }
    }

    /// Returns an empty string when nothing matched. Probe failures are
    /// skipped; only a fatal page error is returned.
    pub async fn locate_overview(&self, page: &dyn RenderedPage) -> Result<String, PageError> {
        for probe in &self.probes {
            let found = match &probe.attribute {
                Some(attr) => page.attribute_values(&probe.selector, attr).await,
                None => page.texts(&probe.selector).await,
            };
            let values = match found {
                Ok(v) => v,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!(target: "extract.overview", selector = %probe.selector, error = %e, "probe failed");
                    continue;
                }
            };
            if let Some(text) = values.iter().map(|v| clean_text(v)).find(|t| !t.is_empty()) {
                debug!(
                    target: "extract.overview",
                    selector = %probe.selector,
                    chars = text.chars().count(),
                    "overview found"
                );
                return Ok(text);
            }
        }
        debug!(target: "extract.overview", "no overview found");
        Ok(String::new())
    }
}
