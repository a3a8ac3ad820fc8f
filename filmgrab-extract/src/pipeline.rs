use crate::alternate::{MetadataLookup, TmdbLookup};
use crate::assemble::ResultAssembler;
use crate::cascade::ExtractionCascade;
use crate::overview::OverviewExtractor;
use filmgrab_common::{ExtractionRequest, ExtractionResult, FilmgrabError, Result};
use filmgrab_config::{DEFAULT_SENTINEL, FilmgrabSettings};
use filmgrab_drivers::film_browser::page::RenderedPage;
use filmgrab_drivers::film_browser::session::BrowserSession;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

/// Cascade, overview extractor and assembler for one invocation.
pub struct Extractor {
    cascade: ExtractionCascade,
    overview: OverviewExtractor,
    assembler: ResultAssembler,
}

impl Extractor {
    pub fn new(
        cascade: ExtractionCascade,
        overview: OverviewExtractor,
        assembler: ResultAssembler,
    ) -> Self {
        Self {
            cascade,
            overview,
            assembler,
        }
    }

    /// Stock pipeline; the alternate source is built from settings when enabled.
    pub fn from_settings(settings: &FilmgrabSettings) -> Self {
        let lookup = TmdbLookup::from_settings(&settings.alternate_source)
            .map(|l| Arc::new(l) as Arc<dyn MetadataLookup>);
        Self::with_lookup(settings, lookup)
    }

    pub fn with_lookup(
        settings: &FilmgrabSettings,
        lookup: Option<Arc<dyn MetadataLookup>>,
    ) -> Self {
        Self::new(
            ExtractionCascade::from_settings(settings, lookup),
            OverviewExtractor::new(settings.extraction.overview_probes.clone()),
            ResultAssembler::from_settings(&settings.extraction),
        )
    }

    pub fn cascade(&self) -> &ExtractionCascade {
        &self.cascade
    }

    pub fn assembler(&self) -> &ResultAssembler {
        &self.assembler
    }

    /// Cascade, then overview, then assembly, against an already rendered
    /// page. Fails only when the page stops responding.
    pub async fn run_on_page(&self, page: &dyn RenderedPage) -> Result<ExtractionResult> {
        let candidate = self.cascade.locate_poster(page).await?;
        let overview = self.overview.locate_overview(page).await?;
        Ok(self.assembler.assemble(candidate, overview))
    }

    /// Open a browser session for `request`, run against the live page and
    /// tear the session down on every path.
    pub async fn run(
        &self,
        request: &ExtractionRequest,
        settings: &FilmgrabSettings,
    ) -> Result<ExtractionResult> {
        let started = Instant::now();
        let budget = Duration::from_millis(request.timeout_ms);

        Url::parse(&request.url)
            .map_err(|e| FilmgrabError::Navigation(format!("invalid URL `{}`: {e}", request.url)))?;

        let session = BrowserSession::open(&request.url, settings).await?;
        info!(
            target: "extract.pipeline",
            url = %request.url,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "page ready"
        );

        let poster_selectors: Vec<&str> = settings
            .extraction
            .poster_probes
            .iter()
            .map(|p| p.selector.as_str())
            .collect();

        session
            .scoped(|page| async move {
                let remaining = budget.saturating_sub(started.elapsed());
                let work = async {
                    if let Ok(landed) = page.get_url().await {
                        if landed != request.url {
                            debug!(target: "extract.pipeline", requested = %request.url, %landed, "navigation redirected");
                        }
                    }
                    let wait = settings.timeouts.poster_wait().min(remaining);
                    if !page.wait_for_any(&poster_selectors, wait).await {
                        info!(target: "extract.pipeline", "poster selectors not present after wait; continuing");
                    }
                    self.run_on_page(&page).await
                };
                match timeout(remaining, work).await {
                    Ok(result) => result,
                    Err(_) => Err(FilmgrabError::Timeout(request.timeout_ms)),
                }
            })
            .await
    }
}

/// Run one invocation end to end. Never fails: every error is folded into
/// a failure record.
pub async fn extract(request: &ExtractionRequest, settings: &FilmgrabSettings) -> ExtractionResult {
    // the configured sentinel may be the invalid setting
    if let Err(e) = settings.validate() {
        let err = FilmgrabError::Config(e.to_string());
        warn!(target: "extract.pipeline", error = %err, "invalid settings");
        return ExtractionResult::failure(DEFAULT_SENTINEL, &err);
    }

    let extractor = Extractor::from_settings(settings);

    match extractor.run(request, settings).await {
        Ok(result) => result,
        Err(err) => {
            warn!(target: "extract.pipeline", url = %request.url, error = %err, "extraction failed");
            extractor.assembler().failure(&err)
        }
    }
}
