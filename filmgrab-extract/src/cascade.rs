//! Ordered poster-locating strategies.
//!
//! Strategies run strictly in order against the rendered page; the first one
//! to produce a non-placeholder candidate wins. A failed probe only means "no
//! candidate here": the cascade moves on. Only a [`PageError::Unresponsive`]
//! aborts it.

use crate::alternate::{AlternateSourceStrategy, MetadataLookup};
use crate::normalize::PlaceholderPolicy;
use async_trait::async_trait;
use filmgrab_common::{Candidate, StrategyId};
use filmgrab_config::{AttrProbe, FilmgrabSettings};
use filmgrab_drivers::film_browser::page::{PageError, RenderedPage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One way of finding a poster reference on the page.
///
/// Implementations return `Ok(None)` when they find nothing usable and only
/// return `Err` for fatal page errors.
#[async_trait]
pub trait PosterStrategy: Send + Sync {
    fn id(&self) -> StrategyId;

    async fn locate(&self, page: &dyn RenderedPage) -> Result<Option<Candidate>, PageError>;
}

/// Turn a non-fatal probe failure into the empty value.
pub(crate) fn absorb<T: Default>(
    result: Result<T, PageError>,
    strategy: StrategyId,
) -> Result<T, PageError> {
    match result {
        Ok(v) => Ok(v),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            debug!(target: "extract.cascade", %strategy, error = %e, "probe failed; continuing");
            Ok(T::default())
        }
    }
}

/// Walk `probes` in order and return the first usable attribute value.
async fn first_usable(
    page: &dyn RenderedPage,
    probes: &[AttrProbe],
    policy: &PlaceholderPolicy,
    strategy: StrategyId,
) -> Result<Option<Candidate>, PageError> {
    for probe in probes {
        let values = absorb(
            page.attribute_values(&probe.selector, &probe.attribute).await,
            strategy,
        )?;
        let hit = values.iter().find(|v| !policy.is_placeholder(v));
        match hit {
            Some(value) => {
                debug!(
                    target: "extract.cascade",
                    %strategy,
                    selector = %probe.selector,
                    attribute = %probe.attribute,
                    %value,
                    "selector matched"
                );
                return Ok(Some(Candidate::new(value.trim(), strategy)));
            }
            None if !values.is_empty() => {
                debug!(
                    target: "extract.cascade",
                    %strategy,
                    selector = %probe.selector,
                    matches = values.len(),
                    "only placeholder values"
                );
            }
            None => {}
        }
    }
    Ok(None)
}

/// Fixed list of poster selectors, each read through its own attribute.
pub struct SelectorListStrategy {
    probes: Vec<AttrProbe>,
    policy: Arc<PlaceholderPolicy>,
}

impl SelectorListStrategy {
    pub fn new(probes: Vec<AttrProbe>, policy: Arc<PlaceholderPolicy>) -> Self {
        Self { probes, policy }
    }
}

#[async_trait]
impl PosterStrategy for SelectorListStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::SelectorList
    }

    async fn locate(&self, page: &dyn RenderedPage) -> Result<Option<Candidate>, PageError> {
        first_usable(page, &self.probes, &self.policy, self.id()).await
    }
}

/// Every `<img>` on the page, filtered by the poster-hosting recognisers.
pub struct BroadScanStrategy {
    policy: Arc<PlaceholderPolicy>,
}

impl BroadScanStrategy {
    pub fn new(policy: Arc<PlaceholderPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl PosterStrategy for BroadScanStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::BroadScan
    }

    async fn locate(&self, page: &dyn RenderedPage) -> Result<Option<Candidate>, PageError> {
        let sources = absorb(page.attribute_values("img", "src").await, self.id())?;
        debug!(target: "extract.cascade", strategy = %self.id(), images = sources.len(), "scanning images");
        Ok(sources
            .iter()
            .find(|src| self.policy.is_recognized(src) && !self.policy.is_placeholder(src))
            .map(|src| Candidate::new(src.trim(), self.id())))
    }
}

/// Scroll to trigger lazy loading, let the page settle, then re-run the
/// selector list once.
pub struct ScrollRetryStrategy {
    probes: Vec<AttrProbe>,
    policy: Arc<PlaceholderPolicy>,
    fraction: f64,
    settle: Duration,
}

impl ScrollRetryStrategy {
    pub fn new(
        probes: Vec<AttrProbe>,
        policy: Arc<PlaceholderPolicy>,
        fraction: f64,
        settle: Duration,
    ) -> Self {
        Self {
            probes,
            policy,
            fraction,
            settle,
        }
    }
}

#[async_trait]
impl PosterStrategy for ScrollRetryStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::ScrollRetry
    }

    async fn locate(&self, page: &dyn RenderedPage) -> Result<Option<Candidate>, PageError> {
        absorb(page.scroll_to_fraction(self.fraction).await, self.id())?;
        tokio::time::sleep(self.settle).await;
        first_usable(page, &self.probes, &self.policy, self.id()).await
    }
}

/// `og:image` meta tag.
pub struct MetaImageStrategy {
    policy: Arc<PlaceholderPolicy>,
}

impl MetaImageStrategy {
    pub const PROBE_SELECTOR: &'static str = "meta[property='og:image']";

    pub fn new(policy: Arc<PlaceholderPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl PosterStrategy for MetaImageStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::MetaImage
    }

    async fn locate(&self, page: &dyn RenderedPage) -> Result<Option<Candidate>, PageError> {
        let probe = [AttrProbe::new(Self::PROBE_SELECTOR, "content")];
        first_usable(page, &probe, &self.policy, self.id()).await
    }
}

/// The ordered strategy list.
pub struct ExtractionCascade {
    strategies: Vec<Box<dyn PosterStrategy>>,
    policy: Arc<PlaceholderPolicy>,
}

impl ExtractionCascade {
    pub fn new(strategies: Vec<Box<dyn PosterStrategy>>, policy: Arc<PlaceholderPolicy>) -> Self {
        Self { strategies, policy }
    }

    /// Build the stock cascade. `lookup` is only wired in when the alternate
    /// source is enabled in `settings`.
    pub fn from_settings(
        settings: &FilmgrabSettings,
        lookup: Option<Arc<dyn MetadataLookup>>,
    ) -> Self {
        let x = &settings.extraction;
        let policy = Arc::new(PlaceholderPolicy::from_settings(x));

        let mut strategies: Vec<Box<dyn PosterStrategy>> = vec![
            Box::new(SelectorListStrategy::new(
                x.poster_probes.clone(),
                policy.clone(),
            )),
            Box::new(BroadScanStrategy::new(policy.clone())),
            Box::new(ScrollRetryStrategy::new(
                x.poster_probes.clone(),
                policy.clone(),
                x.scroll_fraction,
                settings.timeouts.settle(),
            )),
        ];
        if x.meta_image_fallback {
            strategies.push(Box::new(MetaImageStrategy::new(policy.clone())));
        }
        if settings.alternate_source.enabled {
            if let Some(lookup) = lookup {
                strategies.push(Box::new(AlternateSourceStrategy::new(
                    lookup,
                    policy.clone(),
                )));
            }
        }

        Self::new(strategies, policy)
    }

    pub fn strategy_ids(&self) -> Vec<StrategyId> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    /// Run strategies in order until one yields a usable candidate.
    pub async fn locate_poster(
        &self,
        page: &dyn RenderedPage,
    ) -> Result<Option<Candidate>, PageError> {
        for strategy in &self.strategies {
            debug!(target: "extract.cascade", strategy = %strategy.id(), "trying strategy");
            match strategy.locate(page).await? {
                Some(c) if !self.policy.is_placeholder(&c.value) => {
                    info!(
                        target: "extract.cascade",
                        strategy = %c.source,
                        value = %c.value,
                        "poster candidate accepted"
                    );
                    return Ok(Some(c));
                }
                Some(c) => {
                    debug!(target: "extract.cascade", strategy = %c.source, value = %c.value, "placeholder candidate dropped");
                }
                None => {}
            }
        }
        info!(target: "extract.cascade", "no poster candidate found");
        Ok(None)
    }
}
