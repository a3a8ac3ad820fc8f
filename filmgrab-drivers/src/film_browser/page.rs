use async_trait::async_trait;
use fantoccini::{
    elements::Element,
    error::{CmdError, ErrorStatus},
    Client, Locator,
};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Failure of a single DOM query.
///
/// `Probe` is local to the query and is swallowed by strategies.
/// `Unresponsive` means the page itself is gone and must abort the run.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("probe `{selector}` failed: {reason}")]
    Probe { selector: String, reason: String },

    #[error("page unresponsive: {0}")]
    Unresponsive(String),
}

impl PageError {
    pub fn probe(selector: &str, reason: impl ToString) -> Self {
        PageError::Probe {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PageError::Unresponsive(_))
    }
}

/// Classify a WebDriver error raised while querying `selector`.
pub fn classify(selector: &str, err: CmdError) -> PageError {
    match &err {
        CmdError::Lost(_) => PageError::Unresponsive(err.to_string()),
        CmdError::Standard(wd)
            if matches!(
                wd.error,
                ErrorStatus::InvalidSessionId | ErrorStatus::NoSuchWindow
            ) =>
        {
            PageError::Unresponsive(err.to_string())
        }
        _ => PageError::probe(selector, err),
    }
}

/// Query surface of a rendered page, as seen by extraction strategies.
///
/// Elements whose attribute is absent are skipped rather than reported, so
/// the returned lists only hold values that were actually present.
#[async_trait]
pub trait RenderedPage: Send + Sync {
    /// Values of `attribute` on every element matching `selector`, in
    /// document order.
    async fn attribute_values(
        &self,
        selector: &str,
        attribute: &str,
    ) -> Result<Vec<String>, PageError>;

    /// Visible text of every element matching `selector`, in document order.
    async fn texts(&self, selector: &str) -> Result<Vec<String>, PageError>;

    /// Scroll to `fraction` of the document height.
    async fn scroll_to_fraction(&self, fraction: f64) -> Result<(), PageError>;

    /// The document title.
    async fn title(&self) -> Result<String, PageError>;
}

/// Page wrapper over the live WebDriver session.
#[derive(Clone)]
pub struct FilmPage {
    pub(crate) client: Client,
}

impl FilmPage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Return the current page URL.
    pub async fn get_url(&self) -> Result<String, PageError> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(|e| classify("url", e))
    }

    /// Wait up to `timeout` for any of `selectors` to appear.
    ///
    /// Returns whether one did; expiry is not an error.
    pub async fn wait_for_any(&self, selectors: &[&str], timeout: Duration) -> bool {
        if selectors.is_empty() || timeout.is_zero() {
            return false;
        }
        let combined = selectors.join(", ");
        match self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(&combined))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!(
                    target: "browser.page",
                    selector = %combined,
                    error = %e,
                    "poster readiness wait expired"
                );
                false
            }
        }
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<Element>, PageError> {
        self.client
            .find_all(Locator::Css(selector))
            .await
            .map_err(|e| classify(selector, e))
    }
}

#[async_trait]
impl RenderedPage for FilmPage {
    async fn attribute_values(
        &self,
        selector: &str,
        attribute: &str,
    ) -> Result<Vec<String>, PageError> {
        let elements = self.find_elements(selector).await?;
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            match element.attr(attribute).await {
                Ok(Some(v)) => values.push(v),
                Ok(None) => {}
                Err(e) => {
                    let err = classify(selector, e);
                    if err.is_fatal() {
                        return Err(err);
                    }
                    // stale elements are common on pages that swap lazy images
                    debug!(target: "browser.page", %selector, %attribute, error = %err, "attribute read skipped");
                }
            }
        }
        Ok(values)
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, PageError> {
        let elements = self.find_elements(selector).await?;
        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            match element.text().await {
                Ok(t) => texts.push(t),
                Err(e) => {
                    let err = classify(selector, e);
                    if err.is_fatal() {
                        return Err(err);
                    }
                    debug!(target: "browser.page", %selector, error = %err, "text read skipped");
                }
            }
        }
        Ok(texts)
    }

    async fn scroll_to_fraction(&self, fraction: f64) -> Result<(), PageError> {
        let script = r#"
            const f = arguments[0];
            const h = Math.max(document.body ? document.body.scrollHeight : 0,
                               document.documentElement.scrollHeight);
            window.scrollTo(0, Math.floor(h * f));
        "#;
        self.client
            .execute(script, vec![json!(fraction)])
            .await
            .map(|_| ())
            .map_err(|e| {
                let err = classify("scroll", e);
                if !err.is_fatal() {
                    warn!(target: "browser.page", error = %err, "scroll failed");
                }
                err
            })
    }

    async fn title(&self) -> Result<String, PageError> {
        self.client.title().await.map_err(|e| classify("title", e))
    }
}
