use crate::film_browser::{
    launch::build_capabilities,
    page::{FilmPage, PageError},
};
use anyhow::anyhow;
use fantoccini::{wd::TimeoutConfiguration, Client, ClientBuilder};
use filmgrab_common::{FilmgrabError, Result};
use filmgrab_config::FilmgrabSettings;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// One browser engine session, alive for a single invocation.
///
/// Acquire with [`BrowserSession::open`] and run work through
/// [`BrowserSession::scoped`], which closes the session on every exit path.
pub struct BrowserSession {
    client: Client,
    close_grace: Duration,
}

impl BrowserSession {
    /// Start a session against the configured WebDriver endpoint and navigate
    /// to `url`.
    ///
    /// Startup and page load share the navigation budget; exceeding it, or
    /// any failure to connect or load, is a [`FilmgrabError::Navigation`].
    pub async fn open(url: &str, settings: &FilmgrabSettings) -> Result<Self> {
        let budget = settings.timeouts.navigation();
        let started = Instant::now();
        let browser = &settings.browser;

        let mut builder = ClientBuilder::native();
        builder.capabilities(build_capabilities(browser));

        let client = match timeout(budget, builder.connect(&browser.webdriver_url)).await {
            Ok(Ok(client)) => client,
            Ok(Err(e)) => {
                return Err(FilmgrabError::Navigation(format!(
                    "browser engine unavailable at {}: {e}",
                    browser.webdriver_url
                )));
            }
            Err(_) => {
                return Err(FilmgrabError::Navigation(format!(
                    "browser engine did not start within {}ms",
                    budget.as_millis()
                )));
            }
        };
        info!(target: "browser.session", endpoint = %browser.webdriver_url, "browser session started");

        let session = Self {
            client,
            close_grace: settings.timeouts.close(),
        };
        let remaining = budget.saturating_sub(started.elapsed());
        if let Err(e) = session.navigate(url, remaining, settings).await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    /// Resize, set driver timeouts and load `url`, all within `remaining`.
    async fn navigate(
        &self,
        url: &str,
        remaining: Duration,
        settings: &FilmgrabSettings,
    ) -> Result<()> {
        let browser = &settings.browser;
        let load = async {
            if let Err(e) = self
                .client
                .set_window_size(browser.viewport_width, browser.viewport_height)
                .await
            {
                debug!(target: "browser.session", error = %e, "window resize rejected");
            }

            let timeouts = TimeoutConfiguration::new(
                Some(settings.timeouts.navigation()),
                Some(remaining),
                Some(Duration::ZERO),
            );
            if let Err(e) = self.client.update_timeouts(timeouts).await {
                debug!(target: "browser.session", error = %e, "timeout update rejected");
            }

            self.client.goto(url).await
        };

        match timeout(remaining, load).await {
            Ok(Ok(())) => {
                info!(target: "browser.session", %url, "page loaded");
                Ok(())
            }
            Ok(Err(e)) => Err(FilmgrabError::Navigation(format!("{url}: {e}"))),
            Err(_) => Err(FilmgrabError::Navigation(format!(
                "{url}: no response within {}ms",
                settings.timeouts.navigation_ms
            ))),
        }
    }

    /// Handle to the loaded page.
    pub fn page(&self) -> FilmPage {
        FilmPage::new(self.client.clone())
    }

    /// Run `work` against the page, then close the session whether `work`
    /// completed, returned an error, or panicked.
    pub async fn scoped<F, Fut, T>(self, work: F) -> T
    where
        F: FnOnce(FilmPage) -> Fut,
        Fut: Future<Output = T>,
    {
        let outcome = AssertUnwindSafe(work(self.page())).catch_unwind().await;
        self.close().await;
        match outcome {
            Ok(value) => value,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Close the underlying browser session within the close grace period.
    /// Failures and expiry are logged, not raised.
    pub async fn close(self) {
        match timeout(self.close_grace, self.client.close()).await {
            Ok(Ok(())) => debug!(target: "browser.session", "browser session closed"),
            Ok(Err(e)) => warn!(target: "browser.session", error = %e, "browser session close failed"),
            Err(_) => warn!(
                target: "browser.session",
                grace_ms = self.close_grace.as_millis() as u64,
                "browser session close timed out; abandoning it"
            ),
        }
    }
}

impl From<PageError> for FilmgrabError {
    fn from(err: PageError) -> Self {
        FilmgrabError::Pipeline(anyhow!(err))
    }
}
