//! Chromium tab source via chromiumoxide
//!
//! Each sample opens a new tab on the configured [`PageTarget`] and polls
//! `document.readyState` until it reports `"complete"`. Tabs are closed by
//! the cycle runner once the cycle's timing is done.
//!
//! # Example
//!
//! ```no_run
//! use tab_bench::config::SourceConfig;
//! use tab_bench::source::ChromeTabSource;
//! use chromiumoxide::browser::BrowserConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let browser_config = BrowserConfig::builder()
//!     .build()
//!     .map_err(|e| anyhow::anyhow!("{}", e))?;
//! let source = ChromeTabSource::launch(browser_config, &SourceConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info, instrument, trace};

use super::SampleSource;
use crate::config::SourceConfig;
use crate::error::SourceError;

pub use crate::config::PageTarget;

const READY_STATE_SCRIPT: &str = "document.readyState";

/// Opens and closes Chromium tabs through the DevTools protocol
pub struct ChromeTabSource {
    browser: Browser,
    url: String,
    ready_timeout: Duration,
    poll_interval: Duration,
    _handle: tokio::task::JoinHandle<()>,
}

impl ChromeTabSource {
    /// Launch a browser and build a source for `config`
    pub async fn launch(browser_config: BrowserConfig, config: &SourceConfig) -> anyhow::Result<Self> {
        info!("Launching browser for tab benchmarking");
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        // The handler must be polled for the browser connection to make progress
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        info!("Browser launched, target {}", config.target);
        Ok(Self {
            browser,
            url: config.target.to_url(),
            ready_timeout: config.ready_timeout,
            poll_interval: config.poll_interval,
            _handle: handle,
        })
    }

    async fn poll_ready_state(&self, page: &Page) {
        loop {
            match page.evaluate(READY_STATE_SCRIPT).await {
                Ok(result) => match result.into_value::<String>() {
                    Ok(state) if state == "complete" => return,
                    Ok(state) => trace!("readyState = {}", state),
                    Err(e) => trace!("Unreadable readyState: {}", e),
                },
                // The execution context is replaced while the tab navigates
                Err(e) => trace!("readyState probe failed: {}", e),
            }

            if self.poll_interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }
}

#[async_trait]
impl SampleSource for ChromeTabSource {
    type Handle = Page;

    async fn acquire(&mut self) -> Result<Page, SourceError> {
        self.browser
            .new_page(self.url.as_str())
            .await
            .map_err(|e| SourceError::Acquisition(e.to_string()))
    }

    #[instrument(skip(self, page))]
    async fn wait_until_ready(&mut self, page: &Page) -> Result<(), SourceError> {
        tokio::time::timeout(self.ready_timeout, self.poll_ready_state(page))
            .await
            .map_err(|_| SourceError::Timeout(self.ready_timeout))
    }

    async fn release(&mut self, page: &Page) -> Result<(), SourceError> {
        debug!("Closing tab");
        page.clone()
            .close()
            .await
            .map_err(|e| SourceError::Release(e.to_string()))
    }
}
