//! Headless Chromium fetch strategy for client-side rendered pages

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::config::{MAX_RENDER_LOAD, MAX_SETTLE_DELAY};
use crate::error::FetchError;
use crate::traits::PageFetcher;

/// Launches a browser per fetch, waits for the page to settle and returns the
/// rendered DOM.
pub struct RenderFetcher {
    user_agent: String,
    load_timeout: Duration,
    settle_delay: Duration,
    executable: Option<PathBuf>,
}

impl RenderFetcher {
    pub fn new(user_agent: &str, load_timeout: Duration, settle_delay: Duration) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            load_timeout: load_timeout.min(MAX_RENDER_LOAD),
            settle_delay: settle_delay.min(MAX_SETTLE_DELAY),
            executable: None,
        }
    }

    /// Launches this binary instead of searching for Chromium.
    pub fn with_executable(mut self, path: impl AsRef<Path>) -> Self {
        self.executable = Some(path.as_ref().to_path_buf());
        self
    }

    async fn render(&self, browser: &Browser, url: &str) -> Result<String, FetchError> {
        let page = tokio::time::timeout(self.load_timeout, async {
            let page = browser.new_page(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, CdpError>(page)
        })
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_string(),
        })?
        .map_err(|e| render_error(url, &e))?;

        tokio::time::sleep(self.settle_delay).await;

        let html = page.content().await.map_err(|e| render_error(url, &e));

        if let Err(e) = page.close().await {
            debug!("Failed to close page for {}: {}", url, e);
        }

        html
    }
}

#[async_trait]
impl PageFetcher for RenderFetcher {
    fn name(&self) -> &'static str {
        "render"
    }

    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", self.user_agent))
            .request_timeout(self.load_timeout);
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|message| FetchError::Render {
                url: url.to_string(),
                message,
            })?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| render_error(url, &e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self.render(&browser, url).await;

        // Runs on success and failure alike; dropping `Browser` kills the
        // child process if we never get here.
        if let Err(e) = browser.close().await {
            warn!("Failed to close browser after fetching {}: {}", url, e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Browser process did not exit cleanly: {}", e);
        }
        handler_task.abort();

        result
    }
}

fn render_error(url: &str, err: &CdpError) -> FetchError {
    FetchError::Render {
        url: url.to_string(),
        message: err.to_string(),
    }
}
