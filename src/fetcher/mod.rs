//! Page fetch strategies
//!
//! [`HttpFetcher`] handles static pages with a single GET. Pages that build
//! their listings client-side need [`render::RenderFetcher`], which drives a
//! headless Chromium and is compiled in with the `render` feature.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::{Config, FetchStrategy};
use crate::error::FetchError;
use crate::traits::PageFetcher;

#[cfg(feature = "render")]
pub mod render;

/// Plain request/response fetcher.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, &e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(|e| classify(url, &e))
    }
}

fn classify(url: &str, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

impl Clone for HttpFetcher {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

/// Builds the fetcher selected by `FETCH_STRATEGY`.
pub fn build_fetcher(config: &Config) -> Result<Arc<dyn PageFetcher>> {
    match config.fetch_strategy {
        FetchStrategy::Http => Ok(Arc::new(HttpFetcher::new(
            &config.user_agent,
            config.fetch_timeout,
        )?)),
        FetchStrategy::Render => build_render_fetcher(config),
    }
}

#[cfg(feature = "render")]
fn build_render_fetcher(config: &Config) -> Result<Arc<dyn PageFetcher>> {
    let mut fetcher =
        render::RenderFetcher::new(&config.user_agent, config.fetch_timeout, config.settle_delay);
    if let Some(path) = &config.chrome_executable {
        fetcher = fetcher.with_executable(path);
    }
    Ok(Arc::new(fetcher))
}

#[cfg(not(feature = "render"))]
fn build_render_fetcher(_config: &Config) -> Result<Arc<dyn PageFetcher>> {
    Err(crate::error::ConfigError::Env {
        var: "FETCH_STRATEGY".to_string(),
        message: "\"render\" requires building with the `render` feature".to_string(),
    }
    .into())
}
