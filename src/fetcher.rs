use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::config::FetchConfig;
use crate::error::Result;

/// Sequential HTTP client that keeps at least `delay` between two requests.
pub struct PageFetcher {
    client: reqwest::Client,
    delay: Duration,
    last_request: Option<Instant>,
}

impl PageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
        );

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            delay: config.delay,
            last_request: None,
        })
    }

    /// GETs `url` and returns the body; non-2xx statuses are errors.
    pub async fn fetch(&mut self, url: &Url) -> Result<String> {
        self.wait_turn().await;

        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await;
        self.last_request = Some(Instant::now());

        let body = response?.error_for_status()?.text().await?;
        debug!("Fetched {} bytes from {}", body.len(), url);

        Ok(body)
    }

    async fn wait_turn(&self) {
        if let Some(last) = self.last_request {
            let next = last + self.delay;
            if next > Instant::now() {
                tokio::time::sleep_until(next).await;
            }
        }
    }
}
