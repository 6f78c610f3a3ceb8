use crate::config::Config;
use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use std::time::Duration;

/// Anything that can hand back the HTML of a page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetches pages over HTTP with the configured user agent and session cookie.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&format!("remember-www={}", cookie))?,
            );
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_request))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        tracing::debug!("GET {}", url);
        let navigation = |source| ScrapeError::Navigation {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(navigation)?;
        if !response.status().is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        response.text().await.map_err(navigation)
    }
}
