use crate::app::ports::{PageSourcePort, RenderedPage};
use crate::config::SourceConfig;
use crate::error::{CollaboratorError, ConfigError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Page source for sites that serve their event markup without client-side rendering.
pub struct ReqwestPageSource {
    client: reqwest::Client,
}

impl ReqwestPageSource {
    pub fn new(config: &SourceConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ConfigError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

fn classify(url: &str, e: reqwest::Error) -> CollaboratorError {
    if e.is_timeout() {
        CollaboratorError::Timeout {
            url: url.to_string(),
        }
    } else {
        CollaboratorError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl PageSourcePort for ReqwestPageSource {
    async fn fetch_rendered(&self, url: &str) -> Result<RenderedPage, CollaboratorError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = resp.url().to_string();
        let html = resp.text().await.map_err(|e| classify(url, e))?;
        debug!("Fetched {} ({} bytes)", final_url, html.len());

        Ok(RenderedPage {
            url: final_url,
            html,
        })
    }
}
