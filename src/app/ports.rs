use crate::error::CollaboratorError;
use async_trait::async_trait;
use serde::Serialize;

/// Markup of a page after rendering, as produced by a page source.
#[derive(Clone, Debug)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
}

#[async_trait]
pub trait PageSourcePort: Send + Sync {
    async fn fetch_rendered(&self, url: &str) -> Result<RenderedPage, CollaboratorError>;
}

/// Fields handed to the description generator. Everything here is already assembled.
#[derive(Clone, Debug, Serialize)]
pub struct DescriptionRequest {
    pub title: String,
    pub date: String,
    pub location: String,
    pub prices: Vec<String>,
    pub description_source: String,
}

#[async_trait]
pub trait DescriptionGeneratorPort: Send + Sync {
    async fn generate(&self, request: &DescriptionRequest) -> Result<String, CollaboratorError>;
}
