use crate::app::ports::{DescriptionGeneratorPort, DescriptionRequest};
use crate::config::DescriptionConfig;
use crate::error::{CollaboratorError, ConfigError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Client for an OpenAI-compatible `/chat/completions` endpoint (Groq by default).
///
/// The key is handed in through [`DescriptionConfig`]; nothing here reads the environment.
pub struct ChatCompletionsDescriber {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Prompt asking for a short, plain description that adds nothing beyond the given fields.
pub fn build_prompt(request: &DescriptionRequest) -> String {
    let prices = if request.prices.is_empty() {
        crate::constants::UNKNOWN.to_string()
    } else {
        request.prices.join(", ")
    };
    format!(
        "Act like an expert copywriter who creates precise and non-rhetorical descriptions, \
         using natural language. Do not add any information that is not already present. \
         Take inspiration from the description of Virgilio.it to write a short description of the event:\n\n\
         Titolo: {}\n\
         Data: {}\n\
         Luogo: {}\n\
         Prezzo: {}\n\
         Descrizione di Virgilio.it: {}\n\n\
         Crea una descrizione che catturi l'atmosfera dell'evento, ma senza essere retorica.",
        request.title, request.date, request.location, prices, request.description_source
    )
}

fn first_choice(body: &str) -> Result<String, CollaboratorError> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| CollaboratorError::Generation(format!("unexpected response: {e}")))?;
    completion
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| CollaboratorError::Generation("response contained no text".to_string()))
}

impl ChatCompletionsDescriber {
    pub fn new(config: &DescriptionConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::MissingApiKey {
                env_var: config.api_key_env.clone(),
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ConfigError::Http(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl DescriptionGeneratorPort for ChatCompletionsDescriber {
    async fn generate(&self, request: &DescriptionRequest) -> Result<String, CollaboratorError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [ChatMessage { role: "user".to_string(), content: build_prompt(request) }],
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::Generation(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| CollaboratorError::Generation(e.to_string()))?;
        if !status.is_success() {
            return Err(CollaboratorError::Generation(format!(
                "endpoint returned status {}",
                status.as_u16()
            )));
        }

        debug!("Generated description for {}", request.title);
        first_choice(&text)
    }
}
