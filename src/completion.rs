//! Text-completion client used to translate prompts into statements.

use crate::config::CompletionConfig;
use crate::constants::COMPLETION_STOP_SEQUENCES;
use crate::error::ServerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A model that continues a prompt with raw completion text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete `prompt`, returning the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String, ServerError>;

    /// Model identifier, for logs and health output.
    fn model(&self) -> &str;
}

/// Request body for the `/completions` endpoint.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stop: [&'static str; 2],
    temperature: f32,
    max_tokens: u32,
}

/// Response body of the `/completions` endpoint; only the fields read here.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

/// OpenAI-compatible completion client.
pub struct OpenAiCompletionClient {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompletionClient {
    /// Build a client from configuration.
    pub fn new(config: &CompletionConfig) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServerError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            prompt,
            stop: COMPLETION_STOP_SEQUENCES,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Extract the first choice's text.
fn first_choice(response: CompletionResponse) -> Result<String, ServerError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.text)
        .ok_or_else(|| ServerError::completion("Completion response has no choices"))
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, ServerError> {
        debug!("Requesting completion from model {}", self.model);

        let response: CompletionResponse = self
            .client
            .post(format!("{}/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        first_choice(response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
    use std::time::Duration;

    fn test_config() -> CompletionConfig {
        CompletionConfig {
            api_key: "sk-test".to_string(),
            base_url: "https://api.openai.com/v1/".to_string(),
            model: "gpt-3.5-turbo-instruct".to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_client_new() {
        let client = OpenAiCompletionClient::new(&test_config()).unwrap();
        assert_eq!(client.base_url, "https://api.openai.com/v1");
        assert_eq!(client.model(), "gpt-3.5-turbo-instruct");
    }

    #[test]
    fn test_request_body() {
        let client = OpenAiCompletionClient::new(&test_config()).unwrap();
        let body = serde_json::to_value(client.request_body("### prompt")).unwrap();

        assert_eq!(body["model"], "gpt-3.5-turbo-instruct");
        assert_eq!(body["prompt"], "### prompt");
        assert_eq!(body["stop"], serde_json::json!(["#", ";"]));
        assert_eq!(body["max_tokens"], 3000);
        let temperature = body["temperature"].as_f64().unwrap();
        assert!((temperature - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_first_choice_verbatim() {
        let response: CompletionResponse = serde_json::from_value(serde_json::json!({
            "id": "cmpl-1",
            "choices": [
                {"text": " SELECT COUNT(*) AS n FROM products", "index": 0},
                {"text": "ignored", "index": 1}
            ]
        }))
        .unwrap();

        assert_eq!(
            first_choice(response).unwrap(),
            " SELECT COUNT(*) AS n FROM products"
        );
    }

    #[test]
    fn test_empty_choices_is_error() {
        let response: CompletionResponse =
            serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        assert!(matches!(
            first_choice(response),
            Err(ServerError::Completion(_))
        ));

        let response: CompletionResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(first_choice(response).is_err());
    }
}
