//! OpenAI-compatible chat-completion generation provider

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::generation::GenerationProvider;
use crate::domain::DomainError;
use crate::infrastructure::http_client::HttpClientTrait;

/// Generation provider speaking the OpenAI-compatible
/// `/v1/chat/completions` API
#[derive(Debug)]
pub struct OpenAiCompatGenerationProvider<C: HttpClientTrait> {
    client: C,
    base_url: String,
    model: String,
    auth_header: Option<String>,
    temperature: f32,
}

impl<C: HttpClientTrait> OpenAiCompatGenerationProvider<C> {
    pub fn new(
        client: C,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            auth_header: api_key.map(|key| format!("Bearer {}", key)),
            temperature: 0.2,
        }
    }

    /// Override the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        let mut headers = vec![("Content-Type", "application/json")];

        if let Some(ref auth) = self.auth_header {
            headers.push(("Authorization", auth.as_str()));
        }

        headers
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<String, DomainError> {
        let response: ChatResponse = serde_json::from_value(json)
            .map_err(|e| DomainError::generation(format!("failed to parse response: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| DomainError::generation("response contained no choices"))
    }
}

#[async_trait]
impl<C: HttpClientTrait> GenerationProvider for OpenAiCompatGenerationProvider<C> {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, DomainError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post_json(&self.chat_url(), self.headers(), &body)
            .await
            .map_err(|e| match e {
                DomainError::Timeout { .. } => e,
                other => DomainError::generation(other.to_string()),
            })?;

        self.parse_response(response)
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}
