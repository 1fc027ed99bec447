/*!
 * OpenAI-compatible chat completions client.
 *
 * Also serves LM Studio, whose local server speaks the same protocol and
 * does not need a key.
 */

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_client, error_from_response, ApiKeys, Completion, CompletionRequest, Provider};
use crate::errors::ProviderError;

/// Client for `/chat/completions` endpoints
#[derive(Debug)]
pub struct OpenAI {
    /// Name reported in logs ("openai" or "lmstudio")
    name: &'static str,
    /// API base URL, e.g. https://api.openai.com/v1
    base_url: String,
    model: String,
    keys: ApiKeys,
    client: Client,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    pub content: String,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct OpenAIUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIMessage,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
    #[serde(default)]
    pub usage: Option<OpenAIUsage>,
}

impl OpenAIRequest {
    pub fn from_completion(model: &str, request: CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: request.prompt,
        });

        Self {
            model: model.to_string(),
            messages,
            temperature: request.temperature,
        }
    }
}

impl OpenAIResponse {
    /// Text of the first choice, None when the API returned no choice
    pub fn into_completion(self) -> Option<Completion> {
        let choice = self.choices.into_iter().next()?;
        Some(Completion {
            text: choice.message.content,
            prompt_tokens: self.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: self.usage.as_ref().map(|u| u.completion_tokens),
        })
    }
}

impl OpenAI {
    pub fn new(
        name: &'static str,
        base_url: impl Into<String>,
        model: impl Into<String>,
        keys: ApiKeys,
        timeout: Duration,
    ) -> Self {
        Self {
            name,
            base_url: base_url.into(),
            model: model.into(),
            keys,
            client: build_client(timeout),
        }
    }

    async fn send_once(&self, body: &OpenAIRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(body);
        if let Some(key) = self.keys.current() {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: OpenAIResponse = response.json().await?;
        parsed.into_completion().ok_or(ProviderError::EmptyResponse)
    }
}

#[async_trait]
impl Provider for OpenAI {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let body = OpenAIRequest::from_completion(&self.model, request);
        let mut attempts_left = self.keys.len().max(1);

        loop {
            attempts_left -= 1;
            match self.send_once(&body).await {
                Ok(completion) => {
                    debug!("{} answered {} chars", self.name, completion.text.len());
                    return Ok(completion);
                }
                // A rejected key is retried right away with the next one
                Err(ProviderError::AuthenticationError(message)) if attempts_left > 0 && self.keys.rotate(self.name) => {
                    error!("{} rejected API key: {}", self.name, message);
                }
                Err(err) => {
                    if matches!(err, ProviderError::RateLimitExceeded { .. }) {
                        self.keys.rotate(self.name);
                    }
                    error!("{} API error: {}", self.name, err);
                    return Err(err);
                }
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let url = format!("{}/models", self.base_url);
        let mut builder = self.client.get(&url);
        if let Some(key) = self.keys.current() {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}
