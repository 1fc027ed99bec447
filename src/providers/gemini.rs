/*!
 * Google Gemini `generateContent` client.
 */

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_client, error_from_response, ApiKeys, Completion, CompletionRequest, Provider};
use crate::errors::ProviderError;

/// Gemini client
#[derive(Debug)]
pub struct Gemini {
    /// API base URL, e.g. https://generativelanguage.googleapis.com/v1beta
    base_url: String,
    model: String,
    keys: ApiKeys,
    client: Client,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    temperature: f32,
}

/// `generateContent` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsage {
    #[serde(default)]
    pub prompt_token_count: Option<u64>,
    #[serde(default)]
    pub candidates_token_count: Option<u64>,
}

/// `generateContent` response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<GeminiUsage>,
}

impl GeminiRequest {
    pub fn from_completion(request: CompletionRequest) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart { text: request.prompt }],
            }],
            system_instruction: request.system.map(|system| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: system }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        }
    }
}

impl GeminiResponse {
    /// Concatenated text parts of the first candidate; blocked prompts have none
    pub fn into_completion(self) -> Option<Completion> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().map(|p| p.text).collect();
        if text.trim().is_empty() {
            return None;
        }
        Some(Completion {
            text,
            prompt_tokens: self.usage_metadata.as_ref().and_then(|u| u.prompt_token_count),
            completion_tokens: self.usage_metadata.as_ref().and_then(|u| u.candidates_token_count),
        })
    }
}

impl Gemini {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, keys: ApiKeys, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            keys,
            client: build_client(timeout),
        }
    }

    fn key(&self) -> Result<String, ProviderError> {
        self.keys
            .current()
            .ok_or_else(|| ProviderError::AuthenticationError("Gemini API key is missing".to_string()))
    }

    async fn send_once(&self, body: &GeminiRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.key()?)])
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: GeminiResponse = response.json().await?;
        parsed.into_completion().ok_or(ProviderError::EmptyResponse)
    }
}

#[async_trait]
impl Provider for Gemini {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let body = GeminiRequest::from_completion(request);
        let mut attempts_left = self.keys.len().max(1);

        loop {
            attempts_left -= 1;
            match self.send_once(&body).await {
                Ok(completion) => {
                    debug!("gemini answered {} chars", completion.text.len());
                    return Ok(completion);
                }
                Err(ProviderError::AuthenticationError(message)) if attempts_left > 0 && self.keys.rotate("gemini") => {
                    error!("gemini rejected API key: {}", message);
                }
                Err(err) => {
                    if matches!(err, ProviderError::RateLimitExceeded { .. }) {
                        self.keys.rotate("gemini");
                    }
                    error!("gemini API error: {}", err);
                    return Err(err);
                }
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        let response = self.client.get(&url).query(&[("key", self.key()?)]).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}
