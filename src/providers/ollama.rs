use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_client, error_from_response, truncate, Completion, CompletionRequest, Provider};
use crate::errors::ProviderError;

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// Model name
    model: String,
    /// HTTP client for making requests
    client: Client,
}

/// Chat message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model name to use for generation
    model: String,
    /// Messages of the conversation
    messages: Vec<ChatMessage>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    stream: bool,
}

/// Chat response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Response message
    pub message: ChatMessage,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// Number of prompt tokens
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl ChatRequest {
    /// Build a non-streaming chat request from a completion request
    pub fn from_completion(model: &str, request: CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt,
        });

        Self {
            model: model.to_string(),
            messages,
            options: Some(GenerationOptions {
                temperature: Some(request.temperature),
            }),
            stream: false,
        }
    }
}

impl Ollama {
    /// Create a client for the server at `base_url`
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: build_client(timeout),
        }
    }

    /// Parse a chat body, tolerating JSONL bodies from servers that stream anyway
    pub fn parse_chat_body(body: &str) -> Result<ChatResponse, ProviderError> {
        if let Ok(response) = serde_json::from_str::<ChatResponse>(body) {
            return Ok(response);
        }

        let mut content = String::new();
        let mut prompt_eval_count = None;
        let mut eval_count = None;
        let mut parsed_any = false;

        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
                continue;
            };
            parsed_any = true;
            if let Some(part) = value.pointer("/message/content").and_then(|v| v.as_str()) {
                content.push_str(part);
            }
            if value.get("done").and_then(|v| v.as_bool()).unwrap_or(false) {
                prompt_eval_count = value.get("prompt_eval_count").and_then(|v| v.as_u64());
                eval_count = value.get("eval_count").and_then(|v| v.as_u64());
            }
        }

        if !parsed_any {
            error!("Failed to parse Ollama chat response. Raw response: {}", truncate(body, 500));
            return Err(ProviderError::ParseError(
                "Ollama response contains invalid JSON".to_string(),
            ));
        }

        Ok(ChatResponse {
            message: ChatMessage {
                role: "assistant".to_string(),
                content,
            },
            done: true,
            prompt_eval_count,
            eval_count,
        })
    }

    /// Get the Ollama server version
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let value: serde_json::Value = response.json().await?;
        value["version"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ParseError("Invalid version format in response".to_string()))
    }
}

#[async_trait]
impl Provider for Ollama {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest::from_completion(&self.model, request);

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let err = error_from_response(response).await;
            error!("Ollama API error: {}", err);
            return Err(err);
        }

        let text = response.text().await?;
        let chat = Self::parse_chat_body(&text)?;
        debug!("Ollama answered {} chars", chat.message.content.len());

        Ok(Completion {
            text: chat.message.content,
            prompt_tokens: chat.prompt_eval_count,
            completion_tokens: chat.eval_count,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let version = self.version().await?;
        debug!("Connected to Ollama {}", version);
        Ok(())
    }
}
