/*!
 * Provider implementations for the supported LLM backends.
 *
 * - Ollama: local LLM server
 * - OpenAI: OpenAI API, also used for LM Studio's compatible server
 * - Gemini: Google Generative Language API
 * - Mock: scripted in-process provider for tests
 *
 * Clients make exactly one HTTP attempt per call; retries, backoff and
 * pacing belong to the dispatcher.
 */

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::warn;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

pub mod gemini;
pub mod mock;
pub mod ollama;
pub mod openai;

/// A single chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instructions
    pub system: Option<String>,
    /// User message
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 1.0,
        }
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Text answered by a provider plus token accounting when reported
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

/// Common trait for all LLM providers
///
/// Object safe, so the pipeline holds an `Arc<dyn Provider>` chosen at runtime.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Complete a request using this provider
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;

    /// Check that the backend is reachable and the credentials are accepted
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

/// Build the provider selected in the configuration
pub fn create_provider(config: &TranslationConfig) -> Result<Arc<dyn Provider>> {
    let endpoint = normalize_endpoint(&config.get_endpoint())?;
    let model = config.get_model();
    let timeout = Duration::from_secs(config.get_timeout_secs());

    let provider: Arc<dyn Provider> = match config.provider {
        TranslationProvider::Ollama => Arc::new(ollama::Ollama::new(endpoint, model, timeout)),
        TranslationProvider::OpenAI => Arc::new(openai::OpenAI::new(
            "openai",
            endpoint,
            model,
            ApiKeys::parse(&config.get_api_key()),
            timeout,
        )),
        TranslationProvider::LMStudio => Arc::new(openai::OpenAI::new(
            "lmstudio",
            endpoint,
            model,
            ApiKeys::parse(&config.get_api_key()),
            timeout,
        )),
        TranslationProvider::Gemini => Arc::new(gemini::Gemini::new(
            endpoint,
            model,
            ApiKeys::parse(&config.get_api_key()),
            timeout,
        )),
    };
    Ok(provider)
}

/// Validate an endpoint, adding `http://` when no scheme is given, without trailing slash
pub fn normalize_endpoint(endpoint: &str) -> Result<String> {
    if endpoint.trim().is_empty() {
        return Err(anyhow!("Endpoint cannot be empty"));
    }

    let with_scheme = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.trim().to_string()
    } else {
        format!("http://{}", endpoint.trim())
    };

    let url = Url::parse(&with_scheme).map_err(|e| anyhow!("Invalid endpoint {}: {}", endpoint, e))?;
    if url.host_str().is_none() {
        return Err(anyhow!("Invalid host in endpoint: {}", endpoint));
    }

    Ok(with_scheme.trim_end_matches('/').to_string())
}

/// HTTP client shared by the network providers
pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_default()
}

/// Delay requested through a `Retry-After` header, in seconds or as an HTTP date
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    wait.to_std().ok()
}

/// Turn an unsuccessful response into the matching error
pub(crate) async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let retry_after = parse_retry_after(response.headers());
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    ProviderError::from_status(status, truncate(&body, 500), retry_after)
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// Comma separated API keys, rotated after auth or quota failures
#[derive(Debug)]
pub struct ApiKeys {
    keys: Vec<String>,
    current: Mutex<usize>,
}

impl ApiKeys {
    pub fn parse(raw: &str) -> Self {
        let keys = raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            keys,
            current: Mutex::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key to use for the next request
    pub fn current(&self) -> Option<String> {
        let index = *self.current.lock();
        self.keys.get(index).cloned()
    }

    /// Move on to the next key, returns false when there is nothing to rotate to
    pub fn rotate(&self, provider: &str) -> bool {
        if self.keys.len() < 2 {
            return false;
        }
        let mut current = self.current.lock();
        *current = (*current + 1) % self.keys.len();
        warn!("{}: switching to API key {}/{}", provider, *current + 1, self.keys.len());
        true
    }
}
