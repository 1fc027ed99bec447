/*!
 * Mock provider implementations for testing.
 *
 * The mock answers in-process and records every request. Behaviors:
 * - `MockProvider::identity()` - echoes the prompt, keeping unit markers
 * - `MockProvider::prefixed(p)` - prefixes every unit's text with `p`
 * - `MockProvider::missing_markers()` - drops the markers of multi-unit prompts
 * - `MockProvider::failing()` - always fails with a non-transient error
 * - `MockProvider::empty()` - always answers with an empty text
 *
 * `fail_times_on` adds transient failures for prompts containing a text.
 */

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{Completion, CompletionRequest, Provider};

static UNIT_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<<UNIT_\d+>>\n?").unwrap());

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Echo the prompt unchanged
    Identity,
    /// Prefix every unit with the given text
    Prefix(String),
    /// Answer multi-unit prompts without their markers
    MissingMarkers,
    /// Always fail with an API error
    Failing,
    /// Answer with an empty text
    Empty,
}

#[derive(Debug)]
struct FailureRule {
    needle: String,
    remaining: usize,
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    behavior: MockBehavior,
    failures: Mutex<Vec<FailureRule>>,
    calls: Mutex<Vec<CompletionRequest>>,
    request_count: AtomicUsize,
    suffix: Option<String>,
    delay: Option<Duration>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            failures: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            request_count: AtomicUsize::new(0),
            suffix: None,
            delay: None,
        }
    }

    pub fn identity() -> Self {
        Self::new(MockBehavior::Identity)
    }

    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self::new(MockBehavior::Prefix(prefix.into()))
    }

    pub fn missing_markers() -> Self {
        Self::new(MockBehavior::MissingMarkers)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Fail the next `times` requests whose prompt contains `needle` with a transient error
    pub fn fail_times_on(self, needle: impl Into<String>, times: usize) -> Self {
        self.failures.lock().push(FailureRule {
            needle: needle.into(),
            remaining: times,
        });
        self
    }

    /// Append text to every answer, e.g. a `NEW_TERMS` marker
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Simulate latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls so far, failed ones included
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Every request received, in order
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().clone()
    }

    fn should_fail(&self, prompt: &str) -> bool {
        let mut failures = self.failures.lock();
        match failures.iter_mut().find(|f| f.remaining > 0 && prompt.contains(&f.needle)) {
            Some(rule) => {
                rule.remaining -= 1;
                true
            }
            None => false,
        }
    }

    /// Apply `transform` to the text of every marked unit, or to the whole prompt
    fn map_units(prompt: &str, transform: impl Fn(&str) -> String) -> String {
        if !UNIT_MARKER.is_match(prompt) {
            return transform(prompt);
        }

        let mut output = String::new();
        let mut last = 0;
        for marker in UNIT_MARKER.find_iter(prompt) {
            let between = &prompt[last..marker.start()];
            if last > 0 {
                output.push_str(&transform(between.trim_end_matches('\n')));
                output.push('\n');
            } else {
                output.push_str(between);
            }
            output.push_str(marker.as_str());
            last = marker.end();
        }

        let rest = &prompt[last..];
        match rest.find("<<END>>") {
            Some(end) => {
                output.push_str(&transform(rest[..end].trim_end_matches('\n')));
                output.push('\n');
                output.push_str(&rest[end..]);
            }
            None => output.push_str(&transform(rest)),
        }
        output
    }

    fn answer(&self, prompt: &str) -> String {
        match &self.behavior {
            MockBehavior::Identity => prompt.to_string(),
            MockBehavior::Prefix(prefix) => Self::map_units(prompt, |text| format!("{}{}", prefix, text)),
            MockBehavior::MissingMarkers => {
                let stripped = UNIT_MARKER.replace_all(prompt, "");
                stripped.replace("<<END>>", "")
            }
            MockBehavior::Failing | MockBehavior::Empty => String::new(),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.behavior == MockBehavior::Failing {
            return Err(ProviderError::ApiError {
                status_code: 400,
                message: "mock failure".to_string(),
            });
        }
        if self.should_fail(&request.prompt) {
            return Err(ProviderError::ConnectionError("mock transient failure".to_string()));
        }

        let mut text = self.answer(&request.prompt);
        if let Some(suffix) = &self.suffix {
            text.push_str(suffix);
        }

        Ok(Completion {
            prompt_tokens: Some((request.prompt.len() / 4) as u64),
            completion_tokens: Some((text.len() / 4) as u64),
            text,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("mock is offline".to_string())),
            _ => Ok(()),
        }
    }
}
