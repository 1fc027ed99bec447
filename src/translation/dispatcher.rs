/*!
 * Chunk dispatcher: one provider request per chunk of units.
 *
 * Multi-unit chunks are sent as `<<UNIT_n>>` sections closed by `<<END>>`
 * and split back by marker. When the answer's markers do not line up with
 * the request, the chunk's units are translated one at a time instead.
 * Transient provider errors are retried with exponential backoff.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::document::TranslationUnit;
use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, Provider};

use super::glossary::GlossaryManager;
use super::prompts::TranslationPromptBuilder;
use super::rate_limit::RateLimiter;
use super::stats::TokenUsageStats;

/// Closing marker of a multi-unit payload
pub const END_MARKER: &str = "<<END>>";

static UNIT_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<<UNIT_(\d+)>>").unwrap());

static REFINED_TRANSLATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<step3_refined_translation>(.*?)</step3_refined_translation>").unwrap()
});

/// Result of one unit: its index and the translation or the final error
pub type UnitOutcome = (usize, Result<String, ProviderError>);

/// Bounded retries with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retry_count: u32,
    /// Delay before the first retry, doubled for every further one
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), without jitter
    ///
    /// A server-requested `Retry-After` wins when it is longer.
    pub fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = Duration::from_millis(self.backoff_ms.saturating_mul(1u64 << exponent));
        match error.retry_after() {
            Some(retry_after) if retry_after > backoff => retry_after,
            _ => backoff,
        }
    }
}

// Adds up to a quarter of the delay
fn with_jitter(delay: Duration) -> Duration {
    let max_jitter = delay.as_millis() as u64 / 4;
    if max_jitter == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::rng().random_range(0..=max_jitter))
}

/// Everything a dispatcher needs besides the provider
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Language names as written into prompts
    pub source_language: String,
    pub target_language: String,
    pub temperature: f32,
    pub retry: RetryPolicy,
    pub rate_limit_delay_ms: u64,
    pub rate_limit_rpm: Option<u32>,
}

/// Sends chunks to a provider, one document at a time
#[derive(Debug)]
pub struct Dispatcher {
    provider: Arc<dyn Provider>,
    settings: DispatchSettings,
    limiter: RateLimiter,
    glossary: Option<Arc<GlossaryManager>>,
}

impl Dispatcher {
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: DispatchSettings,
        glossary: Option<Arc<GlossaryManager>>,
    ) -> Self {
        let limiter = RateLimiter::new(settings.rate_limit_delay_ms, settings.rate_limit_rpm);
        Self {
            provider,
            settings,
            limiter,
            glossary,
        }
    }

    /// Translate a chunk of units, returning one outcome per unit in chunk order
    pub async fn translate_chunk(
        &self,
        units: &[TranslationUnit],
        glossary_text: &str,
        stats: &mut TokenUsageStats,
    ) -> Vec<UnitOutcome> {
        match units {
            [] => Vec::new(),
            [unit] => {
                let result = self.request(&unit.source, false, glossary_text, stats).await;
                vec![(unit.index, result)]
            }
            _ => self.translate_marked(units, glossary_text, stats).await,
        }
    }

    async fn translate_marked(
        &self,
        units: &[TranslationUnit],
        glossary_text: &str,
        stats: &mut TokenUsageStats,
    ) -> Vec<UnitOutcome> {
        let payload = build_payload(units);

        let answer = match self.request(&payload, true, glossary_text, stats).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Chunk of {} units failed: {}", units.len(), e);
                return units.iter().map(|u| (u.index, Err(e.clone()))).collect();
            }
        };

        match split_sections(&answer, units.len()) {
            Some(sections) => units
                .iter()
                .zip(sections)
                .map(|(unit, text)| (unit.index, Ok(text)))
                .collect(),
            None => {
                warn!(
                    "Markers of a {}-unit chunk did not line up, translating its units one by one",
                    units.len()
                );
                let mut outcomes = Vec::with_capacity(units.len());
                for unit in units {
                    let result = self.request(&unit.source, false, glossary_text, stats).await;
                    outcomes.push((unit.index, result));
                }
                outcomes
            }
        }
    }

    /// One logical request: rate limiting, retries, post-processing
    async fn request(
        &self,
        text: &str,
        multi_unit: bool,
        glossary_text: &str,
        stats: &mut TokenUsageStats,
    ) -> Result<String, ProviderError> {
        let request = self.build_request(text, multi_unit, glossary_text);
        let mut attempt = 0;

        loop {
            self.limiter.wait().await;

            let started = Instant::now();
            let result = match self.provider.complete(request.clone()).await {
                Ok(completion) => {
                    stats.record(&completion, started.elapsed());
                    self.post_process(&completion.text)
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(translated) => return Ok(translated),
                Err(e) if e.is_transient() && attempt < self.settings.retry.retry_count => {
                    attempt += 1;
                    let delay = with_jitter(self.settings.retry.delay_for(attempt, &e));
                    warn!(
                        "{} request failed ({}), retry {}/{} in {:?}",
                        self.provider.name(),
                        e,
                        attempt,
                        self.settings.retry.retry_count,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn build_request(&self, text: &str, multi_unit: bool, glossary_text: &str) -> CompletionRequest {
        let mut builder = TranslationPromptBuilder::new(
            &self.settings.system_prompt,
            &self.settings.user_prompt,
            &self.settings.source_language,
            &self.settings.target_language,
        )
        .with_unit_markers(multi_unit);

        if let Some(glossary) = &self.glossary {
            builder = builder.with_glossary(glossary_text, !glossary.is_full());
        }

        let prompt = builder.build(text);
        CompletionRequest::new(prompt.user)
            .system(prompt.system)
            .temperature(self.settings.temperature)
    }

    /// Learn glossary terms, unwrap refined translations, trim
    fn post_process(&self, answer: &str) -> Result<String, ProviderError> {
        let mut text = match &self.glossary {
            Some(glossary) => glossary.extract_new_terms(answer),
            None => answer.to_string(),
        };

        if let Some(refined) = REFINED_TRANSLATION.captures(&text).and_then(|c| c.get(1)) {
            debug!("Using refined translation section of the answer");
            text = refined.as_str().to_string();
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

/// `<<UNIT_n>>` sections, numbered from 1, closed by `<<END>>`
pub fn build_payload(units: &[TranslationUnit]) -> String {
    let mut payload = String::new();
    for (position, unit) in units.iter().enumerate() {
        payload.push_str(&format!("<<UNIT_{}>>\n", position + 1));
        payload.push_str(&unit.source);
        payload.push('\n');
    }
    payload.push_str(END_MARKER);
    payload
}

/// Split an answer back into `count` sections
///
/// Text before the first marker is ignored and a missing `<<END>>` is
/// tolerated. Returns None when the markers are missing, out of order or
/// a section is empty.
pub fn split_sections(answer: &str, count: usize) -> Option<Vec<String>> {
    let body = match answer.rfind(END_MARKER) {
        Some(end) => &answer[..end],
        None => answer,
    };

    let markers: Vec<(usize, usize, usize)> = UNIT_MARKER
        .captures_iter(body)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let number = c.get(1)?.as_str().parse().ok()?;
            Some((number, whole.start(), whole.end()))
        })
        .collect();

    if markers.len() != count {
        return None;
    }

    let mut sections = Vec::with_capacity(count);
    for (position, &(number, _, content_start)) in markers.iter().enumerate() {
        if number != position + 1 {
            return None;
        }
        let content_end = markers
            .get(position + 1)
            .map(|&(_, next_start, _)| next_start)
            .unwrap_or(body.len());
        let section = body[content_start..content_end].trim();
        if section.is_empty() {
            return None;
        }
        sections.push(section.to_string());
    }
    Some(sections)
}
