/*!
 * Per-document translation run.
 *
 * Restores finished units from the checkpoint, chunks what is left and
 * sends the chunks one after the other. Every translated unit is committed
 * to the checkpoint before the next chunk starts, so a stopped or crashed
 * run loses at most the chunk in flight.
 */

use log::{info, warn, Level};
use std::sync::Arc;

use crate::app_config::Config;
use crate::checkpoint::Checkpoint;
use crate::document::{Document, TranslationUnit, UnitStatus};
use crate::errors::TranslationError;
use crate::providers::Provider;

use super::chunking::chunk_units;
use super::dispatcher::{DispatchSettings, Dispatcher, RetryPolicy};
use super::glossary::GlossaryManager;
use super::progress::{ProgressObserver, StopFlag};
use super::stats::TokenUsageStats;

/// Settings of a pipeline run, taken from the configuration
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub dispatch: DispatchSettings,
    pub model: String,
    pub max_chars_per_request: usize,
    /// Maximum glossary entries injected per chunk
    pub glossary_max_items: usize,
    /// Second pass over the units that failed in the first one
    pub retry_failed: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let translation = &config.translation;
        let common = &translation.common;

        Self {
            dispatch: DispatchSettings {
                system_prompt: common.system_prompt.clone(),
                user_prompt: common.user_prompt.clone(),
                source_language: config.source_language_name(),
                target_language: config.target_language_name(),
                temperature: common.temperature,
                retry: RetryPolicy {
                    retry_count: common.retry_count,
                    backoff_ms: common.retry_backoff_ms,
                },
                rate_limit_delay_ms: common.rate_limit_delay_ms,
                rate_limit_rpm: translation.get_rate_limit(),
            },
            model: translation.get_model(),
            max_chars_per_request: translation.get_max_chars_per_request(),
            glossary_max_items: config.glossary.max_items,
            retry_failed: common.retry_failed,
        }
    }
}

/// Outcome of one document run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub total: usize,
    /// Units taken from the checkpoint without a provider call
    pub restored: usize,
    pub translated: usize,
    pub failed: usize,
    pub failed_indices: Vec<usize>,
    /// The stop flag ended the run early
    pub cancelled: bool,
    pub usage: TokenUsageStats,
}

impl RunSummary {
    /// Every unit has a translation
    pub fn is_complete(&self) -> bool {
        self.restored + self.translated == self.total
    }
}

/// Result of one pass over the pending units
#[derive(Debug, Default)]
struct PassOutcome {
    translated: usize,
    failed_indices: Vec<usize>,
    cancelled: bool,
}

/// Translates documents with one provider
#[derive(Debug)]
pub struct TranslationPipeline {
    provider: Arc<dyn Provider>,
    settings: PipelineSettings,
    glossary: Option<Arc<GlossaryManager>>,
}

impl TranslationPipeline {
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: PipelineSettings,
        glossary: Option<Arc<GlossaryManager>>,
    ) -> Self {
        Self {
            provider,
            settings,
            glossary,
        }
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Translate every pending unit of `document`
    ///
    /// Returns an error only when the checkpoint cannot be written; provider
    /// failures mark units failed and the run goes on.
    pub async fn run(
        &self,
        document: &mut Document,
        checkpoint: &mut Checkpoint,
        observer: &dyn ProgressObserver,
        stop: &StopFlag,
    ) -> Result<RunSummary, TranslationError> {
        let path = document.path.clone();
        let total = document.units.len();

        let restored = restore(document, checkpoint);
        if restored > 0 {
            info!("{:?}: restored {} of {} units from checkpoint", path, restored, total);
        }
        observer.on_document_started(&path, total, restored);

        let dispatcher = Dispatcher::new(
            self.provider.clone(),
            self.settings.dispatch.clone(),
            self.glossary.clone(),
        );
        let mut usage = TokenUsageStats::with_provider_info(
            self.provider.name().to_string(),
            self.settings.model.clone(),
        );

        let mut pass = self
            .translate_pending(document, checkpoint, &dispatcher, &mut usage, observer, stop)
            .await?;
        let mut translated = pass.translated;

        if self.settings.retry_failed && !pass.cancelled && !pass.failed_indices.is_empty() {
            let reset = document.reset_failed();
            info!("{:?}: retrying {} failed unit(s)", path, reset);
            pass = self
                .translate_pending(document, checkpoint, &dispatcher, &mut usage, observer, stop)
                .await?;
            translated += pass.translated;
        }

        let PassOutcome { failed_indices, cancelled, .. } = pass;
        let summary = RunSummary {
            total,
            restored,
            translated,
            failed: failed_indices.len(),
            failed_indices,
            cancelled,
            usage,
        };

        info!(
            "{:?}: {} translated, {} restored, {} failed, {} total",
            path, summary.translated, summary.restored, summary.failed, summary.total
        );
        observer.on_document_finished(&path, &summary);

        Ok(summary)
    }

    /// Send every pending unit of `document`, chunk by chunk
    async fn translate_pending(
        &self,
        document: &mut Document,
        checkpoint: &mut Checkpoint,
        dispatcher: &Dispatcher,
        usage: &mut TokenUsageStats,
        observer: &dyn ProgressObserver,
        stop: &StopFlag,
    ) -> Result<PassOutcome, TranslationError> {
        let path = document.path.clone();
        let pending: Vec<TranslationUnit> = document.pending_units().into_iter().cloned().collect();
        let chunks = chunk_units(&pending, self.settings.max_chars_per_request);
        let mut outcome = PassOutcome::default();

        for chunk in &chunks {
            if stop.is_stopped() {
                info!("{:?}: stop requested, progress is saved", path);
                outcome.cancelled = true;
                break;
            }

            let glossary_text = self.glossary_text_for(chunk);
            let results = dispatcher.translate_chunk(chunk, &glossary_text, usage).await;

            for (index, result) in results {
                match result {
                    Ok(text) => {
                        checkpoint.mark_done(index, &text).await?;
                        document.apply_translation(index, text);
                        outcome.translated += 1;
                        observer.on_unit_finished(&path, index, UnitStatus::Done);
                    }
                    Err(e) => {
                        document.mark_failed(index);
                        outcome.failed_indices.push(index);
                        let message = format!("Unit {} failed: {}", index, e);
                        warn!("{:?}: {}", path, message);
                        observer.on_log(&path, Level::Warn, &message);
                        observer.on_unit_finished(&path, index, UnitStatus::Failed);
                    }
                }
            }
        }

        Ok(outcome)
    }

    fn glossary_text_for(&self, chunk: &[TranslationUnit]) -> String {
        match &self.glossary {
            Some(glossary) if !glossary.is_empty() => {
                let text = chunk
                    .iter()
                    .map(|u| u.source.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                glossary.get_glossary_text(&text, self.settings.glossary_max_items)
            }
            _ => String::new(),
        }
    }
}

/// Apply stored translations, returns how many units were restored
fn restore(document: &mut Document, checkpoint: &Checkpoint) -> usize {
    let stored: Vec<(usize, String)> = document
        .units
        .iter()
        .filter(|u| u.status != UnitStatus::Done)
        .filter_map(|u| checkpoint.translated(u.index).map(|t| (u.index, t.to_string())))
        .collect();

    let restored = stored.len();
    for (index, text) in stored {
        document.apply_translation(index, text);
    }
    restored
}
