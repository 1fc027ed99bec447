use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::app_config::Config;
use crate::checkpoint::{CheckpointKey, CheckpointStore};
use crate::document::{self, DocumentFormat, OutputMode, StripReport};
use crate::errors::TranslationError;
use crate::file_utils::FileManager;
use crate::providers::{self, Provider};
use crate::translation::{
    GlossaryManager, PipelineSettings, ProgressObserver, RunSummary, StopFlag, TokenUsageStats,
    TranslationPipeline,
};

// @module: Application controller for document translation

/// Options of one translate invocation
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub mode: OutputMode,
    /// Drop recorded progress before translating
    pub reset: bool,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: if config.output.bilingual {
                OutputMode::Bilingual
            } else {
                OutputMode::Mono
            },
            reset: false,
        }
    }
}

/// What happened to one input
#[derive(Debug)]
pub enum DocumentOutcome {
    /// The run finished and the output was written, possibly with failed units
    Translated { output: PathBuf, summary: RunSummary },
    /// The document could not be loaded
    Skipped(String),
    /// Progress or output could not be persisted
    Failed(String),
}

#[derive(Debug)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub outcome: DocumentOutcome,
}

impl DocumentReport {
    pub fn summary(&self) -> Option<&RunSummary> {
        match &self.outcome {
            DocumentOutcome::Translated { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

/// Size of a document before translating it
#[derive(Debug, Clone, Serialize)]
pub struct Estimate {
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub units: usize,
    pub chars: usize,
    /// Rough token count, four characters per token
    pub approx_tokens: usize,
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    store: Arc<CheckpointStore>,
    pipeline: TranslationPipeline,
}

impl Controller {
    // @method: Create a controller with the configured provider, glossary and checkpoint database
    pub fn with_config(config: Config) -> Result<Self> {
        let provider = providers::create_provider(&config.translation)
            .context("Failed to create translation provider")?;
        let store = CheckpointStore::open(config.checkpoint.database_path.as_deref())
            .context("Failed to open checkpoint database")?;
        Ok(Self::with_parts(config, provider, store))
    }

    /// Create a controller around an existing provider and checkpoint store
    pub fn with_parts(config: Config, provider: Arc<dyn Provider>, store: CheckpointStore) -> Self {
        let glossary = if config.glossary.enabled {
            Some(Arc::new(GlossaryManager::load(
                &config.glossary.path,
                config.glossary.max_terms,
            )))
        } else {
            None
        };

        let pipeline = TranslationPipeline::new(provider, PipelineSettings::from_config(&config), glossary);

        Self {
            config,
            store: Arc::new(store),
            pipeline,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Check that the provider answers before starting a long run
    pub async fn test_connection(&self) -> Result<()> {
        let provider = self.pipeline.provider();
        provider
            .test_connection()
            .await
            .with_context(|| format!("{} is not reachable", provider.name()))
    }

    /// Output path for an input: `{stem}_bili.ext` or `{stem}_{target}.ext`
    pub fn output_path(&self, input: &Path, mode: OutputMode) -> PathBuf {
        let suffix = match mode {
            OutputMode::Bilingual => "bili",
            OutputMode::Mono => self.config.target_language.as_str(),
        };
        FileManager::generate_output_path(input, self.config.output.output_dir.as_deref(), suffix)
    }

    /// Translate every document found in `inputs`, `workers` at a time
    pub async fn run(
        &self,
        inputs: &[PathBuf],
        options: RunOptions,
        observer: &dyn ProgressObserver,
        stop: &StopFlag,
    ) -> Result<Vec<DocumentReport>> {
        let documents = FileManager::find_documents(inputs, Some(&self.config.target_language))?;
        if documents.is_empty() {
            warn!("No supported documents found");
            return Ok(Vec::new());
        }

        let workers = self.config.workers.max(1);
        info!(
            "bookwai: {} - {}, {} document(s), {} worker(s)",
            self.config.translation.provider.display_name(),
            self.config.translation.get_model(),
            documents.len(),
            workers
        );

        let start_time = Instant::now();
        let reports: Vec<DocumentReport> = stream::iter(documents)
            .map(|path| self.translate_document(path, options, observer, stop))
            .buffered(workers)
            .collect()
            .await;

        let mut usage = TokenUsageStats::with_provider_info(
            self.pipeline.provider().name().to_string(),
            self.config.translation.get_model(),
        );
        for summary in reports.iter().filter_map(|r| r.summary()) {
            usage.merge(&summary.usage);
        }
        if usage.requests > 0 {
            info!("{}", usage.summary());
        }

        let translated = reports.iter().filter(|r| r.summary().is_some()).count();
        info!(
            "Finished {} of {} document(s) in {}",
            translated,
            reports.len(),
            Self::format_duration(start_time.elapsed())
        );

        Ok(reports)
    }

    async fn translate_document(
        &self,
        path: PathBuf,
        options: RunOptions,
        observer: &dyn ProgressObserver,
        stop: &StopFlag,
    ) -> DocumentReport {
        let start_time = Instant::now();

        let outcome = match self.process_document(&path, options, observer, stop).await {
            Ok((output, summary)) => {
                info!(
                    "{} -> {} in {}",
                    path.display(),
                    output.display(),
                    Self::format_duration(start_time.elapsed())
                );
                if summary.failed > 0 {
                    warn!(
                        "{}: {} unit(s) left untranslated: {:?}",
                        path.display(),
                        summary.failed,
                        summary.failed_indices
                    );
                }
                debug!("{}", summary.usage.summary());
                DocumentOutcome::Translated { output, summary }
            }
            Err(TranslationError::Load(e)) => {
                error!("Skipping {}: {}", path.display(), e);
                DocumentOutcome::Skipped(e.to_string())
            }
            Err(e) => {
                error!("Error processing {}: {}", path.display(), e);
                DocumentOutcome::Failed(e.to_string())
            }
        };

        DocumentReport { path, outcome }
    }

    async fn process_document(
        &self,
        path: &Path,
        options: RunOptions,
        observer: &dyn ProgressObserver,
        stop: &StopFlag,
    ) -> Result<(PathBuf, RunSummary), TranslationError> {
        let mut document = document::load(path)?;
        let key = CheckpointKey::new(document.id.clone(), self.config.target_language.clone());

        if options.reset {
            let removed = self.store.reset(&key).await?;
            info!("{}: checkpoint reset, {} unit(s) forgotten", path.display(), removed);
        }
        self.store.register(&key, &document.path, document.units.len()).await?;
        let mut checkpoint = self.store.load(&key).await?;

        let summary = self.pipeline.run(&mut document, &mut checkpoint, observer, stop).await?;

        let output = self.output_path(path, options.mode);
        document::save(&document, &output, options.mode)?;

        Ok((output, summary))
    }

    /// Count units and approximate tokens without calling the provider
    pub fn estimate(inputs: &[PathBuf]) -> Result<Vec<Estimate>> {
        let mut estimates = Vec::new();
        for path in FileManager::find_documents(inputs, None)? {
            match document::load(&path) {
                Ok(document) => {
                    let chars = document.source_chars();
                    estimates.push(Estimate {
                        path,
                        format: document.format,
                        units: document.units.len(),
                        chars,
                        approx_tokens: chars / 4,
                    });
                }
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(estimates)
    }

    /// Remove the source paragraphs of a bilingual EPUB
    pub fn strip(input: &Path, output: Option<&Path>) -> Result<(PathBuf, StripReport)> {
        let output = match output {
            Some(output) => output.to_path_buf(),
            None => document::strip::default_output_path(input),
        };
        let report = document::strip_bilingual_epub(input, &output)
            .with_context(|| format!("Failed to strip {}", input.display()))?;
        Ok((output, report))
    }

    // Format duration in a human-readable format
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
