/*!
 * Translation of loaded documents through an AI provider.
 *
 * - `pipeline`: per-document run, checkpointing every translated unit
 * - `dispatcher`: one provider request per chunk, retries and marker splitting
 * - `chunking`: grouping of pending units under the request size limit
 * - `rate_limit`: minimum spacing between provider calls
 * - `glossary`: shared term table filtered per chunk and learned from answers
 * - `prompts`: system and user prompt construction
 * - `progress`: observer trait and stop flag
 * - `stats`: token and time accounting
 */

pub use self::dispatcher::{DispatchSettings, Dispatcher, RetryPolicy};
pub use self::glossary::GlossaryManager;
pub use self::pipeline::{PipelineSettings, RunSummary, TranslationPipeline};
pub use self::progress::{NullObserver, ProgressBarObserver, ProgressObserver, StopFlag};
pub use self::stats::TokenUsageStats;

pub mod chunking;
pub mod dispatcher;
pub mod glossary;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod rate_limit;
pub mod stats;
