// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use bookwai::app_config::{self, Config, TranslationProvider};
use bookwai::app_controller::{Controller, DocumentOutcome, RunOptions};
use bookwai::checkpoint::CheckpointStore;
use bookwai::document::OutputMode;
use bookwai::errors::AppError;
use bookwai::file_utils::FileManager;
use bookwai::translation::{ProgressBarObserver, StopFlag};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    #[value(name = "openai", alias = "chatgptapi")]
    OpenAI,
    Gemini,
    #[value(name = "lmstudio")]
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Gemini => TranslationProvider::Gemini,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(clap::Args, Debug)]
struct ConfigArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(clap::Args, Debug)]
struct TranslateArgs {
    /// Documents or directories to translate
    #[arg(value_name = "PATHS", required = true)]
    paths: Vec<PathBuf>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// API key(s), comma separated to rotate between several keys
    #[arg(long, env = "BOOKWAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Source language code (e.g. 'en', or 'auto')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g. 'zh-Hant', 'de')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Write only the translation instead of source and translation
    #[arg(long)]
    mono: bool,

    /// Forget recorded progress and translate from the start
    #[arg(long)]
    reset: bool,

    /// Give failed units one more pass before writing the output
    #[arg(long)]
    retry_failed: bool,

    /// Number of documents translated in parallel
    #[arg(short, long)]
    workers: Option<usize>,

    /// Glossary file
    #[arg(long, conflicts_with = "no_glossary")]
    glossary: Option<PathBuf>,

    /// Disable glossary filtering and term learning
    #[arg(long)]
    no_glossary: bool,

    /// Output directory, next to the input by default
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate documents (EPUB, TXT, SRT, DOCX, Markdown)
    Translate(TranslateArgs),

    /// Count units and approximate tokens without calling a provider
    Estimate {
        /// Documents or directories to inspect
        #[arg(value_name = "PATHS", required = true)]
        paths: Vec<PathBuf>,
    },

    /// Turn a bilingual EPUB into a translation-only EPUB
    Strip {
        /// Bilingual EPUB
        #[arg(value_name = "EPUB")]
        input: PathBuf,

        /// Output file, `{stem}_Single.epub` by default
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List recorded translation progress
    Checkpoints {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Generate shell completions for bookwai
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// bookwai - resumable book translation with AI
#[derive(Parser, Debug)]
#[command(name = "bookwai")]
#[command(version)]
#[command(about = "AI-powered document translation tool")]
#[command(long_about = "bookwai translates books and documents chunk by chunk with AI providers, keeping names consistent through a glossary and resuming interrupted runs from a checkpoint database.

EXAMPLES:
    bookwai translate book.epub                     # Bilingual output next to the input
    bookwai translate --mono -t de book.epub        # Translation only, into German
    bookwai translate -p openai -m gpt-4o books/    # Whole folder with a specific model
    bookwai translate --reset book.epub             # Start over, ignoring saved progress
    bookwai estimate books/                         # Size of the work, no provider calls
    bookwai strip book_bili.epub                    # Remove the source paragraphs
    bookwai completions bash > bookwai.bash         # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default
    one will be created automatically. Command line flags override the file.

SUPPORTED PROVIDERS:
    ollama    - Local Ollama server (default)
    openai    - OpenAI API (requires API key)
    gemini    - Google Gemini API (requires API key)
    lmstudio  - LM Studio local server (OpenAI-compatible on http://localhost:1234/v1)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation, filtered by the global max level
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji and ANSI colour for a level
    fn decoration(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("❌ ", "1;31"),
            Level::Warn => ("🚧 ", "1;33"),
            Level::Info => (" ", "1;32"),
            Level::Debug => ("🔍 ", "1;36"),
            Level::Trace => ("📋 ", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (emoji, colour) = Self::decoration(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                colour,
                now,
                emoji,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Level is raised or lowered once the config is known
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Translate(args) => run_translate(args).await,
        Commands::Estimate { paths } => run_estimate(&paths),
        Commands::Strip { input, output } => run_strip(&input, output.as_deref()),
        Commands::Checkpoints { config } => run_checkpoints(&config).await,
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "bookwai", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Load the configuration file, creating it with defaults when missing
fn load_config(args: &ConfigArgs) -> Result<Config> {
    if let Some(level) = &args.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = if FileManager::file_exists(&args.config_path) {
        Config::load_from_file(&args.config_path)?
    } else {
        warn!("Config file not found at {:?}, creating default config.", args.config_path);
        let config = Config::default();
        config
            .save_to_file(&args.config_path)
            .with_context(|| format!("Failed to write default config to {:?}", args.config_path))?;
        config
    };

    match &args.log_level {
        Some(level) => config.log_level = level.clone().into(),
        None => log::set_max_level(config.log_level.to_level_filter()),
    }

    Ok(config)
}

fn apply_overrides(config: &mut Config, args: &TranslateArgs) {
    if let Some(provider) = &args.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &args.model {
        config.translation.active_provider_config_mut().model = model.clone();
    }
    if let Some(api_key) = &args.api_key {
        config.translation.active_provider_config_mut().api_key = api_key.clone();
    }
    if let Some(source_language) = &args.source_language {
        config.source_language = source_language.clone();
    }
    if let Some(target_language) = &args.target_language {
        config.target_language = target_language.clone();
    }
    if args.mono {
        config.output.bilingual = false;
    }
    if args.retry_failed {
        config.translation.common.retry_failed = true;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(glossary) = &args.glossary {
        config.glossary.path = glossary.clone();
        config.glossary.enabled = true;
    }
    if args.no_glossary {
        config.glossary.enabled = false;
    }
    if let Some(output_dir) = &args.output_dir {
        config.output.output_dir = Some(output_dir.clone());
    }
}

async fn run_translate(args: TranslateArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, &args);
    config
        .validate()
        .map_err(|e| AppError::Config(format!("{:#}", e)))?;

    let controller = Controller::with_config(config)?;
    if let Err(e) = controller.test_connection().await {
        warn!("{:#}", e);
    }

    let stop = StopFlag::new();
    let ctrl_c_flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Stopping after the current chunk, progress is kept");
            ctrl_c_flag.stop();
        }
    });

    let mut options = RunOptions::from_config(controller.config());
    options.reset = args.reset;
    if options.mode == OutputMode::Mono {
        info!("Writing translation-only output");
    }

    let observer = ProgressBarObserver::new();
    let reports = controller.run(&args.paths, options, &observer, &stop).await?;

    let mut problems = 0;
    for report in &reports {
        match &report.outcome {
            DocumentOutcome::Translated { output, summary } => {
                let state = if summary.cancelled {
                    "stopped"
                } else if summary.failed > 0 {
                    "incomplete"
                } else {
                    "done"
                };
                info!(
                    "{} [{}] {}/{} units -> {}",
                    report.path.display(),
                    state,
                    summary.restored + summary.translated,
                    summary.total,
                    output.display()
                );
            }
            DocumentOutcome::Skipped(reason) | DocumentOutcome::Failed(reason) => {
                problems += 1;
                error!("{}: {}", report.path.display(), reason);
            }
        }
    }

    if problems > 0 {
        return Err(AppError::Incomplete {
            failed: problems,
            total: reports.len(),
        }
        .into());
    }
    Ok(())
}

fn run_estimate(paths: &[PathBuf]) -> Result<()> {
    let estimates = Controller::estimate(paths)?;
    let mut total_tokens = 0;
    for estimate in &estimates {
        println!(
            "{}\t{}\t{} units\t{} chars\t~{} tokens",
            estimate.path.display(),
            estimate.format,
            estimate.units,
            estimate.chars,
            estimate.approx_tokens
        );
        total_tokens += estimate.approx_tokens;
    }
    println!("{} document(s), ~{} tokens", estimates.len(), total_tokens);
    Ok(())
}

fn run_strip(input: &Path, output: Option<&Path>) -> Result<()> {
    let (output, report) = Controller::strip(input, output)?;
    info!(
        "{}: kept {} paragraphs, removed {} -> {}",
        input.display(),
        report.kept,
        report.removed,
        output.display()
    );
    Ok(())
}

async fn run_checkpoints(args: &ConfigArgs) -> Result<()> {
    let config = load_config(args)?;
    let store = CheckpointStore::open(config.checkpoint.database_path.as_deref())?;
    let checkpoints = store.list().await?;

    if checkpoints.is_empty() {
        println!("No recorded progress in {}", store.database_path().display());
        return Ok(());
    }
    for checkpoint in checkpoints {
        println!(
            "{}\t{}\t{}/{} units\t{}\t{}",
            checkpoint.path,
            checkpoint.target_language,
            checkpoint.completed_units,
            checkpoint.total_units,
            checkpoint.updated_at,
            &checkpoint.document_id[..checkpoint.document_id.len().min(12)]
        );
    }
    Ok(())
}
