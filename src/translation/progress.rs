/*!
 * Progress reporting and cooperative cancellation.
 */

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::Level;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::document::UnitStatus;

use super::pipeline::RunSummary;

/// Receives progress events from running documents
///
/// All methods default to no-ops. Several documents may report at the
/// same time, so every event carries the document path.
pub trait ProgressObserver: Send + Sync {
    fn on_document_started(&self, _path: &Path, _total_units: usize, _restored: usize) {}

    fn on_unit_finished(&self, _path: &Path, _index: usize, _status: UnitStatus) {}

    fn on_log(&self, _path: &Path, _level: Level, _message: &str) {}

    fn on_document_finished(&self, _path: &Path, _summary: &RunSummary) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {}

/// Shared flag asking running documents to stop between chunks
#[derive(Debug, Default, Clone)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One terminal progress bar per running document
pub struct ProgressBarObserver {
    multi_progress: MultiProgress,
    bars: Mutex<HashMap<PathBuf, ProgressBar>>,
}

impl Default for ProgressBarObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBarObserver {
    pub fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} units ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░")
    }

    fn with_bar(&self, path: &Path, f: impl FnOnce(&ProgressBar)) {
        if let Some(bar) = self.bars.lock().get(path) {
            f(bar);
        }
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_document_started(&self, path: &Path, total_units: usize, restored: usize) {
        let bar = self.multi_progress.add(ProgressBar::new(total_units as u64));
        bar.set_style(Self::style());
        bar.set_position(restored as u64);
        let name = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        bar.set_message(name);
        self.bars.lock().insert(path.to_path_buf(), bar);
    }

    fn on_unit_finished(&self, path: &Path, _index: usize, status: UnitStatus) {
        // failed units may still be translated by a retry pass
        if status == UnitStatus::Done {
            self.with_bar(path, |bar| bar.inc(1));
        }
    }

    fn on_log(&self, path: &Path, level: Level, message: &str) {
        if level <= Level::Warn {
            self.with_bar(path, |bar| bar.set_message(message.to_string()));
        }
    }

    fn on_document_finished(&self, path: &Path, _summary: &RunSummary) {
        if let Some(bar) = self.bars.lock().remove(path) {
            bar.finish_and_clear();
        }
    }
}
