/*!
 * Core document model types for chunked translation.
 *
 * A `Document` owns an ordered sequence of `TranslationUnit`s plus the
 * format-specific `Layout` needed to write the document back. Units are
 * addressed by their stable index everywhere else (checkpoint, dispatcher).
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::srt::SrtBlock;
use super::zipped::ArchiveLayout;

/// Lowercase hex SHA-256 of the document bytes
pub type DocumentId = String;

/// Translation state of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Pending,
    Done,
    Failed,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Smallest independently translatable piece of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    /// Position in the document's unit sequence
    pub index: usize,

    /// Source text sent to the provider
    pub source: String,

    /// Translation, set only when the unit is done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,

    pub status: UnitStatus,
}

impl TranslationUnit {
    pub fn new(index: usize, source: impl Into<String>) -> Self {
        Self {
            index,
            source: source.into(),
            translated: None,
            status: UnitStatus::Pending,
        }
    }

    /// Render the unit for output, keeping the source when no translation exists
    pub fn render(&self, mode: OutputMode, separator: &str) -> String {
        match (mode, &self.translated) {
            (OutputMode::Bilingual, Some(translated)) => {
                format!("{}{}{}", self.source, separator, translated)
            }
            (OutputMode::Mono, Some(translated)) => translated.clone(),
            (_, None) => self.source.clone(),
        }
    }
}

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Txt,
    Srt,
    Markdown,
    Docx,
    Epub,
}

impl DocumentFormat {
    /// Detect the format from a file extension, case-insensitive
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Txt),
            "srt" => Some(Self::Srt),
            "md" | "markdown" => Some(Self::Markdown),
            "docx" => Some(Self::Docx),
            "epub" => Some(Self::Epub),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Txt => "TXT",
            Self::Srt => "SRT",
            Self::Markdown => "Markdown",
            Self::Docx => "DOCX",
            Self::Epub => "EPUB",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// How translations are written back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Source followed by its translation
    #[default]
    Bilingual,
    /// Translation replaces the source
    Mono,
}

/// One item of a plain-text layout
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// A translatable unit, by index
    Unit(usize),
    /// Text written back unchanged
    Verbatim(String),
}

/// Line terminator of a plain-text source, reused when writing it back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    /// CRLF when the content uses it, LF otherwise
    pub fn detect(content: &str) -> Self {
        if content.contains("\r\n") {
            Self::CrLf
        } else {
            Self::Lf
        }
    }

    /// Rewrite LF-joined text with this line ending
    pub fn apply(&self, text: String) -> String {
        match self {
            Self::Lf => text,
            Self::CrLf => text.replace("\r\n", "\n").replace('\n', "\r\n"),
        }
    }
}

/// Format-specific structure needed to serialize a document back
#[derive(Debug, Clone)]
pub enum Layout {
    Text {
        segments: Vec<Segment>,
        trailing_newline: bool,
        line_ending: LineEnding,
    },
    Subtitles {
        blocks: Vec<SrtBlock>,
        line_ending: LineEnding,
    },
    Archive(ArchiveLayout),
}

/// Unit totals by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitCounts {
    pub pending: usize,
    pub done: usize,
    pub failed: usize,
}

impl UnitCounts {
    pub fn total(&self) -> usize {
        self.pending + self.done + self.failed
    }
}

/// A loaded document with its units and layout
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub units: Vec<TranslationUnit>,
    pub layout: Layout,
}

impl Document {
    /// Units that still need a translation, in document order
    pub fn pending_units(&self) -> Vec<&TranslationUnit> {
        self.units
            .iter()
            .filter(|u| u.status == UnitStatus::Pending)
            .collect()
    }

    /// Record a translation; returns false when the index is unknown
    pub fn apply_translation(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.units.get_mut(index) {
            Some(unit) => {
                unit.translated = Some(text.into());
                unit.status = UnitStatus::Done;
                true
            }
            None => false,
        }
    }

    /// Mark a pending unit as failed; done units are left alone
    pub fn mark_failed(&mut self, index: usize) -> bool {
        match self.units.get_mut(index) {
            Some(unit) if unit.status == UnitStatus::Pending => {
                unit.status = UnitStatus::Failed;
                true
            }
            _ => false,
        }
    }

    /// Put every failed unit back to pending, returns how many were reset
    pub fn reset_failed(&mut self) -> usize {
        let mut reset = 0;
        for unit in self.units.iter_mut().filter(|u| u.status == UnitStatus::Failed) {
            unit.status = UnitStatus::Pending;
            reset += 1;
        }
        reset
    }

    pub fn counts(&self) -> UnitCounts {
        let mut counts = UnitCounts::default();
        for unit in &self.units {
            match unit.status {
                UnitStatus::Pending => counts.pending += 1,
                UnitStatus::Done => counts.done += 1,
                UnitStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Total number of source characters
    pub fn source_chars(&self) -> usize {
        self.units.iter().map(|u| u.source.chars().count()).sum()
    }

    pub(crate) fn unit(&self, index: usize) -> Option<&TranslationUnit> {
        self.units.get(index)
    }
}

/// Text that never goes to the provider: blank or digits only
pub fn is_special_text(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.chars().all(|c| c.is_ascii_digit())
}
