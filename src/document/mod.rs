/*!
 * Document loading and reassembly.
 *
 * `load` turns a file into a `Document` of translation units, `save` writes
 * the document back with its translations, either next to the source text
 * (bilingual) or in place of it (mono).
 *
 * Supported formats: TXT, SRT, Markdown, DOCX, EPUB.
 */

pub mod docx;
pub mod epub;
pub mod markdown;
mod markup;
pub mod model;
pub mod srt;
pub mod strip;
pub mod txt;
pub mod zipped;

use log::debug;
use std::path::Path;

pub use model::{
    is_special_text, Document, DocumentFormat, DocumentId, Layout, LineEnding, OutputMode, Segment,
    TranslationUnit, UnitCounts, UnitStatus,
};
pub use strip::{strip_bilingual_epub, StripReport};

use crate::errors::{LoadError, PersistenceError, TranslationError};
use crate::file_utils::FileManager;
use srt::SrtBlock;

/// Assigns consecutive indices to translatable text
#[derive(Default)]
pub(crate) struct UnitCollector {
    units: Vec<TranslationUnit>,
}

impl UnitCollector {
    /// Add `source` as a unit unless it is special text
    pub fn push(&mut self, source: &str) -> Option<usize> {
        if is_special_text(source) {
            return None;
        }
        let index = self.units.len();
        self.units.push(TranslationUnit::new(index, source));
        Some(index)
    }

    /// Layout segment for `source`, verbatim when it is special text
    pub fn segment(&mut self, source: &str) -> Segment {
        match self.push(source) {
            Some(index) => Segment::Unit(index),
            None => Segment::Verbatim(source.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn into_units(self) -> Vec<TranslationUnit> {
        self.units
    }
}

fn decode_text(bytes: &[u8]) -> Result<&str, LoadError> {
    let text = std::str::from_utf8(bytes).map_err(|e| LoadError::Encoding(e.to_string()))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Load a document and split it into translation units
pub fn load(path: &Path) -> Result<Document, LoadError> {
    let format = DocumentFormat::from_path(path)
        .ok_or_else(|| LoadError::UnsupportedFormat(path.display().to_string()))?;
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let (units, layout) = match format {
        DocumentFormat::Txt => txt::parse(decode_text(&bytes)?),
        DocumentFormat::Srt => srt::parse(decode_text(&bytes)?),
        DocumentFormat::Markdown => markdown::parse(decode_text(&bytes)?),
        DocumentFormat::Docx => docx::parse(&bytes)?,
        DocumentFormat::Epub => epub::parse(&bytes)?,
    };

    debug!("Loaded {} ({}): {} units", path.display(), format, units.len());

    Ok(Document {
        id: FileManager::sha256_hex(&bytes),
        path: path.to_path_buf(),
        format,
        units,
        layout,
    })
}

fn missing_unit(document: &Document, index: usize) -> LoadError {
    LoadError::Markup {
        part: document.path.display().to_string(),
        message: format!("layout refers to missing unit {}", index),
    }
}

fn bilingual_separator(format: DocumentFormat) -> &'static str {
    match format {
        DocumentFormat::Markdown => markdown::BILINGUAL_SEPARATOR,
        DocumentFormat::Srt => srt::BILINGUAL_SEPARATOR,
        _ => txt::BILINGUAL_SEPARATOR,
    }
}

/// Serialize a document with its current translations
///
/// Units without a translation (failed or still pending) keep their source text.
pub fn render(document: &Document, mode: OutputMode) -> Result<Vec<u8>, TranslationError> {
    let separator = bilingual_separator(document.format);

    match &document.layout {
        Layout::Text { segments, trailing_newline, line_ending } => {
            let mut blocks = Vec::with_capacity(segments.len());
            for segment in segments {
                match segment {
                    Segment::Unit(index) => {
                        let unit = document.unit(*index).ok_or_else(|| missing_unit(document, *index))?;
                        blocks.push(unit.render(mode, separator));
                    }
                    Segment::Verbatim(text) => blocks.push(text.clone()),
                }
            }
            let mut output = blocks.join("\n\n");
            if *trailing_newline && !output.is_empty() {
                output.push('\n');
            }
            Ok(line_ending.apply(output).into_bytes())
        }
        Layout::Subtitles { blocks, line_ending } => {
            let mut rendered = Vec::with_capacity(blocks.len());
            for block in blocks {
                match block {
                    SrtBlock::Cue { header, unit } => {
                        let unit = document.unit(*unit).ok_or_else(|| missing_unit(document, *unit))?;
                        rendered.push(format!("{}\n{}", header, unit.render(mode, separator)));
                    }
                    SrtBlock::Verbatim(text) => rendered.push(text.clone()),
                }
            }
            let mut output = rendered.join("\n\n");
            if !output.is_empty() {
                output.push('\n');
            }
            Ok(line_ending.apply(output).into_bytes())
        }
        Layout::Archive(archive) => match document.format {
            DocumentFormat::Docx => docx::render(document, archive, mode),
            _ => epub::render(document, archive, mode),
        },
    }
}

/// Serialize a document and write it atomically to `path`
pub fn save(document: &Document, path: &Path, mode: OutputMode) -> Result<(), TranslationError> {
    let bytes = render(document, mode)?;
    FileManager::write_atomic(path, &bytes).map_err(|e| PersistenceError::Write {
        path: path.display().to_string(),
        message: format!("{:#}", e),
    })?;
    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
