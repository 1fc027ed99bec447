/*!
 * Turn a bilingual EPUB into a mono-lingual one.
 *
 * Bilingual books keep each source paragraph next to its translation. This
 * pass drops the `p` elements that read as untranslated Latin-script source,
 * everything else in the book is left untouched.
 */

use log::info;
use quick_xml::events::BytesStart;
use std::path::Path;

use super::epub::{is_content_member, MIMETYPE};
use super::markup::{walk_elements, ElementRule};
use super::zipped;
use crate::errors::{LoadError, PersistenceError, TranslationError};
use crate::file_utils::FileManager;

/// Share of ASCII letters above which a paragraph counts as source text
const SOURCE_LETTER_RATIO: f64 = 0.7;

/// Paragraph counts of a strip pass, empty paragraphs are kept but not counted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripReport {
    pub kept: usize,
    pub removed: usize,
}

fn is_paragraph(start: &BytesStart) -> bool {
    start.local_name().as_ref() == b"p"
}

const PARAGRAPHS: ElementRule = ElementRule {
    matches: is_paragraph,
    text_tag: None,
};

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Whether a paragraph is untranslated source text
///
/// True when it holds no CJK ideograph and more than 70% of its letters are
/// ASCII. Whitespace, punctuation and digits are ignored; a paragraph with
/// nothing left is kept.
pub fn is_source_paragraph(text: &str) -> bool {
    if text.chars().any(is_cjk) {
        return false;
    }

    let letters: Vec<char> = text
        .chars()
        .filter(|c| c.is_alphanumeric() && !c.is_numeric())
        .collect();
    if letters.is_empty() {
        return false;
    }

    let ascii = letters.iter().filter(|c| c.is_ascii_alphabetic()).count();
    ascii as f64 / letters.len() as f64 > SOURCE_LETTER_RATIO
}

/// Default output path: `{stem}_Single.epub` next to the input
pub fn default_output_path(input: &Path) -> std::path::PathBuf {
    FileManager::generate_output_path(input, None, "Single")
}

/// Remove source paragraphs from a bilingual EPUB and write the result to `output`
pub fn strip_bilingual_epub(input: &Path, output: &Path) -> Result<StripReport, TranslationError> {
    let bytes = std::fs::read(input).map_err(|source| LoadError::Io {
        path: input.display().to_string(),
        source,
    })?;
    let mut members = zipped::read_archive(&bytes)?;
    let mut report = StripReport::default();

    for member in members.iter_mut().filter(|m| !m.is_dir && is_content_member(&m.name)) {
        member.data = walk_elements(&member.name, &member.data, &PARAGRAPHS, |element, writer| {
            if element.text.trim().is_empty() {
                writer.write_all(&element.events)
            } else if is_source_paragraph(&element.text) {
                report.removed += 1;
                Ok(())
            } else {
                report.kept += 1;
                writer.write_all(&element.events)
            }
        })?;
    }

    let data = zipped::write_archive(&members, Some(MIMETYPE))?;
    FileManager::write_atomic(output, &data).map_err(|e| PersistenceError::Write {
        path: output.display().to_string(),
        message: format!("{:#}", e),
    })?;

    info!(
        "Stripped {}: removed {} source paragraphs, kept {}",
        input.display(),
        report.removed,
        report.kept
    );
    Ok(report)
}
