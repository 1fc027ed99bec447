//! EPUB books: one unit per `p`/`h1`..`h6` element of every XHTML member.

use quick_xml::events::BytesStart;

use super::markup::{walk_elements, Element, ElementRule, XmlWriter};
use super::model::{is_special_text, Document, Layout, OutputMode, TranslationUnit};
use super::zipped::{self, ArchiveLayout, PartUnits, UnitCursor};
use super::UnitCollector;
use crate::errors::{LoadError, TranslationError};

/// Member written first and uncompressed, as the container format requires
pub const MIMETYPE: &str = "mimetype";

pub(crate) fn is_content_member(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".xhtml") || lower.ends_with(".html") || lower.ends_with(".htm")
}

fn is_text_block(start: &BytesStart) -> bool {
    matches!(
        start.local_name().as_ref(),
        b"p" | b"h1" | b"h2" | b"h3" | b"h4" | b"h5" | b"h6"
    )
}

const TEXT_BLOCKS: ElementRule = ElementRule {
    matches: is_text_block,
    text_tag: None,
};

/// Read text blocks of every content document, in archive order
pub fn parse(bytes: &[u8]) -> Result<(Vec<TranslationUnit>, Layout), LoadError> {
    let members = zipped::read_archive(bytes)?;
    let mut collector = UnitCollector::default();
    let mut parts = Vec::new();

    for (position, member) in members.iter().enumerate() {
        if member.is_dir || !is_content_member(&member.name) {
            continue;
        }

        let first_unit = collector.len();
        walk_elements(&member.name, &member.data, &TEXT_BLOCKS, |element, _| {
            collector.push(&element.collapsed_text());
            Ok(())
        })?;

        let count = collector.len() - first_unit;
        if count > 0 {
            parts.push(PartUnits { member: position, first_unit, count });
        }
    }

    let layout = Layout::Archive(ArchiveLayout { members, parts });
    Ok((collector.into_units(), layout))
}

/// Write the book back with translations injected
pub fn render(document: &Document, layout: &ArchiveLayout, mode: OutputMode) -> Result<Vec<u8>, TranslationError> {
    let members = zipped::rewrite_parts(document, layout, |member, units| {
        let mut cursor = UnitCursor::new(&member.name, units);
        let data = walk_elements(&member.name, &member.data, &TEXT_BLOCKS, |element, writer| {
            if is_special_text(&element.collapsed_text()) {
                return writer.write_all(&element.events);
            }
            let unit = cursor.next_unit()?;
            match (&unit.translated, mode) {
                (None, _) => writer.write_all(&element.events),
                (Some(translated), OutputMode::Mono) => replace_content(&element, translated, writer),
                (Some(translated), OutputMode::Bilingual) => append_copy(&element, translated, writer),
            }
        })?;
        cursor.finish()?;
        Ok(data)
    })?;

    Ok(zipped::write_archive(&members, Some(MIMETYPE))?)
}

fn replace_content(element: &Element, translated: &str, writer: &mut XmlWriter) -> Result<(), LoadError> {
    let (Some(start), Some(end)) = (element.events.first(), element.events.last()) else {
        return Ok(());
    };
    writer.write(start)?;
    writer.write_text(translated)?;
    writer.write(end)
}

// The copy keeps the tag and attributes of the source element
fn append_copy(element: &Element, translated: &str, writer: &mut XmlWriter) -> Result<(), LoadError> {
    writer.write_all(&element.events)?;
    replace_content(element, translated, writer)
}
