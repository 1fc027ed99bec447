//! Word documents: one unit per `w:p` paragraph of `word/document.xml`.

use quick_xml::events::{BytesStart, Event};

use super::markup::{walk_elements, Element, ElementRule, XmlWriter};
use super::model::{is_special_text, Document, Layout, OutputMode, TranslationUnit};
use super::zipped::{self, ArchiveLayout, PartUnits, UnitCursor};
use super::UnitCollector;
use crate::errors::{LoadError, TranslationError};

const DOCUMENT_PART: &str = "word/document.xml";
const TEXT_TAG: &[u8] = b"w:t";

fn is_paragraph(start: &BytesStart) -> bool {
    start.name().as_ref() == b"w:p"
}

const PARAGRAPHS: ElementRule = ElementRule {
    matches: is_paragraph,
    text_tag: Some(TEXT_TAG),
};

/// Read paragraphs of the main document part
pub fn parse(bytes: &[u8]) -> Result<(Vec<TranslationUnit>, Layout), LoadError> {
    let members = zipped::read_archive(bytes)?;
    let member = members
        .iter()
        .position(|m| m.name == DOCUMENT_PART)
        .ok_or_else(|| LoadError::Container(format!("missing {}", DOCUMENT_PART)))?;

    let mut collector = UnitCollector::default();
    walk_elements(DOCUMENT_PART, &members[member].data, &PARAGRAPHS, |element, _| {
        collector.push(element.text.trim());
        Ok(())
    })?;

    let parts = vec![PartUnits {
        member,
        first_unit: 0,
        count: collector.len(),
    }];
    let layout = Layout::Archive(ArchiveLayout { members, parts });
    Ok((collector.into_units(), layout))
}

/// Write the document back with translations injected
pub fn render(document: &Document, layout: &ArchiveLayout, mode: OutputMode) -> Result<Vec<u8>, TranslationError> {
    let members = zipped::rewrite_parts(document, layout, |member, units| {
        let mut cursor = UnitCursor::new(&member.name, units);
        let data = walk_elements(&member.name, &member.data, &PARAGRAPHS, |element, writer| {
            if is_special_text(&element.text) {
                return writer.write_all(&element.events);
            }
            let unit = cursor.next_unit()?;
            match (&unit.translated, mode) {
                (None, _) => writer.write_all(&element.events),
                (Some(translated), OutputMode::Mono) => replace_text(&element, translated, writer),
                (Some(translated), OutputMode::Bilingual) => append_translation(&element, translated, writer),
            }
        })?;
        cursor.finish()?;
        Ok(data)
    })?;

    Ok(zipped::write_archive(&members, None)?)
}

// First w:t receives the translation, the others are emptied
fn replace_text(element: &Element, translated: &str, writer: &mut XmlWriter) -> Result<(), LoadError> {
    let mut in_text = false;
    let mut injected = false;

    for event in &element.events {
        match event {
            Event::Start(start) if start.name().as_ref() == TEXT_TAG => {
                writer.write(event)?;
                in_text = true;
                if !injected {
                    writer.write_text(translated)?;
                    injected = true;
                }
            }
            Event::End(end) if end.name().as_ref() == TEXT_TAG => {
                in_text = false;
                writer.write(event)?;
            }
            Event::Text(_) | Event::CData(_) if in_text => {}
            _ => writer.write(event)?,
        }
    }
    Ok(())
}

// Source runs stay, then a break run and a run with the translation
fn append_translation(element: &Element, translated: &str, writer: &mut XmlWriter) -> Result<(), LoadError> {
    let Some((end, body)) = element.events.split_last() else {
        return Ok(());
    };
    writer.write_all(body)?;

    writer.start(BytesStart::new("w:r"))?;
    writer.empty("w:br")?;
    writer.end("w:r")?;

    writer.start(BytesStart::new("w:r"))?;
    writer.start(BytesStart::new("w:t").with_attributes([("xml:space", "preserve")]))?;
    writer.write_text(translated)?;
    writer.end("w:t")?;
    writer.end("w:r")?;

    writer.write(end)
}
