//! Markdown documents: blank-line paragraphs, headings on their own,
//! fenced code blocks never translated.

use super::model::{Layout, LineEnding, Segment, TranslationUnit};
use super::UnitCollector;

/// Separator between source and translation in bilingual paragraphs
pub const BILINGUAL_SEPARATOR: &str = "\n\n";

const FENCES: [&str; 2] = ["```", "~~~"];

fn fence_of(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    FENCES.into_iter().find(|fence| trimmed.starts_with(fence))
}

/// Split markdown into paragraphs
pub fn parse(content: &str) -> (Vec<TranslationUnit>, Layout) {
    let mut collector = UnitCollector::default();
    let mut segments = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut fence: Option<(&'static str, Vec<&str>)> = None;

    let flush = |paragraph: &mut Vec<&str>, collector: &mut UnitCollector, segments: &mut Vec<Segment>| {
        if !paragraph.is_empty() {
            segments.push(collector.segment(&paragraph.join("\n")));
            paragraph.clear();
        }
    };

    for line in content.lines() {
        if let Some((marker, lines)) = fence.as_mut() {
            lines.push(line);
            if lines.len() > 1 && line.trim_start().starts_with(*marker) {
                segments.push(Segment::Verbatim(lines.join("\n")));
                fence = None;
            }
            continue;
        }

        if let Some(marker) = fence_of(line) {
            flush(&mut paragraph, &mut collector, &mut segments);
            fence = Some((marker, vec![line]));
        } else if line.trim().is_empty() {
            flush(&mut paragraph, &mut collector, &mut segments);
        } else if line.trim_start().starts_with('#') {
            flush(&mut paragraph, &mut collector, &mut segments);
            segments.push(collector.segment(line));
        } else {
            paragraph.push(line);
        }
    }

    flush(&mut paragraph, &mut collector, &mut segments);
    if let Some((_, lines)) = fence {
        // unterminated fence runs to the end of the file
        segments.push(Segment::Verbatim(lines.join("\n")));
    }

    let layout = Layout::Text {
        segments,
        trailing_newline: content.ends_with('\n'),
        line_ending: LineEnding::detect(content),
    };
    (collector.into_units(), layout)
}
