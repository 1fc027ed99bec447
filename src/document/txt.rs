//! Plain text documents: one unit per non-empty line.

use super::model::{Layout, LineEnding, TranslationUnit};
use super::UnitCollector;

/// Separator between source and translation in bilingual output
pub const BILINGUAL_SEPARATOR: &str = "\n";

/// Split text into line units
pub fn parse(content: &str) -> (Vec<TranslationUnit>, Layout) {
    let mut collector = UnitCollector::default();
    let mut segments = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        segments.push(collector.segment(line));
    }

    let layout = Layout::Text {
        segments,
        trailing_newline: content.ends_with('\n'),
        line_ending: LineEnding::detect(content),
    };
    (collector.into_units(), layout)
}
