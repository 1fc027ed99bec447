//! SubRip subtitles: one unit per cue text, numbering and timing kept as is.

use once_cell::sync::Lazy;
use regex::Regex;

use super::model::{Layout, LineEnding, TranslationUnit};
use super::UnitCollector;

/// Separator between source and translation in bilingual cues
pub const BILINGUAL_SEPARATOR: &str = "\n";

// Blank line between blocks, possibly holding stray whitespace
static BLOCK_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n\s*\n").unwrap()
});

/// A block of an SRT file
#[derive(Debug, Clone, PartialEq)]
pub enum SrtBlock {
    /// Number and timing lines followed by the unit's text
    Cue { header: String, unit: usize },
    /// Malformed or untranslatable block written back unchanged
    Verbatim(String),
}

/// Split SRT content into cues
pub fn parse(content: &str) -> (Vec<TranslationUnit>, Layout) {
    let line_ending = LineEnding::detect(content);
    let normalized = content.replace("\r\n", "\n");
    let trimmed = normalized.trim();
    let mut collector = UnitCollector::default();
    let mut blocks = Vec::new();

    if !trimmed.is_empty() {
        for block in BLOCK_SEPARATOR.split(trimmed) {
            let lines: Vec<&str> = block.lines().collect();
            if lines.len() < 3 {
                blocks.push(SrtBlock::Verbatim(block.to_string()));
                continue;
            }

            let text = lines[2..].join("\n");
            match collector.push(&text) {
                Some(unit) => blocks.push(SrtBlock::Cue {
                    header: lines[..2].join("\n"),
                    unit,
                }),
                None => blocks.push(SrtBlock::Verbatim(block.to_string())),
            }
        }
    }

    (collector.into_units(), Layout::Subtitles { blocks, line_ending })
}
