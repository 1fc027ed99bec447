/*!
 * Grouping of pending units into provider requests.
 */

use crate::document::TranslationUnit;

/// Group units in order into chunks of at most `max_chars` source characters
///
/// A unit longer than the limit is sent alone. Input order is kept both
/// across and inside chunks.
pub fn chunk_units(units: &[TranslationUnit], max_chars: usize) -> Vec<Vec<TranslationUnit>> {
    let mut chunks = Vec::new();
    let mut current: Vec<TranslationUnit> = Vec::new();
    let mut current_chars = 0;

    for unit in units {
        let chars = unit.source.chars().count();
        if !current.is_empty() && current_chars + chars > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push(unit.clone());
        current_chars += chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
