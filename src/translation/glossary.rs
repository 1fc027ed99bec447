/*!
 * Glossary of proper nouns and terms, kept consistent across a book.
 *
 * The glossary is a flat JSON object `{ "term": "rendering" }` on disk. For
 * each request only the entries whose term occurs in the text are sent, and
 * the model may propose new entries through a trailing `NEW_TERMS: {...}`
 * marker. Existing entries are never overwritten.
 */

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::file_utils::FileManager;

/// Header line of the glossary block injected into prompts
pub const GLOSSARY_HEADER: &str = "Glossary (use these translations for the following terms):";

/// Default size after which no new terms are learned
pub const DEFAULT_MAX_TERMS: usize = 500;

// Marker the model appends at the very end of its answer
static NEW_TERMS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(NEW_TERMS:\s*)(\{.*?\})\s*$").unwrap()
});

struct GlossaryState {
    terms: BTreeMap<String, String>,
    /// Alternation of all terms, longest first
    matcher: Option<Regex>,
}

impl GlossaryState {
    fn new(terms: BTreeMap<String, String>) -> Self {
        let matcher = build_matcher(&terms);
        Self { terms, matcher }
    }
}

fn build_matcher(terms: &BTreeMap<String, String>) -> Option<Regex> {
    if terms.is_empty() {
        return None;
    }

    let mut keys: Vec<&String> = terms.keys().collect();
    keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
    let pattern = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");

    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!("Glossary matcher could not be built, falling back to plain search: {}", e);
            None
        }
    }
}

/// Shared, thread-safe glossary
pub struct GlossaryManager {
    /// Backing file, None for a glossary that is never saved
    path: Option<PathBuf>,
    max_terms: usize,
    state: RwLock<GlossaryState>,
}

impl std::fmt::Debug for GlossaryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlossaryManager")
            .field("path", &self.path)
            .field("terms", &self.len())
            .field("max_terms", &self.max_terms)
            .finish()
    }
}

impl GlossaryManager {
    /// Load the glossary at `path`
    ///
    /// A missing file is created empty. An unreadable or corrupt file is
    /// reported and the glossary starts empty; the file is left as is until
    /// the first new term is saved.
    pub fn load(path: &Path, max_terms: usize) -> Self {
        let terms = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, serde_json::Value>>(&content) {
                Ok(raw) => {
                    let terms: BTreeMap<String, String> = raw
                        .into_iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                        .filter(|(k, v)| !k.trim().is_empty() && !v.trim().is_empty())
                        .collect();
                    info!("Loaded glossary {:?} with {} terms", path, terms.len());
                    terms
                }
                Err(e) => {
                    warn!("Glossary {:?} is not a JSON object, starting empty: {}", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Err(e) = FileManager::write_atomic(path, b"{}") {
                    warn!("Could not create glossary {:?}: {:#}", path, e);
                } else {
                    info!("Created empty glossary {:?}", path);
                }
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Could not read glossary {:?}, starting empty: {}", path, e);
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path.to_path_buf()),
            max_terms,
            state: RwLock::new(GlossaryState::new(terms)),
        }
    }

    /// Glossary that lives in memory only
    pub fn in_memory<I, K, V>(terms: I, max_terms: usize) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let terms = terms.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self {
            path: None,
            max_terms,
            state: RwLock::new(GlossaryState::new(terms)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.state.read().terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the size cap stops new terms from being learned
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_terms
    }

    pub fn get_term(&self, term: &str) -> Option<String> {
        self.state.read().terms.get(term).cloned()
    }

    pub fn has_term(&self, term: &str) -> bool {
        self.state.read().terms.contains_key(term)
    }

    /// Entries relevant to `current_text`, formatted for the prompt
    ///
    /// Entries are ordered by first occurrence in the text; at most
    /// `max_items` are returned. Empty when nothing matches.
    pub fn get_glossary_text(&self, current_text: &str, max_items: usize) -> String {
        let entries = self.matching_entries(current_text, max_items);
        if entries.is_empty() {
            return String::new();
        }

        let mut text = String::from(GLOSSARY_HEADER);
        for (term, rendering) in entries {
            text.push_str(&format!("\n- {} → {}", term, rendering));
        }
        text
    }

    /// Matching `(term, rendering)` pairs in order of first occurrence
    pub fn matching_entries(&self, current_text: &str, max_items: usize) -> Vec<(String, String)> {
        let state = self.state.read();
        if state.terms.is_empty() || max_items == 0 {
            return Vec::new();
        }

        let mut found: Vec<(usize, &String)> = Vec::new();
        match &state.matcher {
            Some(matcher) => {
                for m in matcher.find_iter(current_text) {
                    if let Some((key, _)) = state.terms.get_key_value(m.as_str()) {
                        if !found.iter().any(|(_, k)| *k == key) {
                            found.push((m.start(), key));
                        }
                    }
                }
            }
            None => {
                for key in state.terms.keys() {
                    if let Some(position) = current_text.find(key.as_str()) {
                        found.push((position, key));
                    }
                }
                found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.len().cmp(&a.1.len())));
            }
        }

        found
            .into_iter()
            .take(max_items)
            .filter_map(|(_, key)| state.terms.get(key).map(|v| (key.clone(), v.clone())))
            .collect()
    }

    /// Strip a trailing `NEW_TERMS: {...}` marker and learn its entries
    ///
    /// Returns the answer without the marker. A marker whose payload is not
    /// a JSON object leaves the text untouched.
    pub fn extract_new_terms(&self, translated: &str) -> String {
        let Some(captures) = NEW_TERMS_PATTERN.captures(translated) else {
            return translated.to_string();
        };
        let (Some(whole), Some(payload)) = (captures.get(0), captures.get(2)) else {
            return translated.to_string();
        };

        match serde_json::from_str::<HashMap<String, serde_json::Value>>(payload.as_str()) {
            Ok(raw) => {
                let new_terms: Vec<(String, String)> = raw
                    .into_iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                    .collect();
                self.update(new_terms);
                translated[..whole.start()].trim_end().to_string()
            }
            Err(e) => {
                debug!("Ignoring malformed NEW_TERMS marker: {}", e);
                translated.to_string()
            }
        }
    }

    /// Add new entries, keeping existing ones, until the size cap is reached
    ///
    /// Returns how many entries were added. The file is rewritten when
    /// anything changed.
    pub fn update<I>(&self, new_terms: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut state = self.state.write();
        let mut added = 0;

        for (term, rendering) in new_terms {
            let (term, rendering) = (term.trim(), rendering.trim());
            if term.is_empty() || rendering.is_empty() || state.terms.contains_key(term) {
                continue;
            }
            if state.terms.len() >= self.max_terms {
                debug!("Glossary is full ({} terms), ignoring new terms", self.max_terms);
                break;
            }
            state.terms.insert(term.to_string(), rendering.to_string());
            added += 1;
        }

        if added > 0 {
            state.matcher = build_matcher(&state.terms);
            info!("Glossary learned {} new terms ({} total)", added, state.terms.len());
            if let Some(path) = &self.path {
                self.save(path, &state.terms);
            }
        }
        added
    }

    fn save(&self, path: &Path, terms: &BTreeMap<String, String>) {
        let json = match serde_json::to_string_pretty(terms) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not serialize glossary: {}", e);
                return;
            }
        };
        if let Err(e) = FileManager::write_atomic(path, json.as_bytes()) {
            warn!("Could not save glossary {:?}: {:#}", path, e);
        }
    }
}
