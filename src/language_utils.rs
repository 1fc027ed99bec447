//! Language utilities for language tag handling
//!
//! Tags are ISO 639-1 (2-letter) or ISO 639-2 (3-letter) codes, optionally
//! followed by script or region subtags (`zh-Hant`, `pt-BR`). Only the
//! primary subtag is validated against the ISO tables. Chinese script
//! subtags are rendered into the language name so the prompt names the script.

use anyhow::{Result, anyhow};
use isolang::Language;

/// ISO 639-2/B codes that differ from their 639-2/T counterpart
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Split a tag into its primary language subtag and the optional remainder
pub fn split_tag(tag: &str) -> (String, Option<String>) {
    let trimmed = tag.trim();
    match trimmed.split_once(['-', '_']) {
        Some((primary, rest)) if !rest.is_empty() => (primary.to_lowercase(), Some(rest.to_lowercase())),
        _ => (trimmed.to_lowercase(), None),
    }
}

/// Normalize the primary subtag of a tag to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let (primary, _) = split_tag(code);

    if primary.len() == 2 {
        if let Some(lang) = Language::from_639_1(&primary) {
            return Ok(lang.to_639_3().to_string());
        }
    } else if primary.len() == 3 {
        if Language::from_639_3(&primary).is_some() {
            return Ok(primary);
        }
        if let Some((_, part2t)) = PART2B_TO_PART2T.iter().find(|(b, _)| *b == primary) {
            return Ok(part2t.to_string());
        }
    }

    Err(anyhow!("Invalid language code: {}", code))
}

/// Check if two language tags name the same primary language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name for a tag, including Chinese script variants
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;
    let name = lang.to_name().to_string();

    let (_, subtag) = split_tag(code);
    let name = match (normalized.as_str(), subtag.as_deref()) {
        ("zho", Some("hant" | "tw" | "hk")) => "Traditional Chinese".to_string(),
        ("zho", Some("hans" | "cn" | "sg")) => "Simplified Chinese".to_string(),
        (_, Some(region)) => format!("{} ({})", name, region.to_uppercase()),
        (_, None) => name,
    };

    Ok(name)
}
