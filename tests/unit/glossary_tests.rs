/*!
 * Tests for glossary filtering and term learning
 */

use std::fs;

use bookwai::translation::glossary::GLOSSARY_HEADER;
use bookwai::translation::GlossaryManager;

use crate::common;

#[test]
fn test_get_glossary_text_withMatchingTerms_shouldOnlyListPresentTerms() {
    let glossary = GlossaryManager::in_memory([("Alice", "愛麗絲"), ("Bob", "鮑勃"), ("Paris", "巴黎")], 500);

    let text = glossary.get_glossary_text("Paris was quiet when Alice arrived.", 100);

    assert_eq!(text, format!("{}\n- Paris → 巴黎\n- Alice → 愛麗絲", GLOSSARY_HEADER));
    assert!(!text.contains("Bob"));
    assert_eq!(glossary.get_glossary_text("Nobody here.", 100), "");
}

#[test]
fn test_get_glossary_text_withMaxItems_shouldTruncate() {
    let glossary = GlossaryManager::in_memory([("A1", "a"), ("B2", "b"), ("C3", "c")], 500);

    let entries = glossary.matching_entries("C3 B2 A1 C3", 2);

    assert_eq!(entries, vec![
        ("C3".to_string(), "c".to_string()),
        ("B2".to_string(), "b".to_string()),
    ]);
    assert!(glossary.matching_entries("C3", 0).is_empty());
}

#[test]
fn test_matching_entries_withOverlappingTerms_shouldPreferLongest() {
    let glossary = GlossaryManager::in_memory([("New York", "紐約"), ("York", "約克")], 500);

    let entries = glossary.matching_entries("She moved to New York.", 10);
    assert_eq!(entries, vec![("New York".to_string(), "紐約".to_string())]);
}

#[test]
fn test_load_withGlossaryFile_shouldLearnAndPersistNewTerms() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("nouns.json");

    let glossary = GlossaryManager::load(&path, 500);
    assert!(glossary.is_empty());
    assert_eq!(fs::read_to_string(&path).unwrap(), "{}");

    let answer = "Charlie traf Dana.\nNEW_TERMS: {\"Charlie\": \"Karl\", \"Dana\": \"Dana\"}";
    assert_eq!(glossary.extract_new_terms(answer), "Charlie traf Dana.");
    assert_eq!(glossary.get_term("Charlie").as_deref(), Some("Karl"));

    let reloaded = GlossaryManager::load(&path, 500);
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.has_term("Dana"));
    assert_eq!(reloaded.path(), Some(path.as_path()));
}

#[test]
fn test_update_withExistingTerm_shouldNotOverwrite() {
    let glossary = GlossaryManager::in_memory([("Alice", "Alicia")], 500);

    let added = glossary.update(vec![
        ("Alice".to_string(), "Alicja".to_string()),
        ("Bob".to_string(), "Roberto".to_string()),
        ("  ".to_string(), "blank".to_string()),
    ]);

    assert_eq!(added, 1);
    assert_eq!(glossary.get_term("Alice").as_deref(), Some("Alicia"));
    assert_eq!(glossary.get_term("Bob").as_deref(), Some("Roberto"));
}

#[test]
fn test_update_withFullGlossary_shouldStopLearning() {
    let glossary = GlossaryManager::in_memory([("One", "1")], 2);
    assert!(!glossary.is_full());

    let added = glossary.update(vec![
        ("Two".to_string(), "2".to_string()),
        ("Three".to_string(), "3".to_string()),
    ]);

    assert_eq!(added, 1);
    assert!(glossary.is_full());
    assert!(!glossary.has_term("Three"));
}

#[test]
fn test_extract_new_terms_withMalformedPayload_shouldKeepText() {
    let glossary = GlossaryManager::in_memory(Vec::<(String, String)>::new(), 500);

    let answer = "Text.\nNEW_TERMS: {not json}";
    assert_eq!(glossary.extract_new_terms(answer), answer);
    assert_eq!(glossary.extract_new_terms("No marker."), "No marker.");
    assert!(glossary.is_empty());
}

#[test]
fn test_load_withNonStringValues_shouldKeepOnlyStrings() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        temp_dir.path(),
        "nouns.json",
        r#"{"Alice": "愛麗絲", "Count": 3, "Empty": "", "Bob": null}"#,
    )
    .unwrap();

    let glossary = GlossaryManager::load(&path, 500);
    assert_eq!(glossary.len(), 1);
    assert!(glossary.has_term("Alice"));
}
