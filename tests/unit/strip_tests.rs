/*!
 * Tests for turning bilingual EPUBs into mono-lingual ones
 */

use std::fs;

use bookwai::document::strip::{default_output_path, is_source_paragraph};
use bookwai::document::{strip_bilingual_epub, StripReport};

use crate::common;

#[test]
fn test_strip_withBilingualBook_shouldDropSourceParagraphs() {
    let temp_dir = common::create_temp_dir().unwrap();
    let input = temp_dir.path().join("novel_bili.epub");
    let bytes = common::build_epub(&[
        (
            "OEBPS/ch1.xhtml",
            common::chapter("<h1>Chapter 1</h1><p>Alice went home.</p><p>爱丽丝回家了。</p><p>***</p>"),
        ),
        (
            "OEBPS/ch2.xhtml",
            common::chapter("<p>The end.</p><p>完。</p>"),
        ),
    ])
    .unwrap();
    fs::write(&input, bytes).unwrap();

    let output = temp_dir.path().join("novel_Single.epub");
    let report = strip_bilingual_epub(&input, &output).unwrap();

    assert_eq!(report, StripReport { kept: 3, removed: 2 });

    let stripped = fs::read(&output).unwrap();
    let ch1 = common::read_zip_member(&stripped, "OEBPS/ch1.xhtml").unwrap();
    assert!(ch1.contains("<h1>Chapter 1</h1>"));
    assert!(ch1.contains("<p>爱丽丝回家了。</p>"));
    assert!(ch1.contains("<p>***</p>"));
    assert!(!ch1.contains("Alice went home."));

    let ch2 = common::read_zip_member(&stripped, "OEBPS/ch2.xhtml").unwrap();
    assert!(!ch2.contains("The end."));
    assert!(ch2.contains("完。"));

    assert_eq!(common::zip_member_names(&stripped).unwrap()[0], "mimetype");
}

#[test]
fn test_strip_withEmptyParagraphs_shouldKeepThemWithoutCounting() {
    let temp_dir = common::create_temp_dir().unwrap();
    let input = temp_dir.path().join("spaced_bili.epub");
    let bytes = common::build_epub(&[(
        "OEBPS/ch1.xhtml",
        common::chapter("<p>Hello.</p><p>你好。</p><p></p><p>   </p>"),
    )])
    .unwrap();
    fs::write(&input, bytes).unwrap();

    let output = temp_dir.path().join("spaced_Single.epub");
    let report = strip_bilingual_epub(&input, &output).unwrap();

    assert_eq!(report, StripReport { kept: 1, removed: 1 });
    let ch1 = common::read_zip_member(&fs::read(&output).unwrap(), "OEBPS/ch1.xhtml").unwrap();
    assert!(ch1.contains("<p>你好。</p>"));
    assert!(!ch1.contains("Hello."));
}

#[test]
fn test_strip_withMissingInput_shouldFail() {
    let temp_dir = common::create_temp_dir().unwrap();
    let result = strip_bilingual_epub(
        &temp_dir.path().join("missing.epub"),
        &temp_dir.path().join("out.epub"),
    );
    assert!(result.is_err());
    assert!(!temp_dir.path().join("out.epub").exists());
}

#[test]
fn test_is_source_paragraph_withMixedScripts_shouldUseRatio() {
    // Mostly Latin with a few accented letters still counts as source
    assert!(is_source_paragraph("Café au lait, s'il vous plaît"));
    // Mostly Cyrillic does not
    assert!(!is_source_paragraph("Это текст with a few words"));
}

#[test]
fn test_default_output_path_withEpub_shouldUseSingleSuffix() {
    let path = default_output_path(std::path::Path::new("/books/novel_bili.epub"));
    assert_eq!(path, std::path::PathBuf::from("/books/novel_bili_Single.epub"));
}
