/*!
 * Tests for document loading and reassembly
 */

use std::fs;

use bookwai::document::{self, Document, DocumentFormat, OutputMode, UnitStatus};
use bookwai::errors::LoadError;

use crate::common;

/// Give every unit a translation of `prefix` + source
fn translate_all(document: &mut Document, prefix: &str) {
    let translations: Vec<(usize, String)> = document
        .units
        .iter()
        .map(|u| (u.index, format!("{}{}", prefix, u.source)))
        .collect();
    for (index, text) in translations {
        document.apply_translation(index, text);
    }
}

fn rendered(document: &Document, mode: OutputMode) -> String {
    String::from_utf8(document::render(document, mode).unwrap()).unwrap()
}

#[test]
fn test_load_txt_withParagraphs_shouldCreateOneUnitPerLine() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        temp_dir.path(),
        "story.txt",
        "\u{feff}It was a dark night.\n\n2024\n\nThe end.\n",
    )
    .unwrap();

    let doc = document::load(&path).unwrap();

    assert_eq!(doc.format, DocumentFormat::Txt);
    assert_eq!(doc.units.len(), 2);
    assert_eq!(doc.units[0].source, "It was a dark night.");
    assert_eq!(doc.units[1].source, "The end.");
    assert!(doc.units.iter().all(|u| u.status == UnitStatus::Pending));
    assert_eq!(doc.id.len(), 64);
}

#[test]
fn test_render_txt_withTranslations_shouldHonorOutputMode() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(temp_dir.path(), "a.txt", "One.\n\n7\n\nTwo.\n").unwrap();
    let mut doc = document::load(&path).unwrap();

    // Nothing translated yet: the source comes back
    assert_eq!(rendered(&doc, OutputMode::Mono), "One.\n\n7\n\nTwo.\n");

    translate_all(&mut doc, "T:");
    assert_eq!(rendered(&doc, OutputMode::Mono), "T:One.\n\n7\n\nT:Two.\n");
    assert_eq!(
        rendered(&doc, OutputMode::Bilingual),
        "One.\nT:One.\n\n7\n\nTwo.\nT:Two.\n"
    );
}

#[test]
fn test_render_srt_withTranslations_shouldKeepTimings() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_subtitle(temp_dir.path(), "movie.srt").unwrap();
    let mut doc = document::load(&path).unwrap();
    assert_eq!(doc.units.len(), 3);

    doc.apply_translation(1, "Es enthält mehrere Einträge.");
    let mono = rendered(&doc, OutputMode::Mono);
    assert!(mono.contains("2\n00:00:05,000 --> 00:00:09,000\nEs enthält mehrere Einträge.\n"));
    assert!(mono.contains("1\n00:00:01,000 --> 00:00:04,000\nThis is a test subtitle.\n"));

    let bilingual = rendered(&doc, OutputMode::Bilingual);
    assert!(bilingual.contains("It contains multiple entries.\nEs enthält mehrere Einträge."));
}

#[test]
fn test_render_srt_withCrlfInput_shouldKeepCrlfInBilingualCues() {
    let temp_dir = common::create_temp_dir().unwrap();
    let content = "1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\n\r\n2\r\n00:00:03,000 --> 00:00:04,000\r\nBye\r\n";
    let path = common::create_test_file(temp_dir.path(), "crlf.srt", content).unwrap();
    let mut doc = document::load(&path).unwrap();
    translate_all(&mut doc, "T:");

    assert_eq!(
        rendered(&doc, OutputMode::Bilingual),
        "1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\nT:Hi\r\n\r\n2\r\n00:00:03,000 --> 00:00:04,000\r\nBye\r\nT:Bye\r\n"
    );
}

#[test]
fn test_render_markdown_withCodeFence_shouldLeaveCodeUntouched() {
    let temp_dir = common::create_temp_dir().unwrap();
    let content = "# Intro\n\nSome text here.\n\n```\nfn main() {}\n```\n";
    let path = common::create_test_file(temp_dir.path(), "doc.md", content).unwrap();
    let mut doc = document::load(&path).unwrap();
    assert_eq!(doc.format, DocumentFormat::Markdown);
    assert_eq!(doc.units.len(), 2);

    translate_all(&mut doc, "T:");
    assert_eq!(
        rendered(&doc, OutputMode::Mono),
        "T:# Intro\n\nT:Some text here.\n\n```\nfn main() {}\n```\n"
    );
    assert!(rendered(&doc, OutputMode::Bilingual).contains("Some text here.\n\nT:Some text here."));
}

#[test]
fn test_load_docx_withParagraphs_shouldSkipNumbersOnly() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("letter.docx");
    fs::write(&path, common::build_docx(&["Dear Alice,", "12", "Kind regards"]).unwrap()).unwrap();

    let doc = document::load(&path).unwrap();

    assert_eq!(doc.format, DocumentFormat::Docx);
    let sources: Vec<&str> = doc.units.iter().map(|u| u.source.as_str()).collect();
    assert_eq!(sources, vec!["Dear Alice,", "Kind regards"]);
}

#[test]
fn test_render_docx_withTranslations_shouldInjectText() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("letter.docx");
    fs::write(&path, common::build_docx(&["Hello", "12", "Goodbye"]).unwrap()).unwrap();
    let mut doc = document::load(&path).unwrap();
    translate_all(&mut doc, "T:");

    let mono = document::render(&doc, OutputMode::Mono).unwrap();
    let xml = common::read_zip_member(&mono, "word/document.xml").unwrap();
    assert!(xml.contains("<w:t>T:Hello</w:t>"));
    assert!(xml.contains("<w:t>12</w:t>"));
    assert!(!xml.contains("<w:t>Hello</w:t>"));

    let bilingual = document::render(&doc, OutputMode::Bilingual).unwrap();
    let xml = common::read_zip_member(&bilingual, "word/document.xml").unwrap();
    assert!(xml.contains("<w:t>Goodbye</w:t>"));
    assert!(xml.contains("<w:br/>"));
    assert!(xml.contains(r#"<w:t xml:space="preserve">T:Goodbye</w:t>"#));

    // Untouched members survive
    assert!(common::read_zip_member(&bilingual, "[Content_Types].xml").is_ok());
}

#[test]
fn test_load_epub_withChapters_shouldNumberUnitsAcrossMembers() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("book.epub");
    let bytes = common::build_epub(&[
        ("OEBPS/ch1.xhtml", common::chapter("<h1>Chapter One</h1><p>Hello <b>world</b>.</p><p>42</p>")),
        ("OEBPS/style.css", "p { margin: 0 }".to_string()),
        ("OEBPS/ch2.xhtml", common::chapter("<p>  Second \n  chapter </p>")),
    ])
    .unwrap();
    fs::write(&path, bytes).unwrap();

    let doc = document::load(&path).unwrap();

    let sources: Vec<&str> = doc.units.iter().map(|u| u.source.as_str()).collect();
    assert_eq!(sources, vec!["Chapter One", "Hello world.", "Second chapter"]);
    assert_eq!(doc.units[2].index, 2);
}

#[test]
fn test_render_epub_withTranslations_shouldKeepMimetypeFirst() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("book.epub");
    let bytes = common::build_epub(&[(
        "OEBPS/ch1.xhtml",
        common::chapter(r#"<h1>Chapter One</h1><p class="x">Hello <b>world</b>.</p><p>42</p>"#),
    )])
    .unwrap();
    fs::write(&path, bytes).unwrap();
    let mut doc = document::load(&path).unwrap();
    translate_all(&mut doc, "T:");

    let mono = document::render(&doc, OutputMode::Mono).unwrap();
    let names = common::zip_member_names(&mono).unwrap();
    assert_eq!(names[0], "mimetype");
    let xhtml = common::read_zip_member(&mono, "OEBPS/ch1.xhtml").unwrap();
    assert!(xhtml.contains("<h1>T:Chapter One</h1>"));
    assert!(xhtml.contains(r#"<p class="x">T:Hello world.</p>"#));
    assert!(xhtml.contains("<p>42</p>"));
    assert!(!xhtml.contains("<b>world</b>"));

    let bilingual = document::render(&doc, OutputMode::Bilingual).unwrap();
    let xhtml = common::read_zip_member(&bilingual, "OEBPS/ch1.xhtml").unwrap();
    assert!(xhtml.contains(r#"<p class="x">Hello <b>world</b>.</p><p class="x">T:Hello world.</p>"#));
    assert_eq!(common::read_zip_member(&bilingual, "mimetype").unwrap(), "application/epub+zip");
}

#[test]
fn test_load_withUnsupportedExtension_shouldFail() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(temp_dir.path(), "slides.pptx", "x").unwrap();
    assert!(matches!(document::load(&path), Err(LoadError::UnsupportedFormat(_))));
}

#[test]
fn test_load_withBrokenInputs_shouldReportLoadErrors() {
    let temp_dir = common::create_temp_dir().unwrap();

    let latin1 = temp_dir.path().join("latin1.txt");
    fs::write(&latin1, [0x63, 0x61, 0x66, 0xe9]).unwrap();
    assert!(matches!(document::load(&latin1), Err(LoadError::Encoding(_))));

    let fake = common::create_test_file(temp_dir.path(), "fake.epub", "not a zip").unwrap();
    assert!(matches!(document::load(&fake), Err(LoadError::Container(_))));

    let no_body = temp_dir.path().join("empty.docx");
    fs::write(&no_body, common::build_zip(&[("[Content_Types].xml", "<Types/>")]).unwrap()).unwrap();
    assert!(matches!(document::load(&no_body), Err(LoadError::Container(_))));

    let missing = temp_dir.path().join("missing.md");
    assert!(matches!(document::load(&missing), Err(LoadError::Io { .. })));
}

#[test]
fn test_document_id_withSameContent_shouldNotDependOnPath() {
    let temp_dir = common::create_temp_dir().unwrap();
    let a = common::create_test_file(temp_dir.path(), "a.txt", "Same text.\n").unwrap();
    let b = common::create_test_file(temp_dir.path(), "renamed.txt", "Same text.\n").unwrap();
    let c = common::create_test_file(temp_dir.path(), "c.txt", "Other text.\n").unwrap();

    let id_a = document::load(&a).unwrap().id;
    assert_eq!(id_a, document::load(&b).unwrap().id);
    assert_ne!(id_a, document::load(&c).unwrap().id);
}

#[test]
fn test_save_withOutputDirectory_shouldCreateIt() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(temp_dir.path(), "a.txt", "Hi.\n").unwrap();
    let mut doc = document::load(&path).unwrap();
    doc.apply_translation(0, "Hallo.");

    let output = temp_dir.path().join("out").join("a_de.txt");
    document::save(&doc, &output, OutputMode::Mono).unwrap();
    assert_eq!(fs::read_to_string(&output).unwrap(), "Hallo.\n");
}
