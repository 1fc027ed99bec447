/*!
 * Common test utilities for the bookwai test suite
 */

use anyhow::Result;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use bookwai::app_config::Config;
use bookwai::app_controller::Controller;
use bookwai::checkpoint::CheckpointStore;
use bookwai::providers::mock::MockProvider;

/// Routes `log` output to the test harness, safe to call from every test
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a sample subtitle file for testing
pub fn create_test_subtitle(dir: &Path, filename: &str) -> Result<PathBuf> {
    let content = "1
00:00:01,000 --> 00:00:04,000
This is a test subtitle.

2
00:00:05,000 --> 00:00:09,000
It contains multiple entries.

3
00:00:10,000 --> 00:00:14,000
For testing purposes.
";
    create_test_file(dir, filename, content)
}

/// Configuration that echoes payloads through the mock without waiting
///
/// Glossary file and checkpoint database live in `dir`.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.source_language = "en".to_string();
    config.target_language = "de".to_string();
    config.translation.common.user_prompt = "{text}".to_string();
    config.translation.common.rate_limit_delay_ms = 0;
    config.translation.common.retry_backoff_ms = 1;
    config.translation.common.retry_count = 3;
    config.translation.active_provider_config_mut().max_chars_per_request = 2000;
    config.glossary.path = dir.join("nouns.json");
    config.checkpoint.database_path = Some(dir.join("checkpoints.db"));
    config
}

/// Controller around a mock provider and the configured checkpoint database
pub fn controller_with(config: Config, provider: Arc<MockProvider>) -> Result<Controller> {
    let store = CheckpointStore::open(config.checkpoint.database_path.as_deref())?;
    Ok(Controller::with_parts(config, provider, store))
}

/// Zip the given members, in order, with deflate compression
pub fn build_zip(members: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in members {
        let method = if *name == "mimetype" {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        writer.start_file(*name, FileOptions::default().compression_method(method))?;
        writer.write_all(content.as_bytes())?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Read one member of a zip as text
pub fn read_zip_member(bytes: &[u8], name: &str) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut file = archive.by_name(name)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// Member names of a zip, in archive order
pub fn zip_member_names(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut names = Vec::new();
    for i in 0..archive.len() {
        names.push(archive.by_index(i)?.name().to_string());
    }
    Ok(names)
}

/// Minimal Word document with one paragraph per entry
pub fn build_docx(paragraphs: &[&str]) -> Result<Vec<u8>> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    build_zip(&[
        ("[Content_Types].xml", r#"<?xml version="1.0"?><Types/>"#),
        ("word/document.xml", &document),
    ])
}

/// XHTML chapter with the given body markup
pub fn chapter(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><html xmlns="http://www.w3.org/1999/xhtml"><head><title>c</title></head><body>{}</body></html>"#,
        body
    )
}

/// Minimal EPUB with the given chapters
pub fn build_epub(chapters: &[(&str, String)]) -> Result<Vec<u8>> {
    let mut members: Vec<(&str, &str)> = vec![
        ("mimetype", "application/epub+zip"),
        ("META-INF/container.xml", r#"<?xml version="1.0"?><container/>"#),
        ("OEBPS/content.opf", r#"<?xml version="1.0"?><package/>"#),
    ];
    for (name, content) in chapters {
        members.push((name, content.as_str()));
    }
    build_zip(&members)
}
