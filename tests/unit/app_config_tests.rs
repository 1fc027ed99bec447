/*!
 * Tests for application configuration functionality
 */

use bookwai::app_config::{Config, LogLevel, TranslationProvider};

use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.source_language, "en");
    assert_eq!(config.target_language, "zh-Hant");
    assert_eq!(config.translation.provider, TranslationProvider::Ollama);
    assert_eq!(config.workers, 1);
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.output.bilingual);
    assert!(config.glossary.enabled);
    assert_eq!(config.glossary.max_items, 100);
    assert_eq!(config.glossary.max_terms, 500);

    let common = &config.translation.common;
    assert_eq!(common.rate_limit_delay_ms, 3000);
    assert_eq!(common.retry_count, 6);
    assert_eq!(common.retry_backoff_ms, 1000);
    assert!(common.user_prompt.contains("{text}"));
    assert!(common.system_prompt.contains("{target_language}"));
}

#[test]
fn test_provider_defaults_withEachProvider_shouldResolve() {
    let mut config = Config::default();

    config.translation.provider = TranslationProvider::Gemini;
    assert_eq!(config.translation.get_rate_limit(), Some(15));
    assert!(!config.translation.get_endpoint().is_empty());

    config.translation.provider = TranslationProvider::OpenAI;
    assert_eq!(config.translation.get_rate_limit(), Some(60));

    config.translation.provider = TranslationProvider::Ollama;
    assert_eq!(config.translation.get_rate_limit(), None);
    assert!(config.translation.get_endpoint().contains("11434"));
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.source_language = "auto".to_string();
    assert!(config.validate().is_ok());

    config.source_language = "xyz".to_string();
    assert!(config.validate().is_err());
    config.source_language = "en".to_string();

    config.target_language = "".to_string();
    assert!(config.validate().is_err());
    config.target_language = "fr".to_string();

    config.workers = 0;
    assert!(config.validate().is_err());
    config.workers = 2;

    config.translation.common.temperature = 3.5;
    assert!(config.validate().is_err());
    config.translation.common.temperature = 0.3;

    // Hosted providers need a key
    config.translation.provider = TranslationProvider::OpenAI;
    config.translation.active_provider_config_mut().api_key = String::new();
    assert!(config.validate().is_err());
    config.translation.active_provider_config_mut().api_key = "sk-test".to_string();
    assert!(config.validate().is_ok());

    config.translation.active_provider_config_mut().max_chars_per_request = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_language_names_withAutoSource_shouldUsePlaceholder() {
    let mut config = Config::default();
    assert_eq!(config.target_language_name(), "Traditional Chinese");
    assert_eq!(config.source_language_name(), "English");

    config.source_language = "auto".to_string();
    assert_eq!(config.source_language_name(), "the source language");
}

#[test]
fn test_save_and_load_withTempFile_shouldPreserveValues() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("conf.json");

    let mut config = common::test_config(temp_dir.path());
    config.workers = 3;
    config.output.bilingual = false;
    config.translation.provider = TranslationProvider::Gemini;
    config.translation.active_provider_config_mut().api_key = "k1,k2".to_string();

    config.save_to_file(&path).unwrap();
    let loaded = Config::load_from_file(&path).unwrap();

    assert_eq!(loaded.workers, 3);
    assert!(!loaded.output.bilingual);
    assert_eq!(loaded.translation.provider, TranslationProvider::Gemini);
    assert_eq!(loaded.translation.get_api_key(), "k1,k2");
    assert_eq!(loaded.glossary.path, temp_dir.path().join("nouns.json"));
    assert_eq!(loaded.translation.common.user_prompt, "{text}");
}

#[test]
fn test_load_withMissingSections_shouldFillDefaults() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{
            "source_language": "en",
            "target_language": "ja",
            "translation": { "provider": "ollama", "available_providers": [] }
        }"#,
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.target_language, "ja");
    assert_eq!(config.workers, 1);
    assert!(config.glossary.enabled);
    assert_eq!(config.translation.common.retry_count, 6);
    assert_eq!(config.translation.get_model(), Config::default().translation.get_model());
}

#[test]
fn test_load_withInvalidJson_shouldFail() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json").unwrap();
    assert!(Config::load_from_file(&path).is_err());
    assert!(Config::load_from_file(temp_dir.path().join("missing.json")).is_err());
}

#[test]
fn test_provider_from_str_withKnownNames_shouldParse() {
    assert_eq!("ollama".parse::<TranslationProvider>().unwrap(), TranslationProvider::Ollama);
    assert_eq!("OpenAI".parse::<TranslationProvider>().unwrap(), TranslationProvider::OpenAI);
    assert_eq!("gemini".parse::<TranslationProvider>().unwrap(), TranslationProvider::Gemini);
    assert!("anthropic".parse::<TranslationProvider>().is_err());
}

#[test]
fn test_log_level_withEachVariant_shouldMapToFilter() {
    assert_eq!(LogLevel::Error.to_level_filter(), log::LevelFilter::Error);
    assert_eq!(LogLevel::Trace.to_level_filter(), log::LevelFilter::Trace);
}
