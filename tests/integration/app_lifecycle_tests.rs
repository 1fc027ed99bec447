/*!
 * Full app lifecycle tests: controller runs over files and folders
 */

use std::fs;
use std::sync::Arc;

use bookwai::app_controller::{Controller, DocumentOutcome, RunOptions};
use bookwai::document::{DocumentFormat, OutputMode};
use bookwai::providers::mock::MockProvider;
use bookwai::translation::{NullObserver, StopFlag};

use crate::common;

fn mono() -> RunOptions {
    RunOptions { mode: OutputMode::Mono, reset: false }
}

#[tokio::test]
async fn test_run_withIdentityProvider_shouldReproduceSourcesInMonoMode() {
    let temp_dir = common::create_temp_dir().unwrap();
    let dir = temp_dir.path();
    let txt_content = "First paragraph.\n\nSecond paragraph.\n";
    let txt = common::create_test_file(dir, "notes.txt", txt_content).unwrap();
    let srt = common::create_test_subtitle(dir, "movie.srt").unwrap();

    let provider = Arc::new(MockProvider::identity());
    let controller = common::controller_with(common::test_config(dir), provider).unwrap();

    let reports = controller
        .run(&[txt.clone(), srt.clone()], mono(), &NullObserver, &StopFlag::new())
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    for report in &reports {
        let summary = report.summary().unwrap();
        assert!(summary.is_complete(), "{:?} incomplete", report.path);
    }

    assert_eq!(fs::read_to_string(dir.join("notes_de.txt")).unwrap(), txt_content);
    assert_eq!(
        fs::read_to_string(dir.join("movie_de.srt")).unwrap(),
        fs::read_to_string(&srt).unwrap()
    );
}

#[tokio::test]
async fn test_run_withCrlfSources_shouldReproduceBytesInMonoMode() {
    let temp_dir = common::create_temp_dir().unwrap();
    let dir = temp_dir.path();
    let sources = [
        ("notes.txt", "Hello there.\r\n", "notes_de.txt"),
        ("movie.srt", "1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\n", "movie_de.srt"),
        ("story.md", "# Title\r\n\r\nBody text.\r\n", "story_de.md"),
    ];
    let inputs: Vec<_> = sources
        .iter()
        .map(|(name, content, _)| common::create_test_file(dir, name, content).unwrap())
        .collect();

    let provider = Arc::new(MockProvider::identity());
    let controller = common::controller_with(common::test_config(dir), provider).unwrap();
    controller.run(&inputs, mono(), &NullObserver, &StopFlag::new()).await.unwrap();

    for (_, content, output) in sources {
        assert_eq!(fs::read(dir.join(output)).unwrap(), content.as_bytes(), "{} changed", output);
    }
}

#[tokio::test]
async fn test_run_withBilingualMode_shouldWriteBiliOutput() {
    let temp_dir = common::create_temp_dir().unwrap();
    let dir = temp_dir.path();
    let input = common::create_test_file(dir, "story.md", "# Title\n\nBody text.\n").unwrap();

    let provider = Arc::new(MockProvider::prefixed("DE:"));
    let controller = common::controller_with(common::test_config(dir), provider).unwrap();
    let options = RunOptions::from_config(controller.config());
    assert_eq!(options.mode, OutputMode::Bilingual);

    let reports = controller.run(&[input], options, &NullObserver, &StopFlag::new()).await.unwrap();

    match &reports[0].outcome {
        DocumentOutcome::Translated { output, summary } => {
            assert_eq!(output, &dir.join("story_bili.md"));
            assert_eq!(summary.translated, 2);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(
        fs::read_to_string(dir.join("story_bili.md")).unwrap(),
        "# Title\n\nDE:# Title\n\nBody text.\n\nDE:Body text.\n"
    );
}

#[tokio::test]
async fn test_run_twice_shouldResumeFromCheckpointDatabase() {
    let temp_dir = common::create_temp_dir().unwrap();
    let dir = temp_dir.path();
    let input = common::create_test_file(dir, "a.txt", "One.\n\nTwo.\n\nThree.\n").unwrap();

    let first = Arc::new(MockProvider::identity());
    {
        let controller = common::controller_with(common::test_config(dir), first.clone()).unwrap();
        controller.run(&[input.clone()], mono(), &NullObserver, &StopFlag::new()).await.unwrap();
    }
    assert!(first.request_count() > 0);

    // A new controller on the same database finds everything done
    let second = Arc::new(MockProvider::identity());
    let controller = common::controller_with(common::test_config(dir), second.clone()).unwrap();
    let reports = controller.run(&[input.clone()], mono(), &NullObserver, &StopFlag::new()).await.unwrap();

    assert_eq!(second.request_count(), 0);
    assert_eq!(reports[0].summary().unwrap().restored, 3);

    let listed = controller.store().list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].completed_units, 3);
    assert_eq!(listed[0].target_language, "de");

    // Reset forgets the progress and translates again
    let reset = RunOptions { mode: OutputMode::Mono, reset: true };
    let reports = controller.run(&[input], reset, &NullObserver, &StopFlag::new()).await.unwrap();
    assert_eq!(reports[0].summary().unwrap().restored, 0);
    assert!(second.request_count() > 0);
}

#[tokio::test]
async fn test_run_withUnsupportedFile_shouldSkipItAndContinue() {
    let temp_dir = common::create_temp_dir().unwrap();
    let dir = temp_dir.path();
    let good = common::create_test_file(dir, "good.txt", "Hello.\n").unwrap();
    let bad = common::create_test_file(dir, "slides.pptx", "binary").unwrap();
    let broken = common::create_test_file(dir, "broken.epub", "not a zip").unwrap();

    let provider = Arc::new(MockProvider::identity());
    let controller = common::controller_with(common::test_config(dir), provider).unwrap();
    let reports = controller
        .run(&[bad, good, broken], mono(), &NullObserver, &StopFlag::new())
        .await
        .unwrap();

    assert!(matches!(reports[0].outcome, DocumentOutcome::Skipped(_)));
    assert!(reports[1].summary().is_some());
    assert!(matches!(reports[2].outcome, DocumentOutcome::Skipped(_)));
    assert!(dir.join("good_de.txt").exists());
}

#[tokio::test]
async fn test_run_withFolderAndWorkers_shouldTranslateEveryDocument() {
    let temp_dir = common::create_temp_dir().unwrap();
    let books = temp_dir.path().join("books");
    fs::create_dir_all(books.join("part2")).unwrap();
    common::create_test_file(&books, "one.txt", "Uno.\n").unwrap();
    common::create_test_file(&books.join("part2"), "two.txt", "Dos.\n").unwrap();
    common::create_test_file(&books, "cover.png", "png").unwrap();

    let out_dir = temp_dir.path().join("out");
    let mut config = common::test_config(temp_dir.path());
    config.workers = 2;
    config.output.output_dir = Some(out_dir.clone());

    let provider = Arc::new(MockProvider::prefixed("X:").with_delay(std::time::Duration::from_millis(20)));
    let controller = common::controller_with(config, provider.clone()).unwrap();
    let reports = controller.run(&[books], mono(), &NullObserver, &StopFlag::new()).await.unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(provider.request_count(), 2);
    assert_eq!(fs::read_to_string(out_dir.join("one_de.txt")).unwrap(), "X:Uno.\n");
    assert_eq!(fs::read_to_string(out_dir.join("two_de.txt")).unwrap(), "X:Dos.\n");
}

#[tokio::test]
async fn test_run_withFileAlsoInsideFolderInput_shouldTranslateItOnce() {
    let temp_dir = common::create_temp_dir().unwrap();
    let books = temp_dir.path().join("books");
    fs::create_dir(&books).unwrap();
    let single = common::create_test_file(&books, "a.txt", "Only once.\n").unwrap();

    let mut config = common::test_config(temp_dir.path());
    config.workers = 2;
    let provider = Arc::new(MockProvider::identity().with_delay(std::time::Duration::from_millis(20)));
    let controller = common::controller_with(config, provider.clone()).unwrap();

    let reports = controller
        .run(&[single, books.clone()], mono(), &NullObserver, &StopFlag::new())
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(provider.request_count(), 1);
    assert_eq!(fs::read_to_string(books.join("a_de.txt")).unwrap(), "Only once.\n");
}

#[tokio::test]
async fn test_run_twiceOverFolderInMonoMode_shouldNotTranslateOwnOutput() {
    let temp_dir = common::create_temp_dir().unwrap();
    let books = temp_dir.path().join("books");
    fs::create_dir(&books).unwrap();
    common::create_test_file(&books, "a.txt", "Hello.\n").unwrap();

    let first = Arc::new(MockProvider::prefixed("DE:"));
    {
        let controller = common::controller_with(common::test_config(temp_dir.path()), first.clone()).unwrap();
        controller.run(&[books.clone()], mono(), &NullObserver, &StopFlag::new()).await.unwrap();
    }
    assert_eq!(first.request_count(), 1);
    assert!(books.join("a_de.txt").exists());

    let second = Arc::new(MockProvider::prefixed("DE:"));
    let controller = common::controller_with(common::test_config(temp_dir.path()), second.clone()).unwrap();
    let reports = controller.run(&[books.clone()], mono(), &NullObserver, &StopFlag::new()).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].path, books.join("a.txt"));
    assert_eq!(second.request_count(), 0);
    assert!(!books.join("a_de_de.txt").exists());
}

#[tokio::test]
async fn test_run_withFailingProvider_shouldStillWritePartialOutput() {
    let temp_dir = common::create_temp_dir().unwrap();
    let dir = temp_dir.path();
    let input = common::create_test_file(dir, "a.txt", "Keep me.\n").unwrap();

    let provider = Arc::new(MockProvider::failing());
    let controller = common::controller_with(common::test_config(dir), provider).unwrap();
    assert!(controller.test_connection().await.is_err());

    let reports = controller.run(&[input], mono(), &NullObserver, &StopFlag::new()).await.unwrap();

    let summary = reports[0].summary().unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(fs::read_to_string(dir.join("a_de.txt")).unwrap(), "Keep me.\n");
}

#[tokio::test]
async fn test_run_withEmptyFolder_shouldReturnNoReports() {
    let temp_dir = common::create_temp_dir().unwrap();
    let empty = temp_dir.path().join("empty");
    fs::create_dir(&empty).unwrap();

    let provider = Arc::new(MockProvider::identity());
    let controller = common::controller_with(common::test_config(temp_dir.path()), provider).unwrap();
    let reports = controller.run(&[empty], mono(), &NullObserver, &StopFlag::new()).await.unwrap();
    assert!(reports.is_empty());
}

#[test]
fn test_estimate_withDocuments_shouldCountUnitsAndTokens() {
    let temp_dir = common::create_temp_dir().unwrap();
    let dir = temp_dir.path();
    common::create_test_file(dir, "a.txt", "abcd\n\nefghijkl\n").unwrap();
    common::create_test_subtitle(dir, "b.srt").unwrap();
    common::create_test_file(dir, "c.epub", "broken").unwrap();

    let estimates = Controller::estimate(&[dir.to_path_buf()]).unwrap();

    assert_eq!(estimates.len(), 2);
    assert_eq!(estimates[0].format, DocumentFormat::Txt);
    assert_eq!(estimates[0].units, 2);
    assert_eq!(estimates[0].chars, 12);
    assert_eq!(estimates[0].approx_tokens, 3);
    assert_eq!(estimates[1].format, DocumentFormat::Srt);
    assert_eq!(estimates[1].units, 3);
}

#[test]
fn test_output_path_withModes_shouldUseSuffixes() {
    let temp_dir = common::create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::identity());
    let mut config = common::test_config(temp_dir.path());
    config.target_language = "zh-Hant".to_string();
    let controller = common::controller_with(config, provider).unwrap();

    let input = std::path::Path::new("/library/book.epub");
    assert_eq!(
        controller.output_path(input, OutputMode::Bilingual),
        std::path::PathBuf::from("/library/book_bili.epub")
    );
    assert_eq!(
        controller.output_path(input, OutputMode::Mono),
        std::path::PathBuf::from("/library/book_zh-Hant.epub")
    );
}

#[test]
fn test_strip_withDefaultOutput_shouldWriteSingleEpub() {
    let temp_dir = common::create_temp_dir().unwrap();
    let input = temp_dir.path().join("novel_bili.epub");
    let bytes = common::build_epub(&[(
        "OEBPS/ch1.xhtml",
        common::chapter("<p>Hello there.</p><p>你好。</p>"),
    )])
    .unwrap();
    fs::write(&input, bytes).unwrap();

    let (output, report) = Controller::strip(&input, None).unwrap();

    assert_eq!(output, temp_dir.path().join("novel_bili_Single.epub"));
    assert_eq!(report.removed, 1);
    assert_eq!(report.kept, 1);
    assert!(output.exists());
}
