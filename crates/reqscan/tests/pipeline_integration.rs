//! End-to-end pipeline tests with scripted engines, a fake page rasterizer and a recorded
//! sleeper, so every retry path runs instantly.

mod helpers;

use helpers::*;
use reqscan::ocr::OcrCache;
use reqscan::{ExtractionError, ExtractionRequest, PartialPageFailure, PipelineEvent};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::tempdir;

const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[test]
fn test_image_uses_primary_when_secondary_is_shorter() {
    let dir = tempdir().unwrap();
    let path = write_png(dir.path(), "scan.png");
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        Some(Scripted::lines("paddle", &["Hello", "World"])),
        Some(Scripted::lines("tesseract", &["Hello", "Word"])),
    );

    let extraction = pipeline.extract(&ExtractionRequest::new(&path).unwrap()).unwrap();

    assert_eq!(extraction.text, "Hello\nWorld");
    assert_eq!(extraction.pages.len(), 1);
    assert_eq!(extraction.pages[0].page_no, None);
    assert!(!extraction.is_partial());
    assert!(!extraction.from_cache);
    assert!(harness.sleeper.recorded().is_empty());
}

#[test]
fn test_missing_file_fails_before_any_work() {
    let harness = Harness::new();
    let primary = Scripted::lines("paddle", &["never"]);
    let pipeline = harness.pipeline(Some(primary.clone()), None);

    let request = ExtractionRequest::new("/no/such/file.png").unwrap();
    let err = pipeline.extract(&request).unwrap_err();

    assert!(matches!(err, ExtractionError::FileNotFound { .. }));
    assert!(harness.sleeper.recorded().is_empty());
    assert_eq!(primary.calls(), 0);
    assert!(harness.events.events().is_empty());
}

#[test]
fn test_pdf_with_failed_middle_page_is_partial() {
    let dir = tempdir().unwrap();
    let path = write_pdf(dir.path(), "requirements.pdf");
    let harness = Harness::new();
    let primary = Scripted::new("paddle", |frame| match page_of(frame) {
        2 => Ok(Vec::new()),
        page => Ok(vec![format!("Requirement {}", page)]),
    });
    let secondary = Scripted::new("tesseract", |frame| match page_of(frame) {
        2 => Err(reqscan::ocr::BackendError::ProcessingFailed("no text".to_string())),
        _ => Ok(Vec::new()),
    });
    let pipeline = harness
        .pipeline(Some(primary), Some(secondary))
        .with_rasterizer(FakeRasterizer::new(3));

    let extraction = pipeline.extract(&ExtractionRequest::new(&path).unwrap()).unwrap();

    assert_eq!(
        extraction.text,
        "--- Page 1 ---\nRequirement 1\n\n--- Page 3 ---\nRequirement 3"
    );
    assert_eq!(
        extraction.partial_failure,
        Some(PartialPageFailure {
            failed_pages: vec![2],
            total_pages: 3,
        })
    );
    let page_numbers: Vec<_> = extraction.pages.iter().map(|page| page.page_no).collect();
    assert_eq!(page_numbers, vec![Some(1), Some(3)]);

    // Default budget of 3 attempts on page 2 only
    assert_eq!(
        harness.sleeper.recorded(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );

    let events = harness.events.events();
    assert!(events.iter().any(|event| matches!(event, PipelineEvent::PageFailed { page: 2, .. })));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::ExtractionFinished {
            pages: 3,
            failed_pages: 1,
            from_cache: false,
            ..
        })
    ));

    let err = extraction.into_complete().unwrap_err();
    assert_eq!(err.failed_pages, vec![2]);
}

#[test]
fn test_pdf_unrenderable_page_counts_as_failed() {
    let dir = tempdir().unwrap();
    let path = write_pdf(dir.path(), "requirements.pdf");
    let harness = Harness::new();
    let primary = Scripted::new("paddle", |frame| Ok(vec![format!("Requirement {}", page_of(frame))]));
    let rasterizer = FakeRasterizer {
        unrenderable: Some(0),
        ..FakeRasterizer::new(2)
    };
    let pipeline = harness.pipeline(Some(primary.clone()), None).with_rasterizer(rasterizer);

    let extraction = pipeline.extract(&ExtractionRequest::new(&path).unwrap()).unwrap();

    assert_eq!(extraction.text, "--- Page 2 ---\nRequirement 2");
    assert_eq!(extraction.partial_failure.unwrap().failed_pages, vec![1]);
    assert_eq!(primary.calls(), 1);
    assert!(harness.sleeper.recorded().is_empty());
}

#[test]
fn test_pdf_with_every_page_failing_is_exhausted() {
    let dir = tempdir().unwrap();
    let path = write_pdf(dir.path(), "blank.pdf");
    let harness = Harness::new();
    let pipeline = harness
        .pipeline(Some(Scripted::empty("paddle")), None)
        .with_rasterizer(FakeRasterizer::new(2));

    let request = ExtractionRequest::new(&path).unwrap().with_max_retries(1);
    let err = pipeline.extract(&request).unwrap_err();

    assert!(matches!(err, ExtractionError::RecognitionExhausted { attempts: 2 }));
}

#[test]
fn test_pdf_pages_render_lazily_in_order() {
    let dir = tempdir().unwrap();
    let path = write_pdf(dir.path(), "requirements.pdf");
    let harness = Harness::new();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorder = {
        let seen = seen.clone();
        Scripted::new("paddle", move |frame| {
            let page = page_of(frame);
            seen.lock().unwrap().push(page);
            Ok(vec![format!("p{}", page)])
        })
    };
    let rasterizer = FakeRasterizer::new(4);
    let renders = rasterizer.renders.clone();
    let pipeline = harness.pipeline(Some(recorder), None).with_rasterizer(rasterizer);

    pipeline.extract(&ExtractionRequest::new(&path).unwrap()).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(renders.load(Ordering::SeqCst), 4);
}

#[test]
fn test_pdf_without_rasterizer_is_unsupported() {
    let dir = tempdir().unwrap();
    let path = write_pdf(dir.path(), "requirements.pdf");
    let harness = Harness::new();
    let pipeline = harness.pipeline(Some(Scripted::lines("paddle", &["text"])), None);

    let err = pipeline.extract(&ExtractionRequest::new(&path).unwrap()).unwrap_err();

    assert!(matches!(err, ExtractionError::UnsupportedFormat { .. }));
}

#[test]
fn test_unopenable_pdf_is_unsupported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fake.pdf");
    std::fs::write(&path, b"not really a pdf").unwrap();
    let harness = Harness::new();
    let pipeline = harness
        .pipeline(Some(Scripted::lines("paddle", &["text"])), None)
        .with_rasterizer(FakeRasterizer::new(1));

    let err = pipeline.extract(&ExtractionRequest::new(&path).unwrap()).unwrap_err();

    assert!(matches!(err, ExtractionError::UnsupportedFormat { .. }));
    assert!(harness.sleeper.recorded().is_empty());
}

#[test]
fn test_undecodable_image_is_unsupported_and_not_retried() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scan.png");
    std::fs::write(&path, b"definitely not an image").unwrap();
    let harness = Harness::new();
    let primary = Scripted::lines("paddle", &["text"]);
    let pipeline = harness.pipeline(Some(primary.clone()), None);

    let err = pipeline.extract(&ExtractionRequest::new(&path).unwrap()).unwrap_err();

    assert!(matches!(err, ExtractionError::UnsupportedFormat { .. }));
    assert_eq!(primary.calls(), 0);
    assert!(harness.sleeper.recorded().is_empty());
}

#[test]
fn test_degraded_pass_rescues_secondary() {
    let dir = tempdir().unwrap();
    let path = write_png(dir.path(), "scan.png");
    let harness = Harness::new();
    let call = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let secondary = {
        let call = call.clone();
        // Fails during the two full attempts, works in the degraded pass
        Scripted::new("tesseract", move |_| {
            if call.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(reqscan::ocr::BackendError::ProcessingFailed("timeout".to_string()))
            } else {
                Ok(vec!["ok".to_string()])
            }
        })
    };
    let primary = Scripted::empty("paddle");
    let pipeline = harness.pipeline(Some(primary.clone()), Some(secondary));

    let request = ExtractionRequest::new(&path).unwrap().with_max_retries(2);
    let extraction = pipeline.extract(&request).unwrap();

    assert_eq!(extraction.text, "ok");
    assert_eq!(harness.sleeper.recorded(), vec![Duration::from_secs(1)]);
    assert_eq!(primary.calls(), 3);
    assert!(harness.events.events().iter().any(|event| matches!(
        event,
        PipelineEvent::RecognitionSucceeded {
            degraded: true,
            attempts: 3,
            ..
        }
    )));
}

#[test]
fn test_image_exhaustion_reports_attempts() {
    let dir = tempdir().unwrap();
    let path = write_png(dir.path(), "scan.png");
    let harness = Harness::new();
    let pipeline = harness.pipeline(Some(Scripted::empty("paddle")), Some(Scripted::failing("tesseract")));

    let request = ExtractionRequest::new(&path).unwrap().with_max_retries(2);
    let err = pipeline.extract(&request).unwrap_err();

    assert!(matches!(err, ExtractionError::RecognitionExhausted { attempts: 3 }));
    assert!(err.is_retryable());
    assert_eq!(harness.sleeper.recorded(), vec![Duration::from_secs(1)]);
}

#[test]
fn test_cache_hit_skips_recognition_and_survives_rename() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let path = write_png(dir.path(), "scan.png");
    let harness = Harness::new();
    let cache = Arc::new(OcrCache::new(cache_dir.path(), WEEK).unwrap());
    let primary = Scripted::lines("paddle", &["Cached", "text"]);
    let pipeline = harness.pipeline_with(Some(primary.clone()), None, harness.context().with_cache(cache));

    let first = pipeline.extract(&ExtractionRequest::new(&path).unwrap()).unwrap();
    assert!(!first.from_cache);
    assert_eq!(primary.calls(), 1);

    let renamed = dir.path().join("renamed.png");
    std::fs::rename(&path, &renamed).unwrap();

    let second = pipeline.extract(&ExtractionRequest::new(&renamed).unwrap()).unwrap();
    assert!(second.from_cache);
    assert_eq!(second.text, "Cached\ntext");
    assert_eq!(primary.calls(), 1);

    let events = harness.events.events();
    assert!(events.iter().any(|event| matches!(event, PipelineEvent::CacheMiss { .. })));
    assert!(events.iter().any(|event| matches!(event, PipelineEvent::CacheHit { .. })));
}

#[test]
fn test_partial_results_are_not_cached() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let path = write_pdf(dir.path(), "requirements.pdf");
    let harness = Harness::new();
    let cache = Arc::new(OcrCache::new(cache_dir.path(), WEEK).unwrap());
    let primary = Scripted::new("paddle", |frame| match page_of(frame) {
        1 => Ok(vec!["first".to_string()]),
        _ => Ok(Vec::new()),
    });
    let pipeline = harness
        .pipeline_with(Some(primary), None, harness.context().with_cache(cache.clone()))
        .with_rasterizer(FakeRasterizer::new(2));
    let request = ExtractionRequest::new(&path).unwrap().with_max_retries(1);

    let first = pipeline.extract(&request).unwrap();
    assert!(first.is_partial());

    let second = pipeline.extract(&request).unwrap();
    assert!(!second.from_cache);
    assert_eq!(cache.stats().unwrap().total_files, 0);
}

#[test]
fn test_finished_event_closes_every_request() {
    let dir = tempdir().unwrap();
    let path = write_png(dir.path(), "scan.png");
    let harness = Harness::new();
    let pipeline = harness.pipeline(Some(Scripted::lines("paddle", &["done"])), None);

    pipeline.extract(&ExtractionRequest::new(&path).unwrap()).unwrap();

    match harness.events.events().last() {
        Some(PipelineEvent::ExtractionFinished {
            source,
            bytes,
            duration,
            pages,
            failed_pages,
            from_cache,
        }) => {
            assert_eq!(source, &path);
            assert_eq!(*bytes, std::fs::metadata(&path).unwrap().len());
            assert!(*duration < Duration::from_secs(60));
            assert_eq!(*pages, 1);
            assert_eq!(*failed_pages, 0);
            assert!(!from_cache);
        }
        other => panic!("unexpected last event: {:?}", other),
    }
}
