//! Pipeline scenarios with in-process fakes for every collaborator.
//!
//! No OCR engine, no network: detector, rectifier, recognizer and AI client
//! are all scripted, so each test pins down one path through the state
//! machine.

use async_trait::async_trait;
use card_scan_lib::detect::{DetectedQuadrilateral, PerspectiveRectifier, RectangleDetector};
use card_scan_lib::llm::{AiContactFields, AiEnhancer, AiRequest};
use card_scan_lib::ocr::{BoundingBox, RecognitionResult, RecognizedTextBlock, TextRecognizer};
use card_scan_lib::pipeline::CANCELLED;
use card_scan_lib::{
    ParseSource, PipelineOrchestrator, PipelineState, ProcessingOutcome, RawCapture, Result,
    ScanConfig, ScanError,
};
use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PHOTO: (u32, u32) = (1200, 700);
const CARD: (u32, u32) = (350, 200);

// ── Fakes ──────────────────────────────────────────────────────────

struct FakeDetector {
    found: bool,
}

impl RectangleDetector for FakeDetector {
    fn detect(&self, image: &DynamicImage) -> Result<DetectedQuadrilateral> {
        if !self.found {
            return Err(ScanError::RectangleNotFound {
                reason: "no candidate above confidence 0.5".into(),
            });
        }
        let (w, h) = (image.width() as f32, image.height() as f32);
        Ok(DetectedQuadrilateral::from_pixel_corners(
            [
                (w * 0.1, h * 0.1),
                (w * 0.9, h * 0.1),
                (w * 0.9, h * 0.9),
                (w * 0.1, h * 0.9),
            ],
            image.width(),
            image.height(),
            0.9,
        ))
    }
}

struct FakeRectifier {
    fails: bool,
}

impl PerspectiveRectifier for FakeRectifier {
    fn rectify(&self, _image: &DynamicImage, _quad: &DetectedQuadrilateral) -> Result<DynamicImage> {
        if self.fails {
            return Err(ScanError::CroppingFailed {
                reason: "degenerate quadrilateral".into(),
            });
        }
        Ok(DynamicImage::new_rgb8(CARD.0, CARD.1))
    }
}

enum Script {
    Lines(Vec<&'static str>),
    NoText,
    EngineDown,
    Hang,
}

struct FakeRecognizer {
    script: Script,
    seen: Mutex<Vec<(u32, u32)>>,
}

impl FakeRecognizer {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<(u32, u32)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextRecognizer for FakeRecognizer {
    async fn recognize(&self, image: &DynamicImage) -> Result<RecognitionResult> {
        self.seen.lock().unwrap().push((image.width(), image.height()));
        match &self.script {
            Script::Lines(lines) => {
                let blocks = lines
                    .iter()
                    .enumerate()
                    .map(|(i, text)| {
                        let y = 0.08 + i as f32 * 0.12;
                        RecognizedTextBlock::new(*text, 0.9, BoundingBox::new(0.1, y, 0.6, 0.06))
                    })
                    .collect();
                Ok(RecognitionResult::from_blocks(blocks, Duration::from_millis(5)))
            }
            Script::NoText => Err(ScanError::NoTextFound),
            Script::EngineDown => Err(ScanError::engine_msg("engine crashed")),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Err(ScanError::NoTextFound)
            }
        }
    }
}

struct FakeEnhancer {
    available: bool,
    delay: Duration,
    answer: Result<AiContactFields>,
    calls: AtomicUsize,
    last_request: Mutex<Option<AiRequest>>,
}

impl FakeEnhancer {
    fn answering(fields: AiContactFields) -> Arc<Self> {
        Arc::new(Self {
            available: true,
            delay: Duration::ZERO,
            answer: Ok(fields),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn slow() -> Arc<Self> {
        Arc::new(Self {
            available: true,
            delay: Duration::from_secs(10),
            answer: Ok(AiContactFields::default()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            available: true,
            delay: Duration::ZERO,
            answer: Err(ScanError::ai("API returned 500")),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            available: false,
            delay: Duration::ZERO,
            answer: Ok(AiContactFields::default()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiEnhancer for FakeEnhancer {
    fn name(&self) -> &str {
        "fake"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn enhance(&self, request: &AiRequest) -> Result<AiContactFields> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        tokio::time::sleep(self.delay).await;
        match &self.answer {
            Ok(fields) => Ok(fields.clone()),
            Err(e) => Err(ScanError::ai(e.to_string())),
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn kevin_card() -> Script {
    Script::Lines(vec![
        "Kevin Su",
        "ABC Technology Co., Ltd.",
        "Manager",
        "0912-345-678",
        "kevin@abc.com",
    ])
}

fn photo() -> RawCapture {
    RawCapture::upright_image(DynamicImage::new_rgb8(PHOTO.0, PHOTO.1))
}

fn config() -> ScanConfig {
    let mut config = ScanConfig::default();
    config.ai.timeout_ms = 100;
    config
}

fn orchestrator(found: bool, rectify_fails: bool, recognizer: Arc<FakeRecognizer>) -> PipelineOrchestrator {
    PipelineOrchestrator::new(
        config(),
        Arc::new(FakeDetector { found }),
        Arc::new(FakeRectifier {
            fails: rectify_fails,
        }),
        recognizer,
    )
}

fn record(outcome: &ProcessingOutcome) -> &card_scan_lib::ParsedContactRecord {
    match outcome {
        ProcessingOutcome::Success { record, .. } => record,
        other => panic!("expected success, got {:?}", other),
    }
}

// ── Detection and rectification ────────────────────────────────────

#[tokio::test]
async fn card_found_is_rectified_before_ocr() {
    let recognizer = FakeRecognizer::new(kevin_card());
    let pipeline = orchestrator(true, false, recognizer.clone());

    let (outcome, report) = pipeline.run(photo(), false, &CancellationToken::new()).await;

    let record = record(&outcome);
    assert_eq!(record.name.as_deref(), Some("Kevin Su"));
    assert_eq!(record.mobile.as_deref(), Some("0912-345-678"));
    assert_eq!(recognizer.seen(), vec![CARD]);
    assert_eq!(
        report.states,
        vec![
            PipelineState::Idle,
            PipelineState::Detecting,
            PipelineState::Rectifying,
            PipelineState::Recognizing,
            PipelineState::Extracting,
            PipelineState::Done,
        ]
    );
    if let ProcessingOutcome::Success { rectified_image, .. } = &outcome {
        assert_eq!((rectified_image.width(), rectified_image.height()), CARD);
    }
    assert!(report.fallbacks.is_empty());
}

#[tokio::test]
async fn no_card_found_still_succeeds_on_the_whole_photo() {
    let recognizer = FakeRecognizer::new(kevin_card());
    let pipeline = orchestrator(false, false, recognizer.clone());

    let (outcome, report) = pipeline.run(photo(), false, &CancellationToken::new()).await;

    assert!(outcome.is_success());
    assert_eq!(recognizer.seen(), vec![PHOTO]);
    assert!(!report.visited(PipelineState::Rectifying));
    assert_eq!(report.last_state(), Some(PipelineState::Done));
    assert_eq!(record(&outcome).source, ParseSource::Heuristic);
    assert_eq!(report.fallbacks.len(), 1);
    assert!(report.fallbacks[0].contains("No card boundary found"), "{:?}", report.fallbacks);
}

#[tokio::test]
async fn failed_warp_falls_back_to_the_whole_photo() {
    let recognizer = FakeRecognizer::new(kevin_card());
    let pipeline = orchestrator(true, true, recognizer.clone());

    let (outcome, report) = pipeline.run(photo(), false, &CancellationToken::new()).await;

    assert!(outcome.is_success());
    assert!(report.visited(PipelineState::Rectifying));
    assert_eq!(recognizer.seen(), vec![PHOTO]);
    assert_eq!(report.fallbacks.len(), 1);
    assert!(report.fallbacks[0].contains("Perspective correction failed"));
}

// ── Recognition failures ───────────────────────────────────────────

#[tokio::test]
async fn no_text_is_recognition_failed_with_the_original() {
    let pipeline = orchestrator(false, false, FakeRecognizer::new(Script::NoText));

    let (outcome, report) = pipeline.run(photo(), false, &CancellationToken::new()).await;

    match outcome {
        ProcessingOutcome::RecognitionFailed { original_image } => {
            assert_eq!((original_image.width(), original_image.height()), PHOTO);
        }
        other => panic!("expected recognitionFailed, got {:?}", other),
    }
    assert_eq!(report.last_state(), Some(PipelineState::Failed));
    assert!(!report.visited(PipelineState::Extracting));
}

#[tokio::test]
async fn engine_failure_is_recognition_failed() {
    let pipeline = orchestrator(true, false, FakeRecognizer::new(Script::EngineDown));
    let outcome = pipeline.process(photo(), false).await;
    assert!(matches!(outcome, ProcessingOutcome::RecognitionFailed { .. }));
}

#[tokio::test]
async fn blank_blocks_count_as_no_text() {
    let pipeline = orchestrator(false, false, FakeRecognizer::new(Script::Lines(vec!["   ", ""])));
    let outcome = pipeline.process(photo(), false).await;
    assert!(matches!(outcome, ProcessingOutcome::RecognitionFailed { .. }));
}

#[tokio::test]
async fn undecodable_bytes_are_an_error() {
    let recognizer = FakeRecognizer::new(kevin_card());
    let pipeline = orchestrator(false, false, recognizer.clone());

    let outcome = pipeline.process_bytes(b"definitely not an image", false).await;

    assert!(matches!(outcome, ProcessingOutcome::Error(_)));
    assert!(recognizer.seen().is_empty());
}

// ── AI enhancement ─────────────────────────────────────────────────

#[tokio::test]
async fn ai_answer_replaces_the_heuristic_record() {
    let enhancer = FakeEnhancer::answering(AiContactFields {
        name: Some("蘇凱文".into()),
        company: Some("ABC Technology Co., Ltd.".into()),
        mobile: Some("0912345678".into()),
        phone: Some("N/A".into()),
        ..Default::default()
    });
    let pipeline = orchestrator(true, false, FakeRecognizer::new(kevin_card()))
        .with_enhancer(enhancer.clone());

    let outcome = pipeline.process(photo(), true).await;

    let record = record(&outcome);
    assert_eq!(record.source, ParseSource::Ai);
    assert_eq!(record.name.as_deref(), Some("蘇凱文"));
    assert_eq!(record.mobile.as_deref(), Some("0912-345-678"));
    assert_eq!(record.phone, None);
    assert!(record.confidence > 0.0 && record.confidence <= 1.0);

    let request = enhancer.last_request.lock().unwrap().clone().unwrap();
    assert!(request.ocr_text.contains("kevin@abc.com"));
    assert!(request.image_png.is_some());
}

#[tokio::test]
async fn ai_timeout_falls_back_to_heuristics() {
    let enhancer = FakeEnhancer::slow();
    let pipeline = orchestrator(false, false, FakeRecognizer::new(kevin_card()))
        .with_enhancer(enhancer.clone());

    let started = std::time::Instant::now();
    let (outcome, report) = pipeline.run(photo(), true, &CancellationToken::new()).await;

    eprintln!("[TEST] AI timeout run took {}ms", started.elapsed().as_millis());
    assert!(started.elapsed() < Duration::from_secs(5));
    let record = record(&outcome);
    assert_eq!(record.source, ParseSource::Heuristic);
    assert_eq!(record.name.as_deref(), Some("Kevin Su"));
    assert_eq!(report.last_state(), Some(PipelineState::Done));
    assert_eq!(enhancer.calls(), 1);
    assert_eq!(report.fallbacks.len(), 1);
    assert!(report.fallbacks[0].contains("100ms"), "{:?}", report.fallbacks);
}

#[tokio::test]
async fn ai_error_falls_back_to_heuristics() {
    let pipeline = orchestrator(true, false, FakeRecognizer::new(kevin_card()))
        .with_enhancer(FakeEnhancer::failing());
    let (outcome, report) = pipeline.run(photo(), true, &CancellationToken::new()).await;
    assert_eq!(record(&outcome).source, ParseSource::Heuristic);
    assert_eq!(report.fallbacks.len(), 1);
    assert!(report.fallbacks[0].contains("API returned 500"));
}

#[tokio::test]
async fn empty_ai_answer_falls_back_to_heuristics() {
    let pipeline = orchestrator(false, false, FakeRecognizer::new(kevin_card()))
        .with_enhancer(FakeEnhancer::answering(AiContactFields::default()));
    let outcome = pipeline.process(photo(), true).await;
    assert_eq!(record(&outcome).source, ParseSource::Heuristic);
}

#[tokio::test]
async fn ai_is_skipped_when_disabled_or_unavailable() {
    let enabled_but_off = FakeEnhancer::answering(AiContactFields {
        name: Some("Someone Else".into()),
        ..Default::default()
    });
    let pipeline = orchestrator(false, false, FakeRecognizer::new(kevin_card()))
        .with_enhancer(enabled_but_off.clone());
    let outcome = pipeline.process(photo(), false).await;
    assert_eq!(record(&outcome).source, ParseSource::Heuristic);
    assert_eq!(enabled_but_off.calls(), 0);

    let unavailable = FakeEnhancer::unavailable();
    let pipeline = orchestrator(false, false, FakeRecognizer::new(kevin_card()))
        .with_enhancer(unavailable.clone());
    let outcome = pipeline.process(photo(), true).await;
    assert_eq!(record(&outcome).source, ParseSource::Heuristic);
    assert_eq!(unavailable.calls(), 0);
}

// ── Cancellation and concurrency ───────────────────────────────────

#[tokio::test]
async fn cancelled_before_start_is_an_error() {
    let recognizer = FakeRecognizer::new(kevin_card());
    let pipeline = orchestrator(false, false, recognizer.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = pipeline.process_with_cancel(photo(), false, cancel).await;

    match outcome {
        ProcessingOutcome::Error(reason) => assert_eq!(reason, CANCELLED),
        other => panic!("expected cancellation, got {:?}", other),
    }
    assert!(recognizer.seen().is_empty());
}

#[tokio::test]
async fn cancel_abandons_a_hung_recognizer() {
    let pipeline = orchestrator(false, false, FakeRecognizer::new(Script::Hang));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let (outcome, report) = pipeline.run(photo(), false, &cancel).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(outcome, ProcessingOutcome::Error(ref r) if r == CANCELLED));
    assert!(report.visited(PipelineState::Recognizing));
    assert_eq!(report.last_state(), Some(PipelineState::Failed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_runs_share_one_orchestrator() {
    let pipeline = Arc::new(orchestrator(true, false, FakeRecognizer::new(kevin_card())));

    let (a, b) = tokio::join!(pipeline.process(photo(), false), pipeline.process(photo(), false));

    assert_eq!(record(&a).email.as_deref(), Some("kevin@abc.com"));
    assert_eq!(record(&b).email.as_deref(), Some("kevin@abc.com"));
}
