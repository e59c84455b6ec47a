//! Card scanning pipeline.
//!
//! One call per photo:
//!   preprocess → detect → rectify → recognize → normalize → extract → (AI)
//!
//! Detection and rectification failures fall back to OCR on the whole photo.
//! OCR failures end the run as `RecognitionFailed` so the caller can offer
//! manual entry. AI failures fall back to the heuristic record and are only
//! logged.
//!
//! The orchestrator holds no per-run state, so one instance can serve
//! concurrent runs.

use crate::capture::{to_png_bytes, ImagePreprocessor, RawCapture};
use crate::config::ScanConfig;
use crate::detect::{PerspectiveRectifier, RectangleDetector};
use crate::error::{Result, ScanError};
use crate::extract::{ConfidenceScorer, FieldExtractor, ParsedContactRecord};
use crate::llm::{AiEnhancer, AiRequest};
use crate::ocr::{RecognitionResult, RecognizedTextBlock, TextNormalizer, TextRecognizer};
use image::DynamicImage;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Message carried by `ProcessingOutcome::Error` when the caller cancels.
pub const CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Detecting,
    Rectifying,
    Recognizing,
    Extracting,
    Done,
    Failed,
}

/// What the caller gets back for one photo.
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    /// `rectified_image` is the image OCR ran on: the warped card, or the
    /// preprocessed photo when no card was found.
    Success {
        record: ParsedContactRecord,
        rectified_image: DynamicImage,
    },
    /// OCR found nothing or the engine failed. Recoverable: retry or enter
    /// the details by hand.
    RecognitionFailed { original_image: DynamicImage },
    Error(String),
}

impl ProcessingOutcome {
    pub fn record(&self) -> Option<&ParsedContactRecord> {
        match self {
            ProcessingOutcome::Success { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingOutcome::Success { .. })
    }
}

/// States visited during one run, with the time spent in each.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub states: Vec<PipelineState>,
    pub timings: Vec<(PipelineState, Duration)>,
    /// Normalized OCR text, empty when recognition failed.
    pub ocr_text: String,
    pub ocr_confidence: f32,
    /// Failures the run fell back from without telling the caller.
    pub fallbacks: Vec<String>,
}

impl PipelineReport {
    fn enter(&mut self, state: PipelineState) {
        log::info!("[PIPELINE] → {:?}", state);
        self.states.push(state);
    }

    fn time(&mut self, state: PipelineState, started: Instant) {
        self.timings.push((state, started.elapsed()));
    }

    fn absorb(&mut self, e: &ScanError) {
        if e.is_absorbed() {
            self.fallbacks.push(e.to_string());
        }
    }

    pub fn last_state(&self) -> Option<PipelineState> {
        self.states.last().copied()
    }

    pub fn visited(&self, state: PipelineState) -> bool {
        self.states.contains(&state)
    }
}

pub struct PipelineOrchestrator {
    detector: Arc<dyn RectangleDetector>,
    rectifier: Arc<dyn PerspectiveRectifier>,
    recognizer: Arc<dyn TextRecognizer>,
    enhancer: Option<Arc<dyn AiEnhancer>>,
    preprocessor: Arc<ImagePreprocessor>,
    normalizer: TextNormalizer,
    extractor: FieldExtractor,
    config: ScanConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        config: ScanConfig,
        detector: Arc<dyn RectangleDetector>,
        rectifier: Arc<dyn PerspectiveRectifier>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        let scorer = ConfidenceScorer::new(config.scoring.clone());
        Self {
            detector,
            rectifier,
            recognizer,
            enhancer: None,
            preprocessor: Arc::new(ImagePreprocessor::new(config.preprocess.clone())),
            normalizer: TextNormalizer::new(),
            extractor: FieldExtractor::new(scorer),
            config,
        }
    }

    pub fn with_enhancer(mut self, enhancer: Arc<dyn AiEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub async fn process(&self, capture: RawCapture, ai_enabled: bool) -> ProcessingOutcome {
        self.run(capture, ai_enabled, &CancellationToken::new())
            .await
            .0
    }

    /// Like `process`, but resolves to `Error("cancelled")` as soon as
    /// `cancel` fires. Work already on the blocking pool finishes and is
    /// dropped.
    pub async fn process_with_cancel(
        &self,
        capture: RawCapture,
        ai_enabled: bool,
        cancel: CancellationToken,
    ) -> ProcessingOutcome {
        self.run(capture, ai_enabled, &cancel).await.0
    }

    /// Decode encoded bytes first. Undecodable input is an `Error` outcome.
    pub async fn process_bytes(&self, bytes: &[u8], ai_enabled: bool) -> ProcessingOutcome {
        match RawCapture::from_bytes(bytes) {
            Ok(capture) => self.process(capture, ai_enabled).await,
            Err(e) => {
                log::warn!("[PIPELINE] {}", e);
                ProcessingOutcome::Error(e.user_message())
            }
        }
    }

    /// Full run, returning the state trace next to the outcome.
    pub async fn run(
        &self,
        capture: RawCapture,
        ai_enabled: bool,
        cancel: &CancellationToken,
    ) -> (ProcessingOutcome, PipelineReport) {
        let run_start = Instant::now();
        let mut report = PipelineReport::default();
        report.enter(PipelineState::Idle);

        let upright = capture.into_upright();
        if upright.width() == 0 || upright.height() == 0 {
            let e = ScanError::ImageInvalid {
                message: "image has no pixels".to_string(),
                source: None,
            };
            log::warn!("[PIPELINE] {}", e);
            return (ProcessingOutcome::Error(e.user_message()), report);
        }

        let preprocessor = Arc::clone(&self.preprocessor);
        let original = upright.clone();
        let Some(prepared) =
            guarded(cancel, blocking(move || preprocessor.prepare(&original))).await
        else {
            return cancelled(report);
        };
        let prepared = match prepared {
            Ok(image) => image,
            Err(e) => return (ProcessingOutcome::Error(e.to_string()), report),
        };

        // Stage 1: find the card
        report.enter(PipelineState::Detecting);
        let started = Instant::now();
        let detector = Arc::clone(&self.detector);
        let photo = prepared.clone();
        let Some(detected) = guarded(cancel, blocking(move || detector.detect(&photo))).await
        else {
            return cancelled(report);
        };
        report.time(PipelineState::Detecting, started);

        // Stage 2: warp it upright, or keep the whole photo
        let target = match detected.and_then(|r| r) {
            Ok(quad) => {
                log::info!("[PIPELINE] Card found, confidence {:.2}", quad.confidence);
                report.enter(PipelineState::Rectifying);
                let started = Instant::now();
                let rectifier = Arc::clone(&self.rectifier);
                let photo = prepared.clone();
                let Some(rectified) =
                    guarded(cancel, blocking(move || rectifier.rectify(&photo, &quad))).await
                else {
                    return cancelled(report);
                };
                report.time(PipelineState::Rectifying, started);
                match rectified.and_then(|r| r) {
                    Ok(card) => card,
                    Err(e) => {
                        log::warn!("[PIPELINE] {}, recognizing the whole photo", e);
                        report.absorb(&e);
                        prepared.clone()
                    }
                }
            }
            Err(e) => {
                log::warn!("[PIPELINE] {}, recognizing the whole photo", e);
                report.absorb(&e);
                prepared.clone()
            }
        };

        // Stage 3: OCR
        report.enter(PipelineState::Recognizing);
        let started = Instant::now();
        let Some(recognized) = guarded(cancel, self.recognizer.recognize(&target)).await else {
            return cancelled(report);
        };
        report.time(PipelineState::Recognizing, started);

        let recognition = match recognized.and_then(|r| self.normalize(r)) {
            Ok(r) => r,
            Err(e) if e.is_recoverable() => {
                log::warn!("[PIPELINE] {}", e);
                report.enter(PipelineState::Failed);
                return (
                    ProcessingOutcome::RecognitionFailed {
                        original_image: upright,
                    },
                    report,
                );
            }
            Err(e) => {
                log::warn!("[PIPELINE] {}", e);
                report.enter(PipelineState::Failed);
                return (ProcessingOutcome::Error(e.user_message()), report);
            }
        };
        report.ocr_text = recognition.text.clone();
        report.ocr_confidence = recognition.confidence;

        // Stage 4: fields
        report.enter(PipelineState::Extracting);
        let started = Instant::now();
        let mut record = self
            .extractor
            .extract(&recognition.text, Some(&recognition.blocks));
        record.confidence = self
            .extractor
            .scorer()
            .blend(record.confidence, recognition.confidence);

        if ai_enabled {
            let enhanced = guarded(cancel, self.enhance(&recognition, &target)).await;
            match enhanced {
                None => return cancelled(report),
                Some(Ok(Some(ai_record))) => record = ai_record,
                Some(Ok(None)) => {}
                Some(Err(e)) => {
                    log::warn!("[AI] {}, using heuristic result", e);
                    report.absorb(&e);
                }
            }
        }
        report.time(PipelineState::Extracting, started);

        report.enter(PipelineState::Done);
        log::info!(
            "[PIPELINE] Done in {}ms, source={}, confidence={:.2}",
            run_start.elapsed().as_millis(),
            record.source,
            record.confidence
        );
        (
            ProcessingOutcome::Success {
                record,
                rectified_image: target,
            },
            report,
        )
    }

    /// Normalize the text and every block, then make sure something is left.
    fn normalize(&self, mut recognition: RecognitionResult) -> Result<RecognitionResult> {
        recognition.text = self.normalizer.normalize(&recognition.text);
        recognition.blocks = recognition
            .blocks
            .into_iter()
            .map(|block| RecognizedTextBlock {
                text: self.normalizer.normalize_line(&block.text),
                ..block
            })
            .filter(|block| !block.text.is_empty())
            .collect();
        if recognition.text.trim().is_empty() || recognition.blocks.is_empty() {
            return Err(ScanError::NoTextFound);
        }
        log::info!(
            "[NORMALIZE] {} blocks, {} chars",
            recognition.blocks.len(),
            recognition.text.chars().count()
        );
        Ok(recognition)
    }

    /// AI record when the enhancer answers in time. `Ok(None)` when there is
    /// no usable enhancer.
    async fn enhance(
        &self,
        recognition: &RecognitionResult,
        image: &DynamicImage,
    ) -> Result<Option<ParsedContactRecord>> {
        let enhancer = match &self.enhancer {
            Some(e) if e.is_available() => e,
            Some(e) => {
                log::info!("[AI] {} unavailable, using heuristic result", e.name());
                return Ok(None);
            }
            None => {
                log::info!("[AI] No enhancer configured, using heuristic result");
                return Ok(None);
            }
        };

        let image_png = if self.config.ai.send_image {
            match to_png_bytes(image) {
                Ok(png) => Some(png),
                Err(e) => {
                    log::warn!("[AI] Sending text only: {}", e);
                    None
                }
            }
        } else {
            None
        };
        let request = AiRequest {
            ocr_text: recognition.text.clone(),
            image_png,
        };

        let timeout = Duration::from_millis(self.config.ai.timeout_ms);
        let result = match tokio::time::timeout(timeout, enhancer.enhance(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::ai(format!(
                "no answer within {}ms",
                timeout.as_millis()
            ))),
        };

        let record = result.map(|fields| fields.into_record()).and_then(|record| {
            if record.is_empty() {
                Err(ScanError::ai("response had no fields"))
            } else {
                Ok(record)
            }
        });
        let mut record = record?;
        record.confidence = self
            .extractor
            .scorer()
            .score(&record, Some(recognition.confidence));
        log::info!("[AI] {} fields from {}", record.filled_count(), enhancer.name());
        Ok(Some(record))
    }
}

/// Run CPU-bound work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ScanError::engine("worker task failed", e))
}

/// `None` when `cancel` fires first.
async fn guarded<F: Future>(cancel: &CancellationToken, work: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = work => Some(output),
    }
}

fn cancelled(mut report: PipelineReport) -> (ProcessingOutcome, PipelineReport) {
    log::info!("[PIPELINE] Cancelled by caller");
    report.enter(PipelineState::Failed);
    (ProcessingOutcome::Error(CANCELLED.to_string()), report)
}
