//! OCR domain: text recognition and cleanup.
//!
//! The recognizer is a collaborator behind the `TextRecognizer` trait so the
//! pipeline can run against Tesseract in production and fakes in tests.
//! External code should only use the types exported here.

pub mod normalize;
mod tesseract;

pub use normalize::TextNormalizer;
pub use tesseract::TesseractRecognizer;

use crate::error::Result;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Axis-aligned box in the unit square of the image that was fed to OCR.
/// Origin is top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        let x = x.clamp(0.0, 1.0);
        let y = y.clamp(0.0, 1.0);
        Self {
            x,
            y,
            width: width.clamp(0.0, 1.0 - x),
            height: height.clamp(0.0, 1.0 - y),
        }
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        BoundingBox::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Maximum number of alternate readings kept per block.
pub const MAX_CANDIDATES: usize = 3;

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedTextBlock {
    pub text: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
    /// Alternate readings, best first.
    pub candidates: Vec<String>,
}

impl RecognizedTextBlock {
    pub fn new(text: impl Into<String>, confidence: f32, bounding_box: BoundingBox) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bounding_box,
            candidates: Vec::new(),
        }
    }

    pub fn with_candidates(mut self, mut candidates: Vec<String>) -> Self {
        candidates.truncate(MAX_CANDIDATES);
        self.candidates = candidates;
        self
    }
}

/// Full recognizer output for one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub text: String,
    pub blocks: Vec<RecognizedTextBlock>,
    /// Mean block confidence, 0 for no blocks.
    pub confidence: f32,
    pub duration: Duration,
}

impl RecognitionResult {
    /// Assemble from blocks, ordering them top to bottom, left to right.
    pub fn from_blocks(mut blocks: Vec<RecognizedTextBlock>, duration: Duration) -> Self {
        blocks.sort_by(|a, b| {
            a.bounding_box
                .y
                .total_cmp(&b.bounding_box.y)
                .then(a.bounding_box.x.total_cmp(&b.bounding_box.x))
        });
        let text = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let confidence = if blocks.is_empty() {
            0.0
        } else {
            blocks.iter().map(|b| b.confidence).sum::<f32>() / blocks.len() as f32
        };
        Self {
            text,
            blocks,
            confidence,
            duration,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Runs OCR over an upright image.
///
/// Implementations return `NoTextFound` for zero blocks and wrap engine
/// errors in `EngineFailure`. They must be safe to share between runs.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &DynamicImage) -> Result<RecognitionResult>;
}
