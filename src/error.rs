//! Error taxonomy for the card scanning pipeline.
//!
//! Only `ImageInvalid` and the OCR-stage failures ever reach the caller.
//! Everything else is absorbed by the orchestrator through a fallback path
//! and only shows up in the log.

use thiserror::Error;

/// Result alias used across the pipeline stages.
pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    /// The input bytes could not be decoded into a bitmap.
    #[error("Image could not be decoded: {message}")]
    ImageInvalid {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No card-shaped quadrilateral cleared the detector thresholds.
    #[error("No card boundary found: {reason}")]
    RectangleNotFound { reason: String },

    /// The perspective warp produced no usable image.
    #[error("Perspective correction failed: {reason}")]
    CroppingFailed { reason: String },

    /// The recognizer ran but produced zero text blocks.
    #[error("No text found in image")]
    NoTextFound,

    /// The OCR engine itself failed.
    #[error("OCR engine failure: {message}")]
    EngineFailure {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The remote AI enhancer failed, timed out or answered garbage.
    #[error("AI request failed: {reason}")]
    AiRequestFailed { reason: String },
}

impl ScanError {
    pub fn image_invalid<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ImageInvalid {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn engine<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::EngineFailure {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn engine_msg(message: impl Into<String>) -> Self {
        Self::EngineFailure {
            message: message.into(),
            source: None,
        }
    }

    pub fn ai(reason: impl Into<String>) -> Self {
        Self::AiRequestFailed {
            reason: reason.into(),
        }
    }

    /// True when the caller can continue: either the pipeline falls back on
    /// its own, or the user can retry / switch to manual entry.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ScanError::ImageInvalid { .. })
    }

    /// True for conditions the orchestrator absorbs without telling the caller.
    pub fn is_absorbed(&self) -> bool {
        matches!(
            self,
            ScanError::RectangleNotFound { .. }
                | ScanError::CroppingFailed { .. }
                | ScanError::AiRequestFailed { .. }
        )
    }

    /// Short message suitable for showing to the person holding the card.
    pub fn user_message(&self) -> String {
        match self {
            ScanError::ImageInvalid { .. } => {
                "The photo could not be read. Please take it again.".to_string()
            }
            ScanError::NoTextFound => {
                "No text was found on the card. Retry or enter the details manually.".to_string()
            }
            ScanError::EngineFailure { .. } => {
                "Text recognition failed. Retry or enter the details manually.".to_string()
            }
            _ => "The card was processed with reduced accuracy.".to_string(),
        }
    }
}
