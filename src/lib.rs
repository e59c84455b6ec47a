//! card-scan: business card photo in, structured contact record out.
//!
//! Domains:
//!   - capture: decoding, orientation bake-in, preprocessing
//!   - detect: card boundary detection and perspective correction
//!   - ocr: recognizer trait, Tesseract backend, text normalization
//!   - extract: heuristic field extraction and confidence scoring
//!   - llm: optional remote AI extraction
//!   - pipeline: the orchestrator tying the stages together
//!   - contact: submission record and vCard export
//!
//! Collaborators are injected as trait objects, so every stage can be
//! replaced with a fake in tests.

pub mod capture;
pub mod config;
pub mod contact;
pub mod detect;
pub mod error;
pub mod extract;
pub mod llm;
pub mod ocr;
pub mod pipeline;

pub use capture::RawCapture;
pub use config::ScanConfig;
pub use contact::ContactSubmission;
pub use error::{Result, ScanError};
pub use extract::{FieldExtractor, ParseSource, ParsedContactRecord};
pub use pipeline::{PipelineOrchestrator, PipelineReport, PipelineState, ProcessingOutcome};

/// Load `.env.local`, falling back to `.env`, from the working directory.
/// Call before `env_logger::init` so `RUST_LOG` can come from the file.
pub fn load_env_files() {
    for env_file in [".env.local", ".env"] {
        let path = std::path::Path::new(env_file);
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
            break;
        }
    }
}
