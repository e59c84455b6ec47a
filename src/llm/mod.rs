//! AI domain: optional remote contact extraction.
//!
//! Providers:
//!   - Anthropic Claude Haiku (anthropic.rs)
//!   - Google Gemini Flash (gemini.rs)
//!
//! Shared:
//!   - prompts.rs : system prompt + user message
//!   - provider.rs: API keys + provider resolution
//!   - types.rs   : request/response shapes, phone re-normalization
//!
//! The pipeline only sees the `AiEnhancer` trait, so tests swap in fakes.

mod anthropic;
mod gemini;
pub mod prompts;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicEnhancer;
pub use gemini::GeminiEnhancer;
pub use types::{AiContactFields, AiRequest};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A remote service that reads a card into contact fields.
#[async_trait]
pub trait AiEnhancer: Send + Sync {
    fn name(&self) -> &str;

    /// Whether a request could be attempted at all (key present etc.).
    fn is_available(&self) -> bool;

    async fn enhance(&self, request: &AiRequest) -> Result<AiContactFields>;
}

/// Enhancer for the resolved provider, or `None` when no provider has a key.
pub fn enhancer_for(explicit: Option<&str>) -> Option<Arc<dyn AiEnhancer>> {
    let provider = provider::resolve_provider(explicit)?;
    let enhancer: Option<Arc<dyn AiEnhancer>> = match provider.as_str() {
        "anthropic" => AnthropicEnhancer::from_env().map(|e| Arc::new(e) as Arc<dyn AiEnhancer>),
        "gemini" => GeminiEnhancer::from_env().map(|e| Arc::new(e) as Arc<dyn AiEnhancer>),
        _ => None,
    };
    match &enhancer {
        Some(e) => log::info!("[AI] Enhancer ready: {}", e.name()),
        None => log::warn!("[AI] Provider '{}' has no API key, AI disabled", provider),
    }
    enhancer
}
