//! Gemini Flash enhancer via the `generateContent` endpoint.
//!
//! Differences from the Anthropic client:
//! - API key in the URL query, not a header
//! - `responseMimeType: "application/json"` asks for bare JSON, fences are
//!   still stripped in case the model adds them
//! - text comes back in `candidates[0].content.parts[0].text`

use super::prompts::{build_contact_message, CONTACT_SYSTEM_PROMPT, GEMINI_MODEL, MAX_TOKENS};
use super::provider;
use super::types::{AiContactFields, AiRequest};
use super::AiEnhancer;
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use base64::Engine;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiEnhancer {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiEnhancer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: GEMINI_MODEL.to_string(),
        }
    }

    pub fn from_env() -> Option<Self> {
        provider::api_key("gemini").map(Self::new)
    }

    fn request_body(&self, request: &AiRequest) -> serde_json::Value {
        let text = build_contact_message(&request.ocr_text, request.image_png.is_some());
        let mut parts = vec![serde_json::json!({ "text": text })];
        if let Some(png) = &request.image_png {
            parts.push(serde_json::json!({
                "inline_data": {
                    "mime_type": "image/png",
                    "data": base64::engine::general_purpose::STANDARD.encode(png),
                }
            }));
        }
        serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
            "systemInstruction": { "parts": [{ "text": CONTACT_SYSTEM_PROMPT }] },
            "generationConfig": {
                "maxOutputTokens": MAX_TOKENS,
                "temperature": 0.1,
                "responseMimeType": "application/json"
            }
        })
    }
}

#[async_trait]
impl AiEnhancer for GeminiEnhancer {
    fn name(&self) -> &str {
        "gemini"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn enhance(&self, request: &AiRequest) -> Result<AiContactFields> {
        if request.ocr_text.trim().is_empty() && request.image_png.is_none() {
            return Err(ScanError::ai("nothing to send"));
        }

        log::info!("[AI] Provider: gemini, model: {}", self.model);
        let start = std::time::Instant::now();
        let url = format!("{}/{}:generateContent?key={}", API_BASE, self.model, self.api_key);

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&self.request_body(request))
            .send()
            .await
            // reqwest errors carry the URL, which carries the key.
            .map_err(|e| ScanError::ai(format!("HTTP request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::ai(format!("Gemini API returned {}: {}", status, body)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ScanError::ai(format!("unreadable response body: {}", e.without_url())))?;
        log::info!("[AI] API latency: {}ms", start.elapsed().as_millis());

        if let Some(usage) = body.get("usageMetadata") {
            log::info!(
                "[AI] Tokens in/out: {}/{}",
                usage["promptTokenCount"].as_u64().unwrap_or(0),
                usage["candidatesTokenCount"].as_u64().unwrap_or(0)
            );
        }

        let text = extract_gemini_text(&body)
            .ok_or_else(|| ScanError::ai("response has no candidate text"))?;
        AiContactFields::parse(&text)
    }
}

/// `candidates[0].content.parts[0].text`
fn extract_gemini_text(body: &serde_json::Value) -> Option<String> {
    body.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(|s| s.to_string())
}
