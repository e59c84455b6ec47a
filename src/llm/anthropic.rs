//! Anthropic Messages API enhancer.
//!
//! One non-streaming request per card. The photo, when present, goes in as
//! a base64 image block ahead of the OCR text.

use super::prompts::{build_contact_message, ANTHROPIC_MODEL, CONTACT_SYSTEM_PROMPT, MAX_TOKENS};
use super::provider;
use super::types::{AiContactFields, AiRequest};
use super::AiEnhancer;
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use base64::Engine;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicEnhancer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

impl AnthropicEnhancer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: ANTHROPIC_MODEL.to_string(),
            url: API_URL.to_string(),
        }
    }

    /// Build from the configured key, if there is one.
    pub fn from_env() -> Option<Self> {
        provider::api_key("anthropic").map(Self::new)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn request_body(&self, request: &AiRequest) -> serde_json::Value {
        let text = build_contact_message(&request.ocr_text, request.image_png.is_some());
        let content = match &request.image_png {
            Some(png) => serde_json::json!([
                {
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": "image/png",
                        "data": base64::engine::general_purpose::STANDARD.encode(png),
                    }
                },
                { "type": "text", "text": text }
            ]),
            None => serde_json::Value::String(text),
        };
        serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": CONTACT_SYSTEM_PROMPT,
            "messages": [{ "role": "user", "content": content }]
        })
    }
}

#[async_trait]
impl AiEnhancer for AnthropicEnhancer {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn enhance(&self, request: &AiRequest) -> Result<AiContactFields> {
        if request.ocr_text.trim().is_empty() && request.image_png.is_none() {
            return Err(ScanError::ai("nothing to send"));
        }

        log::info!("[AI] Provider: anthropic, model: {}", self.model);
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| ScanError::ai(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::ai(format!("API returned {}: {}", status, body)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ScanError::ai(format!("unreadable response body: {}", e)))?;
        log::info!("[AI] API latency: {}ms", start.elapsed().as_millis());

        if let Some(usage) = body.get("usage") {
            log::info!(
                "[AI] Tokens in/out: {}/{}",
                usage["input_tokens"].as_u64().unwrap_or(0),
                usage["output_tokens"].as_u64().unwrap_or(0)
            );
        }

        let text = body["content"][0]["text"]
            .as_str()
            .ok_or_else(|| ScanError::ai("response has no text content"))?;
        AiContactFields::parse(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_request_uses_plain_content() {
        let enhancer = AnthropicEnhancer::new("k");
        let body = enhancer.request_body(&AiRequest {
            ocr_text: "Kevin Su".into(),
            image_png: None,
        });
        assert_eq!(body["model"], ANTHROPIC_MODEL);
        assert!(body["messages"][0]["content"].as_str().unwrap().contains("Kevin Su"));
    }

    #[test]
    fn image_goes_first_as_base64() {
        let enhancer = AnthropicEnhancer::new("k").with_model("test-model");
        let body = enhancer.request_body(&AiRequest {
            ocr_text: "Kevin Su".into(),
            image_png: Some(vec![1, 2, 3]),
        });
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["data"], "AQID");
        assert_eq!(content[1]["type"], "text");
        assert_eq!(body["model"], "test-model");
    }

    #[test]
    fn empty_key_is_unavailable() {
        assert!(!AnthropicEnhancer::new("").is_available());
        assert!(AnthropicEnhancer::new("sk-test").is_available());
    }

    #[tokio::test]
    async fn empty_request_fails_before_any_network_call() {
        let err = AnthropicEnhancer::new("k")
            .enhance(&AiRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::AiRequestFailed { .. }));
    }
}
