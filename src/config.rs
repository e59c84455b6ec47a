//! Scanner configuration.
//!
//! Built-in defaults, optionally overlaid by a JSON file in
//! `~/.config/card-scan/config.json`, then by environment variables.
//! Every heuristic threshold lives here so it can be tuned without a rebuild.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub preprocess: PreprocessConfig,
    pub detector: DetectorConfig,
    pub recognizer: RecognizerConfig,
    pub scoring: ScoringConfig,
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Longest edge after downscaling, in pixels.
    pub max_dimension: u32,
    /// Shortest edge after upscaling, in pixels. Small print needs the room.
    pub min_dimension: u32,
    /// Contrast adjustment passed to `image`'s contrast filter.
    pub contrast: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2048,
            min_dimension: 600,
            contrast: 15.0,
        }
    }
}

/// Quadrilateral detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Short side / long side, lower bound.
    pub min_aspect_ratio: f32,
    /// Short side / long side, upper bound.
    pub max_aspect_ratio: f32,
    /// Minimum quadrilateral area as a fraction of the image area.
    pub min_size: f32,
    pub min_confidence: f32,
    pub max_candidates: usize,
    /// Longest edge of the working image used for contour tracing.
    pub working_dimension: u32,
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Polygon approximation epsilon as a fraction of the perimeter.
    pub poly_epsilon: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_aspect_ratio: 0.3,
            max_aspect_ratio: 0.9,
            min_size: 0.2,
            min_confidence: 0.5,
            max_candidates: 3,
            working_dimension: 640,
            blur_sigma: 1.5,
            canny_low: 30.0,
            canny_high: 90.0,
            poly_epsilon: 0.02,
        }
    }
}

/// Recognition level for the OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionLevel {
    #[default]
    Accurate,
    Fast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub level: RecognitionLevel,
    /// Prioritized language sets; the first one the engine supports wins.
    pub languages: Vec<String>,
    pub language_correction: bool,
    /// Minimum text height as a fraction of image height.
    pub min_text_height: f32,
    /// Explicit engine binary. Looked up on PATH when unset.
    pub binary: Option<PathBuf>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            level: RecognitionLevel::Accurate,
            languages: vec![
                "chi_tra+eng".to_string(),
                "chi_sim+eng".to_string(),
                "eng".to_string(),
            ],
            language_correction: true,
            min_text_height: 0.008,
            binary: None,
        }
    }
}

/// Completeness weights per field plus the OCR blend factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub name: f32,
    pub company: f32,
    pub email: f32,
    pub phone: f32,
    pub mobile: f32,
    pub job_title: f32,
    pub address: f32,
    pub website: f32,
    /// Share of the final score taken from OCR aggregate confidence.
    pub ocr_blend: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            name: 0.25,
            company: 0.20,
            email: 0.15,
            phone: 0.10,
            mobile: 0.10,
            job_title: 0.08,
            address: 0.07,
            website: 0.05,
            ocr_blend: 0.3,
        }
    }
}

impl ScoringConfig {
    pub fn total_weight(&self) -> f32 {
        self.name
            + self.company
            + self.email
            + self.phone
            + self.mobile
            + self.job_title
            + self.address
            + self.website
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    /// "anthropic", "gemini", or None to auto-detect from configured keys.
    pub provider: Option<String>,
    pub timeout_ms: u64,
    /// Attach the rectified image to the request.
    pub send_image: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: None,
            timeout_ms: 20_000,
            send_image: true,
        }
    }
}

impl ScanConfig {
    /// Directory holding the user configuration file.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("card-scan")
    }

    /// Defaults → user file (if any) → environment.
    pub fn load() -> Self {
        let path = Self::config_dir().join("config.json");
        let mut config = if path.exists() {
            match Self::from_json_file(&path) {
                Ok(c) => {
                    log::info!("[CONFIG] Loaded {}", path.display());
                    c
                }
                Err(e) => {
                    log::warn!("[CONFIG] Ignoring {}: {}", path.display(), e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        config.apply_env();
        config
    }

    pub fn from_json_file(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config: {}", e))?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| format!("Invalid config JSON: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write config: {}", e))?;
        log::info!("[CONFIG] Saved {}", path.display());
        Ok(())
    }

    /// Apply environment overrides on top of the current values.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("CARD_SCAN_AI") {
            self.ai.enabled = matches!(v.trim(), "1" | "true" | "yes" | "on");
        }
        if let Ok(p) = std::env::var("LLM_PROVIDER") {
            let p = p.trim().to_lowercase();
            if !p.is_empty() {
                self.ai.provider = Some(p);
            }
        }
        if let Ok(mode) = std::env::var("OCR_MODE") {
            self.recognizer.level = match mode.trim() {
                "fast" => RecognitionLevel::Fast,
                _ => RecognitionLevel::Accurate,
            };
        }
        if let Ok(langs) = std::env::var("OCR_LANGS") {
            let langs = langs.trim();
            if !langs.is_empty() {
                // A single explicit set, e.g. "jpn+eng".
                self.recognizer.languages = vec![langs.to_string()];
            }
        }
        if let Ok(t) = std::env::var("AI_TIMEOUT_SECS") {
            match timeout_ms_from_secs(&t) {
                Some(ms) => self.ai.timeout_ms = ms,
                None => log::warn!("[CONFIG] Ignoring AI_TIMEOUT_SECS={:?}", t),
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let d = &self.detector;
        if !(d.min_aspect_ratio > 0.0 && d.min_aspect_ratio <= d.max_aspect_ratio) {
            return Err(format!(
                "detector aspect bounds inverted: [{}, {}]",
                d.min_aspect_ratio, d.max_aspect_ratio
            ));
        }
        if d.max_aspect_ratio > 1.0 {
            return Err("detector.max_aspect_ratio must be <= 1.0".to_string());
        }
        for (name, v) in [("min_size", d.min_size), ("min_confidence", d.min_confidence)] {
            if !(v > 0.0 && v <= 1.0) {
                return Err(format!("detector.{} must be in (0, 1], got {}", name, v));
            }
        }
        if d.max_candidates == 0 {
            return Err("detector.max_candidates must be at least 1".to_string());
        }
        if self.scoring.total_weight() <= 0.0 {
            return Err("scoring weights must not all be zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.scoring.ocr_blend) {
            return Err("scoring.ocr_blend must be in [0, 1]".to_string());
        }
        if self.ai.timeout_ms == 0 {
            return Err("ai.timeout_ms must be positive".to_string());
        }
        if self.recognizer.languages.is_empty() {
            return Err("recognizer.languages must not be empty".to_string());
        }
        Ok(())
    }
}

/// Whole seconds to milliseconds. Zero and garbage are rejected, huge
/// values clamp instead of overflowing.
fn timeout_ms_from_secs(value: &str) -> Option<u64> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs.saturating_mul(1000)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ScanConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.scoring.total_weight() - 1.0).abs() < 1e-6);
        assert_eq!(config.detector.max_candidates, 3);
    }

    #[test]
    fn rejects_inverted_aspect_bounds() {
        let mut config = ScanConfig::default();
        config.detector.min_aspect_ratio = 0.95;
        config.detector.max_aspect_ratio = 0.4;
        assert!(config.validate().unwrap_err().contains("inverted"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ScanConfig =
            serde_json::from_str(r#"{ "ai": { "enabled": true, "timeout_ms": 5000 } }"#).unwrap();
        assert!(config.ai.enabled);
        assert_eq!(config.ai.timeout_ms, 5000);
        assert!(config.ai.send_image);
        assert_eq!(config.detector.min_confidence, 0.5);
    }

    #[test]
    fn ai_timeout_seconds_parse() {
        assert_eq!(timeout_ms_from_secs(" 15 "), Some(15_000));
        assert_eq!(timeout_ms_from_secs("18446744073709551615"), Some(u64::MAX));
        assert_eq!(timeout_ms_from_secs("0"), None);
        assert_eq!(timeout_ms_from_secs("soon"), None);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let path = std::env::temp_dir()
            .join("card-scan-config-test")
            .join("config.json");
        let mut config = ScanConfig::default();
        config.recognizer.level = RecognitionLevel::Fast;
        config.to_json_file(&path).unwrap();

        let loaded = ScanConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.recognizer.level, RecognitionLevel::Fast);

        let _ = std::fs::remove_file(&path);
    }
}
