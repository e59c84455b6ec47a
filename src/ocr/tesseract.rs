//! Tesseract OCR via its command-line binary.
//!
//! The image goes in as PNG on stdin, word-level TSV comes back on stdout.
//! Words are grouped into lines, which become `RecognizedTextBlock`s.

use super::{BoundingBox, RecognitionResult, RecognizedTextBlock, TextRecognizer};
use crate::capture::to_png_bytes;
use crate::config::{RecognitionLevel, RecognizerConfig};
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use image::DynamicImage;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Hard ceiling for one recognition run.
const RECOGNITION_TIMEOUT_SECS: u64 = 60;

pub struct TesseractRecognizer {
    config: RecognizerConfig,
    binary: PathBuf,
    /// Language set chosen from what the local install supports.
    language: String,
}

impl TesseractRecognizer {
    /// Locate the binary and pick the best supported language set.
    pub async fn new(config: RecognizerConfig) -> Result<Self> {
        let binary = match &config.binary {
            Some(path) => path.clone(),
            None => which::which("tesseract")
                .map_err(|e| ScanError::engine("tesseract not found on PATH", e))?,
        };

        let installed = list_languages(&binary).await?;
        let language = choose_language(&config.languages, &installed).ok_or_else(|| {
            ScanError::engine_msg(format!(
                "none of {:?} installed (have: {})",
                config.languages,
                installed.join(", ")
            ))
        })?;

        log::info!(
            "[OCR] Tesseract at {} using '{}' ({:?})",
            binary.display(),
            language,
            config.level
        );
        Ok(Self {
            config,
            binary,
            language,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn args(&self) -> Vec<String> {
        let psm = match self.config.level {
            RecognitionLevel::Accurate => "3",
            RecognitionLevel::Fast => "6",
        };
        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
            "--oem".to_string(),
            "1".to_string(),
            "--psm".to_string(),
            psm.to_string(),
            "--dpi".to_string(),
            "300".to_string(),
        ];
        if !self.config.language_correction {
            for var in ["load_system_dawg=0", "load_freq_dawg=0"] {
                args.push("-c".to_string());
                args.push(var.to_string());
            }
        }
        args.push("tsv".to_string());
        args
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, image: &DynamicImage) -> Result<RecognitionResult> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ScanError::ImageInvalid {
                message: "zero-sized image handed to OCR".to_string(),
                source: None,
            });
        }
        let start = std::time::Instant::now();
        let png = to_png_bytes(image)?;

        let mut child = tokio::process::Command::new(&self.binary)
            .args(self.args())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ScanError::engine("failed to spawn tesseract", e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ScanError::engine_msg("no stdin for tesseract"))?;
        let writer = tokio::spawn(async move {
            let res = stdin.write_all(&png).await;
            drop(stdin);
            res
        });

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(RECOGNITION_TIMEOUT_SECS),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            ScanError::engine_msg(format!("tesseract timed out after {}s", RECOGNITION_TIMEOUT_SECS))
        })?
        .map_err(|e| ScanError::engine("tesseract did not finish", e))?;

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ScanError::engine("writing image to tesseract failed", e)),
            Err(e) => return Err(ScanError::engine("stdin writer task failed", e)),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::engine_msg(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let blocks = parse_tsv(&tsv, image.width(), image.height(), self.config.min_text_height);
        let result = RecognitionResult::from_blocks(blocks, start.elapsed());

        log::info!(
            "[OCR] {} blocks, {} chars in {}ms, confidence={:.2}",
            result.blocks.len(),
            result.text.chars().count(),
            result.duration.as_millis(),
            result.confidence
        );
        if result.is_empty() {
            return Err(ScanError::NoTextFound);
        }
        Ok(result)
    }
}

async fn list_languages(binary: &Path) -> Result<Vec<String>> {
    let output = tokio::process::Command::new(binary)
        .arg("--list-langs")
        .output()
        .await
        .map_err(|e| ScanError::engine("failed to query tesseract languages", e))?;
    // Older builds print the list on stderr.
    let mut raw = String::from_utf8_lossy(&output.stdout).into_owned();
    raw.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of"))
        .map(str::to_string)
        .collect())
}

/// First configured set whose every component is installed.
fn choose_language(preferred: &[String], installed: &[String]) -> Option<String> {
    preferred
        .iter()
        .find(|set| set.split('+').all(|lang| installed.iter().any(|i| i == lang)))
        .cloned()
}

/// One word row from the TSV output.
struct Word {
    text: String,
    conf: f32,
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

/// Group level-5 (word) rows by block/paragraph/line into text blocks.
fn parse_tsv(tsv: &str, img_w: u32, img_h: u32, min_text_height: f32) -> Vec<RecognizedTextBlock> {
    let mut lines: BTreeMap<(u32, u32, u32, u32), Vec<Word>> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        let num = |i: usize| cols[i].trim().parse::<u32>().unwrap_or(0);
        let conf = cols[10].trim().parse::<f32>().unwrap_or(-1.0);
        let key = (num(1), num(2), num(3), num(4));
        lines.entry(key).or_default().push(Word {
            text: text.to_string(),
            conf,
            left: num(6),
            top: num(7),
            width: num(8),
            height: num(9),
        });
    }

    let (w, h) = (img_w.max(1) as f32, img_h.max(1) as f32);
    lines
        .into_values()
        .filter_map(|words| {
            let mut text = String::new();
            for word in &words {
                if needs_space(&text, &word.text) {
                    text.push(' ');
                }
                text.push_str(&word.text);
            }

            let confs: Vec<f32> = words.iter().filter(|w| w.conf >= 0.0).map(|w| w.conf).collect();
            let confidence = if confs.is_empty() {
                0.0
            } else {
                confs.iter().sum::<f32>() / confs.len() as f32 / 100.0
            };

            let bbox = words
                .iter()
                .map(|wd| {
                    BoundingBox::new(
                        wd.left as f32 / w,
                        wd.top as f32 / h,
                        wd.width as f32 / w,
                        wd.height as f32 / h,
                    )
                })
                .reduce(|a, b| a.union(&b))?;

            if bbox.height < min_text_height {
                log::debug!("[OCR] Dropping sub-threshold line {:?}", text);
                return None;
            }
            Some(RecognizedTextBlock::new(text, confidence, bbox))
        })
        .collect()
}

/// Latin words are separated by spaces; CJK glyphs are not.
fn needs_space(prev: &str, next: &str) -> bool {
    match (prev.chars().last(), next.chars().next()) {
        (Some(a), Some(b)) => !(is_cjk(a) || is_cjk(b)),
        _ => false,
    }
}

pub(crate) fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x3000..=0x303F | 0xFF00..=0xFFEF)
}
