//! card-scan CLI.
//!
//! Usage:
//!   card-scan <image>                      Scan one card, print the fields
//!   card-scan <image> --json               Print the record as JSON
//!   card-scan <image> --vcard              Print a vCard 3.0 card
//!   card-scan <image> --ai                 Try the remote AI extractor first
//!   card-scan <image> --fast               Faster, less accurate OCR
//!   card-scan --batch <directory>          One JSON line per image
//!   card-scan --save-key <provider>        Store an API key (read from stdin)
//!                                          in the OS keychain

use card_scan_lib::config::RecognitionLevel;
use card_scan_lib::detect::{ContourDetector, ProjectiveRectifier};
use card_scan_lib::ocr::TesseractRecognizer;
use card_scan_lib::{
    llm, ContactSubmission, PipelineOrchestrator, ProcessingOutcome, RawCapture, ScanConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

struct Options {
    ai: bool,
    json: bool,
    vcard: bool,
}

#[tokio::main]
async fn main() {
    card_scan_lib::load_env_files();
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage:");
        eprintln!("  card-scan <image> [--ai] [--json|--vcard] [--fast]");
        eprintln!("  card-scan --batch <directory> [--ai] [--fast]");
        eprintln!("  card-scan --save-key <anthropic|gemini>");
        std::process::exit(1);
    }

    if args[1] == "--save-key" {
        let Some(provider) = args.get(2) else {
            eprintln!("--save-key requires a provider id");
            std::process::exit(1);
        };
        std::process::exit(save_key(provider));
    }

    let flag = |name: &str| args.iter().any(|a| a == name);
    let mut config = ScanConfig::load();
    if flag("--fast") {
        config.recognizer.level = RecognitionLevel::Fast;
    }
    let options = Options {
        ai: flag("--ai") || config.ai.enabled,
        json: flag("--json"),
        vcard: flag("--vcard"),
    };

    let orchestrator = match build_orchestrator(config, options.ai).await {
        Ok(o) => o,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if args[1] == "--batch" {
        let Some(dir) = args.get(2) else {
            eprintln!("--batch requires a directory path");
            std::process::exit(1);
        };
        run_batch(&orchestrator, Path::new(dir), &options).await;
    } else {
        let code = run_single(&orchestrator, Path::new(&args[1]), &options).await;
        std::process::exit(code);
    }
}

fn save_key(provider: &str) -> i32 {
    eprintln!("Paste the {} API key and press Enter:", provider);
    let mut key = String::new();
    if let Err(e) = std::io::stdin().read_line(&mut key) {
        eprintln!("Failed to read key: {}", e);
        return 1;
    }
    if key.trim().is_empty() {
        eprintln!("Empty key, nothing saved");
        return 1;
    }
    match llm::provider::save_api_key(&provider.trim().to_lowercase(), &key) {
        Ok(()) => {
            eprintln!("Saved {} key to the OS keychain", provider);
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

async fn build_orchestrator(config: ScanConfig, ai: bool) -> Result<PipelineOrchestrator, String> {
    let recognizer = TesseractRecognizer::new(config.recognizer.clone())
        .await
        .map_err(|e| format!("OCR engine unavailable: {}", e))?;
    let detector = ContourDetector::new(config.detector.clone());
    let provider = config.ai.provider.clone();

    let mut orchestrator = PipelineOrchestrator::new(
        config,
        Arc::new(detector),
        Arc::new(ProjectiveRectifier::new()),
        Arc::new(recognizer),
    );
    if ai {
        match llm::enhancer_for(provider.as_deref()) {
            Some(enhancer) => orchestrator = orchestrator.with_enhancer(enhancer),
            None => eprintln!("No AI provider key configured, using heuristics only"),
        }
    }
    Ok(orchestrator)
}

async fn run_single(orchestrator: &PipelineOrchestrator, path: &Path, options: &Options) -> i32 {
    let capture = match RawCapture::open(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", path.display(), e.user_message());
            return 1;
        }
    };

    let (outcome, report) = orchestrator
        .run(capture, options.ai, &CancellationToken::new())
        .await;
    for (state, took) in &report.timings {
        log::info!("[PIPELINE] {:?}: {}ms", state, took.as_millis());
    }

    match &outcome {
        ProcessingOutcome::Success { record, .. } => {
            if options.vcard {
                if let Some(submission) = ContactSubmission::from_outcome(&outcome, &report.ocr_text) {
                    print!("{}", submission.to_vcard());
                }
            } else if options.json {
                match serde_json::to_string_pretty(record) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Failed to serialize record: {}", e);
                        return 1;
                    }
                }
            } else {
                print_record(record);
            }
            0
        }
        ProcessingOutcome::RecognitionFailed { .. } => {
            eprintln!("No text could be read from {}. Retry or enter the details manually.", path.display());
            2
        }
        ProcessingOutcome::Error(reason) => {
            eprintln!("{}: {}", path.display(), reason);
            1
        }
    }
}

fn print_record(record: &card_scan_lib::ParsedContactRecord) {
    let rows = [
        ("Name", &record.name),
        ("Title", &record.job_title),
        ("Company", &record.company),
        ("Email", &record.email),
        ("Phone", &record.phone),
        ("Mobile", &record.mobile),
        ("Address", &record.address),
        ("Website", &record.website),
    ];
    for (label, value) in rows {
        println!("{:<8} {}", label, value.as_deref().unwrap_or("-"));
    }
    println!("{:<8} {:.2} ({})", "Score", record.confidence, record.source);
}

async fn run_batch(orchestrator: &PipelineOrchestrator, dir: &Path, options: &Options) {
    let entries = match list_images(dir) {
        Ok(entries) if !entries.is_empty() => entries,
        Ok(_) => {
            eprintln!("No image files found in {}", dir.display());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to read {}: {}", dir.display(), e);
            std::process::exit(1);
        }
    };

    let mut succeeded = 0;
    for path in &entries {
        let start = Instant::now();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let line = match RawCapture::open(path) {
            Ok(capture) => match orchestrator.process(capture, options.ai).await {
                ProcessingOutcome::Success { record, .. } => {
                    succeeded += 1;
                    serde_json::json!({
                        "file": filename,
                        "outcome": "success",
                        "record": record,
                        "ms": start.elapsed().as_millis() as u64,
                    })
                }
                ProcessingOutcome::RecognitionFailed { .. } => serde_json::json!({
                    "file": filename,
                    "outcome": "recognitionFailed",
                    "ms": start.elapsed().as_millis() as u64,
                }),
                ProcessingOutcome::Error(reason) => serde_json::json!({
                    "file": filename,
                    "outcome": "error",
                    "reason": reason,
                }),
            },
            Err(e) => serde_json::json!({
                "file": filename,
                "outcome": "error",
                "reason": e.user_message(),
            }),
        };
        println!("{}", line);
    }
    eprintln!("{}/{} cards read", succeeded, entries.len());
}

fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy().to_lowercase();
                    ext == "png" || ext == "jpg" || ext == "jpeg"
                })
                .unwrap_or(false)
        })
        .collect();
    entries.sort();
    Ok(entries)
}
