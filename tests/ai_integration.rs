//! Live test against the Anthropic API.
//!
//! Skips unless ANTHROPIC_API_KEY is set (environment or .env.local).
//! Loads the key with dotenvy, same as the CLI.

use card_scan_lib::llm::{AiEnhancer, AiRequest, AnthropicEnhancer};
use card_scan_lib::ParseSource;

fn load_env() {
    let env_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env.local");
    if env_path.exists() {
        match dotenvy::from_path(&env_path) {
            Ok(_) => eprintln!("[TEST] Loaded {}", env_path.display()),
            Err(e) => eprintln!("[TEST] Failed to load {}: {}", env_path.display(), e),
        }
    }
}

#[tokio::test]
async fn test_anthropic_reads_a_card() {
    load_env();

    let Some(enhancer) = AnthropicEnhancer::from_env() else {
        eprintln!("SKIP: No ANTHROPIC_API_KEY");
        return;
    };

    let request = AiRequest {
        ocr_text: "凱文科技股份有限公司\n蘇凱文 總經理\n電話：02-2345-6789 分機 12\n手機：0912 345 678\nkevin@kevin-tech.com.tw".into(),
        image_png: None,
    };

    let start = std::time::Instant::now();
    let fields = enhancer.enhance(&request).await.expect("enhance failed");
    eprintln!("[TEST] Anthropic answered in {}ms", start.elapsed().as_millis());
    eprintln!("[TEST] {:?}", fields);

    let record = fields.into_record();
    assert_eq!(record.source, ParseSource::Ai);
    assert_eq!(record.mobile.as_deref(), Some("0912-345-678"));
    assert_eq!(record.email.as_deref(), Some("kevin@kevin-tech.com.tw"));
    assert!(record.name.as_deref().unwrap_or_default().contains("蘇凱文"));
    assert_ne!(record.phone, record.mobile);
}
