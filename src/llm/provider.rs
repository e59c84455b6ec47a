//! Provider metadata, API key lookup and provider resolution.

use serde::{Deserialize, Serialize};

/// Keychain service name for stored API keys.
pub const KEYRING_SERVICE: &str = "card-scan";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub env_key: String,
}

/// All known providers, in auto-detection order.
pub fn all_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            id: "anthropic".to_string(),
            name: "Claude Haiku".to_string(),
            env_key: "ANTHROPIC_API_KEY".to_string(),
        },
        ProviderInfo {
            id: "gemini".to_string(),
            name: "Gemini Flash".to_string(),
            env_key: "GEMINI_API_KEY".to_string(),
        },
    ]
}

fn env_key(provider_id: &str) -> Option<&'static str> {
    match provider_id {
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "gemini" => Some("GEMINI_API_KEY"),
        _ => None,
    }
}

/// API key for a provider: environment first, then the OS keychain.
pub fn api_key(provider_id: &str) -> Option<String> {
    let var = env_key(provider_id)?;
    if let Ok(key) = std::env::var(var) {
        if !key.trim().is_empty() {
            return Some(key.trim().to_string());
        }
    }

    let entry = keyring::Entry::new(KEYRING_SERVICE, provider_id).ok()?;
    match entry.get_password() {
        Ok(key) if !key.trim().is_empty() => {
            log::info!("[CONFIG] Loaded {} key from OS keychain", provider_id);
            Some(key.trim().to_string())
        }
        _ => None,
    }
}

/// Store a provider key in the OS keychain.
pub fn save_api_key(provider_id: &str, key: &str) -> Result<(), String> {
    if env_key(provider_id).is_none() {
        return Err(format!("Unknown provider: {}", provider_id));
    }
    let entry = keyring::Entry::new(KEYRING_SERVICE, provider_id)
        .map_err(|e| format!("Keyring error: {}", e))?;
    entry
        .set_password(key.trim())
        .map_err(|e| format!("Failed to save key: {}", e))?;
    log::info!("[CONFIG] Saved {} key to OS keychain", provider_id);
    Ok(())
}

/// Pick the provider to use.
///
/// Priority:
/// 1. Explicit choice (config file or `LLM_PROVIDER`, already merged)
/// 2. First provider with an API key
///
/// `None` means AI enhancement is unavailable.
pub fn resolve_provider(explicit: Option<&str>) -> Option<String> {
    if let Some(p) = explicit {
        let p = p.trim().to_lowercase();
        if env_key(&p).is_some() {
            log::info!("[AI] Provider override: {}", p);
            return Some(p);
        }
        log::warn!("[AI] Unknown provider '{}', auto-detecting", p);
    }

    all_providers()
        .into_iter()
        .map(|p| p.id)
        .find(|id| api_key(id).is_some())
}
