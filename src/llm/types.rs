//! AI request/response types.
//!
//! The model returns a flat JSON object that deserializes directly into
//! `AiContactFields`. Phone fields go back through the local phone rules
//! before they reach a record.

use crate::error::{Result, ScanError};
use crate::extract::phone::{PhoneKind, PhoneNumber};
use crate::extract::{ParseSource, ParsedContactRecord};
use serde::{Deserialize, Serialize};

/// What the enhancer gets to see.
#[derive(Debug, Clone, Default)]
pub struct AiRequest {
    pub ocr_text: String,
    /// PNG bytes of the card, when image upload is enabled.
    pub image_png: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiContactFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl AiContactFields {
    /// Parse model output, tolerating a surrounding markdown fence.
    pub fn parse(raw: &str) -> Result<Self> {
        let json = strip_code_fences(raw);
        serde_json::from_str::<Self>(&json).map_err(|e| {
            let preview: String = raw.chars().take(200).collect();
            ScanError::ai(format!("malformed response ({}): {}", e, preview))
        })
    }

    /// Convert to a record tagged `ai`. Confidence is left for the scorer.
    pub fn into_record(self) -> ParsedContactRecord {
        let (phone, mobile) = reclassify_phones(self.phone, self.mobile);
        ParsedContactRecord {
            name: clean(self.name),
            job_title: clean(self.job_title),
            company: clean(self.company),
            email: clean(self.email),
            phone,
            mobile,
            address: clean(self.address),
            website: clean(self.website),
            confidence: 0.0,
            source: ParseSource::Ai,
        }
    }
}

/// Models answer "", "null" or "N/A" for missing fields.
fn clean(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    let missing = trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("n/a")
        || trimmed.eq_ignore_ascii_case("none");
    (!missing).then(|| trimmed.to_string())
}

/// Re-format both numbers and move each into the field its prefix belongs
/// to; the same number never fills both.
fn reclassify_phones(
    phone: Option<String>,
    mobile: Option<String>,
) -> (Option<String>, Option<String>) {
    let mut landline_slot: Option<String> = None;
    let mut mobile_slot: Option<String> = None;
    let mut seen: Vec<String> = Vec::new();

    for (raw, claimed) in [(clean(phone), PhoneKind::Landline), (clean(mobile), PhoneKind::Mobile)] {
        let Some(raw) = raw else { continue };
        let (kind, value, key) = match PhoneNumber::parse(&raw) {
            Some(number) => (number.kind, number.formatted(), number.key()),
            // Unrecognised shapes stay where the model put them.
            None => (claimed, raw.clone(), raw.clone()),
        };
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        let slot = match kind {
            PhoneKind::Landline => &mut landline_slot,
            PhoneKind::Mobile => &mut mobile_slot,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    (landline_slot, mobile_slot)
}

/// Remove a leading ```json / ``` fence and its closing fence.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string ("json") on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}
