//! Contact submission: what gets handed to storage once the user confirms.
//!
//! Serialized camelCase with the photo as base64 PNG, or rendered as a
//! vCard 3.0 card for export.

use crate::capture::to_png_bytes;
use crate::extract::{ParseSource, ParsedContactRecord};
use crate::pipeline::ProcessingOutcome;
use base64::Engine;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// vCard lines longer than this many octets are folded.
const VCARD_LINE_OCTETS: usize = 75;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub name: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    /// PNG bytes of the card.
    #[serde(default, with = "photo_base64")]
    pub photo: Option<Vec<u8>>,
    #[serde(rename = "rawOCRText")]
    pub raw_ocr_text: String,
    pub parse_source: ParseSource,
    pub confidence: f32,
}

impl ContactSubmission {
    pub fn new(record: ParsedContactRecord, photo: Option<Vec<u8>>, raw_ocr_text: &str) -> Self {
        Self {
            name: record.name,
            job_title: record.job_title,
            company: record.company,
            email: record.email,
            phone: record.phone,
            mobile: record.mobile,
            address: record.address,
            website: record.website,
            photo,
            raw_ocr_text: raw_ocr_text.to_string(),
            parse_source: record.source,
            confidence: record.confidence,
        }
    }

    /// Submission for a successful run, photo taken from the rectified image.
    /// `None` for any other outcome.
    pub fn from_outcome(outcome: &ProcessingOutcome, raw_ocr_text: &str) -> Option<Self> {
        let ProcessingOutcome::Success {
            record,
            rectified_image,
        } = outcome
        else {
            return None;
        };
        Some(Self::new(record.clone(), encode_photo(rectified_image), raw_ocr_text))
    }

    /// Manual entry after `RecognitionFailed`: empty fields, original photo.
    pub fn manual(original_image: &DynamicImage) -> Self {
        Self {
            photo: encode_photo(original_image),
            ..Default::default()
        }
    }

    pub fn to_vcard(&self) -> String {
        let mut lines = vec!["BEGIN:VCARD".to_string(), "VERSION:3.0".to_string()];

        let display = self
            .name
            .as_deref()
            .or(self.company.as_deref())
            .unwrap_or_default();
        lines.push(format!("FN:{}", escape(display)));
        lines.push(format!("N:{}", structured_name(self.name.as_deref().unwrap_or_default())));

        let mut push = |prop: &str, value: &Option<String>| {
            if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                lines.push(format!("{}:{}", prop, escape(v)));
            }
        };
        push("ORG", &self.company);
        push("TITLE", &self.job_title);
        push("TEL;TYPE=WORK,VOICE", &self.phone);
        push("TEL;TYPE=CELL", &self.mobile);
        push("EMAIL;TYPE=INTERNET", &self.email);
        push("URL", &self.website);

        if let Some(address) = self.address.as_deref().filter(|a| !a.trim().is_empty()) {
            // Whole address goes in the street component.
            lines.push(format!("ADR;TYPE=WORK:;;{};;;;", escape(address)));
        }
        if let Some(photo) = self.photo.as_deref().filter(|p| !p.is_empty()) {
            lines.push(format!(
                "PHOTO;ENCODING=b;TYPE=PNG:{}",
                base64::engine::general_purpose::STANDARD.encode(photo)
            ));
        }
        lines.push("END:VCARD".to_string());

        let mut out = String::new();
        for line in lines {
            out.push_str(&fold(&line));
            out.push_str("\r\n");
        }
        out
    }
}

fn encode_photo(image: &DynamicImage) -> Option<Vec<u8>> {
    match to_png_bytes(image) {
        Ok(png) => Some(png),
        Err(e) => {
            log::warn!("[CONTACT] Photo dropped: {}", e);
            None
        }
    }
}

/// `Family;Given;;;` for "Given Family", the whole name as family name for
/// anything without spaces (CJK names).
fn structured_name(name: &str) -> String {
    let name = name.trim();
    match name.rsplit_once(' ') {
        Some((given, family)) => format!("{};{};;;", escape(family.trim()), escape(given.trim())),
        None => format!("{};;;;", escape(name)),
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Fold at 75 octets without splitting a UTF-8 character.
fn fold(line: &str) -> String {
    if line.len() <= VCARD_LINE_OCTETS {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + line.len() / VCARD_LINE_OCTETS * 3);
    let mut width = 0;
    for c in line.chars() {
        // Continuation lines start with a space, which counts toward the limit.
        if width + c.len_utf8() > VCARD_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += c.len_utf8();
    }
    out
}

mod photo_base64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(photo: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match photo {
            Some(bytes) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kevin() -> ContactSubmission {
        ContactSubmission::new(
            ParsedContactRecord {
                name: Some("Kevin Su".into()),
                job_title: Some("Manager".into()),
                company: Some("ABC Technology Co., Ltd.".into()),
                email: Some("kevin@abc.com".into()),
                mobile: Some("0912-345-678".into()),
                confidence: 0.7,
                ..Default::default()
            },
            None,
            "Kevin Su\nManager",
        )
    }

    #[test]
    fn serializes_with_persistence_field_names() {
        let json = serde_json::to_value(kevin()).unwrap();
        assert_eq!(json["jobTitle"], "Manager");
        assert_eq!(json["rawOCRText"], "Kevin Su\nManager");
        assert_eq!(json["parseSource"], "heuristic");
        assert!(json["photo"].is_null());
    }

    #[test]
    fn photo_travels_as_base64() {
        let mut submission = kevin();
        submission.photo = Some(vec![1, 2, 3]);
        let json = serde_json::to_string(&submission).unwrap();
        assert!(json.contains("\"photo\":\"AQID\""));
        let back: ContactSubmission = serde_json::from_str(&json).unwrap();
        assert_eq!(back.photo, Some(vec![1, 2, 3]));
    }

    #[test]
    fn vcard_has_escaped_fields() {
        let card = kevin().to_vcard();
        assert!(card.starts_with("BEGIN:VCARD\r\nVERSION:3.0\r\n"));
        assert!(card.contains("FN:Kevin Su\r\n"));
        assert!(card.contains("N:Su;Kevin;;;\r\n"));
        assert!(card.contains("ORG:ABC Technology Co.\\, Ltd.\r\n"));
        assert!(card.contains("TEL;TYPE=CELL:0912-345-678\r\n"));
        assert!(!card.contains("TEL;TYPE=WORK"));
        assert!(card.ends_with("END:VCARD\r\n"));
    }

    #[test]
    fn cjk_name_is_family_name() {
        assert_eq!(structured_name("蘇凱文"), "蘇凱文;;;;");
    }

    #[test]
    fn long_lines_fold_on_char_boundaries() {
        let line = format!("NOTE:{}", "名".repeat(40));
        let folded = fold(&line);
        for part in folded.split("\r\n") {
            assert!(part.len() <= VCARD_LINE_OCTETS, "{}", part.len());
        }
        assert_eq!(folded.replace("\r\n ", ""), line);
    }

    #[test]
    fn only_success_becomes_a_submission() {
        let outcome = ProcessingOutcome::Error("cancelled".into());
        assert!(ContactSubmission::from_outcome(&outcome, "").is_none());

        let outcome = ProcessingOutcome::Success {
            record: ParsedContactRecord::default(),
            rectified_image: DynamicImage::new_rgb8(4, 4),
        };
        let submission = ContactSubmission::from_outcome(&outcome, "x").unwrap();
        assert!(submission.photo.is_some());
    }
}
