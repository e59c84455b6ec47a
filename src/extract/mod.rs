//! Heuristic contact extraction: text and layout in, structured record out.
//!
//! Contact channels (email, website, phones) come from whole-text pattern
//! rules. The remaining fields are picked line by line through ordered rule
//! tables, each line being claimed by at most one field. Every field is
//! independently optional.

mod address;
mod identity;
mod keywords;
mod lines;
pub mod phone;
mod rules;
mod score;
mod web;

pub use lines::UPPER_REGION;
pub use phone::{classify, format_phone, split_extension, PhoneKind};
pub use score::{ConfidenceScorer, Field};

use crate::ocr::RecognizedTextBlock;
use lines::{CardLines, Claims};
use rules::{first_line_match, LineRule};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseSource {
    #[default]
    Heuristic,
    Ai,
}

impl std::fmt::Display for ParseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseSource::Heuristic => write!(f, "heuristic"),
            ParseSource::Ai => write!(f, "ai"),
        }
    }
}

/// Structured contact fields read from one card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedContactRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Landline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub source: ParseSource,
}

impl ParsedContactRecord {
    /// A field's value, treating blank strings as absent.
    pub fn field(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Name => &self.name,
            Field::JobTitle => &self.job_title,
            Field::Company => &self.company,
            Field::Email => &self.email,
            Field::Phone => &self.phone,
            Field::Mobile => &self.mobile,
            Field::Address => &self.address,
            Field::Website => &self.website,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn filled_count(&self) -> usize {
        Field::ALL.iter().filter(|f| self.field(**f).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.filled_count() == 0
    }
}

/// Minimum digits for a line to count as a contact-number line.
const CONTACT_LINE_DIGITS: usize = 7;

#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    scorer: ConfidenceScorer,
}

impl FieldExtractor {
    pub fn new(scorer: ConfidenceScorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &ConfidenceScorer {
        &self.scorer
    }

    /// Extract a record from normalized text, using block layout for the
    /// line-based fields when available. The confidence is the pure
    /// completeness score.
    pub fn extract(&self, text: &str, blocks: Option<&[RecognizedTextBlock]>) -> ParsedContactRecord {
        let start = std::time::Instant::now();
        let lines = match blocks {
            Some(blocks) if !blocks.is_empty() => CardLines::from_blocks(blocks),
            _ => CardLines::from_text(text),
        };

        let mut record = ParsedContactRecord {
            email: web::extract_email(text),
            website: web::extract_website(text),
            ..Default::default()
        };
        let phones = phone::extract_phones(text);
        record.phone = phones.phone;
        record.mobile = phones.mobile;

        let mut claims = Claims::default();
        claim_contact_lines(&lines, &mut claims, &record);

        record.address = take(&address::ADDRESS_RULES, &lines, &mut claims);
        record.company = take(&identity::COMPANY_KEYWORD_RULES, &lines, &mut claims);

        if let Some((idx, name, _)) = first_line_match(&identity::NAME_RULES, &lines, &claims) {
            claims.claim(idx);
            record.job_title = lines
                .get(idx)
                .and_then(|line| identity::title_beside_name(&line.text, &name));
            record.name = Some(name);
        }
        if record.job_title.is_none() {
            record.job_title = take(&identity::TITLE_RULES, &lines, &mut claims);
        }
        if record.company.is_none() {
            record.company = take(&identity::COMPANY_FALLBACK_RULES, &lines, &mut claims);
        }
        if record.job_title.is_none() {
            record.job_title = take(&identity::TITLE_FALLBACK_RULES, &lines, &mut claims);
        }

        record.confidence = self.scorer.completeness(&record);
        log::info!(
            "[EXTRACT] {}/{} fields from {} lines in {}ms, completeness={:.2}",
            record.filled_count(),
            Field::ALL.len(),
            lines.len(),
            start.elapsed().as_millis(),
            record.confidence
        );
        record
    }
}

/// Run a rule table and claim the line it used.
fn take(rules: &[LineRule], lines: &CardLines, claims: &mut Claims) -> Option<String> {
    let (idx, value, _) = first_line_match(rules, lines, claims)?;
    claims.claim(idx);
    Some(value)
}

/// Lines carrying an email, the website or a number are off limits for the
/// line-based fields.
fn claim_contact_lines(lines: &CardLines, claims: &mut Claims, record: &ParsedContactRecord) {
    let website = record.website.as_deref().map(str::to_lowercase);
    for idx in 0..lines.len() {
        let Some(line) = lines.get(idx) else { continue };
        let text = &line.text;
        let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
        let visible = text.chars().filter(|c| !c.is_whitespace()).count();
        let numeric = digits >= CONTACT_LINE_DIGITS
            && digits * 2 >= visible
            && keywords::address_hits(text) < 2;
        let has_site = website
            .as_deref()
            .is_some_and(|site| text.to_lowercase().contains(site));
        if text.contains('@') || has_site || numeric {
            claims.claim(idx);
        }
    }
}
