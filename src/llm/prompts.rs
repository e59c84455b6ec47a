//! Prompt constants for contact extraction.
//!
//! The JSON shape requested here is the contract with `AiContactFields`.
//! Keep both in step.

pub const ANTHROPIC_MODEL: &str = "claude-haiku-4-5-20251001";
pub const GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const MAX_TOKENS: u32 = 512;

/// System prompt shared by every provider.
pub const CONTACT_SYSTEM_PROMPT: &str = r#"You read business cards. You receive the OCR text of one card and, when available, a photo of the card. Your job is to return the contact details as a single JSON object.

<rules>
1. ALWAYS respond with valid JSON matching the schema below. No prose, no markdown, no explanation.
2. Use the photo to correct OCR mistakes, but never invent information that is on neither the photo nor the text.
3. Use null for any field that is not on the card.
4. "phone" is a landline or office number; "mobile" is a mobile/cell number. Never put the same number in both fields.
5. Ignore fax numbers.
6. Keep names, titles and company names in the script printed on the card. If the card shows both Chinese and English, prefer the Chinese form for name and company.
7. Keep an extension on the phone number, written as main#extension.
8. "address" is the full postal address on one line, without the postal code prefix.
</rules>

<response_format>
{
  "name": "<person's full name or null>",
  "jobTitle": "<job title or null>",
  "company": "<company or organization or null>",
  "email": "<email or null>",
  "phone": "<landline number or null>",
  "mobile": "<mobile number or null>",
  "address": "<postal address or null>",
  "website": "<website or null>"
}
</response_format>"#;

/// Wraps the OCR text for the user turn.
pub fn build_contact_message(ocr_text: &str, has_image: bool) -> String {
    format!(
        r#"<card_context>
  <photo_attached>{has_image}</photo_attached>
</card_context>

<ocr_text>
{ocr_text}
</ocr_text>"#
    )
}
