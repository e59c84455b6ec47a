//! Address rules: an explicit label first, then the best-scoring line.

use super::keywords::address_hits;
use super::lines::{CardLines, Claims};
use super::rules::LineRule;
use regex::Regex;
use std::sync::LazyLock;

/// Minimum distinct indicator tokens for an unlabelled line.
const MIN_ADDRESS_HITS: usize = 2;
const MIN_ADDRESS_CHARS: usize = 8;

static ADDRESS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:address|addr|add)\b\.?[ \t]*[:：]|(?:公司)?地址[ \t]*[:：]?|住址[ \t]*[:：]?)[ \t]*(.+)$")
        .expect("address label regex")
});

static SEQUENCE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?\d{1,2}[.)、][ \t]*").expect("sequence regex"));

/// Postal code directly in front of a CJK address.
static POSTAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{3}(?:\d{2,3})?[ \t]*(\p{Han})").expect("postal regex")
});

pub static ADDRESS_RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![
        LineRule {
            name: "address-label",
            select: labelled,
        },
        LineRule {
            name: "address-score",
            select: best_scored,
        },
    ]
});

fn labelled(lines: &CardLines, claims: &Claims) -> Option<(usize, String)> {
    lines.free(claims).find_map(|(i, line)| {
        let caps = ADDRESS_LABEL.captures(&line.text)?;
        let value = clean_address(&caps[1]);
        (!value.is_empty()).then_some((i, value))
    })
}

fn best_scored(lines: &CardLines, claims: &Claims) -> Option<(usize, String)> {
    lines
        .free(claims)
        .filter(|(_, line)| !line.text.contains('@') && line.text.chars().count() >= MIN_ADDRESS_CHARS)
        .filter_map(|(i, line)| {
            let hits = address_hits(&line.text);
            let has_digit = line.text.chars().any(|c| c.is_ascii_digit());
            (hits >= MIN_ADDRESS_HITS).then_some((i, hits * 2 + usize::from(has_digit)))
        })
        // Highest score, earliest line on ties.
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .and_then(|(i, _)| {
            let value = clean_address(&lines.get(i)?.text);
            (!value.is_empty()).then_some((i, value))
        })
}

/// Strip a leading sequence number and postal code.
pub fn clean_address(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_seq = SEQUENCE_PREFIX.replace(trimmed, "");
    let without_postal = POSTAL_PREFIX.replace(&without_seq, "$1");
    without_postal
        .trim()
        .trim_end_matches(|c: char| matches!(c, ',' | '，' | ';'))
        .trim()
        .to_string()
}
