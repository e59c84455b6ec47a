//! Ordered rule tables.
//!
//! Each field is described by a list of rules tried in order; the first rule
//! producing a value wins. Text rules pair a pattern with a post-processor,
//! line rules pick from the candidate lines of the card.

use super::lines::{CardLines, Claims};
use regex::Regex;

/// Pattern + post-processing step over the whole text.
pub struct TextRule {
    pub name: &'static str,
    pub pattern: Regex,
    /// Turns a raw match into a field value, or rejects it.
    pub post: fn(&str) -> Option<String>,
}

impl TextRule {
    pub fn new(name: &'static str, pattern: &str, post: fn(&str) -> Option<String>) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap_or_else(|e| panic!("rule '{}': {}", name, e)),
            post,
        }
    }

    /// First match in `text` that survives post-processing.
    pub fn apply(&self, text: &str) -> Option<String> {
        self.pattern
            .find_iter(text)
            .find_map(|m| (self.post)(m.as_str()))
    }
}

/// Try `rules` in order and report which one produced the value.
pub fn first_text_match(rules: &[TextRule], text: &str) -> Option<(String, &'static str)> {
    rules
        .iter()
        .find_map(|rule| rule.apply(text).map(|v| (v, rule.name)))
}

/// Selects a value from the card's lines, returning the line index it used.
pub struct LineRule {
    pub name: &'static str,
    pub select: fn(&CardLines, &Claims) -> Option<(usize, String)>,
}

pub fn first_line_match(
    rules: &[LineRule],
    lines: &CardLines,
    claims: &Claims,
) -> Option<(usize, String, &'static str)> {
    rules.iter().find_map(|rule| {
        (rule.select)(lines, claims).map(|(idx, value)| {
            log::debug!("[EXTRACT] rule '{}' matched line {}", rule.name, idx);
            (idx, value, rule.name)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep(raw: &str) -> Option<String> {
        let v = raw.trim();
        (!v.is_empty()).then(|| v.to_string())
    }

    fn digits_only(raw: &str) -> Option<String> {
        let d: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        (d.len() >= 3).then_some(d)
    }

    #[test]
    fn first_surviving_rule_wins() {
        let rules = vec![
            TextRule::new("never", r"zzz", keep),
            TextRule::new("short-digits", r"\d[\d-]*", digits_only),
        ];
        let (value, rule) = first_text_match(&rules, "a 12 b 3-4-5").unwrap();
        assert_eq!(value, "345");
        assert_eq!(rule, "short-digits");
    }

    #[test]
    fn no_rule_no_value() {
        let rules = vec![TextRule::new("x", r"x+", keep)];
        assert!(first_text_match(&rules, "abc").is_none());
    }
}
