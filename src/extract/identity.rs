//! Name, company and job-title rules.
//!
//! These fields cluster near the top of a card, so every rule looks at the
//! upper region before the rest of the card.

use super::keywords::{
    address_hits, entity_strength, has_title, title_terms, EntityStrength, JOB_TITLES_CJK,
};
use super::lines::{CardLine, CardLines, Claims};
use super::rules::LineRule;
use regex::Regex;
use std::sync::LazyLock;

const RELAXED_NAME_CHARS: std::ops::RangeInclusive<usize> = 2..=15;
const MAX_TITLE_CHARS: usize = 40;
const MAX_SUFFIX_TITLE_CHARS: usize = 20;

static LATIN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][A-Za-z'\-]*\.?(?:[ \t]+[A-Z][A-Za-z'\-]*\.?){1,3}$").expect("latin name regex")
});

static ROLE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[a-z]{2,}(?:ist|ant|ager|ector|ineer|ician|visor|ator)|[長師員理監])$")
        .expect("role suffix regex")
});

pub static COMPANY_KEYWORD_RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![
        LineRule {
            name: "entity-strong",
            select: strong_entity,
        },
        LineRule {
            name: "entity-weak",
            select: weak_entity,
        },
    ]
});

pub static COMPANY_FALLBACK_RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![LineRule {
        name: "longest-upper",
        select: longest_upper,
    }]
});

pub static NAME_RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![
        LineRule {
            name: "strict-name",
            select: strict_name,
        },
        LineRule {
            name: "relaxed-name",
            select: relaxed_name,
        },
    ]
});

pub static TITLE_RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![LineRule {
        name: "title-dictionary",
        select: dictionary_title,
    }]
});

pub static TITLE_FALLBACK_RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![LineRule {
        name: "title-suffix",
        select: suffix_title,
    }]
});

fn is_han(c: char) -> bool {
    matches!(c as u32, 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF)
}

fn has_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

fn has_letter(text: &str) -> bool {
    text.chars().any(char::is_alphabetic)
}

/// Upper region first, then the whole card.
fn upper_then_all<'a>(
    lines: &'a CardLines,
    claims: &'a Claims,
) -> impl Iterator<Item = (usize, &'a CardLine)> + 'a {
    lines.free_upper(claims).chain(lines.free(claims))
}

/// Lines that can never hold a person's name.
fn excluded_from_name(text: &str) -> bool {
    let lower = text.to_lowercase();
    has_digit(text)
        || text.contains('@')
        || lower.contains("www")
        || text.contains(':')
        || text.contains('：')
        || entity_strength(text).is_some()
}

fn strong_entity(lines: &CardLines, claims: &Claims) -> Option<(usize, String)> {
    upper_then_all(lines, claims)
        .find(|(_, line)| entity_strength(&line.text) == Some(EntityStrength::Strong))
        .map(|(i, line)| (i, line.text.clone()))
}

fn weak_entity(lines: &CardLines, claims: &Claims) -> Option<(usize, String)> {
    upper_then_all(lines, claims)
        .find(|(_, line)| {
            entity_strength(&line.text) == Some(EntityStrength::Weak) && !has_title(&line.text)
        })
        .map(|(i, line)| (i, line.text.clone()))
}

fn longest_upper(lines: &CardLines, claims: &Claims) -> Option<(usize, String)> {
    lines
        .free_upper(claims)
        .filter(|(_, line)| {
            let text = &line.text;
            text.chars().count() >= 2
                && has_letter(text)
                && !has_digit(text)
                && !text.contains('@')
                && !has_title(text)
                && address_hits(text) < 2
        })
        // Longest, earliest on ties.
        .max_by(|a, b| {
            a.1.text
                .chars()
                .count()
                .cmp(&b.1.text.chars().count())
                .then(b.0.cmp(&a.0))
        })
        .map(|(i, line)| (i, line.text.clone()))
}

/// A 2-4 character Han name, possibly sharing the line with a CJK title.
fn cjk_name(text: &str) -> Option<String> {
    let mut rest = text.to_string();
    for term in title_terms(text).into_iter().filter(|t| JOB_TITLES_CJK.contains(t)) {
        rest = rest.replacen(term, " ", 1);
    }
    let compact: String = rest.chars().filter(|c| !c.is_whitespace()).collect();
    let len = compact.chars().count();
    ((2..=4).contains(&len) && compact.chars().all(is_han) && address_hits(text) < 2)
        .then_some(compact)
}

fn latin_name(text: &str) -> Option<String> {
    (LATIN_NAME.is_match(text) && !has_title(text) && address_hits(text) == 0)
        .then(|| text.to_string())
}

fn strict_name(lines: &CardLines, claims: &Claims) -> Option<(usize, String)> {
    upper_then_all(lines, claims).find_map(|(i, line)| {
        if excluded_from_name(&line.text) {
            return None;
        }
        cjk_name(&line.text)
            .or_else(|| latin_name(&line.text))
            .map(|name| (i, name))
    })
}

fn relaxed_name(lines: &CardLines, claims: &Claims) -> Option<(usize, String)> {
    upper_then_all(lines, claims)
        .find(|(_, line)| {
            let text = &line.text;
            RELAXED_NAME_CHARS.contains(&text.chars().count())
                && has_letter(text)
                && !excluded_from_name(text)
                && !has_title(text)
                && address_hits(text) < 2
        })
        .map(|(i, line)| (i, line.text.clone()))
}

/// Title written on the same line as the name, e.g. `蘇凱文 經理`.
pub fn title_beside_name(line: &str, name: &str) -> Option<String> {
    let rest = line.replacen(name, "", 1);
    let rest = rest.trim();
    (rest.len() < line.trim().len() && !rest.is_empty() && has_title(rest))
        .then(|| rest.to_string())
}

fn dictionary_title(lines: &CardLines, claims: &Claims) -> Option<(usize, String)> {
    upper_then_all(lines, claims)
        .find(|(_, line)| {
            let text = &line.text;
            has_title(text)
                && text.chars().count() <= MAX_TITLE_CHARS
                && !text.contains('@')
                && !has_digit(text)
        })
        .map(|(i, line)| (i, line.text.clone()))
}

fn suffix_title(lines: &CardLines, claims: &Claims) -> Option<(usize, String)> {
    upper_then_all(lines, claims)
        .find(|(_, line)| {
            let text = line.text.trim();
            text.chars().count() <= MAX_SUFFIX_TITLE_CHARS
                && !has_digit(text)
                && !text.contains('@')
                && ROLE_SUFFIX.is_match(text)
        })
        .map(|(i, line)| (i, line.text.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::rules::first_line_match;

    fn run(rules: &[LineRule], text: &str) -> Option<String> {
        let lines = CardLines::from_text(text);
        first_line_match(rules, &lines, &Claims::default()).map(|(_, v, _)| v)
    }

    #[test]
    fn strict_names_in_both_scripts() {
        assert_eq!(run(&NAME_RULES, "ABC Co., Ltd.\nKevin Su").as_deref(), Some("Kevin Su"));
        assert_eq!(run(&NAME_RULES, "凱文科技有限公司\n蘇凱文").as_deref(), Some("蘇凱文"));
        assert_eq!(run(&NAME_RULES, "蘇凱文 經理").as_deref(), Some("蘇凱文"));
    }

    #[test]
    fn name_exclusions() {
        assert_eq!(run(&NAME_RULES, "Sales Manager\nkevin@abc.com\n0912-345-678"), None);
        assert_eq!(run(&NAME_RULES, "www.abc.com"), None);
    }

    #[test]
    fn relaxed_name_takes_short_plain_line() {
        assert_eq!(run(&NAME_RULES, "kevin su").as_deref(), Some("kevin su"));
    }

    #[test]
    fn company_prefers_entity_suffix() {
        let text = "Kevin Su\nNimbus Labs\nNimbus Cloud Co., Ltd.";
        assert_eq!(
            run(&COMPANY_KEYWORD_RULES, text).as_deref(),
            Some("Nimbus Cloud Co., Ltd.")
        );
        assert_eq!(run(&COMPANY_KEYWORD_RULES, "Kevin Su\nNimbus Labs").as_deref(), Some("Nimbus Labs"));
    }

    #[test]
    fn company_falls_back_to_longest_upper_line() {
        let lines = CardLines::from_text("Kevin Su\nBlue Harbor Trading\nManager");
        let mut claims = Claims::default();
        claims.claim(0);
        let (_, company, _) = first_line_match(&COMPANY_FALLBACK_RULES, &lines, &claims).unwrap();
        assert_eq!(company, "Blue Harbor Trading");
    }

    #[test]
    fn titles_by_dictionary_then_suffix() {
        assert_eq!(run(&TITLE_RULES, "Kevin Su\nSenior Product Manager").as_deref(), Some("Senior Product Manager"));
        assert_eq!(run(&TITLE_RULES, "蘇凱文\n業務副理").as_deref(), Some("業務副理"));
        assert_eq!(run(&TITLE_FALLBACK_RULES, "Pharmacist").as_deref(), Some("Pharmacist"));
        assert_eq!(run(&TITLE_FALLBACK_RULES, "品管組員").as_deref(), Some("品管組員"));
    }

    #[test]
    fn title_next_to_name() {
        assert_eq!(title_beside_name("蘇凱文 經理", "蘇凱文").as_deref(), Some("經理"));
        assert_eq!(title_beside_name("Kevin Su", "Kevin Su"), None);
    }
}
