//! Lexical cleanup of recognized text.
//!
//! Whitespace and line-ending normalization is applied everywhere. Character
//! substitutions are deliberately narrow: letter→digit fixes only inside
//! phone-shaped runs, and artifact fixes only inside email-shaped runs, so
//! names and addresses are never rewritten.

use regex::Regex;
use std::sync::LazyLock;

/// Runs that look like phone numbers once confusable letters are counted as digits.
static PHONE_SHAPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[+(]?[0-9OoIlSB](?:[0-9OoIlSB()\-.\s]){6,18}[0-9OoIlSB]").expect("phone-shaped regex")
});

/// Local part, `@` and first domain label, tolerating a space beside the `@`.
static EMAIL_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+ ?@ ?[A-Za-z0-9\-]+").expect("email head regex")
});

/// One more domain label after a `.` (spaces allowed beside it) or a bare `,`.
static DOMAIN_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?: ?\. ?|,)([A-Za-z0-9\-]+)").expect("domain label regex")
});

/// Labels accepted after a separator OCR may have mangled.
const KNOWN_TLDS: &[&str] = &[
    "com", "net", "org", "edu", "gov", "biz", "info", "io", "co", "ai", "app", "dev", "me",
    "tw", "cn", "hk", "jp", "kr", "sg", "my", "uk", "us", "de", "fr", "au", "ca",
];

/// Letters OCR commonly reads in place of digits.
const DIGIT_CONFUSIONS: &[(char, char)] = &[
    ('O', '0'),
    ('o', '0'),
    ('I', '1'),
    ('l', '1'),
    ('S', '5'),
    ('B', '8'),
];

/// Known misreadings inside email domains.
const EMAIL_DOMAIN_FIXES: &[(&str, &str)] = &[
    ("gmai1", "gmail"),
    ("gmall", "gmail"),
    ("hotmai1", "hotmail"),
    ("hotmall", "hotmail"),
    (".corn", ".com"),
    (".c0m", ".com"),
    (".co1n", ".com"),
    (".tvv", ".tw"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a whole recognition text: one cleaned line per input line,
    /// blank lines removed.
    pub fn normalize(&self, text: &str) -> String {
        let unified = text.replace("\r\n", "\n").replace('\r', "\n");
        unified
            .lines()
            .map(|line| self.normalize_line(line))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Clean a single line.
    pub fn normalize_line(&self, line: &str) -> String {
        let collapsed = collapse_whitespace(line);
        let emails_fixed = fix_emails(&collapsed);
        fix_phone_runs(&emails_fixed)
    }
}

fn collapse_whitespace(line: &str) -> String {
    line.split(|c: char| c.is_whitespace() || c == '\u{3000}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn fix_emails(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for head in EMAIL_HEAD.find_iter(line) {
        if head.start() < last {
            continue;
        }
        let end = domain_end(line, head.end());
        if end == head.end() {
            continue;
        }
        out.push_str(&line[last..head.start()]);
        out.push_str(&repair_email(&line[head.start()..end]));
        last = end;
    }
    out.push_str(&line[last..]);
    out
}

/// Extend a domain label by label. A label followed by `:` is the next
/// field's label, and a spaced or comma separator only joins a known TLD.
fn domain_end(line: &str, mut end: usize) -> usize {
    while let Some(caps) = DOMAIN_LABEL.captures(&line[end..]) {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let separator = &whole.as_str()[..label.start()];
        let rest = line[end + whole.end()..].trim_start();
        if rest.starts_with([':', '：']) {
            break;
        }
        let tld = KNOWN_TLDS.contains(&label.as_str().to_lowercase().as_str());
        if separator != "." && !tld {
            break;
        }
        end += whole.end();
    }
    end
}

fn repair_email(run: &str) -> String {
    let compact: String = run.chars().filter(|c| !c.is_whitespace()).collect();
    let Some((local, domain)) = compact.split_once('@') else {
        return compact;
    };
    let mut domain = domain.replace(',', ".").to_lowercase();
    for (wrong, right) in EMAIL_DOMAIN_FIXES {
        domain = domain.replace(wrong, right);
    }
    format!("{}@{}", local, domain)
}

fn fix_phone_runs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for m in PHONE_SHAPED.find_iter(line) {
        let (start, end) = trim_glued_letters(line, m.start(), m.end());
        if start >= end {
            continue;
        }
        let run = &line[start..end];
        let before = line[..start].chars().last();
        let after = line[end..].chars().next();
        // Glued to a word or an email: not a phone number.
        let embedded = before.is_some_and(|c| c.is_alphabetic() || c == '@' || c == '.')
            || after.is_some_and(|c| c.is_alphabetic() || c == '@');
        let digits = run.chars().filter(|c| c.is_ascii_digit()).count();
        if embedded || digits < 6 {
            continue;
        }
        out.push_str(&line[last..start]);
        out.extend(run.chars().map(|c| {
            DIGIT_CONFUSIONS
                .iter()
                .find(|(from, _)| *from == c)
                .map_or(c, |(_, to)| *to)
        }));
        last = end;
    }
    out.push_str(&line[last..]);
    out
}

/// A run can swallow confusable letters from a neighbouring word
/// (`Tel O2-…`, `… 6789 Sales`). Drop them, and the separators they leave
/// behind, from whichever end touches that word.
fn trim_glued_letters(line: &str, start: usize, end: usize) -> (usize, usize) {
    let is_gap = |c: char| c.is_whitespace() || c == '-' || c == '.';
    let mut run = &line[start..end];
    let mut start = start;
    if line[..start].chars().last().is_some_and(char::is_alphabetic) {
        let trimmed = run
            .trim_start_matches(char::is_alphabetic)
            .trim_start_matches(|c: char| is_gap(c) || c == ')');
        start += run.len() - trimmed.len();
        run = trimmed;
    }
    if line[end..].chars().next().is_some_and(char::is_alphabetic) {
        run = run
            .trim_end_matches(char::is_alphabetic)
            .trim_end_matches(|c: char| is_gap(c) || c == '(');
    }
    (start, start + run.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> String {
        TextNormalizer::new().normalize(s)
    }

    #[test]
    fn collapses_whitespace_and_blank_lines() {
        assert_eq!(norm("Kevin   Su\r\n\r\n  Manager \t\r"), "Kevin Su\nManager");
        assert_eq!(norm("蘇凱文\u{3000}\u{3000}經理"), "蘇凱文 經理");
    }

    #[test]
    fn fixes_letters_inside_phone_runs() {
        assert_eq!(norm("Tel: O2-2345-67B9"), "Tel: 02-2345-6789");
        assert_eq!(norm("0912-345-6l8"), "0912-345-618");
    }

    #[test]
    fn phone_run_next_to_words_is_still_fixed() {
        assert_eq!(norm("Tel O2-2345-6789 Sales"), "Tel 02-2345-6789 Sales");
        assert_eq!(norm("Mobile O9l2-345-678"), "Mobile 0912-345-678");
    }

    #[test]
    fn leaves_names_alone() {
        assert_eq!(norm("BOSS Solutions"), "BOSS Solutions");
        assert_eq!(norm("Isabel Olsson"), "Isabel Olsson");
    }

    #[test]
    fn repairs_email_artifacts() {
        assert_eq!(norm("kevin @ abc . com"), "kevin@abc.com");
        assert_eq!(norm("E: amy@gmai1.corn"), "E: amy@gmail.com");
        assert_eq!(norm("amy@abc,com.tw"), "amy@abc.com.tw");
    }

    #[test]
    fn following_labels_stay_out_of_the_domain() {
        assert_eq!(
            norm("E: kevin@abc.com, Web: www.abc.com"),
            "E: kevin@abc.com, Web: www.abc.com"
        );
        assert_eq!(
            norm("Email: kevin@abc.com. Tel: 02-2345-6789"),
            "Email: kevin@abc.com. Tel: 02-2345-6789"
        );
        assert_eq!(norm("kevin@abc.com Sales Dept"), "kevin@abc.com Sales Dept");
        assert_eq!(norm("amy@abc.com , co"), "amy@abc.com , co");
    }

    #[test]
    fn extension_suffix_survives() {
        assert_eq!(norm("03-6123-4567#12"), "03-6123-4567#12");
    }
}
