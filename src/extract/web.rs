//! Email and website rules.

use super::rules::{first_text_match, TextRule};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RULES: LazyLock<Vec<TextRule>> = LazyLock::new(|| {
    vec![TextRule::new(
        "email",
        r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}",
        clean_email,
    )]
});

static WEBSITE_RULES: LazyLock<Vec<TextRule>> = LazyLock::new(|| {
    vec![
        TextRule::new("url", r"(?i)\bhttps?://[^\s,;，]+", clean_url),
        TextRule::new(
            "www",
            r"(?i)\bwww\.[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)+(?:/[^\s,;，]*)?",
            clean_url,
        ),
        TextRule::new(
            "bare-domain",
            r"(?i)\b[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.(?:com|net|org|io|co|tw|cn|hk|jp|biz|info|me|app|dev)(?:\.[a-z]{2})?\b(?:/[^\s,;，]*)?",
            clean_url,
        ),
    ]
});

/// Used to blank out emails before the website scan so a mail domain is
/// never read as a website.
static EMAIL_ANYWHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+").expect("email blanking regex"));

fn clean_email(raw: &str) -> Option<String> {
    let value = raw.trim().trim_end_matches('.');
    (value.matches('@').count() == 1).then(|| value.to_string())
}

fn clean_url(raw: &str) -> Option<String> {
    let value = raw
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ')' | '，'));
    if value.contains('@') || value.len() < 4 {
        return None;
    }
    Some(value.to_string())
}

pub fn extract_email(text: &str) -> Option<String> {
    first_text_match(&EMAIL_RULES, text).map(|(value, _)| value)
}

pub fn extract_website(text: &str) -> Option<String> {
    let without_email = EMAIL_ANYWHERE.replace_all(text, " ");
    first_text_match(&WEBSITE_RULES, &without_email).map(|(value, rule)| {
        log::debug!("[EXTRACT] website via {}", rule);
        value
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_email_wins() {
        let text = "E: kevin.su@abc.com.tw\nalt: ks@xyz.io";
        assert_eq!(extract_email(text).as_deref(), Some("kevin.su@abc.com.tw"));
        assert_eq!(extract_email("no mail here"), None);
    }

    #[test]
    fn website_rule_order() {
        assert_eq!(
            extract_website("www.abc.com https://abc.com/team").as_deref(),
            Some("https://abc.com/team")
        );
        assert_eq!(extract_website("Web: www.abc.com.tw.").as_deref(), Some("www.abc.com.tw"));
        assert_eq!(extract_website("abc-tech.io").as_deref(), Some("abc-tech.io"));
    }

    #[test]
    fn email_domain_is_not_a_website() {
        assert_eq!(extract_website("kevin@abc.com"), None);
        assert_eq!(extract_website("ABC Co., Ltd.\nSec. 2, Rd."), None);
    }
}
