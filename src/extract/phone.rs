//! Phone number recognition, classification and formatting.
//!
//! Numbers follow the Taiwan numbering plan: mobile numbers start with `09`
//! (10 digits), landlines start with an area code from `AREA_CODES`. A
//! candidate is classified purely by its prefix, so a number can only ever
//! land in one of the two fields.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneKind {
    Mobile,
    Landline,
}

/// Area code, minimum and maximum total digit count (trunk `0` included).
/// Longest matching prefix wins.
pub const AREA_CODES: &[(&str, usize, usize)] = &[
    ("02", 10, 10),
    ("03", 9, 10),
    ("037", 9, 9),
    ("04", 9, 10),
    ("049", 10, 10),
    ("05", 9, 9),
    ("06", 9, 9),
    ("07", 9, 9),
    ("070", 11, 11),
    ("08", 9, 9),
    ("0800", 10, 10),
    ("082", 9, 9),
    ("0826", 9, 9),
    ("0836", 9, 9),
    ("089", 9, 9),
];

const MOBILE_LEN: usize = 10;
const MAX_EXTENSION_LEN: usize = 6;

/// Country codes with two digits; `1` and `7` are one digit, the rest three.
const TWO_DIGIT_COUNTRY_CODES: &[&str] = &[
    "20", "27", "30", "31", "32", "33", "34", "36", "39", "40", "41", "43", "44", "45", "46",
    "47", "48", "49", "51", "52", "53", "54", "55", "56", "57", "58", "60", "61", "62", "63",
    "64", "65", "66", "81", "82", "84", "86", "90", "91", "92", "93", "94", "95", "98",
];

/// Optional extension tail accepted after a strict match.
const EXT: &str = r"(?:[ \t]*(?:#|[Ee][Xx][Tt]\.?|[Xx]|分機|轉)[ \t]*\d{1,6})?";

static EXPLICIT_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*?\d)[ \t]*(?:#|ext\.?|x|分機|轉|,|，)[ \t]*(\d{1,6})[ \t]*$")
        .expect("extension regex")
});

static MOBILE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:\+|\b00)[ \t]?886[ \t\-]?(?:\(0\)|0)?[ \t]?9\d{2}[ \t\-.]?\d{3}[ \t\-.]?\d{3}\b",
        r"\b09\d{2}[ \t\-.]?\d{3}[ \t\-.]?\d{3}\b",
    ]
    .iter()
    .map(|p| Regex::new(&format!("{p}{EXT}")).expect("mobile regex"))
    .collect()
});

static LANDLINE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:\+|\b00)[ \t]?886[ \t\-]?(?:\(0\)|0)?[ \t]?\(?[2-8]\d{0,2}\)?[ \t\-]?\d{3,4}[ \t\-]?\d{3,4}\b",
        r"\(0[2-8]\d{0,2}\)[ \t]?\d{3,4}[ \t\-]?\d{3,4}\b",
        r"\b0[2-8]\d{0,2}[ \t\-]\d{3,4}[ \t\-]?\d{3,4}\b",
        r"\b0[2-8]\d{7,9}\b",
    ]
    .iter()
    .map(|p| Regex::new(&format!("{p}{EXT}")).expect("landline regex"))
    .collect()
});

/// Any run of digits with phone punctuation.
static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\+?\d[\d \t\-().]{{6,}}\d{EXT}")).expect("digit run regex")
});

static MOBILE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:mobile|mob|cell|m)\b\.?|手機|行動電話|行動)[ \t]*[:：]?[ \t]*(\+?\d[\d \t\-()]*\d)")
        .expect("mobile label regex")
});

static PHONE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:tel|phone|t)\b\.?|電話|市話)[ \t]*[:：]?[ \t]*(\+?\d[\d \t\-()]*\d)")
        .expect("phone label regex")
});

static FAX_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bfax\b\.?[ \t]*[:：]?|\bf[ \t]*[:：]|傳真[ \t]*[:：]?)").expect("fax label regex")
});

/// Labels that end a fax segment.
static OTHER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\b(?:tel|phone|mobile|mob|cell|email|e-mail|web|website|address)\b|\b[tmew][ \t]*[:：]|電話|手機|行動|信箱|網址|地址)",
    )
    .expect("label regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    /// Taiwan number written with the trunk prefix.
    Domestic,
    /// Taiwan number written with `+886`.
    International,
    /// `area` is kept when the number was written with it as its own group.
    Foreign {
        country_code: String,
        area: Option<String>,
    },
    /// Local landline part without an area code.
    Local,
}

/// A classified phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    pub kind: PhoneKind,
    plan: Plan,
    /// National digits (trunk `0` included) for Taiwan numbers, subscriber
    /// digits otherwise.
    digits: String,
    pub extension: Option<String>,
}

impl PhoneNumber {
    /// Parse, classify and split off any extension. `None` when the digits
    /// fit neither a mobile nor a landline shape.
    pub fn parse(raw: &str) -> Option<Self> {
        let (main_raw, explicit_ext) = match EXPLICIT_EXTENSION.captures(raw.trim()) {
            Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
            None => (raw.trim().to_string(), None),
        };

        let mut digits: String = main_raw.chars().filter(|c| c.is_ascii_digit()).collect();
        let mut international = main_raw.trim_start().starts_with('+');
        if !international && digits.starts_with("00") {
            digits.replace_range(..2, "");
            international = true;
        }
        if !international && digits.starts_with("886") && (11..=13).contains(&digits.len()) {
            international = true;
        }

        let plan = if international {
            match digits.strip_prefix("886") {
                Some(rest) => {
                    digits = format!("0{}", rest.strip_prefix('0').unwrap_or(rest));
                    Plan::International
                }
                None => return Self::foreign(&digits, &main_raw, explicit_ext),
            }
        } else {
            Plan::Domestic
        };

        let (kind, min, max) = national_shape(&digits)?;
        if digits.len() < min {
            return None;
        }
        let extension = if digits.len() > max {
            // Extra digits only read as an extension when none was written.
            if explicit_ext.is_some() || digits.len() - max > MAX_EXTENSION_LEN {
                return None;
            }
            Some(digits.split_off(max))
        } else {
            explicit_ext
        };

        Some(Self {
            kind,
            plan,
            digits,
            extension,
        })
    }

    fn foreign(digits: &str, written: &str, extension: Option<String>) -> Option<Self> {
        if !(8..=15).contains(&digits.len()) {
            return None;
        }
        let cc_len = if digits.starts_with('1') || digits.starts_with('7') {
            1
        } else if TWO_DIGIT_COUNTRY_CODES.contains(&&digits[..2]) {
            2
        } else {
            3
        };
        let country_code = &digits[..cc_len];
        let subscriber = &digits[cc_len..];
        Some(Self {
            kind: PhoneKind::Landline,
            plan: Plan::Foreign {
                country_code: country_code.to_string(),
                area: written_area(written, country_code, subscriber),
            },
            digits: subscriber.to_string(),
            extension,
        })
    }

    /// A landline written without its area code.
    fn local(digits: String) -> Option<Self> {
        (7..=8).contains(&digits.len()).then_some(Self {
            kind: PhoneKind::Landline,
            plan: Plan::Local,
            digits,
            extension: None,
        })
    }

    /// The main number as canonical digits, `+` kept for international forms.
    pub fn main(&self) -> String {
        match &self.plan {
            Plan::Domestic | Plan::Local => self.digits.clone(),
            Plan::International => format!("+886{}", &self.digits[1..]),
            Plan::Foreign { country_code, .. } => format!("+{}{}", country_code, self.digits),
        }
    }

    /// Identity used to drop the same number seen twice.
    pub(crate) fn key(&self) -> String {
        match &self.plan {
            Plan::Foreign { country_code, .. } => format!("+{}{}", country_code, self.digits),
            _ => self.digits.clone(),
        }
    }

    /// Display form: `0912-345-678`, `02-2345-6789#12`, `+886-2-2345-6789`.
    pub fn formatted(&self) -> String {
        let main = match (&self.plan, self.kind) {
            (Plan::Domestic, PhoneKind::Mobile) => group_mobile(&self.digits),
            (Plan::International, PhoneKind::Mobile) => {
                format!("+886-{}", &group_mobile(&self.digits)[1..])
            }
            (Plan::Domestic, PhoneKind::Landline) => group_landline(&self.digits),
            (Plan::International, PhoneKind::Landline) => {
                format!("+886-{}", &group_landline(&self.digits)[1..])
            }
            (Plan::Foreign { country_code, area: Some(area) }, _) => format!(
                "+{}-{}-{}",
                country_code,
                area,
                group_from_end(&self.digits[area.len()..])
            ),
            (Plan::Foreign { country_code, area: None }, _) => {
                format!("+{}-{}", country_code, group_from_end(&self.digits))
            }
            (Plan::Local, _) => group_local(&self.digits, ""),
        };
        match &self.extension {
            Some(ext) => format!("{}#{}", main, ext),
            None => main,
        }
    }
}

/// Classification by prefix alone: kind plus the allowed digit range.
fn national_shape(digits: &str) -> Option<(PhoneKind, usize, usize)> {
    if digits.starts_with("09") {
        return Some((PhoneKind::Mobile, MOBILE_LEN, MOBILE_LEN));
    }
    area_code(digits).map(|(_, min, max)| (PhoneKind::Landline, min, max))
}

fn area_code(digits: &str) -> Option<(&'static str, usize, usize)> {
    AREA_CODES
        .iter()
        .filter(|(code, _, _)| digits.starts_with(code))
        .max_by_key(|(code, _, _)| code.len())
        .copied()
}

fn group_mobile(digits: &str) -> String {
    if digits.len() != MOBILE_LEN {
        return digits.to_string();
    }
    format!("{}-{}-{}", &digits[..4], &digits[4..7], &digits[7..])
}

fn group_landline(digits: &str) -> String {
    match area_code(digits) {
        Some((code, _, _)) => format!("{}-{}", code, group_local(&digits[code.len()..], code)),
        None => digits.to_string(),
    }
}

fn group_local(local: &str, area: &str) -> String {
    let head = match local.len() {
        8 => 4,
        7 => 3,
        6 if area == "0800" => 3,
        6 => 2,
        5 => 1,
        _ => return local.to_string(),
    };
    format!("{}-{}", &local[..head], &local[head..])
}

/// The digit group written right after the country code, e.g. `415` in
/// `+1 (415) 555-0100`. `None` when the country code was not written as a
/// group of its own.
fn written_area(written: &str, country_code: &str, subscriber: &str) -> Option<String> {
    let mut groups = written
        .split(|c: char| !c.is_ascii_digit())
        .filter(|g| !g.is_empty())
        .map(|g| g.strip_prefix("00").unwrap_or(g))
        .filter(|g| !g.is_empty());
    if groups.next()? != country_code {
        return None;
    }
    let area = groups.next()?;
    let rest = subscriber.strip_prefix(area)?;
    ((1..=5).contains(&area.len()) && rest.len() >= 4).then(|| area.to_string())
}

fn group_from_end(digits: &str) -> String {
    let mut groups: Vec<&str> = Vec::new();
    let mut end = digits.len();
    while end > 4 {
        groups.push(&digits[end - 4..end]);
        end -= 4;
    }
    groups.push(&digits[..end]);
    groups.reverse();
    groups.join("-")
}

/// Classify a raw number by prefix.
pub fn classify(raw: &str) -> Option<PhoneKind> {
    PhoneNumber::parse(raw).map(|n| n.kind)
}

/// Normalize a raw number to its display form.
pub fn format_phone(raw: &str) -> Option<String> {
    PhoneNumber::parse(raw).map(|n| n.formatted())
}

/// Split a raw number into main digits and extension. Splitting
/// `main#ext` again yields the same pair.
pub fn split_extension(raw: &str) -> (String, Option<String>) {
    if let Some(number) = PhoneNumber::parse(raw) {
        return (number.main(), number.extension);
    }
    let digits = |s: &str| s.chars().filter(|c| c.is_ascii_digit()).collect::<String>();
    match EXPLICIT_EXTENSION.captures(raw.trim()) {
        Some(caps) => (digits(&caps[1]), Some(caps[2].to_string())),
        None => (digits(raw), None),
    }
}

/// Phone and mobile fields pulled from card text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhoneFields {
    pub phone: Option<String>,
    pub mobile: Option<String>,
}

impl PhoneFields {
    fn is_complete(&self) -> bool {
        self.phone.is_some() && self.mobile.is_some()
    }
}

#[derive(Default)]
struct Collector {
    fields: PhoneFields,
    seen: HashSet<String>,
}

impl Collector {
    fn offer(&mut self, number: PhoneNumber, rule: &str) {
        if !self.seen.insert(number.key()) {
            return;
        }
        let slot = match number.kind {
            PhoneKind::Mobile => &mut self.fields.mobile,
            PhoneKind::Landline => &mut self.fields.phone,
        };
        if slot.is_none() {
            let formatted = number.formatted();
            log::debug!("[EXTRACT] {:?} {} via {}", number.kind, formatted, rule);
            *slot = Some(formatted);
        }
    }
}

/// Find the phone and mobile numbers in normalized card text.
///
/// Strict patterns run first; the digit-run scan and then the label scan
/// only fill fields that are still empty. Fax numbers never count.
pub fn extract_phones(text: &str) -> PhoneFields {
    let cleaned = text.lines().map(strip_fax).collect::<Vec<_>>().join("\n");
    let mut collector = Collector::default();

    // Reading order decides between overlapping strict matches.
    let mut strict: Vec<(usize, &str)> = MOBILE_PATTERNS
        .iter()
        .chain(LANDLINE_PATTERNS.iter())
        .flat_map(|p| p.find_iter(&cleaned).map(|m| (m.start(), m.as_str())))
        .collect();
    strict.sort_by_key(|(start, _)| *start);
    for (_, raw) in strict {
        if let Some(number) = PhoneNumber::parse(raw) {
            collector.offer(number, "strict");
        }
    }

    if !collector.fields.is_complete() {
        for m in DIGIT_RUN.find_iter(&cleaned) {
            let (main, _) = split_extension(m.as_str());
            let count = main.chars().filter(|c| c.is_ascii_digit()).count();
            if !(8..=15).contains(&count) {
                continue;
            }
            if let Some(number) = PhoneNumber::parse(m.as_str()) {
                collector.offer(number, "digit-run");
            }
        }
    }

    if !collector.fields.is_complete() {
        for line in cleaned.lines() {
            for caps in MOBILE_LABEL.captures_iter(line) {
                if let Some(number) = labelled_number(&caps[1], PhoneKind::Mobile) {
                    collector.offer(number, "mobile-label");
                }
            }
            for caps in PHONE_LABEL.captures_iter(line) {
                if let Some(number) = labelled_number(&caps[1], PhoneKind::Landline) {
                    collector.offer(number, "phone-label");
                }
            }
        }
    }

    collector.fields
}

/// A number behind a label, allowing the shapes a label makes unambiguous.
fn labelled_number(raw: &str, label: PhoneKind) -> Option<PhoneNumber> {
    if let Some(number) = PhoneNumber::parse(raw) {
        return Some(number);
    }
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match label {
        // Mobile written without its leading zero.
        PhoneKind::Mobile if digits.len() == 9 && digits.starts_with('9') => {
            PhoneNumber::parse(&format!("0{}", digits))
        }
        PhoneKind::Landline => PhoneNumber::local(digits),
        _ => None,
    }
}

/// Remove fax segments: from a fax label to the next other label or the end
/// of the line. A shared `Tel/Fax` label is kept.
fn strip_fax(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pos = 0;
    while let Some(fax) = FAX_LABEL.find_at(line, pos) {
        if line[..fax.start()].ends_with('/') {
            out.push_str(&line[pos..fax.end()]);
            pos = fax.end();
            continue;
        }
        out.push_str(&line[pos..fax.start()]);
        pos = OTHER_LABEL
            .find_at(line, fax.end())
            .map_or(line.len(), |next| next.start());
    }
    out.push_str(&line[pos..]);
    out
}
