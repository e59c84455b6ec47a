//! Keyword dictionaries for line classification.
//!
//! English terms match whole words, case-insensitively. CJK terms match as
//! substrings.

pub const JOB_TITLES_EN: &[&str] = &[
    "ceo", "cto", "cfo", "coo", "cio", "cmo", "president", "vice president", "vp", "chairman",
    "chairwoman", "director", "manager", "supervisor", "engineer", "developer", "designer",
    "consultant", "specialist", "assistant", "officer", "head", "lead", "founder", "co-founder",
    "partner", "owner", "executive", "coordinator", "analyst", "architect", "representative",
    "sales", "secretary", "accountant", "attorney", "lawyer", "doctor", "professor",
    "researcher", "administrator", "associate", "principal", "agent", "advisor", "planner",
    "producer", "editor", "marketing", "intern",
];

pub const JOB_TITLES_CJK: &[&str] = &[
    "董事長", "總經理", "副總經理", "執行長", "總裁", "副總裁", "經理", "副理", "協理", "襄理",
    "主任", "主管", "組長", "課長", "處長", "部長", "廠長", "店長", "總監", "副總", "董事",
    "顧問", "工程師", "設計師", "專員", "助理", "秘書", "業務", "會計師", "律師", "醫師",
    "教授", "研究員", "創辦人", "負責人", "合夥人", "特助", "代表", "營運長", "技術長", "財務長",
];

/// Legal-entity suffixes: a line carrying one is almost surely the company.
pub const ENTITY_STRONG_EN: &[&str] = &[
    "co.", "co", "ltd", "ltd.", "inc", "inc.", "corp", "corp.", "corporation", "company", "llc",
    "llp", "plc", "limited", "gmbh", "s.a.", "pte",
];

pub const ENTITY_STRONG_CJK: &[&str] = &[
    "股份有限公司", "有限公司", "公司", "事務所", "銀行", "協會", "基金會", "醫院", "大學",
    "商行", "工作室",
];

/// Organisation-ish words that also show up in titles and departments.
pub const ENTITY_WEAK_EN: &[&str] = &[
    "group", "technology", "technologies", "studio", "bank", "university", "association",
    "foundation", "enterprise", "enterprises", "holdings", "solutions", "systems", "labs",
    "industries", "international",
];

pub const ENTITY_WEAK_CJK: &[&str] = &["企業", "集團", "科技", "實業", "國際", "工業", "電子"];

pub const ADDRESS_TOKENS_EN: &[&str] = &[
    "road", "rd", "rd.", "street", "st.", "avenue", "ave", "ave.", "boulevard", "blvd", "lane",
    "ln.", "alley", "section", "sec.", "no.", "floor", "fl.", "suite", "ste.", "room", "rm.",
    "building", "bldg", "district", "dist.", "city", "county", "taiwan", "r.o.c.", "drive",
    "dr.",
];

pub const ADDRESS_TOKENS_CJK: &[&str] = &[
    "市", "縣", "區", "鄉", "鎮", "村", "里", "路", "街", "段", "巷", "弄", "號", "樓", "室",
    "大道",
];

/// Whole-word, case-insensitive search for an ASCII term.
pub fn contains_word(line: &str, term: &str) -> bool {
    contains_bounded(line, term, |c| !c.is_alphanumeric())
}

/// Like [`contains_word`], but a hyphen joins words: `co` is not found in
/// `Co-Founder`.
pub fn contains_entity_word(line: &str, term: &str) -> bool {
    contains_bounded(line, term, |c| !c.is_alphanumeric() && c != '-')
}

fn contains_bounded(line: &str, term: &str, is_boundary: fn(char) -> bool) -> bool {
    let haystack = line.to_lowercase();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(term) {
        let start = from + pos;
        let end = start + term.len();
        let before = haystack[..start].chars().last();
        let after = haystack[end..].chars().next();
        let boundary = |c: Option<char>| c.map_or(true, is_boundary);
        // Terms ending in '.' already carry their own boundary.
        if boundary(before) && (term.ends_with('.') || boundary(after)) {
            return true;
        }
        from = start + 1;
        while !haystack.is_char_boundary(from) {
            from += 1;
        }
    }
    false
}

fn any_term(line: &str, en: &[&str], cjk: &[&str]) -> bool {
    en.iter().any(|t| contains_word(line, t)) || cjk.iter().any(|t| line.contains(t))
}

/// Job-title terms present in the line, CJK terms longest first.
pub fn title_terms(line: &str) -> Vec<&'static str> {
    let mut terms: Vec<&'static str> = JOB_TITLES_CJK
        .iter()
        .copied()
        .filter(|t| line.contains(t))
        .collect();
    terms.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));
    terms.extend(JOB_TITLES_EN.iter().copied().filter(|t| contains_word(line, t)));
    terms
}

pub fn has_title(line: &str) -> bool {
    any_term(line, JOB_TITLES_EN, JOB_TITLES_CJK)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityStrength {
    Weak,
    Strong,
}

pub fn entity_strength(line: &str) -> Option<EntityStrength> {
    let has = |en: &[&str], cjk: &[&str]| {
        en.iter().any(|t| contains_entity_word(line, t)) || cjk.iter().any(|t| line.contains(t))
    };
    if has(ENTITY_STRONG_EN, ENTITY_STRONG_CJK) {
        Some(EntityStrength::Strong)
    } else if has(ENTITY_WEAK_EN, ENTITY_WEAK_CJK) {
        Some(EntityStrength::Weak)
    } else {
        None
    }
}

/// Number of distinct address indicators in the line.
pub fn address_hits(line: &str) -> usize {
    ADDRESS_TOKENS_EN.iter().filter(|t| contains_word(line, t)).count()
        + ADDRESS_TOKENS_CJK.iter().filter(|t| line.contains(*t)).count()
}
