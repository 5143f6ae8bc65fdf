//! Heuristic field extraction from rendered detail pages
//!
//! Detail pages carry no stable structured data, so each field is located by
//! a chain of strategies that fall through from most to least precise:
//!
//! 1. **Structural selectors** from the source profile
//! 2. **Marker proximity**: find the SVG icon drawn next to the field and
//!    search its ancestors (see [`AncestorWindow`])
//! 3. **Full-text patterns** over the whole page
//!
//! The five fields are extracted independently. A strategy that finds nothing
//! is not an error; the field is simply left empty.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use url::Url;

use crate::{
    dom::{AncestorWindow, DomNode, collapse_whitespace, find_glyphs},
    geo::TargetCity,
    record::{MAX_HOURS_CHARS, MAX_PHONES, MAX_WEBSITES, RawFields},
    source::SourceProfile,
};

const HEADING_DENYLIST: &[&str] = &["перейти", "назад", "меню", "фильтр", "поиск"];
const LINE_DENYLIST: &[&str] = &["поиск", "каталог", "фильтр"];

const ADDRESS_MARKERS: &[&str] = &[
    "ул.", "улица", "пр.", "проспект", "пер.", "переулок", "ш.", "шоссе", "д.", "дом",
];

const ADDRESS_BOILERPLATE: &[&str] = &[
    "показать вход",
    "показать на карте",
    "показать схему проезда",
    "показать маршрут",
    "показать здание",
    "рассмотреть",
];

const HOURS_KEYWORDS: &[&str] = &[
    "часы работы",
    "время работы",
    "режим работы",
    "открыто",
    "график работы",
    "работаем",
    "пн-пт",
    "пн–пт",
    "ежедневно",
    "круглосуточно",
    "24/7",
];

const COMMON_TLDS: &[&str] = &["ru", "com", "net", "org", "рф", "su", "io", "info", "biz"];

/// Lines following an hours keyword that are appended as continuation
const HOURS_CONTINUATION_LINES: usize = 2;
const HOURS_CONTINUATION_MAX_CHARS: usize = 50;

static PHONE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\+7\s?\(?\d{3}\)?\s?\d{3}[\s-]?\d{2}[\s-]?\d{2}",
        r"8\s?\(?\d{3}\)?\s?\d{3}[\s-]?\d{2}[\s-]?\d{2}",
        r"\(\d{3}\)\s?\d{3}[\s-]?\d{2}[\s-]?\d{2}",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("hardcoded phone pattern is valid"))
    .collect()
});

static PHONE_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"^\+7\d{10}$", r"^8\d{10}$", r"^7\d{10}$", r"^\d{10,11}$"]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("hardcoded phone shape is valid"))
        .collect()
});

static DOMAIN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^[a-z0-9][a-z0-9-]{0,61}[a-z0-9]\.[a-z]{2,}$",
        r"(?i)^[a-z0-9][a-z0-9-]{0,61}[a-z0-9]\.[a-z]{2,}\.[a-z]{2,}$",
        r"(?i)^www\.[a-z0-9][a-z0-9-]{0,61}[a-z0-9]\.[a-z]{2,}$",
        r"(?i)^https?://[a-z0-9][a-z0-9-]{0,61}[a-z0-9]\.[a-z]{2,}",
        r"(?i)^[а-яё0-9][а-яё0-9-]{0,61}[а-яё0-9]\.(ru|рф|su|com|net|org)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("hardcoded domain pattern is valid"))
    .collect()
});

static TOKEN_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,;]+").expect("hardcoded separator pattern is valid"));

static DOUBLE_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*,").expect("hardcoded comma pattern is valid"));

static TRAILING_ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)показать").expect("hardcoded action pattern is valid"));

/// Extracts name, address, phones, websites and hours from detail markup
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    profile: &'static SourceProfile,
    city: TargetCity,
    window: AncestorWindow,
    address_patterns: Vec<Regex>,
}

impl FieldExtractor {
    pub fn new(profile: &'static SourceProfile, city: TargetCity, window: AncestorWindow) -> Self {
        let address_patterns = address_patterns_for(&city.name);
        Self {
            profile,
            city,
            window,
            address_patterns,
        }
    }

    /// Parse a rendered detail page and extract every field
    pub fn extract(&self, markup: &str) -> RawFields {
        let document = Html::parse_document(markup);
        let root = document.root_element();

        RawFields {
            name: self.name(root),
            address: self.address(root),
            phones: self.phones(root),
            websites: self.websites(root),
            hours: self.hours(root),
        }
    }

    // ========== NAME ==========

    pub fn name(&self, root: ElementRef<'_>) -> String {
        for selector in self.profile.name_selectors {
            if let Some(element) = root.select_one(selector) {
                let text = element.joined_text();
                if text.chars().count() > 2 {
                    return text;
                }
            }
        }

        for heading in ["h1", "h2", "h3"] {
            for element in root.select_all(heading) {
                let text = element.joined_text();
                let len = text.chars().count();
                if (6..100).contains(&len) && !contains_any(&text, HEADING_DENYLIST) {
                    return text;
                }
            }
        }

        for meta in root.select_all("meta[property]") {
            if matches!(meta.attr("property"), Some("og:title" | "og:site_name"))
                && let Some(content) = meta.attr("content")
            {
                let content = collapse_whitespace(content);
                let len = content.chars().count();
                if len > 5 && len < 150 {
                    return content;
                }
            }
        }

        root.text_lines()
            .into_iter()
            .find(|line| {
                let len = line.chars().count();
                len > 10
                    && len < 100
                    && line.chars().next().is_some_and(char::is_uppercase)
                    && !contains_any(line, LINE_DENYLIST)
            })
            .unwrap_or_default()
    }

    // ========== ADDRESS ==========

    pub fn address(&self, root: ElementRef<'_>) -> String {
        for selector in self.profile.address_selectors {
            if let Some(element) = root.select_one(selector) {
                let text = element.joined_text();
                if text.chars().count() > 5 {
                    return clean_address(&text);
                }
            }
        }

        if let Some(signature) = self.profile.glyphs.address {
            for marker in find_glyphs(root, signature) {
                let found = self
                    .window
                    .search(marker, |container, nodes| self.address_in_container(container, nodes));
                if let Some(address) = found {
                    let cleaned = clean_address(&address);
                    if !cleaned.is_empty() {
                        return cleaned;
                    }
                }
            }
        }

        let page_text = root.joined_text();
        self.address_patterns
            .iter()
            .find_map(|pattern| pattern.find(&page_text))
            .map(|found| clean_address(found.as_str()))
            .unwrap_or_default()
    }

    fn address_in_container(&self, container: ElementRef<'_>, nodes: &[ElementRef<'_>]) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        for node in nodes {
            if !matches!(node.tag(), "div" | "span" | "p") {
                continue;
            }
            let text = node.joined_text();
            if text.chars().count() > 3 && self.looks_like_address(&text) && !parts.contains(&text) {
                parts.push(text);
            }
        }

        // A wrapper's text repeats its children's; keep only the widest pieces
        let widest: Vec<&String> = parts
            .iter()
            .filter(|part| !parts.iter().any(|other| other != *part && other.contains(part.as_str())))
            .collect();
        if !widest.is_empty() {
            let joined = widest.iter().map(|part| part.as_str()).collect::<Vec<_>>().join(", ");
            if joined.chars().count() > 15 && joined.chars().any(|c| c.is_ascii_digit()) {
                return Some(joined);
            }
        }

        let lines: Vec<String> = container
            .text_lines()
            .into_iter()
            .filter(|line| {
                line.chars().count() > 10 && !line.starts_with('©') && self.looks_like_address(line)
            })
            .collect();
        (!lines.is_empty()).then(|| lines.join(" "))
    }

    fn looks_like_address(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        ADDRESS_MARKERS.iter().any(|marker| lower.contains(marker))
            || self
                .city
                .variants
                .iter()
                .any(|variant| lower.contains(variant.as_str()))
    }

    // ========== PHONE ==========

    pub fn phones(&self, root: ElementRef<'_>) -> Vec<String> {
        let mut phones = Vec::new();
        for selector in self.profile.phone_selectors {
            for element in root.select_all(selector) {
                if let Some(phone) = normalize_phone(&element.joined_text()) {
                    push_unique(&mut phones, phone);
                }
            }
        }
        if !phones.is_empty() {
            phones.truncate(MAX_PHONES);
            return phones;
        }

        if let Some(signature) = self.profile.glyphs.phone {
            for marker in find_glyphs(root, signature) {
                let found = self.window.search(marker, |container, nodes| {
                    let linked = tel_links(nodes.iter().copied());
                    if !linked.is_empty() {
                        return Some(linked);
                    }
                    let matched = phones_in_text(&container.joined_text());
                    (!matched.is_empty()).then_some(matched)
                });
                if let Some(mut found) = found {
                    found.truncate(MAX_PHONES);
                    return found;
                }
            }
        }

        let mut found = tel_links(root.select_all("a[href]"));
        if found.is_empty() {
            found = phones_in_text(&root.joined_text());
        }
        found.truncate(MAX_PHONES);
        found
    }

    // ========== WEBSITE ==========

    pub fn websites(&self, root: ElementRef<'_>) -> Vec<String> {
        let mut websites = Vec::new();
        for selector in self.profile.website_selectors {
            for element in root.select_all(selector) {
                let href = if element.tag() == "a" {
                    element.attr("href")
                } else {
                    element.select_one("a[href]").and_then(|link| link.attr("href"))
                };
                if let Some(website) = href.and_then(|href| self.normalize_website(href)) {
                    push_unique(&mut websites, website);
                }
            }
        }
        if !websites.is_empty() {
            websites.truncate(MAX_WEBSITES);
            return websites;
        }

        if let Some(signature) = self.profile.glyphs.website {
            for marker in find_glyphs(root, signature) {
                let found = self
                    .window
                    .search(marker, |_, nodes| {
                        let found = self.websites_in_nodes(nodes);
                        (!found.is_empty()).then_some(found)
                    });
                if let Some(mut found) = found {
                    found.truncate(MAX_WEBSITES);
                    return found;
                }
            }
        }

        websites
    }

    fn websites_in_nodes(&self, nodes: &[ElementRef<'_>]) -> Vec<String> {
        let mut websites = Vec::new();

        for node in nodes {
            if !matches!(node.tag(), "div" | "span" | "a" | "p") {
                continue;
            }
            let text = node.joined_text();
            for token in TOKEN_SEPARATORS.split(&text) {
                if is_website_token(token)
                    && let Some(website) = self.normalize_website(token)
                {
                    push_unique(&mut websites, website);
                }
            }
        }

        for link in nodes.iter().filter(|node| node.tag() == "a") {
            if link.attr("href").is_some_and(|href| href.starts_with("tel:")) {
                continue;
            }
            let text = link.joined_text();
            if is_phone_text(&text) {
                continue;
            }
            if is_website_token(&text)
                && let Some(website) = self.normalize_website(&text)
            {
                push_unique(&mut websites, website);
            }
        }

        websites
    }

    /// Turn a domain-shaped token or href into an `https://` URL
    ///
    /// Phone numbers, e-mail addresses and links back to the source itself
    /// are rejected.
    pub fn normalize_website(&self, text: &str) -> Option<String> {
        if text.is_empty() || text.contains('@') || is_phone_text(text) {
            return None;
        }

        let mut candidate: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '‒' | '–' | '—'))
            .collect();
        if candidate.starts_with("+7")
            || candidate.starts_with("8(")
            || candidate.starts_with("7(")
            || candidate.starts_with("(8")
            || candidate.starts_with("(7")
            || !candidate.contains('.')
        {
            return None;
        }

        if let Some(rest) = candidate.strip_prefix("//") {
            candidate = format!("https://{rest}");
        } else if !candidate.starts_with("http://") && !candidate.starts_with("https://") {
            candidate = format!("https://{candidate}");
        }

        if self.profile.is_own_domain(&candidate) {
            return None;
        }

        let end = candidate.find(['?', '#']).unwrap_or(candidate.len());
        candidate.truncate(end);
        let candidate = candidate.trim_end_matches('/').to_string();

        let parsed = Url::parse(&candidate).ok()?;
        parsed.host_str()?;
        Some(candidate)
    }

    // ========== HOURS ==========

    pub fn hours(&self, root: ElementRef<'_>) -> String {
        let lines = root.text_lines();

        for (index, line) in lines.iter().enumerate() {
            let lower = line.to_lowercase();
            if !HOURS_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
                continue;
            }

            let mut parts = vec![line.as_str()];
            for next in lines.iter().skip(index + 1).take(HOURS_CONTINUATION_LINES) {
                if next.chars().count() < HOURS_CONTINUATION_MAX_CHARS && !next.starts_with('©') {
                    parts.push(next);
                }
            }
            return parts.join(" ").chars().take(MAX_HOURS_CHARS).collect();
        }

        String::new()
    }
}

/// Remove map-widget action phrases and tidy punctuation
pub fn clean_address(address: &str) -> String {
    let mut cleaned = address.to_string();
    for phrase in ADDRESS_BOILERPLATE {
        cleaned = cleaned.replace(phrase, "");
    }

    if let Some(cut) = TRAILING_ACTION.find(&cleaned).map(|action| action.start())
        && cleaned[..cut].chars().count() > 10
    {
        cleaned.truncate(cut);
    }

    let cleaned = collapse_whitespace(&cleaned);
    let cleaned = DOUBLE_COMMA.replace_all(&cleaned, ",");
    cleaned
        .trim()
        .trim_end_matches([',', '.', ';', ' '])
        .trim()
        .to_string()
}

/// Keep digits (and a leading plus); reject anything shorter than 10 digits
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 10 {
        return None;
    }
    if raw.trim_start().starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}

/// Phone numbers in free text, in order of appearance
///
/// A match that overlaps one already accepted is skipped, so `+7 (863) ...`
/// is not also reported as its bare `(863) ...` tail.
pub fn phones_in_text(text: &str) -> Vec<String> {
    let mut spans: Vec<(usize, usize, String)> = Vec::new();
    for pattern in PHONE_PATTERNS.iter() {
        for found in pattern.find_iter(text) {
            let overlaps = spans
                .iter()
                .any(|(start, end, _)| found.start() < *end && *start < found.end());
            if overlaps {
                continue;
            }
            if let Some(phone) = normalize_phone(found.as_str()) {
                spans.push((found.start(), found.end(), phone));
            }
        }
    }
    spans.sort_by_key(|(start, _, _)| *start);

    let mut phones = Vec::new();
    for (_, _, phone) in spans {
        push_unique(&mut phones, phone);
    }
    phones
}

/// Whether a token reads as a phone number rather than anything else
pub fn is_phone_text(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if PHONE_SHAPES.iter().any(|shape| shape.is_match(&cleaned)) {
        return true;
    }
    let compact: String = text.chars().filter(|c| *c != ' ' && *c != '-').collect();
    ["+7", "8(", "(8", "7("]
        .iter()
        .any(|prefix| compact.starts_with(prefix))
}

/// Whether a token has the shape of a domain or URL
pub fn is_website_token(text: &str) -> bool {
    if text.chars().count() < 4 || is_phone_text(text) || text.contains('@') {
        return false;
    }
    if DOMAIN_PATTERNS.iter().any(|pattern| pattern.is_match(text)) {
        return true;
    }
    let mut parts = text.rsplit('.');
    match (parts.next(), parts.next()) {
        (Some(tld), Some(rest)) if !rest.is_empty() => {
            COMMON_TLDS.contains(&tld.to_lowercase().as_str())
        }
        _ => false,
    }
}

fn tel_links<'a>(elements: impl IntoIterator<Item = ElementRef<'a>>) -> Vec<String> {
    let mut phones = Vec::new();
    for element in elements {
        if element.tag() != "a" {
            continue;
        }
        if let Some(number) = element.attr("href").and_then(|href| href.strip_prefix("tel:"))
            && let Some(phone) = normalize_phone(number)
        {
            push_unique(&mut phones, phone);
        }
    }
    phones
}

fn address_patterns_for(city: &str) -> Vec<Regex> {
    let city = regex::escape(city);
    [
        format!(r"(?i){city}[,\s]+[А-Яа-яёЁ0-9\s\-\.]+ул\.\s*[А-Яа-яёЁ\-]+\s*[,\s]*д\.\s*\d+"),
        format!(r"(?i)г\.\s*{city}[,\s]+[А-Яа-яёЁ0-9\s\-\.]+"),
        format!(r"(?i)ул\.\s*[А-Яа-яёЁ\-]+\s*[,\s]*д\.\s*\d+\s*[,\s]*г\.\s*{city}"),
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    let lower = text.to_lowercase();
    words.iter().any(|word| lower.contains(word))
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}
