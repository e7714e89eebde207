use super::rows::clean_text;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use tracing::debug;

/// Shorter digit runs are ids or counters, not phone numbers
const MIN_PHONE_DIGITS: usize = 7;

static TEL_LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"a[href^="tel:"]"#).expect("valid tel selector"));
static SHOWPHONE_HANDLERS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[onclick*="showphone"]"#).expect("valid onclick selector"));
static PHONE_LABELS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.propDetailPhone, span.propDetailPhone, div.text-block-80, span.text-block-80")
        .expect("valid phone label selector")
});
static WHATSAPP_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="wa.me/"]"#).expect("valid whatsapp selector"));
static AGENCY_BLOCKS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.text-block-157, a.text-block-157, div.text-block-204, a.text-block-204")
        .expect("valid agency selector")
});

static SHOWPHONE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"showphone\s*\([^,]+,\s*['"]([^'"]+)['"]"#).expect("valid showphone regex")
});
static PHONE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+90|0)5\d{2}\s*\d{3}\s*\d{2}\s*\d{2}").expect("valid phone text regex")
});
static WHATSAPP_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"wa\.me/\+?(\d+)").expect("valid wa.me regex"));

/// Starts with '+' or is all digits, and is long enough to dial
pub fn is_plausible_phone(candidate: &str) -> bool {
    let digits = candidate.strip_prefix('+').unwrap_or(candidate);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) && digits.len() >= MIN_PHONE_DIGITS
}

/// Numbers from tel: links, showphone(...) handlers and phone label text
pub fn phone_numbers(document: &Html) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut accept = |number: String, source: &str| {
        if is_plausible_phone(&number) {
            debug!("Phone {} from {}", number, source);
            found.insert(number);
        }
    };

    for link in document.select(&TEL_LINKS) {
        if let Some(href) = link.value().attr("href") {
            let number = href.trim_start_matches("tel:").trim().replace(' ', "");
            accept(number, "tel link");
        }
    }

    for element in document.select(&SHOWPHONE_HANDLERS) {
        let onclick = element.value().attr("onclick").unwrap_or_default();
        if let Some(caps) = SHOWPHONE_CALL.captures(onclick) {
            accept(caps[1].trim().to_string(), "showphone handler");
        }
    }

    for label in document.select(&PHONE_LABELS) {
        let text = clean_text(label);
        for m in PHONE_TEXT.find_iter(&text) {
            accept(m.as_str().replace(' ', ""), "label text");
        }
    }

    found
}

/// `+<country><digits>`; the country code is added when missing
pub fn normalize_whatsapp(digits: &str, country_code: &str) -> String {
    let digits = digits.trim_start_matches('+');
    if digits.starts_with(country_code) {
        format!("+{}", digits)
    } else {
        format!("+{}{}", country_code, digits)
    }
}

pub fn whatsapp_numbers(document: &Html, country_code: &str) -> BTreeSet<String> {
    document
        .select(&WHATSAPP_LINKS)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| WHATSAPP_NUMBER.captures(href))
        .map(|caps| normalize_whatsapp(&caps[1], country_code))
        .collect()
}

/// First contact-card text that looks like a name rather than a number
pub fn agency_name(document: &Html) -> Option<String> {
    document.select(&AGENCY_BLOCKS).map(clean_text).find(|text| {
        text.chars().count() > 3 && !text.starts_with('+') && !text.chars().all(|c| c.is_ascii_digit())
    })
}
