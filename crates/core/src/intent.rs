use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::cities::{normalize_city_key, CityTable};
use crate::models::RawDateRequest;
use crate::timing::find_timing_phrase;

static BUDGET_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:₹|\brs\.?|\binr|\bunder|\bbelow|\bwithin|\bbudget(?: of| is)?|\bup to|\bmax(?:imum)?)\s*:?\s*(?:₹|rs\.?|inr)?\s*(\d[\d,]*(?:\.\d+)?\s*k?)\b",
    )
    .expect("valid budget amount regex")
});

static RUPEE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d[\d,]*(?:\.\d+)?\s*k?)\s*(?:rupees|rs\b|inr\b|/-)").expect("valid rupee suffix regex")
});

static IN_PLACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:in|at|around)\s+([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)?)").expect("valid place regex"));

const DATE_TYPE_KEYWORDS: &[(&str, &[&str])] = &[
    ("romantic", &["romantic", "romance", "anniversary", "valentine", "candle", "proposal", "propose"]),
    ("budget-friendly", &["budget-friendly", "budget friendly", "cheap", "affordable", "inexpensive"]),
    ("cozy", &["cozy", "cosy", "quiet", "intimate", "chill"]),
    ("formal", &["formal", "fine dining", "fine-dining", "classy", "upscale", "elegant"]),
    ("fun", &["fun", "adventure", "bowling", "arcade", "games", "karaoke", "exciting"]),
    ("casual", &["casual", "coffee", "relaxed", "laid back", "laid-back", "simple"]),
];

// Words that follow "in" but are never places.
const NOT_PLACES: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "the", "a", "an", "my", "our",
];

pub fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// Keyword extraction used when no language model is available.
pub fn extract_request_rules(text: &str, cities: &CityTable) -> RawDateRequest {
    let text = normalize_text(text);
    RawDateRequest {
        city: detect_city(&text, cities),
        budget: detect_budget(&text),
        date_type: detect_date_type(&text),
        timing_phrase: find_timing_phrase(&text),
        special_requirements: detect_special_requirements(&text),
    }
}

/// Known city names and aliases first, longest first; otherwise a capitalized
/// word after "in" so unsupported cities still reach the validator.
pub fn detect_city(text: &str, cities: &CityTable) -> Option<String> {
    let haystack = format!(" {} ", normalize_city_key(&strip_punctuation(text)));
    for key in cities.keys_longest_first() {
        if haystack.contains(&format!(" {key} ")) {
            return cities.lookup(key).map(|city| city.name.clone());
        }
    }

    IN_PLACE
        .captures_iter(text)
        .map(|captures| captures[1].to_string())
        .find(|place| {
            let first = place.split_whitespace().next().unwrap_or_default().to_lowercase();
            !NOT_PLACES.contains(&first.as_str())
        })
}

pub fn detect_budget(text: &str) -> Option<Value> {
    let lower = text.to_lowercase();
    BUDGET_AMOUNT
        .captures(&lower)
        .or_else(|| RUPEE_SUFFIX.captures(&lower))
        .map(|captures| Value::String(captures[1].replace(' ', "")))
}

pub fn detect_date_type(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    DATE_TYPE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| contains_word(&lower, keyword)))
        .map(|(tag, _)| tag.to_string())
}

pub fn detect_special_requirements(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    if contains_any(&lower, &["indoor", "inside", "air conditioned", "air-conditioned"]) {
        Some("indoor only".to_string())
    } else if contains_any(&lower, &["outdoor", "open air", "open-air", "rooftop", "terrace"]) {
        Some("outdoor preferred".to_string())
    } else {
        None
    }
}

fn strip_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect()
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}
