use chrono::{Datelike, Days, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::models::{ResolvedDate, TimeOfDay};

const MONTHS: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

// 29 February can be up to eight years away across a century boundary.
const MAX_YEARS_TO_SEARCH: i32 = 8;

const FILLER_WORDS: &[&str] = &["on", "at", "in", "the", "for", "around", "coming", "upcoming", "by"];

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid iso date regex"));

static NUMERIC_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})(?:[/.\-](\d{4}|\d{2}))?\b").expect("valid numeric date regex")
});

static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&[r"\b(\d{1,2})(?:st|nd|rd|th)?[\s\-]+(?:of\s+)?", MONTHS, r"\b\.?(?:,?[\s\-]+(\d{4}))?"].concat())
        .expect("valid day-month regex")
});

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&[r"\b", MONTHS, r"\.?[\s\-]+(\d{1,2})(?:st|nd|rd|th)?\b(?:,?[\s\-]+(\d{4}))?"].concat())
        .expect("valid month-day regex")
});

static IN_DAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^in (\d{1,3}) (days?|weeks?)$").expect("valid relative offset regex"));

static TIMING_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:day after tomorrow|tomorrow|today|tonight|this (?:morning|afternoon|evening)|(?:this|next) weekend|weekend|next week|in \d{1,3} (?:days?|weeks?)|(?:this |next )?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday))(?: (?:morning|afternoon|evening|night))?\b",
    )
    .expect("valid timing mention regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ParseError {
    #[error("no timing given")]
    Missing,
    #[error("could not understand timing '{phrase}'")]
    Unrecognized { phrase: String },
    #[error("'{phrase}' is not a real calendar date")]
    InvalidCalendarDate { phrase: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTiming {
    pub resolved: ResolvedDate,
    /// Whole years added because the naive date was in the past or did not exist.
    pub years_advanced: u32,
}

/// Resolves a free-form timing phrase against `reference`. The result is never
/// before `reference`.
pub fn resolve_timing(phrase: &str, reference: NaiveDate) -> Result<ResolvedTiming, ParseError> {
    let normalized = normalize_phrase(phrase);
    if normalized.is_empty() {
        return Err(ParseError::Missing);
    }

    let mut time_of_day = None;
    let mut words = Vec::new();
    for token in normalized.split_whitespace() {
        let bare = token.trim_matches(|c| c == ',' || c == '.');
        if let Some(part) = TimeOfDay::parse(bare) {
            time_of_day.get_or_insert(part);
            if bare == "tonight" {
                words.push("today");
            }
            continue;
        }
        if FILLER_WORDS.contains(&bare) || bare.is_empty() {
            continue;
        }
        words.push(bare);
    }
    let core = words.join(" ");

    if let Some(date) = relative_date(&core, reference, time_of_day.is_some()) {
        return Ok(ResolvedTiming {
            resolved: ResolvedDate::new(date, time_of_day),
            years_advanced: 0,
        });
    }

    if let Some((year, month, day)) = explicit_date(&core, reference) {
        let (date, years_advanced) = roll_forward(year, month, day, reference).ok_or_else(|| {
            ParseError::InvalidCalendarDate {
                phrase: phrase.trim().to_string(),
            }
        })?;
        return Ok(ResolvedTiming {
            resolved: ResolvedDate::new(date, time_of_day),
            years_advanced,
        });
    }

    Err(ParseError::Unrecognized {
        phrase: phrase.trim().to_string(),
    })
}

/// The Saturday at or after `reference`.
pub fn upcoming_saturday(reference: NaiveDate) -> NaiveDate {
    add_days(reference, days_until(reference, Weekday::Sat))
}

/// Finds the first timing expression inside a longer sentence.
pub fn find_timing_phrase(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    [&*TIMING_MENTION, &*ISO_DATE, &*NUMERIC_DATE, &*DAY_MONTH, &*MONTH_DAY]
        .into_iter()
        .filter_map(|pattern| pattern.find(&lowered))
        .min_by_key(|found| found.start())
        .map(|found| found.as_str().to_string())
}

fn normalize_phrase(phrase: &str) -> String {
    phrase
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '/' | '-' | '.' | ',') {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn relative_date(core: &str, reference: NaiveDate, has_day_part: bool) -> Option<NaiveDate> {
    let date = match core {
        "" | "this" if has_day_part => reference,
        "today" | "now" | "right now" => reference,
        "tomorrow" | "tmrw" | "tmr" => add_days(reference, 1),
        "day after tomorrow" => add_days(reference, 2),
        "weekend" | "this weekend" => this_weekend(reference),
        "next weekend" => next_weekend(reference),
        "next week" => add_days(reference, 7),
        _ => return in_days(core, reference).or_else(|| weekday_date(core, reference)),
    };
    Some(date)
}

fn in_days(core: &str, reference: NaiveDate) -> Option<NaiveDate> {
    // "in" is a filler word, so restore it before matching "in 3 days".
    let haystack = format!("in {core}");
    let captures = IN_DAYS.captures(&haystack)?;
    let count = captures[1].parse::<u64>().ok()?;
    let days = if captures[2].starts_with("week") {
        count * 7
    } else {
        count
    };
    Some(add_days(reference, days))
}

fn weekday_date(core: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let (strictly_after, name) = match core.split_once(' ') {
        Some(("this", name)) => (false, name),
        Some(("next", name)) => (true, name),
        Some(_) => return None,
        None => (false, core),
    };
    if name.len() < 3 || !name.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let weekday = name.parse::<Weekday>().ok()?;

    let mut offset = days_until(reference, weekday);
    if strictly_after && offset == 0 {
        offset = 7;
    }
    Some(add_days(reference, offset))
}

fn this_weekend(reference: NaiveDate) -> NaiveDate {
    match reference.weekday() {
        Weekday::Sat | Weekday::Sun => reference,
        _ => upcoming_saturday(reference),
    }
}

fn next_weekend(reference: NaiveDate) -> NaiveDate {
    match reference.weekday() {
        Weekday::Sun => upcoming_saturday(reference),
        _ => add_days(upcoming_saturday(reference), 7),
    }
}

fn explicit_date(core: &str, reference: NaiveDate) -> Option<(i32, u32, u32)> {
    if let Some(captures) = ISO_DATE.captures(core) {
        return Some((
            captures[1].parse().ok()?,
            captures[2].parse().ok()?,
            captures[3].parse().ok()?,
        ));
    }

    if let Some(captures) = DAY_MONTH.captures(core) {
        let year = optional_year(captures.get(3).map(|m| m.as_str()), reference)?;
        return Some((year, month_number(&captures[2])?, captures[1].parse().ok()?));
    }

    if let Some(captures) = MONTH_DAY.captures(core) {
        let year = optional_year(captures.get(3).map(|m| m.as_str()), reference)?;
        return Some((year, month_number(&captures[1])?, captures[2].parse().ok()?));
    }

    numeric_date(core, reference)
}

/// Day/month[/year]. Prefers the first match that looks like a calendar date
/// so a clock time such as "7.30" does not shadow it.
fn numeric_date(core: &str, reference: NaiveDate) -> Option<(i32, u32, u32)> {
    let mut candidates = NUMERIC_DATE
        .captures_iter(core)
        .filter_map(|captures| {
            let year = match captures.get(3) {
                Some(year) if year.as_str().len() == 2 => 2000 + year.as_str().parse::<i32>().ok()?,
                Some(year) => year.as_str().parse().ok()?,
                None => reference.year(),
            };
            Some((year, captures[2].parse::<u32>().ok()?, captures[1].parse::<u32>().ok()?))
        })
        .collect::<Vec<_>>();

    let plausible = candidates
        .iter()
        .position(|(_, month, day)| (1..=12).contains(month) && (1..=31).contains(day));
    match plausible {
        Some(index) => Some(candidates.swap_remove(index)),
        None => candidates.into_iter().next(),
    }
}

fn optional_year(raw: Option<&str>, reference: NaiveDate) -> Option<i32> {
    match raw {
        Some(year) => year.parse().ok(),
        None => Some(reference.year()),
    }
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Smallest whole-year advance that yields an existing date at or after
/// `reference`. Returns `None` for day/month pairs that never exist.
fn roll_forward(year: i32, month: u32, day: u32, reference: NaiveDate) -> Option<(NaiveDate, u32)> {
    // Any year before the reference year is in the past, so start no earlier.
    let start = year.max(reference.year());
    (0..=MAX_YEARS_TO_SEARCH).find_map(|offset| {
        let candidate_year = start.checked_add(offset)?;
        let date = NaiveDate::from_ymd_opt(candidate_year, month, day)?;
        (date >= reference).then(|| (date, u32::try_from(candidate_year - year).unwrap_or(0)))
    })
}

fn days_until(reference: NaiveDate, target: Weekday) -> u64 {
    let from = reference.weekday().num_days_from_monday();
    let to = target.num_days_from_monday();
    u64::from((to + 7 - from) % 7)
}

fn add_days(reference: NaiveDate, days: u64) -> NaiveDate {
    reference.checked_add_days(Days::new(days)).unwrap_or(reference)
}
