//! Field parsers: pure functions that pull typed values out of noisy
//! free-text fields. Row-level failures surface as `ParseError`; the owning
//! cleaner decides whether to drop or flag the row.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("valid year regex"));
static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid digits regex"));
static COMPACT_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("valid compact date regex"));
static BARE_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("valid bare year regex"));
static PUNCTUATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid punctuation regex"));
static PERCENTAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:percent\b|%)?").expect("valid percentage regex")
});

// Month-first wins for ambiguous slashed dates; day-first only catches day > 12.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y",
];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no 4-digit year in '{input}'")]
    NoYear { input: String },

    #[error("unrecognized date '{input}'")]
    InvalidDate { input: String },

    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },
}

/// First 4-digit run read as a calendar year, January 1 of that year
pub fn parse_year(text: &str) -> Result<NaiveDate, ParseError> {
    YEAR_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        .ok_or_else(|| ParseError::NoYear {
            input: text.to_string(),
        })
}

/// Full calendar date. A bare `YYYY` reads as January 1; any other text that
/// matches no format, or names an impossible day, is `InvalidDate`.
pub fn parse_date(text: &str) -> Result<NaiveDate, ParseError> {
    let trimmed = text.trim();

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }

    let compact = COMPACT_DATE_RE.captures(trimmed).and_then(|caps| {
        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let year = i32::try_from(field(1)?).ok()?;
        NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)
    });
    let bare_year = || {
        BARE_YEAR_RE
            .is_match(trimmed)
            .then(|| parse_year(trimmed).ok())
            .flatten()
    };

    compact.or_else(bare_year).ok_or_else(|| ParseError::InvalidDate {
        input: text.to_string(),
    })
}

/// First run of digits, bounded to `u32`. `None` means "unparseable", never
/// "zero"; an out-of-range count is unparseable too, so sums stay in range.
pub fn parse_count(text: &str) -> Option<u64> {
    DIGITS_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(u64::from)
}

/// Strips punctuation and collapses whitespace. Idempotent.
pub fn normalize_name(text: &str) -> String {
    let stripped = PUNCTUATION_RE.replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trims and title-cases a location: each run of letters starts upper-case and
/// continues lower-case. Idempotent.
pub fn title_case_location(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for ch in text.trim().chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }
    out
}

/// Leading segment of an authors field, up to the first comma
pub fn extract_first_author(authors: Option<&str>) -> Option<String> {
    let authors = authors?;
    let first = authors.split(',').next().unwrap_or("").trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

/// Every number in the text, each optionally followed by `%` or `percent`
pub fn parse_percentage_list(text: &str) -> Vec<f64> {
    PERCENTAGE_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

/// Arithmetic mean; `None` for an empty slice so it never leaks NaN downstream
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
