//! Text to typed-cell coercion.
//!
//! Attempts run in a fixed order and the first success wins: number, then date, then text.

use crate::types::TypedCell;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("valid ordinal regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%m.%d.%Y",
    "%Y%m%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%b. %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d %B, %Y",
    "%d-%b-%Y",
    "%A, %B %d, %Y",
    "%a, %b %d, %Y",
    "%A %B %d %Y",
    "%a %b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
];

/// Coerces extracted text into a typed cell. Never fails; unrecognised text stays text.
pub fn coerce(text: &str) -> TypedCell {
    let stripped = text.trim();
    if let Some(n) = parse_number(stripped) {
        return TypedCell::Number(n);
    }
    if let Some(d) = parse_date(stripped) {
        return TypedCell::Date(d.format("%Y-%m-%d").to_string());
    }
    TypedCell::Text(stripped.to_string())
}

/// Parses a decimal after dropping thousands-separator commas. Non-finite values are refused.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    // f64::from_str also takes "inf"/"nan" spellings; only plain numerals count here
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Permissive date parse over common human and ISO layouts.
///
/// Ambiguous numeric layouts read month first. Dates without a year are not
/// accepted (`"March 3"` stays text) so the result never depends on today's date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }
    let normalized = WHITESPACE.replace_all(text, " ");
    let normalized = ORDINAL_SUFFIX.replace_all(&normalized, "$1");
    let candidate = normalized.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(candidate) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(candidate) {
        return Some(dt.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| {
            NaiveDate::parse_from_str(candidate, fmt)
                .ok()
                .filter(plausible_year)
        })
        .or_else(|| {
            DATETIME_FORMATS.iter().find_map(|fmt| {
                NaiveDateTime::parse_from_str(candidate, fmt)
                    .ok()
                    .map(|dt| dt.date())
                    .filter(plausible_year)
            })
        })
}

// chrono's %Y takes any digit count, so "1.2.3" would otherwise read as year 3
fn plausible_year(date: &NaiveDate) -> bool {
    (1000..=9999).contains(&date.year())
}
