//! Numeric hours/days/pages extraction and hours-calculation rules per §4.5.

use crate::entities::{ActivityCategory, CalculationType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Ordered fallback patterns, mirroring the source's
/// `_extract_numeric_hours`: try each in turn, first successful match wins.
static HOURS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(\d+)\s*h\b").unwrap(),
        Regex::new(r"(\d+)\s*horas?").unwrap(),
        Regex::new(r"(\d+)\s*hr").unwrap(),
        Regex::new(r"(\d+)").unwrap(),
    ]
});

static DAYS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*(?:dias?|days?)").unwrap());

static PAGES_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(?:p[aá]ginas?|pages?|p\.|pgs?)").unwrap());

/// Parse the first contiguous run of digits out of a hours-like string.
/// Null (`None`) if no digits are present at all.
pub fn extract_numeric_hours(text: Option<&str>) -> Option<i64> {
    let text = text?.to_lowercase();
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for pattern in HOURS_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            if let Some(m) = caps.get(1) {
                if let Ok(n) = m.as_str().parse::<i64>() {
                    return Some(n);
                }
            }
        }
    }
    None
}

/// Search `evento`, `data`, `carga_horaria` (in that order) for the first
/// `\d+\s*(dia|day)s?` match.
pub fn extract_days(fields: &[Option<&str>]) -> Option<i64> {
    for field in fields {
        if let Some(text) = field {
            if let Some(caps) = DAYS_PATTERN.captures(&text.to_lowercase()) {
                if let Ok(n) = caps[1].parse::<i64>() {
                    return Some(n);
                }
            }
        }
    }
    None
}

/// Search `evento`, `carga_horaria` (in that order) for the first
/// pages-like match.
pub fn extract_pages(fields: &[Option<&str>]) -> Option<i64> {
    for field in fields {
        if let Some(text) = field {
            if let Some(caps) = PAGES_PATTERN.captures(&text.to_lowercase()) {
                if let Ok(n) = caps[1].parse::<i64>() {
                    return Some(n);
                }
            }
        }
    }
    None
}

/// Inputs the hours calculation needs beyond the category row itself.
pub struct HoursInput<'a> {
    pub numeric_hours: Option<i64>,
    pub evento: Option<&'a str>,
    pub data: Option<&'a str>,
    pub carga_horaria: Option<&'a str>,
}

/// Compute `calculated_hours` per the §4.5 table, clamped to
/// `category.max_total_hours` in every branch.
pub fn calculate_hours(category: &ActivityCategory, input: &HoursInput<'_>) -> i64 {
    let max = category.max_total_hours;
    let raw = match category.calculation_type {
        CalculationType::FixedPerSemester | CalculationType::FixedPerActivity => {
            category.hours_awarded.unwrap_or(0)
        }
        CalculationType::RatioHours => {
            let output_hours = category.output_hours.unwrap_or(0);
            let input_quantity = category.input_quantity.unwrap_or(1).max(1);
            match input.numeric_hours {
                Some(numeric_hours) => (numeric_hours * output_hours) / input_quantity,
                None => 0,
            }
        }
        CalculationType::RatioDays => {
            let output_hours = category.output_hours.unwrap_or(0);
            match extract_days(&[input.evento, input.data, input.carga_horaria]) {
                Some(days) => days * output_hours,
                None => output_hours,
            }
        }
        CalculationType::RatioPages => {
            let output_hours = category.output_hours.unwrap_or(0);
            let input_quantity = category.input_quantity.unwrap_or(1).max(1);
            match extract_pages(&[input.evento, input.carga_horaria]) {
                Some(pages) => (pages * output_hours) / input_quantity,
                None => output_hours,
            }
        }
    };
    raw.clamp(0, max)
}
