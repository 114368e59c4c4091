use once_cell::sync::Lazy;
use regex::Regex;

static FOUR_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})").expect("four-digit pattern should compile"));

/// 1) Collapse runs of whitespace (spaces, tabs, newlines) into one space and trim the ends.
pub fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 2) Lenient numeric coercion: anything that is not a finite number becomes `None`.
pub fn coerce_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 3) Keep only ASCII digits and decimal points, e.g. `"$2,923,706,026"` → `"2923706026"`.
pub fn strip_to_numeric(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect()
}

/// First run of four digits in `text`, if any.
pub fn first_four_digits(text: &str) -> Option<&str> {
    FOUR_DIGITS
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
