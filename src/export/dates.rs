//! Date normalization for interchange output.
//!
//! Free-text dates are normalized through a fallback chain: a full ISO date is
//! emitted structurally; anything unparseable is wrapped as a free-text date
//! string; a bare 4-digit year is extracted as a last resort. A date is never
//! silently dropped.

use std::sync::LazyLock;

use regex::Regex;

static RE_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(?:-(\d{2})(?:-(\d{2}))?)?$").unwrap());

static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

/// Normalized shape of a date for a target format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateForm {
    /// Full or partial ISO date (`1900`, `1900-01`, `1900-01-15`).
    Iso(String),
    /// Unparseable text, carried verbatim in the target's free-text wrapper.
    Text(String),
}

/// Normalize a raw date string.
///
/// Returns `None` only for empty input.
pub fn normalize(raw: &str) -> Option<DateForm> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if RE_ISO.is_match(trimmed) {
        Some(DateForm::Iso(trimmed.to_owned()))
    } else {
        Some(DateForm::Text(trimmed.to_owned()))
    }
}

/// Extract the first 4-digit year from arbitrary date text.
pub fn extract_year(raw: &str) -> Option<i32> {
    RE_YEAR
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Render an ISO date in GEDCOM date syntax (`15 JAN 1900`, `JAN 1900`, `1900`).
///
/// Input that is not ISO (or carries an out-of-range month) is returned
/// verbatim — GEDCOM tolerates free-text dates.
pub fn iso_to_gedcom(iso: &str) -> String {
    let Some(caps) = RE_ISO.captures(iso.trim()) else {
        return iso.trim().to_owned();
    };
    let year = &caps[1];
    let month = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .filter(|m| (1..=12).contains(m));
    let day = caps.get(3).and_then(|d| d.as_str().parse::<u8>().ok());

    match (month, day) {
        (Some(m), Some(d)) => format!("{} {} {}", d, MONTHS[m - 1], year),
        (Some(m), None) => format!("{} {}", MONTHS[m - 1], year),
        _ => year.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_dates_stay_structured() {
        assert_eq!(normalize("1900-01-15"), Some(DateForm::Iso("1900-01-15".into())));
        assert_eq!(normalize("1900"), Some(DateForm::Iso("1900".into())));
    }

    #[test]
    fn free_text_wraps_instead_of_dropping() {
        assert_eq!(
            normalize("about 1850, maybe spring"),
            Some(DateForm::Text("about 1850, maybe spring".into()))
        );
        assert_eq!(normalize("  "), None);
    }

    #[test]
    fn year_extraction_as_last_resort() {
        assert_eq!(extract_year("circa 1874 in Ohio"), Some(1874));
        assert_eq!(extract_year("spring"), None);
    }

    #[test]
    fn gedcom_date_rendering() {
        assert_eq!(iso_to_gedcom("1900-01-15"), "15 JAN 1900");
        assert_eq!(iso_to_gedcom("1900-01"), "JAN 1900");
        assert_eq!(iso_to_gedcom("1900"), "1900");
        assert_eq!(iso_to_gedcom("ABT 1850"), "ABT 1850");
    }
}
