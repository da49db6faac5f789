//! Small helpers shared across pipeline stages.
//!
//! This module provides:
//! - Digit extraction from the messy strings lottery pages publish
//! - Lenient date parsing for document-embedded draw dates
//! - Target-date resolution for a pipeline invocation
//! - String truncation for logging raw documents

use chrono::{Duration, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// Extract the ASCII digits from a raw draw string, dropping separators.
///
/// Result pages render draw numbers inconsistently: `"12345"`, `"12.345"`,
/// `"1 2 3 4 5"` and `"012-345"` all mean the same number. Everything that
/// is not an ASCII digit is discarded.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(digits_only("12.345"), "12345");
/// assert_eq!(digits_only(" 0 451 "), "0451");
/// assert_eq!(digits_only("n/d"), "");
/// ```
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// First date-shaped token in a string: digit fields joined by `/` or `-`.
/// Mismatched separators and out-of-range fields are rejected by the
/// format pass below, not here.
static DATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,4})[/-](\d{1,2})[/-](\d{1,4})").unwrap());

/// Parse a document-embedded date leniently.
///
/// Pages rarely carry a bare date; the usual shape is prose like
/// `"Extração de 10/03/2024"`. The first date-shaped token in the input is
/// extracted and parsed day-first, the Brazilian convention. Returns
/// `None` when no token parses; the caller decides whether that is an
/// error (the normalizer treats it as one).
pub fn parse_flex_date(raw: &str) -> Option<NaiveDate> {
    let caps = DATE_TOKEN.captures(raw)?;
    let token = caps.get(0)?.as_str();
    let head = caps.get(1)?.as_str();
    let tail = caps.get(3)?.as_str();

    // chrono's %Y accepts 1..=4 digit years, so "10/03/24" would parse as
    // year 24 under %d/%m/%Y. Pick the format family by field width before
    // parsing: a wide tail is a day-first four-digit year, a wide head is
    // ISO, anything else is a day-first two-digit year.
    let formats: &[&str] = if tail.len() >= 3 {
        &["%d/%m/%Y", "%d-%m-%Y"]
    } else if head.len() >= 3 {
        &["%Y-%m-%d"]
    } else {
        &["%d/%m/%y"]
    };
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
}

/// Resolve the target draw date for this invocation.
///
/// An explicit date wins; `--today` selects the current local date; the
/// default is yesterday, because the common schedule is an end-of-day
/// confirmation run shortly after midnight.
pub fn target_date(explicit: Option<NaiveDate>, today: bool) -> NaiveDate {
    if let Some(date) = explicit {
        return date;
    }
    let now = Local::now().date_naive();
    if today { now } else { now - Duration::days(1) }
}

/// Truncate a string for logging purposes.
///
/// Raw documents run to hundreds of kilobytes; log previews keep the first
/// `max` bytes with a byte-count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…(+{} bytes)", &s[..end], s.len() - end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_only_strips_separators() {
        assert_eq!(digits_only("12345"), "12345");
        assert_eq!(digits_only("12.345"), "12345");
        assert_eq!(digits_only("1 2 3 4 5"), "12345");
        assert_eq!(digits_only("012-345"), "012345");
        assert_eq!(digits_only(""), "");
        assert_eq!(digits_only("n/d"), "");
    }

    #[test]
    fn parse_flex_date_accepts_known_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(parse_flex_date("10/03/2024"), Some(expected));
        assert_eq!(parse_flex_date("2024-03-10"), Some(expected));
        assert_eq!(parse_flex_date("10-03-2024"), Some(expected));
        assert_eq!(parse_flex_date(" 10/03/24 "), Some(expected));
    }

    #[test]
    fn parse_flex_date_finds_the_date_inside_prose() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(parse_flex_date("Extração de 10/03/2024"), Some(expected));
        assert_eq!(
            parse_flex_date("Resultado do dia 10/03/24 às 21h"),
            Some(expected)
        );
        assert_eq!(parse_flex_date("Concurso 5789 de 10/03/2024"), Some(expected));
    }

    #[test]
    fn parse_flex_date_rejects_garbage() {
        assert_eq!(parse_flex_date("domingo"), None);
        assert_eq!(parse_flex_date("2024/03/10 21:00"), None);
        assert_eq!(parse_flex_date("10/03-2024"), None);
        assert_eq!(parse_flex_date(""), None);
    }

    #[test]
    fn target_date_explicit_wins() {
        let explicit = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(target_date(Some(explicit), true), explicit);
        assert_eq!(target_date(Some(explicit), false), explicit);
    }

    #[test]
    fn target_date_defaults_to_yesterday() {
        let today = Local::now().date_naive();
        assert_eq!(target_date(None, true), today);
        assert_eq!(target_date(None, false), today - Duration::days(1));
    }

    #[test]
    fn truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("<html>", 100), "<html>");
    }

    #[test]
    fn truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn truncate_for_log_respects_char_boundaries() {
        // "1º" is three bytes; truncating at 2 must back off to a boundary
        let result = truncate_for_log("1º: 12345", 2);
        assert!(result.starts_with('1'));
    }
}
