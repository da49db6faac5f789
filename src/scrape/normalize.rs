//! Raw extractions into canonical results.
//!
//! Sites render draw numbers with thousands separators, stray whitespace
//! and clipped leading zeros. Normalization strips everything but digits,
//! fits each entry to the lottery's draw width and validates the page's own
//! date against the date the run asked for, so a stale page can never be
//! published under today's date.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use crate::errors::ValidationError;
use crate::models::{CanonicalResult, ExtractedDraw, Lottery, ResultStatus};
use crate::utils::{digits_only, parse_flex_date};

/// Fit a raw digit string to `len` digits. Separators are dropped first;
/// overlong values keep their rightmost digits (sites sometimes prefix the
/// contest number), short values regain the leading zeros the site
/// clipped. Returns `None` when no digits survive.
fn fit_digits(raw: &str, len: usize) -> Option<String> {
    let digits = digits_only(raw);
    if digits.is_empty() {
        return None;
    }
    if digits.len() > len {
        Some(digits[digits.len() - len..].to_string())
    } else {
        Some(format!("{digits:0>len$}"))
    }
}

/// Validate and canonicalize one extracted draw.
///
/// # Arguments
///
/// * `draw` - output of a plausible extraction strategy
/// * `lottery` - which lottery the source is configured for
/// * `date` - the draw date this run is scraping
/// * `source_url` - provenance, recorded on the result
/// * `fetched_at` - when the page was retrieved
///
/// # Returns
///
/// The canonical result, or the validation error that makes this page
/// unusable for `date`. Validation errors are terminal: retrying the same
/// page cannot fix a wrong date.
pub fn normalize(
    draw: ExtractedDraw,
    lottery: Lottery,
    date: NaiveDate,
    source_url: &str,
    fetched_at: DateTime<Utc>,
) -> Result<CanonicalResult, ValidationError> {
    if let Some(text) = draw.date_text.as_deref() {
        match parse_flex_date(text) {
            Some(embedded) if embedded != date => {
                return Err(ValidationError::DateMismatch {
                    requested: date,
                    embedded,
                });
            }
            Some(_) => {}
            None => return Err(ValidationError::BadDate(text.to_string())),
        }
    }

    let len = lottery.digit_len();
    let mut positions = BTreeMap::new();
    for (rank, raw) in &draw.positions {
        match fit_digits(raw, len) {
            Some(fitted) => {
                positions.insert(*rank, fitted);
            }
            None => {
                debug!(rank, raw = raw.as_str(), "dropping entry without digits");
            }
        }
    }
    if positions.is_empty() {
        return Err(ValidationError::EmptyDraw);
    }

    // Prize labels only make sense next to a draw number of the same rank.
    let prizes: BTreeMap<u8, String> = draw
        .prizes
        .into_iter()
        .filter(|(rank, _)| positions.contains_key(rank))
        .collect();

    // The headline number is what makes a result publishable; missing tail
    // ranks render as unavailable downstream.
    let status = if positions.contains_key(&1) {
        ResultStatus::Active
    } else {
        ResultStatus::Pending
    };

    Ok(CanonicalResult {
        lottery_id: lottery,
        date,
        positions,
        prizes,
        source_url: source_url.to_string(),
        status,
        fetched_at,
    })
}
