//! Header cleaning, field coercion and row fingerprints.
//!
//! The listing pages format money, share counts and dates inconsistently.
//! Dollar amounts and trade dates soft-fail; offer dates and share counts
//! are strict because a failure there means the page layout changed.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::ParseError;

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static DOLLAR_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]*\.[0-9]*").unwrap());
static DATE_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{1,2}/[0-9]{1,2}/[0-9]{2,4}").unwrap());

/// Turns a display header into a stable field token.
///
/// `"Offer Price ($)"` becomes `offer_price`. Cleaning a clean header is a no-op.
pub fn clean_header(header: &str) -> String {
    let lower = header.to_lowercase();
    NON_ALNUM
        .replace_all(&lower, "_")
        .trim_matches('_')
        .to_string()
}

/// Reads the first `digits.digits` run out of a dollar string, `0.0` if none.
pub fn dollar_to_float(raw: &str) -> f64 {
    DOLLAR_DIGITS
        .find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parses a price that may already be a bare decimal (`10.00`, `10`) or
/// still carry formatting (`$10.00`).
pub fn parse_price(raw: &str) -> f64 {
    let trimmed = raw.trim();
    // `f64::from_str` also accepts `NaN` and `inf`, which must soft-fail.
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or_else(|| dollar_to_float(trimmed))
}

/// Parses a share count in millions. Thousands separators are tolerated.
pub fn parse_shares(raw: &str) -> Result<f64, ParseError> {
    let cleaned = raw.trim().replace(',', "");
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber {
            field: "shares_millions".into(),
            value: raw.to_string(),
        })
}

/// Parses a source offer date in `month/day/year` form.
pub fn parse_offer_date(raw: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(raw.trim(), "%m/%d/%Y").map_err(|_| ParseError::InvalidDate {
        field: "offer_date".into(),
        value: raw.to_string(),
    })
}

/// Parses a date as written into a blob.
///
/// Accepts the normalized `YYYY-MM-DD`, a `YYYY-MM-DD HH:MM:SS` timestamp,
/// and the source `MM/DD/YYYY` form.
pub fn parse_stored_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| NaiveDate::parse_from_str(trimmed, "%m/%d/%Y").ok())
}

/// Pulls the first `m/d/yyyy`-shaped date out of free text such as
/// `"Week of 10/26/2026"`. Two-digit years are read as `%y`.
pub fn extract_trade_date(text: &str) -> Option<NaiveDate> {
    let found = DATE_IN_TEXT.find(text)?.as_str();
    let year_len = found.rsplit('/').next().map(str::len).unwrap_or(0);
    let format = if year_len == 4 { "%m/%d/%Y" } else { "%m/%d/%y" };
    NaiveDate::parse_from_str(found, format).ok()
}

/// Lower-case hex SHA-256 of a raw row line.
pub fn fingerprint(raw_line: &str) -> String {
    let digest = Sha256::digest(raw_line.as_bytes());
    hex::encode(digest)
}
