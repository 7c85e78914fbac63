//! Row validation and precision inference
//!
//! Raw (date, value) pairs are filtered, never repaired: a row either parses
//! into a strict `YYYY-MM-DD` date and finite value or it is silently
//! dropped. Dropped rows still count toward `total_scanned`. The minimum-row
//! check lives here, independently of any request-level minimum, because this
//! path is reachable without going through request validation.

use super::query::RawRow;
use crate::error::ForecastError;
use crate::models::{is_strict_date, IngestionResult, TimeSeriesRow, MIN_ROWS};

/// Significant fractional digits in a value's textual form, trailing zeros
/// stripped. A negative scientific exponent shifts the count right:
/// "1.50e-3" has four fractional digits.
fn fractional_digits(text: &str) -> u32 {
    let text = text.trim().to_ascii_lowercase();
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => {}
        _ => return 0,
    }

    if let Some((mantissa, exponent)) = text.split_once("e-") {
        let shift: u32 = exponent.parse().unwrap_or(0);
        let decimals = mantissa
            .split_once('.')
            .map(|(_, frac)| frac.trim_end_matches('0').len() as u32)
            .unwrap_or(0);
        // Exponents near u32::MAX still parse to a finite 0.0, so the
        // shift must saturate rather than wrap.
        return decimals.saturating_add(shift);
    }

    text.split_once('.')
        .map(|(_, frac)| frac.trim_end_matches('0').len() as u32)
        .unwrap_or(0)
}

/// Filter raw pairs into a validated series and infer display precision.
pub fn validate_rows(raw: &[RawRow]) -> Result<IngestionResult, ForecastError> {
    let mut rows = Vec::new();
    let mut precision = 0u32;

    for pair in raw {
        let Ok(value) = pair.value.trim().parse::<f64>() else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }

        // Timestamps are tolerated: trim, then keep the first 10 characters.
        let date = pair.date.trim();
        let date = if date.len() <= 10 {
            date
        } else {
            match date.get(..10) {
                Some(head) => head,
                None => continue,
            }
        };
        if !is_strict_date(date) {
            continue;
        }

        precision = precision.max(fractional_digits(&pair.value));
        rows.push(TimeSeriesRow {
            date: date.to_string(),
            value,
        });
    }

    if rows.len() < MIN_ROWS {
        return Err(ForecastError::InsufficientData(rows.len()));
    }

    Ok(IngestionResult {
        total_scanned: raw.len(),
        valid_count: rows.len(),
        inferred_precision: precision,
        rows,
    })
}
