//! Fallback capture-date search
//!
//! Used only when the structured date field of a metadata response is missing.
//! Walks the nested arrays depth-first, left to right, and returns the first
//! two-element integer array that looks like `[year, month]`. This can match an
//! unrelated field that happens to look like a date; callers must tolerate that.

use panoscout_common::CapturedDate;
use serde_json::Value;

/// Plausible capture years
const YEAR_RANGE: std::ops::RangeInclusive<i64> = 1900..=2100;

/// First `[year, month]`-shaped pair in depth-first order
///
/// Recursion depth is bounded by serde_json's parser nesting limit.
pub fn find_date(node: &Value) -> Option<CapturedDate> {
    let Value::Array(items) = node else {
        return None;
    };

    if let [year, month] = items.as_slice() {
        if let Some(date) = as_date_pair(year, month) {
            return Some(date);
        }
    }

    items.iter().find_map(find_date)
}

fn as_date_pair(year: &Value, month: &Value) -> Option<CapturedDate> {
    // as_i64 is None for floats, so 2019.0 never matches
    let year = year.as_i64()?;
    let month = month.as_i64()?;
    if !YEAR_RANGE.contains(&year) || !(1..=12).contains(&month) {
        return None;
    }
    CapturedDate::new(i32::try_from(year).ok()?, u32::try_from(month).ok()?)
}
