//! Location tag parsing
//!
//! Locations carry their capture date as free-form tags: a `YYYY` year tag,
//! an `MM` month tag, and after an update check a `YY-M` tag naming the newer
//! coverage.

use crate::model::CapturedDate;
use crate::{Error, Result};

/// Tag marking a location whose coverage was replaced
pub const UPDATED_TAG: &str = "Updated";
/// Tag routing a location to manual review
pub const REVIEW_TAG: &str = "REVIEW";
/// Tag marking a location that could not be checked
pub const ERROR_TAG: &str = "ERROR";

fn is_year_tag(tag: &str) -> bool {
    let b = tag.as_bytes();
    b.len() == 4 && (b.starts_with(b"19") || b.starts_with(b"20")) && b.iter().all(u8::is_ascii_digit)
}

fn is_month_tag(tag: &str) -> bool {
    match tag.as_bytes() {
        [b'0', d] => (b'1'..=b'9').contains(d),
        [b'1', d] => (b'0'..=b'2').contains(d),
        _ => false,
    }
}

fn single_match<'a>(tags: &'a [String], kind: &str, pred: fn(&str) -> bool) -> Result<Option<&'a str>> {
    let matches: Vec<&str> = tags.iter().map(String::as_str).filter(|t| pred(t)).collect();
    if matches.len() > 1 {
        return Err(Error::InvalidInput(format!("Multiple {} tags found: {:?}", kind, matches)));
    }
    Ok(matches.first().copied())
}

/// The single `YYYY` tag, if present
pub fn extract_year_tag(tags: &[String]) -> Result<Option<&str>> {
    single_match(tags, "year", is_year_tag)
}

/// The single `MM` tag (01-12), if present
pub fn extract_month_tag(tags: &[String]) -> Result<Option<&str>> {
    single_match(tags, "month", is_month_tag)
}

/// A `YY-M` / `YY-MM` tag expanded to a full year and zero-padded month
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YymmTag {
    /// Tag as written
    pub tag: String,
    /// `20YY`
    pub year: String,
    /// Zero-padded month
    pub month: String,
}

impl YymmTag {
    pub fn date(&self) -> Result<CapturedDate> {
        CapturedDate::parse(&self.year, &self.month)
    }
}

/// First tag shaped like `YY-M` or `YY-MM`
pub fn split_yymm_tag(tags: &[String]) -> Option<YymmTag> {
    tags.iter().find_map(|tag| {
        let (yy, m) = tag.split_once('-')?;
        let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if yy.len() != 2 || !(1..=2).contains(&m.len()) || !digits(yy) || !digits(m) {
            return None;
        }
        Some(YymmTag {
            tag: tag.clone(),
            year: format!("20{}", yy),
            month: format!("{:0>2}", m),
        })
    })
}

/// Year, month and update tags for a capture date: `["2023", "08", "23-8"]`
pub fn date_tags(date: &CapturedDate) -> [String; 3] {
    [
        format!("{:04}", date.year()),
        format!("{:02}", date.month()),
        format!("{:02}-{}", date.year().rem_euclid(100), date.month()),
    ]
}
