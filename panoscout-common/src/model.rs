//! Panorama data model shared across panoscout crates

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::{Error, Result};

/// Provider-assigned panorama identifier (opaque)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanoId(String);

impl PanoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PanoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PanoId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PanoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// WGS84 coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Capture date at month precision
///
/// Ordering is lexicographic on (year, month). Serialized as `"YYYY-MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CapturedDate {
    year: i32,
    month: u32,
}

impl CapturedDate {
    /// Build a date, rejecting months outside 1..=12 and years outside 1..=9999
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=9999).contains(&year) && (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// Parse a reference date from tag strings such as `("2023", "05")`
    pub fn parse(year: &str, month: &str) -> Result<Self> {
        let y: i32 = year
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Invalid year: {:?}", year)))?;
        let m: u32 = month
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Invalid month: {:?}", month)))?;
        Self::new(y, m)
            .ok_or_else(|| Error::InvalidInput(format!("Date out of range: {}-{}", year, month)))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Months elapsed since year 0, used for month arithmetic
    pub fn month_index(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month)
    }

    /// Signed number of months from `earlier` to `self`
    pub fn months_since(&self, earlier: &CapturedDate) -> i64 {
        self.month_index() - earlier.month_index()
    }
}

impl fmt::Display for CapturedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for CapturedDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CapturedDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| serde::de::Error::custom(format!("expected YYYY-MM, got {:?}", s)))?;
        CapturedDate::parse(year, month).map_err(serde::de::Error::custom)
    }
}
