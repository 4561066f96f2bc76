//! Retag decisions derived from coverage verdicts
//!
//! Translates verdicts into what should happen to a stored location:
//! leave it, flag it, or replace its pano and tags.

use panoscout_common::tags::{date_tags, YymmTag, ERROR_TAG, REVIEW_TAG, UPDATED_TAG};
use panoscout_common::{CapturedDate, Coordinate, PanoId};
use serde::Serialize;

use crate::locations::MapLocation;
use crate::services::CoverageVerdict;

/// What to do with one checked location
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RetagAction {
    /// Could not be checked
    Error,
    /// No newer coverage
    Unchanged,
    /// Newer by one month only; likely a mislabeled re-upload
    Review,
    /// Replace with the newer pano
    Replace {
        pano_id: PanoId,
        coordinate: Coordinate,
        tags: Vec<String>,
    },
}

impl RetagAction {
    pub fn for_verdict(verdict: Option<&CoverageVerdict>) -> Self {
        let Some(verdict) = verdict else {
            return RetagAction::Error;
        };
        if !verdict.has_newer_coverage {
            return RetagAction::Unchanged;
        }
        if verdict.is_only_one_month_newer {
            return RetagAction::Review;
        }
        let mut tags = vec![UPDATED_TAG.to_string()];
        tags.extend(date_tags(&verdict.date));
        RetagAction::Replace {
            pano_id: verdict.pano_id.clone(),
            coordinate: verdict.coordinate,
            tags,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RetagAction::Error => "error",
            RetagAction::Unchanged => "unchanged",
            RetagAction::Review => "review",
            RetagAction::Replace { .. } => "replace",
        }
    }

    /// The rewritten location, or `None` when nothing changes
    pub fn apply(&self, location: &MapLocation) -> Option<MapLocation> {
        match self {
            RetagAction::Unchanged => None,
            RetagAction::Error => Some(location.with_added_tag(ERROR_TAG)),
            RetagAction::Review => Some(location.with_added_tag(REVIEW_TAG)),
            RetagAction::Replace {
                pano_id,
                coordinate,
                tags,
            } => {
                let mut updated = location.moved_to(pano_id, *coordinate);
                updated.tags = tags.clone();
                Some(updated)
            }
        }
    }
}

/// Outcome of re-checking a location already tagged as updated
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reconciliation {
    /// Claimed update date equals the original date
    FalseUpdate,
    /// Dates differ by one month
    Review,
    /// Claimed update is newer than the original
    ConfirmedUpdate,
    /// Search found coverage matching the claimed date
    ///
    /// Only reachable with a search that can return dates before the
    /// original; [`crate::locations::reconcile_locations`] never does.
    FoundOldCoverage { pano_id: PanoId, coordinate: Coordinate },
    /// Search found nothing newer than the original date
    FalseUpdateAfterSearch { pano_id: PanoId, coordinate: Coordinate },
    /// Search found coverage newer than the original date
    EvenNewer {
        pano_id: PanoId,
        coordinate: Coordinate,
        date: CapturedDate,
    },
    /// Search was needed but failed
    NotFound,
}

impl Reconciliation {
    /// Whether [`reconcile_updated`] needs a coverage search for these dates
    pub fn needs_search(original: &CapturedDate, claimed: &CapturedDate) -> bool {
        original > claimed && original.months_since(claimed).abs() >= 2
    }

    pub fn label(&self) -> &'static str {
        match self {
            Reconciliation::FalseUpdate => "false_update",
            Reconciliation::Review => "review",
            Reconciliation::ConfirmedUpdate => "confirmed_update",
            Reconciliation::FoundOldCoverage { .. } => "found_old_coverage",
            Reconciliation::FalseUpdateAfterSearch { .. } => "false_update_after_search",
            Reconciliation::EvenNewer { .. } => "even_newer",
            Reconciliation::NotFound => "not_found",
        }
    }

    /// The rewritten location, or `None` when nothing changes
    pub fn apply(&self, location: &MapLocation, claimed: &YymmTag) -> Option<MapLocation> {
        let without_update_tags = |loc: &MapLocation| {
            let mut loc = loc.clone();
            loc.tags.retain(|t| t != &claimed.tag && t != UPDATED_TAG);
            loc
        };

        match self {
            Reconciliation::NotFound => None,
            Reconciliation::FalseUpdate => Some(without_update_tags(location)),
            Reconciliation::Review => Some(location.with_added_tag(REVIEW_TAG)),
            Reconciliation::ConfirmedUpdate => {
                let mut updated = location.clone();
                updated.tags = vec![
                    "NEW".to_string(),
                    claimed.tag.clone(),
                    claimed.year.clone(),
                    claimed.month.clone(),
                ];
                Some(updated)
            }
            Reconciliation::FoundOldCoverage { pano_id, coordinate }
            | Reconciliation::FalseUpdateAfterSearch { pano_id, coordinate } => {
                Some(without_update_tags(&location.moved_to(pano_id, *coordinate)))
            }
            Reconciliation::EvenNewer {
                pano_id,
                coordinate,
                date,
            } => {
                let mut updated = location.moved_to(pano_id, *coordinate);
                updated.tags = vec!["EVENNEWER".to_string()];
                updated.tags.extend(date_tags(date));
                Some(updated)
            }
        }
    }
}

/// Decide what a location tagged as updated really is
///
/// `original` is the capture date from the year/month tags, `claimed` the
/// date of the `YY-M` update tag. `found` is the newest coverage resolved
/// against `original`, only consulted when the claimed date is older than the
/// original (see [`Reconciliation::needs_search`]).
///
/// A search result equal to the original date means nothing newer exists, so
/// the claimed update was false.
pub fn reconcile_updated(
    original: CapturedDate,
    claimed: CapturedDate,
    found: Option<&CoverageVerdict>,
) -> Reconciliation {
    if original == claimed {
        return Reconciliation::FalseUpdate;
    }
    if original.months_since(&claimed).abs() < 2 {
        return Reconciliation::Review;
    }
    if original < claimed {
        return Reconciliation::ConfirmedUpdate;
    }

    let Some(found) = found else {
        return Reconciliation::NotFound;
    };
    let pano_id = found.pano_id.clone();
    let coordinate = found.coordinate;

    if found.date == claimed {
        Reconciliation::FoundOldCoverage { pano_id, coordinate }
    } else if found.date == original {
        Reconciliation::FalseUpdateAfterSearch { pano_id, coordinate }
    } else {
        Reconciliation::EvenNewer {
            pano_id,
            coordinate,
            date: found.date,
        }
    }
}
