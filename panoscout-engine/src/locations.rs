//! Exported map locations and the check/reconcile workflows over them
//!
//! Locations are read from a JSON array as exported from the location store.
//! Fields other than `panoId`, `lat`, `lng` and `tags` pass through untouched.

use chrono::{DateTime, Utc};
use panoscout_common::tags::{extract_month_tag, extract_year_tag, split_yymm_tag, YymmTag, ERROR_TAG, UPDATED_TAG};
use panoscout_common::{CapturedDate, Coordinate, Error, PanoId, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::retag::{reconcile_updated, Reconciliation, RetagAction};
use crate::services::{BatchResolver, CoverageVerdict, ResolveRequest};

/// One stored location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pano_id: Option<PanoId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MapLocation {
    /// Year and month tags of this location
    pub fn tagged_date(&self) -> Result<(String, String)> {
        let year = extract_year_tag(&self.tags)?;
        let month = extract_month_tag(&self.tags)?;
        match (year, month) {
            (Some(y), Some(m)) => Ok((y.to_string(), m.to_string())),
            _ => Err(Error::InvalidInput("No year/month tag found for location".to_string())),
        }
    }

    /// Request for checking this location against newer coverage
    pub fn resolve_request(&self) -> Result<ResolveRequest> {
        let pano_id = self
            .pano_id
            .clone()
            .ok_or_else(|| Error::InvalidInput("No panoId found for location".to_string()))?;
        let (year, month) = self.tagged_date()?;
        Ok(ResolveRequest { pano_id, year, month })
    }

    pub fn with_added_tag(&self, tag: &str) -> Self {
        let mut updated = self.clone();
        updated.tags.push(tag.to_string());
        updated
    }

    pub fn moved_to(&self, pano_id: &PanoId, coordinate: Coordinate) -> Self {
        let mut updated = self.clone();
        updated.pano_id = Some(pano_id.clone());
        updated.lat = Some(coordinate.lat);
        updated.lng = Some(coordinate.lng);
        updated
    }
}

/// Read a JSON array of locations
pub fn read_locations(path: &Path) -> Result<Vec<MapLocation>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Per-location result of a coverage check
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub index: usize,
    pub pano_id: Option<PanoId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub verdict: Option<CoverageVerdict>,
    pub action: RetagAction,
    pub updated_location: Option<MapLocation>,
}

/// Per-location result of reconciling an updated tag
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub index: usize,
    pub pano_id: Option<PanoId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub reconciliation: Option<Reconciliation>,
    pub updated_location: Option<MapLocation>,
}

/// Batch report written by the CLI
#[derive(Debug, Clone, Serialize)]
pub struct Report<T> {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub counts: BTreeMap<&'static str, usize>,
    pub outcomes: Vec<T>,
}

impl<T> Report<T> {
    fn new(outcomes: Vec<T>, label: impl Fn(&T) -> &'static str) -> Self {
        let mut counts = BTreeMap::new();
        for outcome in &outcomes {
            *counts.entry(label(outcome)).or_insert(0) += 1;
        }
        for (label, count) in &counts {
            info!(outcome = label, count, "Report summary");
        }
        Self {
            generated_at: Utc::now(),
            total: outcomes.len(),
            counts,
            outcomes,
        }
    }
}

/// Check every location for newer coverage
///
/// Locations without a pano id or usable year/month tags are not resolved
/// and come back as errors.
pub async fn check_locations(batch: &BatchResolver, locations: &[MapLocation]) -> Report<CheckOutcome> {
    let prepared: Vec<Result<ResolveRequest>> = locations.iter().map(MapLocation::resolve_request).collect();
    let requests: Vec<ResolveRequest> = prepared.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
    let mut verdicts = batch.resolve_all(&requests).await.into_iter();

    let outcomes = locations
        .iter()
        .zip(prepared)
        .enumerate()
        .map(|(index, (location, request))| {
            let (verdict, error) = match request {
                Ok(_) => {
                    let verdict = verdicts.next().flatten();
                    let error = verdict.is_none().then(|| "No data found for panoId".to_string());
                    (verdict, error)
                }
                Err(e) => (None, Some(e.to_string())),
            };
            let action = RetagAction::for_verdict(verdict.as_ref());
            CheckOutcome {
                index,
                pano_id: location.pano_id.clone(),
                error,
                updated_location: action.apply(location),
                verdict,
                action,
            }
        })
        .collect();

    Report::new(outcomes, |o: &CheckOutcome| o.action.label())
}

/// Request, update tag, original date and claimed date of an updated location
fn parse_updated(location: &MapLocation) -> Result<(ResolveRequest, YymmTag, CapturedDate, CapturedDate)> {
    let request = location.resolve_request()?;
    let claimed_tag = split_yymm_tag(&location.tags)
        .ok_or_else(|| Error::InvalidInput("No YY-MM found for location".to_string()))?;
    let original = CapturedDate::parse(&request.year, &request.month)?;
    let claimed = claimed_tag.date()?;
    Ok((request, claimed_tag, original, claimed))
}

/// Re-check locations tagged as updated
///
/// Only locations whose claimed update is older than their original date by
/// two months or more need a coverage search; the rest are decided from tags.
pub async fn reconcile_locations(batch: &BatchResolver, locations: &[MapLocation]) -> Report<ReconcileOutcome> {
    struct Pending {
        index: usize,
        original: CapturedDate,
        claimed: CapturedDate,
        claimed_tag: YymmTag,
    }

    let mut outcomes = Vec::new();
    let mut pending = Vec::new();
    let mut requests = Vec::new();

    let updated = locations
        .iter()
        .enumerate()
        .filter(|(_, loc)| loc.tags.iter().any(|t| t == UPDATED_TAG));

    for (index, location) in updated {
        match parse_updated(location) {
            Err(e) => outcomes.push(ReconcileOutcome {
                index,
                pano_id: location.pano_id.clone(),
                error: Some(e.to_string()),
                reconciliation: None,
                updated_location: Some(location.with_added_tag(ERROR_TAG)),
            }),
            Ok((request, claimed_tag, original, claimed)) => {
                if Reconciliation::needs_search(&original, &claimed) {
                    requests.push(request);
                    pending.push(Pending {
                        index,
                        original,
                        claimed,
                        claimed_tag,
                    });
                } else {
                    let reconciliation = reconcile_updated(original, claimed, None);
                    outcomes.push(ReconcileOutcome {
                        index,
                        pano_id: location.pano_id.clone(),
                        error: None,
                        updated_location: reconciliation.apply(location, &claimed_tag),
                        reconciliation: Some(reconciliation),
                    });
                }
            }
        }
    }

    let verdicts = batch.resolve_all(&requests).await;
    for (item, verdict) in pending.into_iter().zip(verdicts) {
        let location = &locations[item.index];
        let reconciliation = reconcile_updated(item.original, item.claimed, verdict.as_ref());
        outcomes.push(ReconcileOutcome {
            index: item.index,
            pano_id: location.pano_id.clone(),
            error: None,
            updated_location: reconciliation.apply(location, &item.claimed_tag),
            reconciliation: Some(reconciliation),
        });
    }

    outcomes.sort_by_key(|o| o.index);
    Report::new(outcomes, |o: &ReconcileOutcome| {
        o.reconciliation.as_ref().map_or("error", Reconciliation::label)
    })
}
