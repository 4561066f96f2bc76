//! Newest-coverage resolution for one panorama
//!
//! Starting from a panorama and the capture date the caller believes it has,
//! finds the newest panorama at the same tripod location (history links) or
//! within a radius of it (spatial links), and judges whether the difference is
//! significant.

use panoscout_common::config::ResolverConfig;
use panoscout_common::geo::haversine_meters;
use panoscout_common::{CapturedDate, Coordinate, PanoId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::core_extractor::CoreRecord;
use super::metadata_client::{FetchError, MetadataFetcher};

/// Resolution errors; callers treat any of them as "needs manual review"
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid reference date: {0}")]
    InvalidReferenceDate(#[from] panoscout_common::Error),

    #[error("Invalid search radius: {0} (must be a finite, non-negative number of meters)")]
    InvalidRadius(f64),

    #[error("Base panorama {pano_id} unavailable: {source}")]
    BaseUnavailable {
        pano_id: PanoId,
        #[source]
        source: FetchError,
    },
}

/// Result of one resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageVerdict {
    /// Newest panorama found (the input pano when nothing newer exists)
    pub pano_id: PanoId,
    pub date: CapturedDate,
    pub coordinate: Coordinate,
    pub has_newer_coverage: bool,
    /// Only meaningful when `has_newer_coverage`; a one-month gap is usually a
    /// mislabeled re-upload and goes to manual review
    pub is_only_one_month_newer: bool,
}

/// Best coverage seen so far; its date never decreases
#[derive(Debug, Clone)]
struct CoverageCandidate {
    pano_id: PanoId,
    date: CapturedDate,
    coordinate: Coordinate,
}

impl CoverageCandidate {
    /// Take the offer only when it is strictly newer
    fn offer(&mut self, pano_id: &PanoId, date: CapturedDate, coordinate: Coordinate) -> bool {
        if date <= self.date {
            return false;
        }
        self.pano_id = pano_id.clone();
        self.date = date;
        self.coordinate = coordinate;
        true
    }

    fn into_verdict(self, reference: &CapturedDate) -> CoverageVerdict {
        let month_diff = self.date.months_since(reference);
        CoverageVerdict {
            pano_id: self.pano_id,
            date: self.date,
            coordinate: self.coordinate,
            has_newer_coverage: month_diff > 0,
            is_only_one_month_newer: month_diff == 1,
        }
    }
}

/// Resolves the newest coverage around a panorama
#[derive(Clone)]
pub struct CoverageResolver {
    fetcher: MetadataFetcher,
    config: ResolverConfig,
}

impl CoverageResolver {
    pub fn new(fetcher: MetadataFetcher, config: ResolverConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn fetcher(&self) -> &MetadataFetcher {
        &self.fetcher
    }

    /// Resolve with the configured radius
    pub async fn resolve(
        &self,
        pano_id: &PanoId,
        expected_year: &str,
        expected_month: &str,
    ) -> Result<CoverageVerdict, ResolveError> {
        self.resolve_within(pano_id, expected_year, expected_month, self.config.radius_meters)
            .await
    }

    /// Resolve newest coverage within `radius_meters` of `pano_id`
    ///
    /// Failure to fetch the base panorama aborts; failure on a spatial
    /// neighbor only skips that neighbor. A NaN, infinite or negative radius
    /// is rejected before any fetch.
    pub async fn resolve_within(
        &self,
        pano_id: &PanoId,
        expected_year: &str,
        expected_month: &str,
        radius_meters: f64,
    ) -> Result<CoverageVerdict, ResolveError> {
        let reference = CapturedDate::parse(expected_year, expected_month)?;
        if !radius_meters.is_finite() || radius_meters < 0.0 {
            return Err(ResolveError::InvalidRadius(radius_meters));
        }

        let base = self
            .fetcher
            .fetch(pano_id)
            .await
            .map_err(|source| ResolveError::BaseUnavailable {
                pano_id: pano_id.clone(),
                source,
            })?;
        let core = &base.core;

        let mut candidate = CoverageCandidate {
            pano_id: pano_id.clone(),
            date: reference,
            coordinate: core.coordinate,
        };

        self.scan_history(core, &mut candidate);

        let month_diff = candidate.date.months_since(&reference);
        if month_diff <= self.config.spatial_probe_max_month_diff {
            self.probe_spatial(core, radius_meters, &mut candidate).await;
        } else {
            debug!(
                pano_id = %pano_id,
                month_diff,
                "History already newer than probe threshold, skipping spatial links"
            );
        }

        let verdict = candidate.into_verdict(&reference);
        debug!(
            pano_id = %pano_id,
            reference = %reference,
            newest = %verdict.pano_id,
            date = %verdict.date,
            has_newer = verdict.has_newer_coverage,
            "Coverage resolved"
        );
        Ok(verdict)
    }

    /// History links share the base tripod, so the base coordinate is kept
    fn scan_history(&self, core: &CoreRecord, candidate: &mut CoverageCandidate) {
        for link in &core.history_links {
            let Some(history_id) = core.resolve(link.node) else {
                debug!(node = link.node.0, "History link points outside node table, skipped");
                continue;
            };
            candidate.offer(history_id, link.date, core.coordinate);
        }
    }

    async fn probe_spatial(&self, core: &CoreRecord, radius_meters: f64, candidate: &mut CoverageCandidate) {
        for link in &core.spatial_links {
            let Some(spatial_id) = core.resolve(link.node) else {
                debug!(node = link.node.0, "Spatial link points outside node table, skipped");
                continue;
            };

            let neighbor = match self.fetcher.fetch(spatial_id).await {
                Ok(neighbor) => neighbor,
                Err(e) => {
                    debug!(pano_id = %spatial_id, error = %e, "Spatial neighbor unavailable, skipped");
                    continue;
                }
            };

            let coordinate = neighbor.core.coordinate;
            let distance = haversine_meters(core.coordinate, coordinate);
            if distance > radius_meters {
                debug!(pano_id = %spatial_id, distance, "Spatial neighbor outside radius, skipped");
                continue;
            }

            let Some(date) = neighbor.capture_date() else {
                debug!(pano_id = %spatial_id, "Spatial neighbor has no capture date, skipped");
                continue;
            };

            candidate.offer(spatial_id, date, coordinate);
        }
    }
}
