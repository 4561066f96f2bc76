//! Single-fetch views of a panorama's neighborhood

use panoscout_common::{CapturedDate, Coordinate, PanoId};
use serde::Serialize;

use super::metadata_client::{FetchError, MetadataFetcher};

/// A panorama with a known capture date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatedPano {
    pub pano_id: PanoId,
    pub date: CapturedDate,
    pub coordinate: Coordinate,
}

/// The panorama itself, as reported by its own response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentPano {
    pub pano_id: PanoId,
    pub date: Option<CapturedDate>,
    pub coordinate: Coordinate,
}

/// Links of one panorama
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjacentPanos {
    pub current: CurrentPano,
    /// Walkable neighbors; their dates need one fetch each
    pub spatial: Vec<PanoId>,
    /// Same location, other capture dates
    pub history: Vec<DatedPano>,
}

/// Current, spatial and history links of `pano_id`
pub async fn adjacent_panos(fetcher: &MetadataFetcher, pano_id: &PanoId) -> Result<AdjacentPanos, FetchError> {
    let metadata = fetcher.fetch(pano_id).await?;
    let core = &metadata.core;

    let current = CurrentPano {
        pano_id: metadata.pano_id.clone().unwrap_or_else(|| pano_id.clone()),
        date: metadata.capture_date(),
        coordinate: core.coordinate,
    };

    let spatial = core
        .spatial_links
        .iter()
        .filter_map(|link| core.resolve(link.node).cloned())
        .collect();

    let history = core
        .history_links
        .iter()
        .filter_map(|link| {
            Some(DatedPano {
                pano_id: core.resolve(link.node)?.clone(),
                date: link.date,
                coordinate: core.coordinate,
            })
        })
        .collect();

    Ok(AdjacentPanos {
        current,
        spatial,
        history,
    })
}

/// Every capture at the tripod location of `pano_id`, oldest first
///
/// The current pano is included only when its date is known. Duplicate ids
/// (the current pano often reappears in its own history) keep the last entry.
pub async fn all_panos(fetcher: &MetadataFetcher, pano_id: &PanoId) -> Result<Vec<DatedPano>, FetchError> {
    let adjacent = adjacent_panos(fetcher, pano_id).await?;

    let current = adjacent.current.date.map(|date| DatedPano {
        pano_id: adjacent.current.pano_id.clone(),
        date,
        coordinate: adjacent.current.coordinate,
    });

    let mut panos: Vec<DatedPano> = Vec::new();
    for pano in current.into_iter().chain(adjacent.history) {
        match panos.iter_mut().find(|p| p.pano_id == pano.pano_id) {
            Some(existing) => *existing = pano,
            None => panos.push(pano),
        }
    }

    panos.sort_by_key(|p| p.date);
    Ok(panos)
}

/// Capture date of `pano_id`, if the response exposes one
pub async fn pano_date(fetcher: &MetadataFetcher, pano_id: &PanoId) -> Result<Option<CapturedDate>, FetchError> {
    Ok(fetcher.fetch(pano_id).await?.capture_date())
}

/// Coordinate of `pano_id`
pub async fn pano_coordinate(fetcher: &MetadataFetcher, pano_id: &PanoId) -> Result<Coordinate, FetchError> {
    Ok(fetcher.fetch(pano_id).await?.core.coordinate)
}
