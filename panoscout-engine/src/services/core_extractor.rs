//! Metadata response extraction
//!
//! The provider answers with an undocumented, deeply nested JSON array. The
//! positional contract below was reverse-engineered and is best-effort; the
//! provider may change it without notice. With `msg = response[1][0]`:
//!
//! | Position                 | Meaning                                      |
//! |--------------------------|----------------------------------------------|
//! | `msg[1][1]`              | pano id of the response (optional)           |
//! | `msg[5][0]`              | core node                                    |
//! | `core[1][0][2]`, `[3]`   | latitude, longitude                          |
//! | `core[3][0]`             | node table, entry `i` holds its id at `[0][1]` |
//! | `core[6]`                | spatial links `[node_index, ...]` (optional) |
//! | `core[8]`                | history links `[node_index, [year, month]]` (optional) |
//! | `msg[6][7]`              | capture date `[year, month]` (optional)      |
//!
//! Each level is validated once here; any mismatch is a single
//! [`ExtractError::Unparseable`] naming the failing path.

use panoscout_common::{CapturedDate, Coordinate, PanoId};
use serde_json::Value;
use thiserror::Error;

use super::date_heuristic;

/// Upstream response did not match the positional contract
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    #[error("Unparseable upstream response at {path}: {reason}")]
    Unparseable { path: String, reason: &'static str },
}

/// Index into a response's node table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(pub usize);

/// Same tripod location captured at another time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLink {
    pub node: NodeRef,
    pub date: CapturedDate,
}

/// Walkably adjacent location; its date needs a follow-up fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialLink {
    pub node: NodeRef,
}

/// Node table of one response
///
/// Entries whose id could not be read are kept as `None` so indices stay aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTable(Vec<Option<PanoId>>);

impl NodeTable {
    /// Bounds-checked lookup
    pub fn resolve(&self, node: NodeRef) -> Option<&PanoId> {
        self.0.get(node.0)?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Core node of a metadata response
#[derive(Debug, Clone, PartialEq)]
pub struct CoreRecord {
    pub coordinate: Coordinate,
    pub nodes: NodeTable,
    pub history_links: Vec<HistoryLink>,
    pub spatial_links: Vec<SpatialLink>,
}

impl CoreRecord {
    pub fn resolve(&self, node: NodeRef) -> Option<&PanoId> {
        self.nodes.resolve(node)
    }
}

/// One parsed metadata response
#[derive(Debug, Clone)]
pub struct PanoMetadata {
    /// Id reported by the response itself
    pub pano_id: Option<PanoId>,
    pub core: CoreRecord,
    /// Capture date from its structured field, if present
    pub structured_date: Option<CapturedDate>,
    raw: Value,
}

impl PanoMetadata {
    pub fn from_response(raw: Value) -> Result<Self, ExtractError> {
        let msg = message(&raw)?;
        let core = CoreRecord::parse(&msg.at(5)?.at(0)?)?;
        let pano_id = msg
            .optional(1)
            .and_then(|f| f.optional(1))
            .and_then(|f| f.value.as_str())
            .map(PanoId::from);
        let structured_date = msg
            .optional(6)
            .and_then(|f| f.optional(7))
            .and_then(|f| date_pair(&f).ok());

        Ok(Self {
            pano_id,
            core,
            structured_date,
            raw,
        })
    }

    /// Capture date: the structured field, else the heuristic search over the
    /// whole response
    pub fn capture_date(&self) -> Option<CapturedDate> {
        if self.structured_date.is_some() {
            return self.structured_date;
        }
        let found = date_heuristic::find_date(&self.raw);
        tracing::debug!(
            pano_id = ?self.pano_id,
            date = ?found,
            "Structured capture date missing, used heuristic search"
        );
        found
    }
}

/// Extract only the core record from a raw response
pub fn extract_core(response: &Value) -> Result<CoreRecord, ExtractError> {
    let msg = message(response)?;
    CoreRecord::parse(&msg.at(5)?.at(0)?)
}

/// Validate the envelope down to `response[1][0]`
fn message(response: &Value) -> Result<Field<'_>, ExtractError> {
    let root = Field::root(response);
    if root.items()?.len() < 2 {
        return root.fail("expected at least 2 elements");
    }
    let level1 = root.at(1)?;
    if level1.items()?.is_empty() {
        return level1.fail("empty");
    }
    let msg = level1.at(0)?;
    if msg.items()?.len() <= 5 {
        return msg.fail("expected more than 5 fields");
    }
    let level3 = msg.at(5)?;
    if level3.items()?.is_empty() {
        return level3.fail("empty");
    }
    Ok(msg)
}

impl CoreRecord {
    fn parse(core: &Field<'_>) -> Result<Self, ExtractError> {
        let position = core.at(1)?.at(0)?;
        let lat_field = position.at(2)?;
        let lng_field = position.at(3)?;
        let (lat, lng) = (lat_field.number()?, lng_field.number()?);
        if !(-90.0..=90.0).contains(&lat) {
            return lat_field.fail("latitude out of range");
        }
        if !(-180.0..=180.0).contains(&lng) {
            return lng_field.fail("longitude out of range");
        }

        let nodes = core
            .at(3)?
            .at(0)?
            .items()?
            .iter()
            .map(|entry| {
                entry
                    .get(0)
                    .and_then(|e| e.get(1))
                    .and_then(Value::as_str)
                    .map(PanoId::from)
            })
            .collect();

        let spatial_links = match core.optional(6) {
            Some(links) => links
                .children()?
                .map(|link| -> Result<SpatialLink, ExtractError> {
                    Ok(SpatialLink { node: link.at(0)?.node_ref()? })
                })
                .collect::<Result<Vec<_>, ExtractError>>()?,
            None => Vec::new(),
        };

        let history_links = match core.optional(8) {
            Some(links) => links
                .children()?
                .map(|link| -> Result<HistoryLink, ExtractError> {
                    Ok(HistoryLink {
                        node: link.at(0)?.node_ref()?,
                        date: date_pair(&link.at(1)?)?,
                    })
                })
                .collect::<Result<Vec<_>, ExtractError>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            coordinate: Coordinate::new(lat, lng),
            nodes: NodeTable(nodes),
            history_links,
            spatial_links,
        })
    }
}

fn date_pair(field: &Field<'_>) -> Result<CapturedDate, ExtractError> {
    let year = field.at(0)?.value.as_i64();
    let month = field.at(1)?.value.as_i64();
    match (year, month) {
        (Some(y), Some(m)) => i32::try_from(y)
            .ok()
            .zip(u32::try_from(m).ok())
            .and_then(|(y, m)| CapturedDate::new(y, m))
            .map_or_else(|| field.fail("date out of range"), Ok),
        _ => field.fail("expected [year, month] integers"),
    }
}

/// Guarded positional access that remembers where it is
#[derive(Debug, Clone)]
struct Field<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Field<'a> {
    fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: "response".to_string(),
        }
    }

    fn child(&self, index: usize, value: &'a Value) -> Field<'a> {
        Field {
            value,
            path: format!("{}[{}]", self.path, index),
        }
    }

    fn fail<T>(&self, reason: &'static str) -> Result<T, ExtractError> {
        Err(ExtractError::Unparseable {
            path: self.path.clone(),
            reason,
        })
    }

    fn items(&self) -> Result<&'a [Value], ExtractError> {
        match self.value.as_array() {
            Some(items) => Ok(items.as_slice()),
            None => self.fail("expected array"),
        }
    }

    fn children(&self) -> Result<impl Iterator<Item = Field<'a>> + '_, ExtractError> {
        Ok(self
            .items()?
            .iter()
            .enumerate()
            .map(move |(i, v)| self.child(i, v)))
    }

    fn at(&self, index: usize) -> Result<Field<'a>, ExtractError> {
        match self.items()?.get(index) {
            Some(value) => Ok(self.child(index, value)),
            None => Err(ExtractError::Unparseable {
                path: format!("{}[{}]", self.path, index),
                reason: "missing",
            }),
        }
    }

    /// Present and non-null, otherwise `None`
    fn optional(&self, index: usize) -> Option<Field<'a>> {
        self.value
            .as_array()?
            .get(index)
            .filter(|v| !v.is_null())
            .map(|v| self.child(index, v))
    }

    fn number(&self) -> Result<f64, ExtractError> {
        match self.value.as_f64() {
            Some(n) if n.is_finite() => Ok(n),
            _ => self.fail("expected number"),
        }
    }

    fn node_ref(&self) -> Result<NodeRef, ExtractError> {
        match self.value.as_u64().and_then(|n| usize::try_from(n).ok()) {
            Some(n) => Ok(NodeRef(n)),
            None => self.fail("expected non-negative node index"),
        }
    }
}
