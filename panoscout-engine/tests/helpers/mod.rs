//! Shared test helpers: provider-shaped fixtures and a call-counting transport

#![allow(dead_code)]

use async_trait::async_trait;
use panoscout_common::config::{BatchConfig, ResolverConfig};
use panoscout_common::PanoId;
use panoscout_engine::services::PanoType;
use panoscout_engine::{BatchResolver, CoverageResolver, FetchError, FetchPermits, MetadataFetcher, MetadataTransport};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Base coordinate used across tests (Paris)
pub const BASE_LAT: f64 = 48.8566;
pub const BASE_LNG: f64 = 2.3522;
/// ~11 m of latitude
pub const NEAR: f64 = 0.0001;
/// ~111 m of latitude
pub const FAR: f64 = 0.001;

/// One panorama as the provider would describe it
#[derive(Debug, Clone)]
pub struct PanoFixture {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub date: Option<(i32, u32)>,
    pub hidden_date: Option<(i32, u32)>,
    nodes: Vec<String>,
    spatial: Vec<usize>,
    history: Vec<(usize, (i32, u32))>,
}

impl PanoFixture {
    pub fn new(id: &str, lat: f64, lng: f64) -> Self {
        Self {
            id: id.to_string(),
            lat,
            lng,
            date: None,
            hidden_date: None,
            nodes: vec![id.to_string()],
            spatial: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Structured capture date
    pub fn dated(mut self, year: i32, month: u32) -> Self {
        self.date = Some((year, month));
        self
    }

    /// Date reachable only by the heuristic search
    pub fn hidden_date(mut self, year: i32, month: u32) -> Self {
        self.hidden_date = Some((year, month));
        self
    }

    pub fn history(mut self, id: &str, year: i32, month: u32) -> Self {
        self.nodes.push(id.to_string());
        self.history.push((self.nodes.len() - 1, (year, month)));
        self
    }

    pub fn spatial(mut self, id: &str) -> Self {
        self.nodes.push(id.to_string());
        self.spatial.push(self.nodes.len() - 1);
        self
    }

    /// Spatial link whose node index is outside the node table
    pub fn dangling_spatial(mut self, index: usize) -> Self {
        self.spatial.push(index);
        self
    }

    pub fn to_response(&self) -> Value {
        let nodes: Vec<Value> = self.nodes.iter().map(|id| json!([[2, id]])).collect();
        let spatial: Vec<Value> = self.spatial.iter().map(|i| json!([i, null, 90.5])).collect();
        let history: Vec<Value> = self.history.iter().map(|(i, (y, m))| json!([i, [y, m]])).collect();
        let core = json!([
            null,
            [[null, null, self.lat, self.lng]],
            null,
            [nodes],
            null,
            null,
            spatial,
            null,
            history
        ]);
        let date = self.date.map_or(Value::Null, |(y, m)| json!([y, m]));

        let mut root = json!([
            [1],
            [[null, [2, self.id], null, null, null, [core], [null, null, null, null, null, null, null, date]]]
        ]);
        if let Some((y, m)) = self.hidden_date {
            if let Some(items) = root.as_array_mut() {
                items.push(json!([[null, [y, m]]]));
            }
        }
        root
    }
}

/// In-memory transport serving fixtures and recording every call
#[derive(Default)]
pub struct StubTransport {
    responses: HashMap<String, Value>,
    pano_types: HashMap<String, u8>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    calls: Mutex<Vec<(String, u8)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pano(mut self, fixture: PanoFixture) -> Self {
        self.responses.insert(fixture.id.clone(), fixture.to_response());
        self
    }

    pub fn with_raw(mut self, id: &str, response: Value) -> Self {
        self.responses.insert(id.to_string(), response);
        self
    }

    /// Serve `id` only for this panorama type code; other codes get garbage
    pub fn with_pano_type(mut self, id: &str, code: u8) -> Self {
        self.pano_types.insert(id.to_string(), code);
        self
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn panicking(mut self, id: &str) -> Self {
        self.panicking.insert(id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_delay_for(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, u8)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, id: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(c, _)| c == id).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataTransport for StubTransport {
    async fn get_metadata(&self, pano_id: &PanoId, pano_type: PanoType) -> Result<Value, FetchError> {
        let id = pano_id.as_str();
        if self.panicking.contains(id) {
            panic!("stub transport asked to panic for {}", id);
        }
        self.calls.lock().unwrap().push((id.to_string(), pano_type.code()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.delays.get(id).copied().unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(id) {
            return Err(FetchError::NetworkError(format!("connection reset for {}", id)));
        }

        let expected_type = self
            .pano_types
            .get(id)
            .copied()
            .unwrap_or_else(|| PanoType::attempt_order(pano_id)[0].code());

        match self.responses.get(id) {
            Some(response) if pano_type.code() == expected_type => Ok(response.clone()),
            // Wrong type code: success status with an empty payload
            Some(_) => Ok(json!([[0], []])),
            None => Ok(json!([[5, "not found"]])),
        }
    }
}

pub fn fetcher(stub: &Arc<StubTransport>, max_concurrent_fetches: usize) -> MetadataFetcher {
    let transport: Arc<dyn MetadataTransport> = stub.clone();
    MetadataFetcher::new(transport, FetchPermits::new(max_concurrent_fetches))
}

pub fn resolver(stub: &Arc<StubTransport>) -> CoverageResolver {
    CoverageResolver::new(fetcher(stub, 4), ResolverConfig::default())
}

pub fn batch(stub: &Arc<StubTransport>, config: BatchConfig) -> BatchResolver {
    let resolver = CoverageResolver::new(fetcher(stub, config.max_concurrent_fetches), ResolverConfig::default());
    BatchResolver::new(resolver, config)
}
