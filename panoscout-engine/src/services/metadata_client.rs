//! Imagery metadata RPC client
//!
//! Looks up one panorama through the provider's internal metadata endpoint.
//! The endpoint needs a "panorama type" code next to the id and silently
//! returns an empty or garbage payload (with a success status) when the code
//! is wrong, so [`MetadataFetcher`] tries every known code until a response
//! parses. There are no other retries.

use async_trait::async_trait;
use panoscout_common::config::ProviderConfig;
use panoscout_common::PanoId;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};

use super::core_extractor::{ExtractError, PanoMetadata};

/// Metadata client errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP client setup failed: {0}")]
    ClientBuild(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unusable response for {pano_id} as panorama type {pano_type}: {source}")]
    Unparseable {
        pano_id: PanoId,
        pano_type: u8,
        #[source]
        source: ExtractError,
    },

    #[error("No usable metadata for {pano_id} after trying all panorama types (last error: {last_error})")]
    Exhausted { pano_id: PanoId, last_error: String },

    #[error("Fetch permit pool closed")]
    PermitsClosed,
}

/// Panorama type discriminant sent with the id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanoType {
    /// Provider-captured imagery
    Official,
    /// User-contributed photospheres
    UserContributed,
}

impl PanoType {
    pub fn code(self) -> u8 {
        match self {
            PanoType::Official => 2,
            PanoType::UserContributed => 10,
        }
    }

    /// Codes to try, best guess first
    ///
    /// User-contributed ids usually start with `CIHM`; the guess is only a
    /// starting point since the prefix is not authoritative.
    pub fn attempt_order(pano_id: &PanoId) -> [PanoType; 2] {
        if pano_id.as_str().starts_with("CIHM") {
            [PanoType::UserContributed, PanoType::Official]
        } else {
            [PanoType::Official, PanoType::UserContributed]
        }
    }
}

/// One metadata request for one `(pano_id, pano_type)`
#[async_trait]
pub trait MetadataTransport: Send + Sync {
    async fn get_metadata(&self, pano_id: &PanoId, pano_type: PanoType) -> Result<Value, FetchError>;
}

/// Request body: `[clientInfo, locale, [[[type, id]]], [fields]]`
pub fn request_payload(region: &str, language: &str, pano_id: &PanoId, pano_type: PanoType) -> Value {
    json!([
        ["apiv3", null, null, null, region, null, null, null, null, null, [[0]]],
        [language, region],
        [[[pano_type.code(), pano_id.as_str()]]],
        [[1, 2, 3, 4, 8, 6]]
    ])
}

/// Production transport over HTTPS
pub struct HttpTransport {
    http_client: reqwest::Client,
    endpoint: String,
    region: String,
    language: String,
}

impl HttpTransport {
    /// Build a transport with the given per-request timeout
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&config.content_type).map_err(|e| FetchError::ClientBuild(e.to_string()))?,
        );
        headers.insert(
            "x-user-agent",
            HeaderValue::from_str(&config.x_user_agent).map_err(|e| FetchError::ClientBuild(e.to_string()))?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            region: config.region.clone(),
            language: config.language.clone(),
        })
    }
}

#[async_trait]
impl MetadataTransport for HttpTransport {
    async fn get_metadata(&self, pano_id: &PanoId, pano_type: PanoType) -> Result<Value, FetchError> {
        let payload = request_payload(&self.region, &self.language, pano_id, pano_type);

        tracing::debug!(pano_id = %pano_id, pano_type = pano_type.code(), "Querying metadata endpoint");

        let response = self
            .http_client
            .post(&self.endpoint)
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::ApiError(status.as_u16(), error_text));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::ParseError(e.to_string()))
    }
}

/// Global pool of in-flight request permits
///
/// Shared by every fetch in the process, including fetches nested inside a
/// resolution, so total network concurrency is bounded no matter how work nests.
#[derive(Debug, Clone)]
pub struct FetchPermits {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl FetchPermits {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a slot; the slot frees when the permit drops
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, FetchError> {
        self.semaphore.acquire().await.map_err(|_| FetchError::PermitsClosed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Fetches and parses panorama metadata with panorama-type fallback
#[derive(Clone)]
pub struct MetadataFetcher {
    transport: Arc<dyn MetadataTransport>,
    permits: FetchPermits,
}

impl MetadataFetcher {
    pub fn new(transport: Arc<dyn MetadataTransport>, permits: FetchPermits) -> Self {
        Self { transport, permits }
    }

    pub fn permits(&self) -> &FetchPermits {
        &self.permits
    }

    /// Fetch and parse metadata for `pano_id`
    ///
    /// Each attempt holds one permit for the duration of its request only.
    /// Fails only after every panorama type was tried.
    pub async fn fetch(&self, pano_id: &PanoId) -> Result<PanoMetadata, FetchError> {
        let mut last_error = None;

        for pano_type in PanoType::attempt_order(pano_id) {
            let response = {
                let _permit = self.permits.acquire().await?;
                self.transport.get_metadata(pano_id, pano_type).await
            };

            let error = match response {
                Ok(raw) => match PanoMetadata::from_response(raw) {
                    Ok(metadata) => {
                        tracing::debug!(pano_id = %pano_id, pano_type = pano_type.code(), "Metadata parsed");
                        return Ok(metadata);
                    }
                    Err(source) => FetchError::Unparseable {
                        pano_id: pano_id.clone(),
                        pano_type: pano_type.code(),
                        source,
                    },
                },
                Err(e) => e,
            };

            tracing::debug!(
                pano_id = %pano_id,
                pano_type = pano_type.code(),
                error = %error,
                "Metadata attempt failed, trying next panorama type"
            );
            last_error = Some(error);
        }

        Err(FetchError::Exhausted {
            pano_id: pano_id.clone(),
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}
