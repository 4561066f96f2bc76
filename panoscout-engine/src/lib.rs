//! panoscout-engine library interface
//!
//! Determines whether newer street-level coverage exists at or near a
//! panorama with a known capture date, for whole batches of locations.

pub mod locations;
pub mod retag;
pub mod services;

pub use crate::services::{
    BatchResolver, CoverageResolver, CoverageVerdict, FetchError, FetchPermits, HttpTransport, MetadataFetcher,
    MetadataTransport, ResolveError, ResolveRequest,
};

use panoscout_common::config::TomlConfig;
use std::sync::Arc;
use std::time::Duration;

/// Build a fetcher over HTTPS with its own permit pool
pub fn build_fetcher(config: &TomlConfig, request_timeout: Duration) -> Result<MetadataFetcher, FetchError> {
    let transport = HttpTransport::new(&config.provider, request_timeout)?;
    let permits = FetchPermits::new(config.batch.max_concurrent_fetches);
    Ok(MetadataFetcher::new(Arc::new(transport), permits))
}

/// Build the batch resolver stack using the batch request timeout
pub fn build_batch_resolver(config: &TomlConfig) -> Result<BatchResolver, FetchError> {
    let fetcher = build_fetcher(config, config.provider.batch_request_timeout())?;
    let resolver = CoverageResolver::new(fetcher, config.resolver.clone());
    Ok(BatchResolver::new(resolver, config.batch.clone()))
}
