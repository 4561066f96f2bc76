//! Coverage resolution services
//!
//! Data flows downward:
//! `batch_resolver` → `coverage_resolver` → `metadata_client` → `core_extractor`
//! (with `date_heuristic` as the date fallback).

pub mod batch_resolver;
pub mod core_extractor;
pub mod coverage_resolver;
pub mod date_heuristic;
pub mod metadata_client;
pub mod pano_graph;

pub use batch_resolver::{BatchProgress, BatchResolver, ResolveRequest};
pub use core_extractor::{extract_core, CoreRecord, ExtractError, HistoryLink, NodeRef, NodeTable, PanoMetadata, SpatialLink};
pub use coverage_resolver::{CoverageResolver, CoverageVerdict, ResolveError};
pub use metadata_client::{FetchError, FetchPermits, HttpTransport, MetadataFetcher, MetadataTransport, PanoType};
