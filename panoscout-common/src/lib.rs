//! # panoscout common library
//!
//! Shared code for the panoscout workspace including:
//! - Panorama data model (ids, coordinates, capture dates)
//! - Great-circle distance
//! - Location tag parsing
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod geo;
pub mod model;
pub mod tags;

pub use error::{Error, Result};
pub use model::{CapturedDate, Coordinate, PanoId};
