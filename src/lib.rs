//! Collection, aggregation and melting core for climate-data subsetting.
//!
//! The implementation lives in [`ocgis_core`]; this crate re-exports it so
//! downstream tools depend on a single name.

pub use ocgis_core::*;
