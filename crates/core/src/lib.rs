//! # gwpump Core
//!
//! Core types and I/O for the gwpump raster preprocessing toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type
//! - `GeoTransform` and `Bounds`: Affine georeferencing and extents
//! - `CRS`: Coordinate Reference System handling
//! - Point features loaded from delimited tables
//! - Native GeoTIFF reading and writing

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{Bounds, GeoTransform, Raster, RasterElement};

/// Default no-data sentinel for rasters produced by the gridding tools
pub const NO_DATA_VALUE: f64 = -32767.0;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{Bounds, GeoTransform, Raster, RasterElement};
    pub use crate::NO_DATA_VALUE;
}
