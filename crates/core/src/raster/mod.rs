//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;

pub use element::RasterElement;
pub use geotransform::{Bounds, GeoTransform};
pub use grid::{Raster, RasterStatistics};
