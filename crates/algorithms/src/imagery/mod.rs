//! Cell-wise raster algorithms
//!
//! - Reclassify: ordered `(low, high]` interval mapping to class codes
//! - Presets: Cropland Data Layer tables for the study basins
//! - Stack: multi-raster reductions and class-mask filtering

pub mod presets;
mod reclassify;
mod stack;

pub use reclassify::{reclassify, ClassRule, ClassificationRule};
pub use stack::{
    apply_raster_filter, matching_files, stack_arithmetic, stack_rasters, RasterStack, StackOp,
};
