//! # gwpump Algorithms
//!
//! Processing steps of the groundwater-pumping preprocessing pipeline.
//!
//! - **imagery**: interval reclassification, CDL presets, raster stacks and filters
//! - **tabular**: per-variable raster tables and regression scoring
//! - **gdal_tools**: GDAL/OGR command construction and execution

pub mod gdal_tools;
pub mod imagery;
pub mod tabular;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::gdal_tools::{GdalTools, ProcessRunner, ToolCommand, ToolRunner};
    pub use crate::imagery::{
        apply_raster_filter, reclassify, stack_arithmetic, stack_rasters, ClassRule,
        ClassificationRule, RasterStack, StackOp,
    };
    pub use crate::tabular::{create_table, Table, TableBuilder, TableOptions};
    pub use gwpump_core::prelude::*;
}
