//! Raster stacks
//!
//! Read a family of same-shaped rasters (one per year, one per month, ...)
//! from a directory and reduce them cell by cell, or mask one raster by
//! the class codes of another.

use glob::Pattern;
use ndarray::Array2;
use crate::maybe_rayon::*;
use gwpump_core::io::read_geotiff;
use gwpump_core::raster::Raster;
use gwpump_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Per-cell reduction applied across the layers of a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackOp {
    #[default]
    Sum,
    Mean,
    Min,
    Max,
}

impl StackOp {
    fn reduce(self, values: &[f64]) -> f64 {
        match self {
            StackOp::Sum => values.iter().sum(),
            StackOp::Mean => values.iter().sum::<f64>() / values.len() as f64,
            StackOp::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            StackOp::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// An ordered list of named rasters sharing one shape
#[derive(Debug, Clone)]
pub struct RasterStack {
    names: Vec<String>,
    layers: Vec<Raster<f64>>,
}

impl RasterStack {
    /// Build a stack, checking every layer against the first one's shape
    pub fn new(layers: Vec<(String, Raster<f64>)>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::InvalidParameter {
                name: "layers",
                value: "0".into(),
                reason: "a stack needs at least one raster".into(),
            });
        }
        let (names, layers): (Vec<_>, Vec<_>) = layers.into_iter().unzip();
        for layer in &layers[1..] {
            layers[0].ensure_same_shape(layer)?;
        }
        Ok(Self { names, layers })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn layers(&self) -> &[Raster<f64>] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.layers[0].shape()
    }
}

/// Files directly inside `dir` whose name matches the glob `pattern`,
/// sorted by name
pub fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = Pattern::new(pattern).map_err(|e| Error::InvalidParameter {
        name: "pattern",
        value: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| matcher.matches(n))
            .unwrap_or(false);
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    debug!("{} files in {} match {:?}", files.len(), dir.display(), pattern);
    Ok(files)
}

/// Read every raster in `dir` matching `pattern` into a stack.
///
/// Layers are named after the file stem and ordered by file name.
pub fn stack_rasters<P: AsRef<Path>>(dir: P, pattern: &str) -> Result<RasterStack> {
    let dir = dir.as_ref();
    let files = matching_files(dir, pattern)?;
    if files.is_empty() {
        return Err(Error::InvalidParameter {
            name: "pattern",
            value: pattern.to_string(),
            reason: format!("no files in {}", dir.display()),
        });
    }

    let layers = files
        .iter()
        .map(|path| {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            read_geotiff::<f64, _>(path, None).map(|r| (name, r))
        })
        .collect::<Result<Vec<_>>>()?;

    info!("Stacked {} rasters matching {:?}", layers.len(), pattern);
    RasterStack::new(layers)
}

/// Reduce a stack to a single raster.
///
/// A cell that is no-data in any layer is NaN in the output. The output
/// takes its georeference from the first layer.
pub fn stack_arithmetic(stack: &RasterStack, op: StackOp) -> Result<Raster<f64>> {
    let (rows, cols) = stack.shape();
    let layers = stack.layers();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut cell = Vec::with_capacity(layers.len());
            for (col, out) in row_data.iter_mut().enumerate() {
                cell.clear();
                for layer in layers {
                    let v = unsafe { layer.get_unchecked(row, col) };
                    if layer.is_nodata(v) {
                        break;
                    }
                    cell.push(v);
                }
                if cell.len() == layers.len() {
                    *out = op.reduce(&cell);
                }
            }
            row_data
        })
        .collect();

    let mut output = layers[0].with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

/// Keep `raster` values where `mask` holds one of `keep_values`.
///
/// All other cells, and cells where either input is no-data, become NaN.
pub fn apply_raster_filter(
    mask: &Raster<f64>,
    raster: &Raster<f64>,
    keep_values: &[f64],
) -> Result<Raster<f64>> {
    raster.ensure_same_shape(mask)?;
    let (rows, cols) = raster.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let m = unsafe { mask.get_unchecked(row, col) };
                let v = unsafe { raster.get_unchecked(row, col) };
                if mask.is_nodata(m) || raster.is_nodata(v) {
                    continue;
                }
                if keep_values.contains(&m) {
                    *out = v;
                }
            }
            row_data
        })
        .collect();

    let mut output = raster.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}
