//! Error types for gwpump

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for gwpump operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid class rule #{index}: ({low}, {high}] -> {code} ({reason})")]
    InvalidClassRule {
        index: usize,
        low: f64,
        high: f64,
        code: f64,
        reason: &'static str,
    },

    #[error("Cannot parse file name {path:?}: {reason}")]
    FileName { path: PathBuf, reason: String },

    #[error("External tool {program} failed: {reason}")]
    ToolFailed { program: String, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for gwpump operations
pub type Result<T> = std::result::Result<T, Error>;
