//! Raster reclassification
//!
//! Map continuous cell values to discrete class codes through an ordered
//! list of half-open `(low, high]` intervals.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use crate::maybe_rayon::*;
use gwpump_core::raster::Raster;
use gwpump_core::{Error, Result};

/// One interval of a classification: values in `(low, high]` become `code`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassRule {
    /// Lower bound (exclusive)
    pub low: f64,
    /// Upper bound (inclusive)
    pub high: f64,
    /// Output class code
    pub code: f64,
}

impl ClassRule {
    pub fn new(low: f64, high: f64, code: f64) -> Self {
        Self { low, high, code }
    }

    /// `low < value <= high`
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.low < value && value <= self.high
    }
}

/// Ordered set of class rules, validated on construction.
///
/// Intervals may overlap, leave gaps or cover only part of the value
/// range. Lookup walks the rules in declaration order and the first
/// interval containing the value wins.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRule {
    rules: Vec<ClassRule>,
}

impl ClassificationRule {
    /// Validate and wrap a list of rules. Every bound must be finite and
    /// `low < high`, otherwise the whole rule set is rejected.
    pub fn new(rules: Vec<ClassRule>) -> Result<Self> {
        for (index, rule) in rules.iter().enumerate() {
            let reason = if !rule.low.is_finite() || !rule.high.is_finite() {
                Some("bounds must be finite")
            } else if rule.low >= rule.high {
                Some("low must be less than high")
            } else if rule.code.is_nan() {
                Some("code must be a number")
            } else {
                None
            };

            if let Some(reason) = reason {
                return Err(Error::InvalidClassRule {
                    index,
                    low: rule.low,
                    high: rule.high,
                    code: rule.code,
                    reason,
                });
            }
        }
        Ok(Self { rules })
    }

    /// Build from `(low, high, code)` tuples, keeping their order
    pub fn from_ranges(ranges: &[(f64, f64, f64)]) -> Result<Self> {
        Self::new(
            ranges
                .iter()
                .map(|&(low, high, code)| ClassRule::new(low, high, code))
                .collect(),
        )
    }

    pub fn rules(&self) -> &[ClassRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Class code of the first interval containing `value`
    #[inline]
    pub fn classify(&self, value: f64) -> Option<f64> {
        if value.is_nan() {
            return None;
        }
        self.rules.iter().find(|r| r.contains(value)).map(|r| r.code)
    }

    /// Distinct class codes in declaration order
    pub fn codes(&self) -> Vec<f64> {
        let mut codes: Vec<f64> = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            if !codes.contains(&rule.code) {
                codes.push(rule.code);
            }
        }
        codes
    }
}

/// Reclassify raster values with an ordered rule set.
///
/// Every cell is replaced by the code of the first rule whose `(low, high]`
/// interval contains it. Cells that are NaN, equal to the input raster's
/// no-data value, or matched by no rule become `no_data_value`; the
/// no-data check runs before any interval test. The output keeps the
/// input's shape, transform and CRS, and its no-data value is set to
/// `no_data_value`.
///
/// # Example
/// ```ignore
/// let rules = ClassificationRule::from_ranges(&[
///     (0.0, 0.5, 0.0),
///     (1.0, 59.5, 1.0),     // crops
///     (120.5, 124.5, 3.0),  // developed
/// ])?;
/// let classes = reclassify(&cdl, &rules, 0.0)?;
/// ```
pub fn reclassify(
    raster: &Raster<f64>,
    rules: &ClassificationRule,
    no_data_value: f64,
) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![no_data_value; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let val = unsafe { raster.get_unchecked(row, col) };
                if val.is_nan() || raster.is_nodata(val) {
                    continue;
                }
                if let Some(code) = rules.classify(val) {
                    *out = code;
                }
            }
            row_data
        })
        .collect();

    let mut output = raster.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(no_data_value));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}
