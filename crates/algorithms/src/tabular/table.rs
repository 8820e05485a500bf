use crate::imagery::matching_files;
use csv::Writer;
use gwpump_core::io::read_geotiff;
use gwpump_core::{Error, Raster, Result};
use ndarray::Array2;
use std::path::Path;
use tracing::{debug, info};

/// Converts acre-feet per square mile to millimetres of water depth
/// (1233.48 m³ per acre-foot over 2.59e6 m² per square mile)
pub const ACRE_FEET_PER_SQ_MILE_TO_MM: f64 = 1233.48 * 1000.0 / 2.59e6;

/// Split `<Variable>_<Year>.<ext>` on the last underscore
pub fn parse_variable_year(path: &Path) -> Result<(String, i32)> {
    let bad = |reason: &str| Error::FileName {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| bad("not valid UTF-8"))?;
    let (variable, year) = stem
        .rsplit_once('_')
        .ok_or_else(|| bad("expected <Variable>_<Year>"))?;
    if variable.is_empty() {
        return Err(bad("empty variable name"));
    }
    let year = year.parse().map_err(|_| bad("year is not an integer"))?;
    Ok((variable.to_string(), year))
}

/// Append-only accumulator of named columns.
///
/// Columns keep the order in which their variable was first pushed.
#[derive(Debug, Default)]
pub struct TableBuilder {
    columns: Vec<(String, Vec<f64>)>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append values to the column `variable`, creating it if needed
    pub fn push_values(&mut self, variable: &str, values: impl IntoIterator<Item = f64>) {
        match self.columns.iter_mut().find(|(name, _)| name == variable) {
            Some((_, column)) => column.extend(values),
            None => self.columns.push((variable.to_string(), values.into_iter().collect())),
        }
    }

    /// Append a raster flattened row-major, no-data as NaN
    pub fn push_raster(&mut self, variable: &str, raster: &Raster<f64>) {
        self.push_values(variable, raster.to_f64_vec_masked());
    }

    /// Freeze into a table; every column must have the same length
    pub fn finish(self) -> Result<Table> {
        if let Some((first, rest)) = self.columns.split_first() {
            for (name, column) in rest {
                if column.len() != first.1.len() {
                    return Err(Error::InvalidParameter {
                        name: "column",
                        value: name.clone(),
                        reason: format!(
                            "{} values, but {:?} has {}",
                            column.len(),
                            first.0,
                            first.1.len()
                        ),
                    });
                }
            }
        }
        let (names, columns) = self.columns.into_iter().unzip();
        Ok(Table { names, columns })
    }
}

/// Immutable column-oriented table of `f64` values
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl Table {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    /// `(name, values)` pairs in column order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.names
            .iter()
            .zip(&self.columns)
            .map(|(n, c)| (n.as_str(), c.as_slice()))
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Drop every row holding a NaN in any column
    pub fn drop_nan_rows(self) -> Table {
        let keep: Vec<usize> = (0..self.n_rows())
            .filter(|&row| self.columns.iter().all(|c| !c[row].is_nan()))
            .collect();
        let columns = self
            .columns
            .into_iter()
            .map(|c| keep.iter().map(|&row| c[row]).collect())
            .collect();
        Table {
            names: self.names,
            columns,
        }
    }

    /// Separate the `target` column from the features.
    ///
    /// Returns the feature matrix (rows × remaining columns), the target
    /// values and the feature names in column order.
    pub fn split_target(&self, target: &str) -> Result<(Array2<f64>, Vec<f64>, Vec<String>)> {
        let target_idx = self
            .names
            .iter()
            .position(|n| n == target)
            .ok_or_else(|| Error::InvalidParameter {
                name: "target",
                value: target.to_string(),
                reason: format!("not one of {:?}", self.names),
            })?;

        let feature_idx: Vec<usize> = (0..self.n_cols()).filter(|&i| i != target_idx).collect();
        let rows = self.n_rows();
        let features = Array2::from_shape_fn((rows, feature_idx.len()), |(r, c)| {
            self.columns[feature_idx[c]][r]
        });
        let names = feature_idx.iter().map(|&i| self.names[i].clone()).collect();

        Ok((features, self.columns[target_idx].clone(), names))
    }

    /// Write with a header row and no index column
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = Writer::from_path(path.as_ref())?;
        writer.write_record(&self.names)?;
        for row in 0..self.n_rows() {
            writer.write_record(self.columns.iter().map(|c| c[row].to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Options for [`create_table`]
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// File name glob inside the input directory
    pub pattern: String,
    /// Years whose rasters are skipped
    pub exclude_years: Vec<i32>,
    /// Multipliers applied to a variable's values before they are stored
    pub scale: Vec<(String, f64)>,
    /// Variables whose missing cells are stored as 0 instead of NaN
    pub zero_fill: Vec<String>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            pattern: "*.tif".to_string(),
            exclude_years: Vec::new(),
            scale: vec![("GW".to_string(), ACRE_FEET_PER_SQ_MILE_TO_MM)],
            zero_fill: vec!["URBAN".to_string()],
        }
    }
}

/// Build a table from every `<Variable>_<Year>` raster in `dir`.
///
/// Files are taken in name order, so each column lists its years in
/// ascending order. Rows with a NaN in any column are dropped.
pub fn create_table<P: AsRef<Path>>(dir: P, options: &TableOptions) -> Result<Table> {
    let dir = dir.as_ref();
    let mut builder = TableBuilder::new();

    for path in matching_files(dir, &options.pattern)? {
        let (variable, year) = parse_variable_year(&path)?;
        if options.exclude_years.contains(&year) {
            debug!("Skipping {} (year {} excluded)", path.display(), year);
            continue;
        }

        let raster: Raster<f64> = read_geotiff(&path, None)?;
        let factor = options
            .scale
            .iter()
            .find(|(name, _)| *name == variable)
            .map(|(_, f)| *f);
        let zero_fill = options.zero_fill.contains(&variable);

        let values = raster.to_f64_vec_masked().into_iter().map(|v| {
            let v = if zero_fill && v.is_nan() { 0.0 } else { v };
            factor.map_or(v, |f| v * f)
        });
        builder.push_values(&variable, values);
        debug!("Added {} ({}, {})", path.display(), variable, year);
    }

    let table = builder.finish()?;
    let before = table.n_rows();
    let table = table.drop_nan_rows();
    info!(
        "Table: {} columns, {} rows ({} dropped with missing values)",
        table.n_cols(),
        table.n_rows(),
        before - table.n_rows()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::path::PathBuf;

    #[test]
    fn test_parse_variable_year() {
        let (v, y) = parse_variable_year(Path::new("/data/ET_2015.tif")).unwrap();
        assert_eq!((v.as_str(), y), ("ET", 2015));

        let (v, y) = parse_variable_year(Path::new("GW_KS_2012.tif")).unwrap();
        assert_eq!((v.as_str(), y), ("GW_KS", 2012));

        assert!(parse_variable_year(Path::new("precip.tif")).is_err());
        assert!(parse_variable_year(Path::new("ET_latest.tif")).is_err());
        assert!(matches!(
            parse_variable_year(&PathBuf::from("_2015.tif")),
            Err(Error::FileName { .. })
        ));
    }

    #[test]
    fn test_builder_appends_in_first_seen_order() {
        let mut builder = TableBuilder::new();
        builder.push_values("ET", [1.0, 2.0]);
        builder.push_values("P", [10.0, 20.0]);
        builder.push_values("ET", [3.0]);
        builder.push_values("P", [30.0]);

        let table = builder.finish().unwrap();
        assert_eq!(table.names(), &["ET".to_string(), "P".to_string()]);
        assert_eq!(table.column("ET").unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(table.n_rows(), 3);
        let widths: Vec<(&str, usize)> = table.columns().map(|(n, c)| (n, c.len())).collect();
        assert_eq!(widths, vec![("ET", 3), ("P", 3)]);
    }

    #[test]
    fn test_builder_rejects_ragged_columns() {
        let mut builder = TableBuilder::new();
        builder.push_values("ET", [1.0, 2.0]);
        builder.push_values("P", [10.0]);
        assert!(builder.finish().is_err());
    }

    #[test]
    fn test_drop_nan_rows() {
        let mut builder = TableBuilder::new();
        builder.push_values("A", [1.0, f64::NAN, 3.0]);
        builder.push_values("B", [4.0, 5.0, f64::NAN]);
        let table = builder.finish().unwrap().drop_nan_rows();

        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.column("B").unwrap(), &[4.0]);
    }

    #[test]
    fn test_split_target() {
        let mut builder = TableBuilder::new();
        builder.push_values("ET", [1.0, 2.0]);
        builder.push_values("GW", [5.0, 6.0]);
        builder.push_values("P", [3.0, 4.0]);
        let table = builder.finish().unwrap();

        let (x, y, names) = table.split_target("GW").unwrap();
        assert_eq!(names, vec!["ET", "P"]);
        assert_eq!(y, vec![5.0, 6.0]);
        assert_eq!(x.dim(), (2, 2));
        assert_eq!(x[[1, 1]], 4.0);
        assert!(table.split_target("missing").is_err());
    }

    #[test]
    fn test_conversion_factor() {
        assert_relative_eq!(ACRE_FEET_PER_SQ_MILE_TO_MM, 0.476247, epsilon = 1e-6);
    }
}
