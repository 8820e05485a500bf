//! Point features loaded from delimited tables, and shapefile layer
//! metadata

use crate::error::{Error, Result};
use crate::raster::Bounds;
use csv::{ReaderBuilder, StringRecord};
use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

mod shapefile;

pub use shapefile::{parse_shapefile_bounds, read_shapefile_bounds, read_shapefile_crs};

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Parse a table cell, preferring integers, then floats
    pub fn parse(cell: &str) -> Self {
        let cell = cell.trim();
        if is_missing(cell) {
            return AttributeValue::Null;
        }
        if let Ok(i) = cell.parse::<i64>() {
            return AttributeValue::Int(i);
        }
        if let Ok(f) = cell.parse::<f64>() {
            return AttributeValue::Float(f);
        }
        AttributeValue::String(cell.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Cells pandas reads as NaN by default
fn is_missing(cell: &str) -> bool {
    matches!(
        cell,
        "" | "NA" | "N/A" | "NaN" | "nan" | "NULL" | "null" | "#N/A" | "-NaN" | "-nan"
    )
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: HashMap<String, AttributeValue>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    fn point(&self) -> Option<Point<f64>> {
        match self.geometry {
            Some(Geometry::Point(p)) => Some(p),
            _ => None,
        }
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self { features: Vec::new() }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Total bounds of all point geometries
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.iter().filter_map(Feature::point).map(|p| (p.x(), p.y())))
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

/// Points read from a delimited table
#[derive(Debug, Clone)]
pub struct PointTable {
    /// Columns kept after dropping those with missing cells
    pub columns: Vec<String>,
    pub lon_column: String,
    pub lat_column: String,
    pub features: FeatureCollection,
}

/// Read a delimited table of point observations.
///
/// Columns with at least one missing cell are dropped first; `lon_lat_pos`
/// then indexes (zero-based) into the remaining columns.
pub fn read_points_csv<P: AsRef<Path>>(
    path: P,
    delimiter: u8,
    lon_lat_pos: (usize, usize),
) -> Result<PointTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(false)
        .from_path(path.as_ref())?;

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let records: Vec<StringRecord> = reader.records().collect::<std::result::Result<_, _>>()?;

    let kept: Vec<usize> = (0..headers.len())
        .filter(|&i| records.iter().all(|r| !is_missing(r.get(i).unwrap_or("").trim())))
        .collect();
    debug!(
        "{}: {} of {} columns complete, {} rows",
        path.as_ref().display(),
        kept.len(),
        headers.len(),
        records.len()
    );

    let column_at = |pos: usize, name: &'static str| {
        kept.get(pos).copied().ok_or_else(|| Error::InvalidParameter {
            name,
            value: pos.to_string(),
            reason: format!("only {} complete columns", kept.len()),
        })
    };
    let lon_idx = column_at(lon_lat_pos.0, "lon_lat_pos.0")?;
    let lat_idx = column_at(lon_lat_pos.1, "lon_lat_pos.1")?;

    let mut features = FeatureCollection::new();
    for (line, record) in records.iter().enumerate() {
        let coord = |idx: usize| {
            let cell = record.get(idx).unwrap_or("").trim();
            cell.parse::<f64>().map_err(|_| Error::InvalidParameter {
                name: "coordinate",
                value: cell.to_string(),
                reason: format!("row {} column {:?} is not numeric", line + 1, headers[idx]),
            })
        };
        let point = Point::new(coord(lon_idx)?, coord(lat_idx)?);

        let mut feature = Feature::new(Geometry::Point(point));
        for &i in &kept {
            feature.set_property(headers[i].clone(), AttributeValue::parse(record.get(i).unwrap_or("")));
        }
        features.push(feature);
    }

    Ok(PointTable {
        columns: kept.iter().map(|&i| headers[i].clone()).collect(),
        lon_column: headers[lon_idx].clone(),
        lat_column: headers[lat_idx].clone(),
        features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_attribute() {
        assert_eq!(AttributeValue::parse("42"), AttributeValue::Int(42));
        assert_eq!(AttributeValue::parse("4.5"), AttributeValue::Float(4.5));
        assert_eq!(AttributeValue::parse(" NA "), AttributeValue::Null);
        assert_eq!(AttributeValue::parse("Finney"), AttributeValue::String("Finney".into()));
    }

    #[test]
    fn test_positions_index_complete_columns() {
        let file = write_csv(
            "well,notes,af_used,lon,lat\n\
             1,,120.5,-100.5,37.9\n\
             2,dry,80,-101.25,38.2\n",
        );
        // "notes" has a gap and is dropped, so lon/lat sit at 2 and 3
        let table = read_points_csv(file.path(), b',', (2, 3)).unwrap();

        assert_eq!(table.columns, vec!["well", "af_used", "lon", "lat"]);
        assert_eq!(table.lon_column, "lon");
        assert_eq!(table.lat_column, "lat");
        assert_eq!(table.features.len(), 2);

        let bounds = table.features.bounds().unwrap();
        assert_eq!(bounds, Bounds::new(-101.25, 37.9, -100.5, 38.2));
        let first = &table.features.features[0];
        assert_eq!(first.get_property("af_used"), Some(&AttributeValue::Float(120.5)));
        assert!(first.get_property("notes").is_none());
    }

    #[test]
    fn test_position_out_of_range() {
        let file = write_csv("a,b\n1,2\n");
        assert!(matches!(
            read_points_csv(file.path(), b',', (7, 8)),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_non_numeric_coordinate() {
        let file = write_csv("x;y\n1.0;north\n");
        assert!(read_points_csv(file.path(), b';', (0, 1)).is_err());
    }
}
