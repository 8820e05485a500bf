//! Layer metadata read straight from ESRI shapefile sidecars
//!
//! Only the main-file header (bounding box) and the `.prj` WKT are
//! read; geometry and attribute records are left to OGR.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::Bounds;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

const HEADER_LEN: usize = 100;
const FILE_CODE: i32 = 9994;

/// Parse the X/Y bounding box from a `.shp` main-file header
pub fn parse_shapefile_bounds(header: &[u8]) -> Result<Bounds> {
    if header.len() < HEADER_LEN {
        return Err(Error::Other(format!(
            "shapefile header is {} bytes, expected {}",
            header.len(),
            HEADER_LEN
        )));
    }
    // File code is big-endian, the rest of the header little-endian
    let code = BigEndian::read_i32(&header[0..4]);
    if code != FILE_CODE {
        return Err(Error::Other(format!("not a shapefile (file code {})", code)));
    }

    let min_x = LittleEndian::read_f64(&header[36..44]);
    let min_y = LittleEndian::read_f64(&header[44..52]);
    let max_x = LittleEndian::read_f64(&header[52..60]);
    let max_y = LittleEndian::read_f64(&header[60..68]);
    if !(min_x <= max_x && min_y <= max_y) {
        return Err(Error::Other(format!(
            "shapefile has no valid extent ({}, {}, {}, {})",
            min_x, min_y, max_x, max_y
        )));
    }
    Ok(Bounds::new(min_x, min_y, max_x, max_y))
}

/// Total bounds of the layer in `path`
pub fn read_shapefile_bounds<P: AsRef<Path>>(path: P) -> Result<Bounds> {
    let path = path.as_ref();
    let mut header = [0u8; HEADER_LEN];
    File::open(path)?.read_exact(&mut header)?;
    let bounds = parse_shapefile_bounds(&header)?;
    debug!("{} extent {}", path.display(), bounds);
    Ok(bounds)
}

/// CRS of the layer in `path`, from the `.prj` file beside it
pub fn read_shapefile_crs<P: AsRef<Path>>(path: P) -> Result<CRS> {
    let prj = path.as_ref().with_extension("prj");
    let wkt = std::fs::read_to_string(&prj)?;
    let wkt = wkt.trim();
    if wkt.is_empty() {
        return Err(Error::FileName {
            path: prj,
            reason: "empty projection file".into(),
        });
    }
    Ok(CRS::from_wkt(wkt))
}

#[cfg(test)]
pub(crate) fn header_bytes(bounds: &Bounds) -> Vec<u8> {
    let mut header = vec![0u8; HEADER_LEN];
    BigEndian::write_i32(&mut header[0..4], FILE_CODE);
    BigEndian::write_i32(&mut header[24..28], (HEADER_LEN / 2) as i32);
    LittleEndian::write_i32(&mut header[28..32], 1000);
    LittleEndian::write_i32(&mut header[32..36], 1);
    for (i, v) in [bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y]
        .into_iter()
        .enumerate()
    {
        LittleEndian::write_f64(&mut header[36 + i * 8..44 + i * 8], v);
    }
    header
}
