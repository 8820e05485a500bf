//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate. Georeferencing is limited to what the
//! pipeline needs: pixel scale + tiepoint, the `GDAL_NODATA` tag and an
//! EPSG code in the GeoKey directory.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::compression::{Compression, Deflate, Lzw, Uncompressed};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::debug;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

/// Compression applied to written images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    #[default]
    None,
    Deflate,
    Lzw,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub compression: TiffCompression,
}

/// Read the first band of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    debug!("Reading {}", path.as_ref().display());
    let file = File::open(path.as_ref())?;
    decode_geotiff(file, band)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band)
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

fn decode_geotiff<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    if let Some(b) = band.filter(|&b| b != 1) {
        return Err(Error::InvalidParameter {
            name: "band",
            value: b.to_string(),
            reason: "native reader supports single-band images only".into(),
        });
    }

    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    // GDAL_NODATA is stored as text at full precision; match it to the
    // precision the pixels were stored with.
    let single_precision = matches!(result, DecodingResult::F32(_));

    let data: Vec<T> = match result {
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::U64(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::I64(buf) => cast_all(buf),
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    if let Some(nodata) = read_nodata(&mut decoder) {
        let nodata = if single_precision { f64::from(nodata as f32) } else { nodata };
        raster.set_nodata(T::from_f64(nodata));
    }
    if let Some(epsg) = read_epsg(&mut decoder) {
        raster.set_crs(Some(CRS::from_epsg(epsg)));
    }

    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    let text = text.trim_matches(char::from(0)).trim();
    match text.to_ascii_lowercase().as_str() {
        "nan" | "-nan" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    // Header is [version, revision, minor, count], then one
    // [key, location, count, value] entry per key.
    let entries = keys.get(4..)?;
    let lookup = |wanted: u16| {
        entries
            .chunks_exact(4)
            .find(|e| e[0] == wanted && e[1] == 0)
            .map(|e| u32::from(e[3]))
    };
    lookup(PROJECTED_CS_TYPE)
        .or_else(|| lookup(GEOGRAPHIC_TYPE))
        .filter(|&code| code != 0 && code != 32767)
}

fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs.and_then(|c| Some((c, u16::try_from(c.epsg()?).ok()?)));
    let mut keys: Vec<[u16; 4]> = Vec::with_capacity(3);
    match epsg {
        Some((crs, code)) if crs.is_geographic() => {
            keys.push([GT_MODEL_TYPE, 0, 1, 2]);
            keys.push([GT_RASTER_TYPE, 0, 1, 1]);
            keys.push([GEOGRAPHIC_TYPE, 0, 1, code]);
        }
        Some((_, code)) => {
            keys.push([GT_MODEL_TYPE, 0, 1, 1]);
            keys.push([GT_RASTER_TYPE, 0, 1, 1]);
            keys.push([PROJECTED_CS_TYPE, 0, 1, code]);
        }
        None => {
            keys.push([GT_MODEL_TYPE, 0, 1, 1]);
            keys.push([GT_RASTER_TYPE, 0, 1, 1]);
        }
    }

    let mut dir = vec![1, 1, 0, keys.len() as u16];
    dir.extend(keys.into_iter().flatten());
    dir
}

/// Write a Raster to a GeoTIFF file as 32-bit float
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    debug!("Writing {}", path.as_ref().display());
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer, options.unwrap_or_default())?;
    writer.flush()?;
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    match options.compression {
        TiffCompression::None => encode_with(raster, writer, Uncompressed),
        TiffCompression::Deflate => encode_with(raster, writer, Deflate::default()),
        TiffCompression::Lzw => encode_with(raster, writer, Lzw::default()),
    }
}

fn encode_with<T, W, C>(raster: &Raster<T>, writer: W, compression: C) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
    C: Compression,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions { width: cols, height: rows });
    }

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image_with_compression::<Gray32Float, C>(cols as u32, rows as u32, compression)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    // Same rounding as the pixels, so the sentinel keeps matching them
    if let Some(nodata) = raster.nodata().and_then(|nd| nd.to_f64()).map(|nd| f64::from(nd as f32)) {
        let text = if nodata.is_nan() { "nan".to_string() } else { nodata.to_string() };
        image
            .encoder()
            .write_tag(Tag::GdalNodata, text.as_str())
            .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
    }

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::NamedTempFile;

    fn sample() -> Raster<f64> {
        let mut raster = Raster::from_vec((0..12).map(f64::from).collect(), 3, 4).unwrap();
        raster.set_transform(GeoTransform::new(500_000.0, 4_200_000.0, 1000.0, -1000.0));
        raster.set_crs(Some(CRS::from_epsg(26914)));
        raster.set_nodata(Some(-32767.0));
        raster.set(1, 1, -32767.0).unwrap();
        raster
    }

    #[test]
    fn test_buffer_roundtrip_keeps_metadata() {
        let raster = sample();
        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let loaded: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();

        assert_eq!(loaded.shape(), (3, 4));
        assert_eq!(loaded.get(2, 3).unwrap(), 11.0);
        assert_eq!(loaded.nodata(), Some(-32767.0));
        assert!(loaded.is_nodata(loaded.get(1, 1).unwrap()));
        assert_eq!(loaded.crs().and_then(|c| c.epsg()), Some(26914));
        assert_relative_eq!(loaded.transform().origin_x, 500_000.0);
        assert_relative_eq!(loaded.transform().pixel_height, -1000.0);
    }

    #[test]
    fn test_file_roundtrip_geographic_deflate() {
        let mut raster = sample();
        raster.set_crs(Some(CRS::wgs84()));
        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        let options = GeoTiffOptions {
            compression: TiffCompression::Deflate,
        };
        write_geotiff(&raster, tmp.path(), Some(options)).unwrap();

        let loaded: Raster<f64> = read_geotiff(tmp.path(), None).unwrap();
        assert_eq!(loaded.crs(), Some(&CRS::wgs84()));
        assert_eq!(loaded.get(0, 3).unwrap(), 3.0);
    }

    #[test]
    fn test_single_precision_sentinels_still_match() {
        for nd in [-9999.9, -3.4e38, 0.1] {
            let mut raster = Raster::from_vec(vec![nd, 1.0, 2.0, nd], 2, 2).unwrap();
            raster.set_nodata(Some(nd));

            let buf = write_geotiff_to_buffer(&raster, None).unwrap();
            let loaded: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();

            let stored = loaded.nodata().unwrap();
            assert_eq!(stored, f64::from(nd as f32));
            assert!(loaded.is_nodata(loaded.get(0, 0).unwrap()), "sentinel {nd}");
            assert!(loaded.is_nodata(loaded.get(1, 1).unwrap()), "sentinel {nd}");
            assert!(!loaded.is_nodata(loaded.get(0, 1).unwrap()));
            assert_eq!(loaded.statistics().valid_count, 2);
        }
    }

    #[test]
    fn test_rejects_other_bands() {
        let buf = write_geotiff_to_buffer(&sample(), None).unwrap();
        assert!(read_geotiff_from_buffer::<f64>(&buf, Some(2)).is_err());
    }

    #[test]
    fn test_geokeys_sorted() {
        let dir = geokey_directory(Some(&CRS::from_epsg(5070)));
        assert_eq!(dir[3], 3);
        assert_eq!(&dir[12..16], &[PROJECTED_CS_TYPE, 0, 1, 5070]);
    }
}
