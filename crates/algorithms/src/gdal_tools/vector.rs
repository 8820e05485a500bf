use super::{output_path, GdalTools, ToolCommand, ToolRunner};
use crate::imagery::matching_files;
use gwpump_core::io::read_geotiff;
use gwpump_core::vector::{read_points_csv, read_shapefile_crs, PointTable};
use gwpump_core::{Error, Raster, Result, CRS};
use std::path::{Path, PathBuf};
use tracing::info;

/// How to turn a delimited table into a point layer
#[derive(Debug, Clone)]
pub struct CsvPointOptions {
    pub delimiter: u8,
    /// Zero-based (longitude, latitude) positions among the complete columns
    pub lon_lat_pos: (usize, usize),
    pub source_crs: CRS,
    pub target_crs: CRS,
}

impl Default for CsvPointOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            lon_lat_pos: (7, 8),
            source_crs: CRS::wgs84(),
            target_crs: CRS::wgs84(),
        }
    }
}

fn is_shapefile(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("shp"))
}

fn separator_name(delimiter: u8) -> Result<&'static str> {
    match delimiter {
        b',' => Ok("COMMA"),
        b';' => Ok("SEMICOLON"),
        b'\t' => Ok("TAB"),
        b' ' => Ok("SPACE"),
        other => Err(Error::InvalidParameter {
            name: "delimiter",
            value: (other as char).to_string(),
            reason: "OGR CSV driver accepts comma, semicolon, tab or space".into(),
        }),
    }
}

impl<R: ToolRunner> GdalTools<R> {
    /// `ogr2ogr -clipsrc <clip> <output> <input>`
    pub fn clip_vector_cmd(&self, input: &Path, clip: &Path, output: &Path) -> ToolCommand {
        self.command("ogr2ogr")
            .arg("-clipsrc")
            .path(clip)
            .path(output)
            .path(input)
    }

    pub fn clip_vector(&self, input: &Path, clip: &Path, output: &Path) -> Result<()> {
        self.run(&self.clip_vector_cmd(input, clip, output))
    }

    /// Clip every shapefile in `input_dir` into `out_dir`, keeping file names
    pub fn clip_vectors(&self, input_dir: &Path, clip: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut outputs = Vec::new();
        for input in matching_files(input_dir, "*.shp")? {
            let output = output_path(&input, out_dir, "shp");
            self.clip_vector(&input, clip, &output)?;
            outputs.push(output);
        }
        info!("Clipped {} layers", outputs.len());
        Ok(outputs)
    }

    /// `ogr2ogr -t_srs <crs> <output> <input>`
    pub fn reproject_vector_cmd(&self, input: &Path, output: &Path, crs: &CRS) -> ToolCommand {
        self.command("ogr2ogr")
            .arg("-t_srs")
            .arg(crs.identifier())
            .path(output)
            .path(input)
    }

    pub fn reproject_vector(&self, input: &Path, output: &Path, crs: &CRS) -> Result<()> {
        self.run(&self.reproject_vector_cmd(input, output, crs))
    }

    /// Reproject into the CRS of a reference layer.
    ///
    /// A `.shp` reference contributes the WKT of its `.prj` file; anything
    /// else is read as a GeoTIFF and must carry an EPSG code.
    pub fn reproject_vector_like(&self, input: &Path, output: &Path, reference: &Path) -> Result<()> {
        let crs = if is_shapefile(reference) {
            read_shapefile_crs(reference)?
        } else {
            let raster: Raster<f64> = read_geotiff(reference, None)?;
            raster.crs().cloned().ok_or_else(|| Error::InvalidParameter {
                name: "reference",
                value: reference.display().to_string(),
                reason: "reference raster carries no EPSG code".into(),
            })?
        };
        self.reproject_vector(input, output, &crs)
    }

    /// Command converting the table described by `points` to a shapefile.
    ///
    /// Only the complete columns are kept. With differing source and
    /// target CRS the points are reprojected in the same call.
    pub fn csv_to_shapefile_cmd(
        &self,
        input: &Path,
        output: &Path,
        points: &PointTable,
        options: &CsvPointOptions,
    ) -> Result<ToolCommand> {
        let is_csv = input
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        // The CSV driver only claims *.csv files unless forced with a prefix
        let source = if is_csv {
            input.to_string_lossy().into_owned()
        } else {
            format!("CSV:{}", input.display())
        };

        let mut cmd = self
            .command("ogr2ogr")
            .args(["-f", "ESRI Shapefile"])
            .arg("-oo")
            .arg(format!("X_POSSIBLE_NAMES={}", points.lon_column))
            .arg("-oo")
            .arg(format!("Y_POSSIBLE_NAMES={}", points.lat_column))
            .arg("-oo")
            .arg(format!("SEPARATOR={}", separator_name(options.delimiter)?))
            .arg("-select")
            .arg(points.columns.join(","));

        cmd = if options.source_crs.is_equivalent(&options.target_crs) {
            cmd.arg("-a_srs").arg(options.source_crs.identifier())
        } else {
            cmd.arg("-s_srs")
                .arg(options.source_crs.identifier())
                .arg("-t_srs")
                .arg(options.target_crs.identifier())
        };

        Ok(cmd.path(output).arg(source))
    }

    /// Read point observations from a table and write them as a shapefile.
    ///
    /// Returns the parsed points so callers can reuse their extent.
    pub fn csv_to_shapefile(&self, input: &Path, output: &Path, options: &CsvPointOptions) -> Result<PointTable> {
        let points = read_points_csv(input, options.delimiter, options.lon_lat_pos)?;
        self.run(&self.csv_to_shapefile_cmd(input, output, &points, options)?)?;
        Ok(points)
    }

    /// Convert every table in `input_dir` matching `pattern` to
    /// `out_dir/<stem>.shp`
    pub fn csvs_to_shapefiles(
        &self,
        input_dir: &Path,
        out_dir: &Path,
        pattern: &str,
        options: &CsvPointOptions,
    ) -> Result<Vec<PathBuf>> {
        let mut outputs = Vec::new();
        for input in matching_files(input_dir, pattern)? {
            let output = output_path(&input, out_dir, "shp");
            self.csv_to_shapefile(&input, &output, options)?;
            outputs.push(output);
        }
        info!("Converted {} tables to shapefiles", outputs.len());
        Ok(outputs)
    }
}
