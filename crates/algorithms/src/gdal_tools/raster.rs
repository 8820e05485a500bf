use super::{output_path, GdalTools, ToolCommand, ToolRunner};
use crate::imagery::matching_files;
use gwpump_core::io::read_geotiff;
use gwpump_core::vector::read_shapefile_bounds;
use gwpump_core::{Bounds, Error, Raster, Result, NO_DATA_VALUE};
use std::path::{Path, PathBuf};
use tracing::info;

/// How point values are turned into a grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridMethod {
    /// Burn feature values into the cells they fall in (`gdal_rasterize`)
    Burn,
    /// Inverse distance to a power (`gdal_grid -a invdist`); larger
    /// smoothing values give smoother surfaces
    InverseDistance { smoothing: f64 },
}

impl Default for GridMethod {
    fn default() -> Self {
        GridMethod::InverseDistance { smoothing: 4800.0 }
    }
}

/// Parameters for converting a point layer to a raster
#[derive(Debug, Clone)]
pub struct RasterizeParams {
    /// Attribute holding the values to grid
    pub value_field: String,
    /// Pixel width in layer units
    pub xres: f64,
    /// Pixel height in layer units
    pub yres: f64,
    pub method: GridMethod,
    /// Output extent; `shapefile_to_raster` reads the layer's own
    /// bounds when this is `None`
    pub extent: Option<Bounds>,
    pub no_data: f64,
}

impl RasterizeParams {
    pub fn new(value_field: impl Into<String>) -> Self {
        Self {
            value_field: value_field.into(),
            xres: 1000.0,
            yres: 1000.0,
            method: GridMethod::default(),
            extent: None,
            no_data: NO_DATA_VALUE,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [("xres", self.xres), ("yres", self.yres)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "resolution must be positive".into(),
                });
            }
        }
        if self.value_field.is_empty() {
            return Err(Error::InvalidParameter {
                name: "value_field",
                value: String::new(),
                reason: "an attribute name is required".into(),
            });
        }
        Ok(())
    }
}

/// gdalwarp resampling kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampling {
    #[default]
    Nearest,
    Bilinear,
    Cubic,
    Average,
    Mode,
}

impl Resampling {
    pub fn as_gdal(self) -> &'static str {
        match self {
            Resampling::Nearest => "near",
            Resampling::Bilinear => "bilinear",
            Resampling::Cubic => "cubic",
            Resampling::Average => "average",
            Resampling::Mode => "mode",
        }
    }
}

fn layer_name(input: &Path) -> Result<String> {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::FileName {
            path: input.to_path_buf(),
            reason: "no layer name".into(),
        })
}

impl<R: ToolRunner> GdalTools<R> {
    /// Command gridding the shapefile `input` into the GeoTIFF `output`.
    ///
    /// The layer name is the file stem. Output is Float32 with
    /// `params.no_data` as the no-data value.
    pub fn shapefile_to_raster_cmd(&self, input: &Path, output: &Path, params: &RasterizeParams) -> Result<ToolCommand> {
        params.validate()?;
        let layer = layer_name(input)?;

        let cmd = match params.method {
            GridMethod::Burn => {
                let mut cmd = self
                    .command("gdal_rasterize")
                    .args(["-l", layer.as_str()])
                    .args(["-a", params.value_field.as_str()])
                    .arg("-tr")
                    .arg(params.xres)
                    .arg(params.yres);
                if let Some(b) = params.extent {
                    cmd = cmd.arg("-te").args([b.min_x, b.min_y, b.max_x, b.max_y]);
                }
                cmd.args(["-ot", "Float32", "-of", "GTiff"])
                    .arg("-a_nodata")
                    .arg(params.no_data)
            }
            GridMethod::InverseDistance { smoothing } => {
                let mut cmd = self
                    .command("gdal_grid")
                    .arg("-a")
                    .arg(format!("invdist:smoothing={}:nodata={}", smoothing, params.no_data))
                    .args(["-zfield", params.value_field.as_str()])
                    .args(["-l", layer.as_str()]);
                let b = params.extent.ok_or_else(|| Error::InvalidParameter {
                    name: "extent",
                    value: "none".into(),
                    reason: "gdal_grid needs the layer extent to size the output".into(),
                })?;
                let (xsize, ysize) = b.grid_size(params.xres, params.yres);
                if xsize == 0 || ysize == 0 {
                    return Err(Error::InvalidParameter {
                        name: "extent",
                        value: b.to_string(),
                        reason: "smaller than one cell at this resolution".into(),
                    });
                }
                cmd.arg("-outsize")
                    .arg(xsize)
                    .arg(ysize)
                    .args(["-ot", "Float32", "-of", "GTiff"])
            }
        };

        Ok(cmd.path(input).path(output))
    }

    /// Grid `input`, taking the extent from its header unless
    /// `params.extent` is set
    pub fn shapefile_to_raster(&self, input: &Path, output: &Path, params: &RasterizeParams) -> Result<()> {
        let cmd = match params.extent {
            Some(_) => self.shapefile_to_raster_cmd(input, output, params)?,
            None => {
                let params = RasterizeParams {
                    extent: Some(read_shapefile_bounds(input)?),
                    ..params.clone()
                };
                self.shapefile_to_raster_cmd(input, output, &params)?
            }
        };
        self.run(&cmd)
    }

    /// Grid every shapefile in `input_dir` to `out_dir/<stem>.tif`
    pub fn shapefiles_to_rasters(&self, input_dir: &Path, out_dir: &Path, params: &RasterizeParams) -> Result<Vec<PathBuf>> {
        let mut outputs = Vec::new();
        for input in matching_files(input_dir, "*.shp")? {
            let output = output_path(&input, out_dir, "tif");
            self.shapefile_to_raster(&input, &output, params)?;
            outputs.push(output);
        }
        info!("Gridded {} layers", outputs.len());
        Ok(outputs)
    }

    /// `gdalwarp -cutline <shp> -crop_to_cutline`
    pub fn crop_raster_cmd(&self, input: &Path, cutline: &Path, output: &Path, no_data: f64) -> ToolCommand {
        self.command("gdalwarp")
            .arg("-overwrite")
            .arg("-cutline")
            .path(cutline)
            .arg("-crop_to_cutline")
            .arg("-dstnodata")
            .arg(no_data)
            .args(["-of", "GTiff"])
            .path(input)
            .path(output)
    }

    pub fn crop_raster(&self, input: &Path, cutline: &Path, output: &Path, no_data: f64) -> Result<()> {
        self.run(&self.crop_raster_cmd(input, cutline, output, no_data))
    }

    /// `gdalwarp -tr <xres> <yres> -r <method>`
    pub fn resample_raster_cmd(&self, input: &Path, output: &Path, xres: f64, yres: f64, method: Resampling) -> ToolCommand {
        self.command("gdalwarp")
            .arg("-overwrite")
            .arg("-tr")
            .arg(xres)
            .arg(yres)
            .args(["-r", method.as_gdal()])
            .args(["-of", "GTiff"])
            .path(input)
            .path(output)
    }

    pub fn resample_raster(&self, input: &Path, output: &Path, xres: f64, yres: f64, method: Resampling) -> Result<()> {
        self.run(&self.resample_raster_cmd(input, output, xres, yres, method))
    }

    /// Warp `input` onto the grid of `reference`: same CRS (when known),
    /// extent and number of rows and columns
    pub fn match_raster_cmd(&self, input: &Path, reference: &Raster<f64>, output: &Path, method: Resampling) -> ToolCommand {
        let b = reference.bounds();
        let mut cmd = self.command("gdalwarp").arg("-overwrite");
        if let Some(crs) = reference.crs() {
            cmd = cmd.arg("-t_srs").arg(crs.identifier());
        }
        cmd.arg("-te")
            .args([b.min_x, b.min_y, b.max_x, b.max_y])
            .arg("-ts")
            .arg(reference.cols())
            .arg(reference.rows())
            .args(["-r", method.as_gdal()])
            .args(["-of", "GTiff"])
            .path(input)
            .path(output)
    }

    pub fn match_raster(&self, input: &Path, reference: &Path, output: &Path, method: Resampling) -> Result<()> {
        let reference: Raster<f64> = read_geotiff(reference, None)?;
        self.run(&self.match_raster_cmd(input, &reference, output, method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdal_tools::testing::{args, tools, write_shp};
    use gwpump_core::{GeoTransform, CRS};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_rasterize_command() {
        let t = tools();
        let params = RasterizeParams {
            method: GridMethod::Burn,
            extent: Some(Bounds::new(0.0, 0.0, 5000.0, 3000.0)),
            ..RasterizeParams::new("AF_USED")
        };
        let cmd = t
            .shapefile_to_raster_cmd(Path::new("/d/GW_2015.shp"), Path::new("/o/GW_2015.tif"), &params)
            .unwrap();

        assert_eq!(cmd.program_name(), "gdal_rasterize");
        assert_eq!(
            args(&cmd),
            vec![
                "-l", "GW_2015", "-a", "AF_USED", "-tr", "1000", "1000", "-te", "0", "0", "5000",
                "3000", "-ot", "Float32", "-of", "GTiff", "-a_nodata", "-32767", "/d/GW_2015.shp",
                "/o/GW_2015.tif",
            ]
        );
    }

    #[test]
    fn test_grid_command_with_extent() {
        let t = tools();
        let params = RasterizeParams {
            extent: Some(Bounds::new(0.0, 0.0, 10_400.0, 4_600.0)),
            ..RasterizeParams::new("AF_USED")
        };
        let cmd = t
            .shapefile_to_raster_cmd(Path::new("GW_2015.shp"), Path::new("GW_2015.tif"), &params)
            .unwrap();

        assert_eq!(cmd.program_name(), "gdal_grid");
        assert_eq!(
            args(&cmd),
            vec![
                "-a", "invdist:smoothing=4800:nodata=-32767", "-zfield", "AF_USED", "-l", "GW_2015",
                "-outsize", "10", "5", "-ot", "Float32", "-of", "GTiff", "GW_2015.shp", "GW_2015.tif",
            ]
        );
    }

    #[test]
    fn test_grid_command_needs_extent() {
        let t = tools();
        let err = t
            .shapefile_to_raster_cmd(Path::new("a.shp"), Path::new("a.tif"), &RasterizeParams::new("AF_USED"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "extent", .. }));
    }

    #[test]
    fn test_grid_extent_from_layer_header() {
        let dir = tempdir().unwrap();
        let shp = dir.path().join("GW_2015.shp");
        write_shp(&shp, Bounds::new(-1000.0, 2000.0, 9400.0, 6500.0));

        let t = tools();
        let params = RasterizeParams {
            xres: 1000.0,
            yres: 1000.0,
            ..RasterizeParams::new("AF_USED")
        };
        t.shapefile_to_raster(&shp, Path::new("GW_2015.tif"), &params).unwrap();

        let calls = t.runner().calls.borrow();
        let a = args(&calls[0]);
        assert_eq!(calls[0].program_name(), "gdal_grid");
        // 10.4 x 4.5 cells, the half rounds to even
        let i = a.iter().position(|x| *x == "-outsize").unwrap();
        assert_eq!(&a[i..i + 3], &["-outsize", "10", "4"]);
        assert!(!a.contains(&"-tr"));
    }

    #[test]
    fn test_burn_extent_from_layer_header() {
        let dir = tempdir().unwrap();
        let shp = dir.path().join("GW_2015.shp");
        write_shp(&shp, Bounds::new(0.0, 0.0, 5000.0, 3000.0));

        let t = tools();
        let params = RasterizeParams {
            method: GridMethod::Burn,
            ..RasterizeParams::new("AF_USED")
        };
        t.shapefile_to_raster(&shp, Path::new("GW_2015.tif"), &params).unwrap();

        let calls = t.runner().calls.borrow();
        let a = args(&calls[0]);
        let i = a.iter().position(|x| *x == "-te").unwrap();
        assert_eq!(&a[i..i + 5], &["-te", "0", "0", "5000", "3000"]);
    }

    #[test]
    fn test_unreadable_layer_is_an_error() {
        let dir = tempdir().unwrap();
        let shp = dir.path().join("empty.shp");
        fs::write(&shp, b"").unwrap();
        let t = tools();
        assert!(t
            .shapefile_to_raster(&shp, Path::new("empty.tif"), &RasterizeParams::new("AF_USED"))
            .is_err());
        assert!(t.runner().calls.borrow().is_empty());
    }

    #[test]
    fn test_rasterize_rejects_bad_params() {
        let t = tools();
        let zero_res = RasterizeParams {
            xres: 0.0,
            ..RasterizeParams::new("AF_USED")
        };
        assert!(t
            .shapefile_to_raster_cmd(Path::new("a.shp"), Path::new("a.tif"), &zero_res)
            .is_err());

        let tiny = RasterizeParams {
            extent: Some(Bounds::new(0.0, 0.0, 10.0, 10.0)),
            ..RasterizeParams::new("AF_USED")
        };
        assert!(t
            .shapefile_to_raster_cmd(Path::new("a.shp"), Path::new("a.tif"), &tiny)
            .is_err());
    }

    #[test]
    fn test_shapefiles_to_rasters() {
        let input = tempdir().unwrap();
        write_shp(&input.path().join("GW_2014.shp"), Bounds::new(0.0, 0.0, 3000.0, 3000.0));
        write_shp(&input.path().join("GW_2015.shp"), Bounds::new(0.0, 0.0, 3000.0, 3000.0));

        let t = tools();
        let outputs = t
            .shapefiles_to_rasters(input.path(), Path::new("/out"), &RasterizeParams::new("AF_USED"))
            .unwrap();
        assert_eq!(outputs, vec![PathBuf::from("/out/GW_2014.tif"), PathBuf::from("/out/GW_2015.tif")]);
        assert_eq!(t.runner().calls.borrow().len(), 2);
    }

    #[test]
    fn test_crop_and_resample() {
        let t = tools();
        let crop = t.crop_raster_cmd(Path::new("cdl.tif"), Path::new("ks.shp"), Path::new("ks_crop.tif"), 0.0);
        assert_eq!(
            args(&crop),
            vec![
                "-overwrite", "-cutline", "ks.shp", "-crop_to_cutline", "-dstnodata", "0", "-of",
                "GTiff", "cdl.tif", "ks_crop.tif",
            ]
        );

        let resample = t.resample_raster_cmd(Path::new("a.tif"), Path::new("b.tif"), 5000.0, 5000.0, Resampling::Mode);
        assert!(args(&resample).windows(2).any(|w| w == ["-r", "mode"]));
    }

    #[test]
    fn test_match_raster_uses_reference_grid() {
        let mut reference: Raster<f64> = Raster::new(4, 6);
        reference.set_transform(GeoTransform::new(100.0, 400.0, 50.0, -50.0));
        reference.set_crs(Some(CRS::from_epsg(5070)));

        let t = tools();
        let cmd = t.match_raster_cmd(Path::new("ks_reclass.tif"), &reference, Path::new("ks_resamp.tif"), Resampling::Nearest);
        assert_eq!(
            args(&cmd),
            vec![
                "-overwrite", "-t_srs", "EPSG:5070", "-te", "100", "200", "400", "400", "-ts", "6",
                "4", "-r", "near", "-of", "GTiff", "ks_reclass.tif", "ks_resamp.tif",
            ]
        );
    }
}
