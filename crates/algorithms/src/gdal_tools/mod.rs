//! GDAL/OGR command-line tool invocation
//!
//! Reprojection, clipping, rasterization, gridding and warping are
//! delegated to the GDAL binaries. Each operation has a pure `*_cmd`
//! builder returning the [`ToolCommand`] and an executing method that
//! hands it to the [`ToolRunner`]. Only the exit status is checked and
//! nothing is retried.

mod command;
mod raster;
mod vector;

pub use command::{ProcessRunner, ToolCommand, ToolRunner};
pub use raster::{GridMethod, RasterizeParams, Resampling};
pub use vector::CsvPointOptions;

use std::path::{Path, PathBuf};

/// Builds and runs GDAL/OGR commands
#[derive(Debug, Clone, Default)]
pub struct GdalTools<R: ToolRunner = ProcessRunner> {
    bin_dir: Option<PathBuf>,
    runner: R,
}

impl GdalTools<ProcessRunner> {
    /// Run binaries found on `PATH`
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: ToolRunner> GdalTools<R> {
    pub fn with_runner(runner: R) -> Self {
        Self {
            bin_dir: None,
            runner,
        }
    }

    /// Look binaries up in `dir` instead of `PATH`
    pub fn bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bin_dir = Some(dir.into());
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn program(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    fn command(&self, name: &str) -> ToolCommand {
        ToolCommand::new(self.program(name))
    }

    fn run(&self, cmd: &ToolCommand) -> gwpump_core::Result<()> {
        self.runner.run(cmd)
    }
}

/// `out_dir/<stem of input>.<ext>`
fn output_path(input: &Path, out_dir: &Path, ext: &str) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    out_dir.join(format!("{}.{}", stem, ext))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Records commands instead of spawning them
    #[derive(Debug, Default)]
    pub struct RecordingRunner {
        pub calls: RefCell<Vec<ToolCommand>>,
    }

    impl ToolRunner for RecordingRunner {
        fn run(&self, cmd: &ToolCommand) -> gwpump_core::Result<()> {
            self.calls.borrow_mut().push(cmd.clone());
            Ok(())
        }
    }

    pub fn tools() -> GdalTools<RecordingRunner> {
        GdalTools::with_runner(RecordingRunner::default()).bin_dir("/opt/gdal/bin")
    }

    pub fn args(cmd: &ToolCommand) -> Vec<&str> {
        cmd.get_args().iter().map(String::as_str).collect()
    }

    /// Write a point-layer `.shp` holding only the 100-byte header
    pub fn write_shp(path: &Path, bounds: gwpump_core::Bounds) {
        let mut header = vec![0u8; 100];
        header[0..4].copy_from_slice(&9994i32.to_be_bytes());
        header[24..28].copy_from_slice(&50i32.to_be_bytes());
        header[28..32].copy_from_slice(&1000i32.to_le_bytes());
        header[32..36].copy_from_slice(&1i32.to_le_bytes());
        for (i, v) in [bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y].into_iter().enumerate() {
            header[36 + i * 8..44 + i * 8].copy_from_slice(&v.to_le_bytes());
        }
        std::fs::write(path, header).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_resolution() {
        let on_path = GdalTools::new();
        assert_eq!(on_path.program("ogr2ogr"), PathBuf::from("ogr2ogr"));

        let pinned = GdalTools::new().bin_dir("/usr/local/Cellar/gdal/2.4.2/bin");
        assert_eq!(
            pinned.program("gdal_grid"),
            PathBuf::from("/usr/local/Cellar/gdal/2.4.2/bin/gdal_grid")
        );
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("/in/wells_2015.shp"), Path::new("/out"), "tif"),
            PathBuf::from("/out/wells_2015.tif")
        );
    }
}
