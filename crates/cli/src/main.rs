//! gwpump CLI - raster preprocessing for groundwater-pumping estimation

mod rules;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gwpump_algorithms::gdal_tools::{
    CsvPointOptions, GdalTools, GridMethod, RasterizeParams, Resampling,
};
use gwpump_algorithms::imagery::{
    apply_raster_filter, reclassify, stack_arithmetic, stack_rasters, StackOp,
};
use gwpump_algorithms::tabular::{create_table, TableOptions};
use gwpump_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use gwpump_core::{Bounds, Raster, CRS, NO_DATA_VALUE};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "gwpump")]
#[command(author, version, about = "Raster preprocessing for groundwater-pumping estimation", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding the GDAL binaries (default: search PATH)
    #[arg(long, global = true)]
    gdal_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Map cell values to class codes through (low, high] intervals
    Reclassify {
        /// Input raster file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// TOML rule file with [[class]] low/high/code tables
        #[arg(long, conflicts_with = "preset", required_unless_present = "preset")]
        rules: Option<PathBuf>,
        /// Built-in CDL table: arizona, kansas
        #[arg(long)]
        preset: Option<String>,
        /// Code for no-data and unmatched cells (overrides the rule file)
        #[arg(long, allow_hyphen_values = true)]
        no_data: Option<f64>,
    },
    /// Combine every raster in a directory matching a pattern
    Stack {
        /// Input directory
        dir: PathBuf,
        /// Output file
        output: PathBuf,
        /// File name glob, e.g. "ET_2015*.tif"
        #[arg(long)]
        pattern: String,
        /// Reduction: sum, mean, min, max
        #[arg(long, default_value = "sum")]
        op: String,
    },
    /// Keep values where a class raster holds one of the given codes
    Filter {
        /// Class raster
        mask: PathBuf,
        /// Raster to filter
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Class codes to keep, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<f64>,
    },
    /// Build a CSV table from <Variable>_<Year> rasters
    Table {
        /// Input directory
        dir: PathBuf,
        /// Output CSV file
        output: PathBuf,
        /// File name glob
        #[arg(long, default_value = "*.tif")]
        pattern: String,
        /// Years to leave out, comma separated
        #[arg(long, value_delimiter = ',')]
        exclude_years: Vec<i32>,
    },
    /// Vector operations through OGR
    Vector {
        #[command(subcommand)]
        operation: VectorCommands,
    },
    /// Raster warping through GDAL
    Raster {
        #[command(subcommand)]
        operation: RasterCommands,
    },
}

// ─── Vector subcommands ─────────────────────────────────────────────────

#[derive(clap::Args)]
struct CsvArgs {
    /// Column delimiter
    #[arg(long, default_value = ",")]
    delimiter: char,
    /// Zero-based longitude position among the complete columns
    #[arg(long, default_value = "7")]
    lon_col: usize,
    /// Zero-based latitude position among the complete columns
    #[arg(long, default_value = "8")]
    lat_col: usize,
    /// CRS of the coordinates
    #[arg(long, default_value = "EPSG:4326")]
    source_crs: String,
    /// CRS of the written layer
    #[arg(long, default_value = "EPSG:4326")]
    target_crs: String,
}

#[derive(clap::Args)]
struct GridArgs {
    /// Attribute holding the values to grid
    #[arg(long)]
    field: String,
    /// Pixel width
    #[arg(long, default_value = "1000")]
    xres: f64,
    /// Pixel height
    #[arg(long, default_value = "1000")]
    yres: f64,
    /// Method: idw, burn
    #[arg(long, default_value = "idw")]
    method: String,
    /// Inverse-distance smoothing
    #[arg(long, default_value = "4800")]
    smoothing: f64,
    /// Output extent as min_x,min_y,max_x,max_y (default: layer bounds)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    extent: Option<Vec<f64>>,
    /// No-data value
    #[arg(long, allow_hyphen_values = true, default_value_t = NO_DATA_VALUE)]
    no_data: f64,
}

#[derive(Subcommand)]
enum VectorCommands {
    /// Clip a layer to a boundary
    Clip {
        input: PathBuf,
        /// Clipping layer
        clip: PathBuf,
        output: PathBuf,
    },
    /// Clip every shapefile in a directory
    ClipDir {
        input_dir: PathBuf,
        /// Clipping layer
        clip: PathBuf,
        out_dir: PathBuf,
    },
    /// Reproject a layer to a CRS or to a reference layer's CRS
    Reproject {
        input: PathBuf,
        output: PathBuf,
        /// Target CRS, e.g. EPSG:5070
        #[arg(long, conflicts_with = "like", required_unless_present = "like")]
        crs: Option<String>,
        /// Raster or shapefile whose CRS to use
        #[arg(long)]
        like: Option<PathBuf>,
    },
    /// Convert a delimited point table to a shapefile
    Csv2shp {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        csv: CsvArgs,
    },
    /// Convert every table in a directory to shapefiles
    Csv2shpDir {
        input_dir: PathBuf,
        out_dir: PathBuf,
        /// File name glob
        #[arg(long, default_value = "*.csv")]
        pattern: String,
        #[command(flatten)]
        csv: CsvArgs,
    },
    /// Grid a point shapefile
    Rasterize {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        grid: GridArgs,
    },
    /// Grid every shapefile in a directory
    RasterizeDir {
        input_dir: PathBuf,
        out_dir: PathBuf,
        #[command(flatten)]
        grid: GridArgs,
    },
}

// ─── Raster subcommands ─────────────────────────────────────────────────

#[derive(Subcommand)]
enum RasterCommands {
    /// Crop a raster to a polygon layer
    Crop {
        input: PathBuf,
        /// Cutline layer
        cutline: PathBuf,
        output: PathBuf,
        /// No-data value outside the cutline
        #[arg(long, allow_hyphen_values = true, default_value_t = NO_DATA_VALUE)]
        no_data: f64,
    },
    /// Change the pixel size of a raster
    Resample {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        xres: f64,
        #[arg(long)]
        yres: f64,
        /// Kernel: near, bilinear, cubic, average, mode
        #[arg(long, default_value = "near")]
        method: String,
    },
    /// Warp a raster onto another raster's grid
    Match {
        input: PathBuf,
        /// Raster whose CRS, extent and size to use
        reference: PathBuf,
        output: PathBuf,
        /// Kernel: near, bilinear, cubic, average, mode
        #[arg(long, default_value = "near")]
        method: String,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path, None)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(GeoTiffOptions::default()))
        .context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))
}

fn parse_stack_op(s: &str) -> Result<StackOp> {
    match s.to_lowercase().as_str() {
        "sum" | "add" => Ok(StackOp::Sum),
        "mean" | "avg" => Ok(StackOp::Mean),
        "min" => Ok(StackOp::Min),
        "max" => Ok(StackOp::Max),
        _ => bail!("Unknown operation: {}. Use: sum, mean, min, max", s),
    }
}

fn parse_resampling(s: &str) -> Result<Resampling> {
    match s.to_lowercase().as_str() {
        "near" | "nearest" => Ok(Resampling::Nearest),
        "bilinear" => Ok(Resampling::Bilinear),
        "cubic" => Ok(Resampling::Cubic),
        "average" | "avg" => Ok(Resampling::Average),
        "mode" => Ok(Resampling::Mode),
        _ => bail!(
            "Unknown resampling: {}. Use: near, bilinear, cubic, average, mode",
            s
        ),
    }
}

fn parse_crs(s: &str) -> Result<CRS> {
    s.parse().with_context(|| format!("Invalid CRS: {}", s))
}

fn csv_options(args: &CsvArgs) -> Result<CsvPointOptions> {
    if !args.delimiter.is_ascii() {
        bail!("Delimiter must be a single ASCII character");
    }
    Ok(CsvPointOptions {
        delimiter: args.delimiter as u8,
        lon_lat_pos: (args.lon_col, args.lat_col),
        source_crs: parse_crs(&args.source_crs)?,
        target_crs: parse_crs(&args.target_crs)?,
    })
}

fn grid_params(args: &GridArgs) -> Result<RasterizeParams> {
    let method = match args.method.to_lowercase().as_str() {
        "idw" | "invdist" => GridMethod::InverseDistance {
            smoothing: args.smoothing,
        },
        "burn" => GridMethod::Burn,
        _ => bail!("Unknown grid method: {}. Use: idw, burn", args.method),
    };
    let extent = match args.extent.as_deref() {
        Some(&[min_x, min_y, max_x, max_y]) => Some(Bounds::new(min_x, min_y, max_x, max_y)),
        Some(_) => bail!("Extent needs min_x,min_y,max_x,max_y"),
        None => None,
    };
    Ok(RasterizeParams {
        xres: args.xres,
        yres: args.yres,
        method,
        extent,
        no_data: args.no_data,
        ..RasterizeParams::new(args.field.clone())
    })
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let tools = match cli.gdal_path {
        Some(dir) => GdalTools::new().bin_dir(dir),
        None => GdalTools::new(),
    };

    match cli.command {
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!("Bounds: {}", raster.bounds());
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }

        Commands::Reclassify {
            input,
            output,
            rules: rule_file,
            preset,
            no_data,
        } => {
            let loaded = match (rule_file, preset) {
                (Some(path), _) => rules::load_rules(&path)?,
                (None, Some(name)) => rules::preset(&name)?,
                (None, None) => bail!("Either --rules or --preset is required"),
            };
            let no_data = no_data.unwrap_or(loaded.no_data);
            info!("{} class rules, no-data code {}", loaded.rules.len(), no_data);

            let raster = read_raster(&input)?;
            let start = Instant::now();
            let result =
                reclassify(&raster, &loaded.rules, no_data).context("Failed to reclassify")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("Reclassified raster", &output, elapsed);
        }

        Commands::Stack {
            dir,
            output,
            pattern,
            op,
        } => {
            let op = parse_stack_op(&op)?;
            let pb = spinner("Reading rasters...");
            let stack = stack_rasters(&dir, &pattern).context("Failed to stack rasters")?;
            pb.finish_and_clear();
            info!("{} layers: {}", stack.len(), stack.names().join(", "));

            let start = Instant::now();
            let result = stack_arithmetic(&stack, op).context("Failed to combine stack")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("Stack", &output, elapsed);
        }

        Commands::Filter {
            mask,
            input,
            output,
            values,
        } => {
            let mask = read_raster(&mask)?;
            let raster = read_raster(&input)?;
            let start = Instant::now();
            let result =
                apply_raster_filter(&mask, &raster, &values).context("Failed to filter")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("Filtered raster", &output, elapsed);
        }

        Commands::Table {
            dir,
            output,
            pattern,
            exclude_years,
        } => {
            let options = TableOptions {
                pattern,
                exclude_years,
                ..Default::default()
            };
            let start = Instant::now();
            let pb = spinner("Building table...");
            let table = create_table(&dir, &options).context("Failed to build table")?;
            pb.finish_and_clear();
            table
                .write_csv(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Columns: {}", table.names().join(", "));
            done("Table", &output, start.elapsed());
        }

        // ── Vector ───────────────────────────────────────────────────
        Commands::Vector { operation } => match operation {
            VectorCommands::Clip {
                input,
                clip,
                output,
            } => {
                let start = Instant::now();
                tools
                    .clip_vector(&input, &clip, &output)
                    .context("Failed to clip layer")?;
                done("Clipped layer", &output, start.elapsed());
            }

            VectorCommands::ClipDir {
                input_dir,
                clip,
                out_dir,
            } => {
                ensure_dir(&out_dir)?;
                let start = Instant::now();
                let outputs = tools
                    .clip_vectors(&input_dir, &clip, &out_dir)
                    .context("Failed to clip layers")?;
                info!("{} layers clipped", outputs.len());
                done("Clipped layers", &out_dir, start.elapsed());
            }

            VectorCommands::Reproject {
                input,
                output,
                crs,
                like,
            } => {
                let start = Instant::now();
                let result = match (crs, like) {
                    (Some(crs), _) => tools.reproject_vector(&input, &output, &parse_crs(&crs)?),
                    (None, Some(reference)) => {
                        tools.reproject_vector_like(&input, &output, &reference)
                    }
                    (None, None) => bail!("Either --crs or --like is required"),
                };
                result.context("Failed to reproject layer")?;
                done("Reprojected layer", &output, start.elapsed());
            }

            VectorCommands::Csv2shp { input, output, csv } => {
                let options = csv_options(&csv)?;
                let start = Instant::now();
                let points = tools
                    .csv_to_shapefile(&input, &output, &options)
                    .context("Failed to convert table")?;
                info!("{} points, columns: {}", points.features.len(), points.columns.join(", "));
                done("Shapefile", &output, start.elapsed());
            }

            VectorCommands::Csv2shpDir {
                input_dir,
                out_dir,
                pattern,
                csv,
            } => {
                let options = csv_options(&csv)?;
                ensure_dir(&out_dir)?;
                let start = Instant::now();
                tools
                    .csvs_to_shapefiles(&input_dir, &out_dir, &pattern, &options)
                    .context("Failed to convert tables")?;
                done("Shapefiles", &out_dir, start.elapsed());
            }

            VectorCommands::Rasterize {
                input,
                output,
                grid,
            } => {
                let params = grid_params(&grid)?;
                let start = Instant::now();
                tools
                    .shapefile_to_raster(&input, &output, &params)
                    .context("Failed to rasterize layer")?;
                done("Raster", &output, start.elapsed());
            }

            VectorCommands::RasterizeDir {
                input_dir,
                out_dir,
                grid,
            } => {
                let params = grid_params(&grid)?;
                ensure_dir(&out_dir)?;
                let start = Instant::now();
                tools
                    .shapefiles_to_rasters(&input_dir, &out_dir, &params)
                    .context("Failed to rasterize layers")?;
                done("Rasters", &out_dir, start.elapsed());
            }
        },

        // ── Raster ───────────────────────────────────────────────────
        Commands::Raster { operation } => match operation {
            RasterCommands::Crop {
                input,
                cutline,
                output,
                no_data,
            } => {
                let start = Instant::now();
                tools
                    .crop_raster(&input, &cutline, &output, no_data)
                    .context("Failed to crop raster")?;
                done("Cropped raster", &output, start.elapsed());
            }

            RasterCommands::Resample {
                input,
                output,
                xres,
                yres,
                method,
            } => {
                let method = parse_resampling(&method)?;
                let start = Instant::now();
                tools
                    .resample_raster(&input, &output, xres, yres, method)
                    .context("Failed to resample raster")?;
                done("Resampled raster", &output, start.elapsed());
            }

            RasterCommands::Match {
                input,
                reference,
                output,
                method,
            } => {
                let method = parse_resampling(&method)?;
                let start = Instant::now();
                tools
                    .match_raster(&input, &reference, &output, method)
                    .context("Failed to match raster")?;
                done("Matched raster", &output, start.elapsed());
            }
        },
    }

    Ok(())
}
