//! Greenstack CLI - Sentinel-2 band stacking and green-space mapping

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use greenstack_algorithms::classification::{
    predict_green_space, CentroidClassifier, MedianSplit, NdviThreshold, PixelClassifier,
    PredictionSummary, ThresholdParams,
};
use greenstack_algorithms::clip::clip_raster;
use greenstack_algorithms::landcover::{summarize_landcover, LandCoverSummary};
use greenstack_algorithms::mosaic::mosaic;
use greenstack_algorithms::stack::{
    stack_periods, stack_single, BandSource, MissingBandPolicy, Period, PeriodInput,
    StackOutcome, StackParams,
};
use greenstack_core::io::{read_band_f32, read_stack, write_geotiff, write_stack, GeoTiffOptions};
use greenstack_core::{Aoi, BandStack, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "greenstack")]
#[command(author, version, about = "Sentinel-2 band stacking and green-space mapping", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use only the first feature of every AOI file
    #[arg(long, global = true)]
    first_feature: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster or band stack
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Normalise an AOI GeoJSON to EPSG:4326 and summarise it
    Aoi {
        /// GeoJSON file
        input: PathBuf,
    },
    /// Clip every band of a raster to an AOI
    Clip {
        /// Input raster file
        input: PathBuf,
        /// AOI GeoJSON file
        aoi: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Build a 7-band stack (B02, B03, B04, B08, NDVI, EVI, SAVI) for one scene
    Indices {
        /// Directory holding the band files (searched recursively)
        #[arg(short, long)]
        dir: PathBuf,
        /// AOI GeoJSON file
        #[arg(short, long)]
        aoi: PathBuf,
        /// Output file
        output: PathBuf,
        /// Fail when a band file is missing instead of skipping it
        #[arg(long)]
        strict: bool,
    },
    /// Build a multi-period stack, 7 bands per period
    Stack {
        /// Period and its band directory, e.g. april=/data/S2_2024-04 (up to 3)
        #[arg(short, long = "period", value_parser = parse_period, required = true)]
        periods: Vec<(Period, PathBuf)>,
        /// AOI GeoJSON file
        #[arg(short, long)]
        aoi: PathBuf,
        /// Output file
        output: PathBuf,
        /// Fail when a band file is missing instead of skipping it
        #[arg(long)]
        strict: bool,
    },
    /// Classify green space in a band stack
    Predict {
        /// Input band stack
        input: PathBuf,
        /// Output label raster (1 green, 0 not green, NaN no data)
        output: PathBuf,
        /// Pre-trained centroid model (JSON)
        #[arg(short, long)]
        model: Option<PathBuf>,
        /// NDVI threshold when no model is given
        #[arg(short, long, default_value = "0.3")]
        threshold: f32,
        /// Split on the median of the first band instead of NDVI
        #[arg(long, conflicts_with = "model")]
        median: bool,
        /// Write the summary as JSON to this file
        #[arg(short, long)]
        summary: Option<PathBuf>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Merge co-gridded tiles, optionally clipped to an AOI
    Mosaic {
        /// Output file
        output: PathBuf,
        /// Input tiles, earlier tiles win where they overlap
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// AOI GeoJSON file
        #[arg(short, long)]
        aoi: Option<PathBuf>,
    },
    /// Summarise ESA WorldCover classes
    Landcover {
        /// WorldCover raster
        input: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn json_output(&self) -> bool {
        matches!(
            self,
            Commands::Predict { json: true, .. } | Commands::Landcover { json: true, .. }
        )
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a global tracing subscriber was already set");
    }
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

fn parse_period(s: &str) -> std::result::Result<(Period, PathBuf), String> {
    let (name, dir) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <month>=<dir>, got '{}'", s))?;
    let period = name.parse::<Period>().map_err(|e| e.to_string())?;
    Ok((period, PathBuf::from(dir)))
}

fn read_aoi(path: &Path, first_feature: bool) -> Result<Aoi> {
    let mut aoi = Aoi::from_geojson_file(path)
        .with_context(|| format!("Failed to read AOI {}", path.display()))?;
    if first_feature {
        aoi = aoi.first_only();
    }
    info!(
        "AOI: {} polygon(s) from {} feature(s)",
        aoi.polygon_count(),
        aoi.feature_count()
    );
    Ok(aoi)
}

fn read_bands(path: &Path) -> Result<BandStack> {
    let pb = spinner("Reading raster...");
    let stack = read_stack(path).with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    let (rows, cols) = stack.shape();
    info!("Input: {} x {}, {} band(s)", cols, rows, stack.len());
    Ok(stack)
}

fn write_bands(stack: &BandStack, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_stack(stack, path, Some(GeoTiffOptions::default()))
        .context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn write_result(raster: &Raster<f32>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(GeoTiffOptions::default()))
        .context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn stack_params(strict: bool) -> StackParams {
    StackParams {
        policy: if strict {
            MissingBandPolicy::Fail
        } else {
            MissingBandPolicy::Skip
        },
        ..StackParams::default()
    }
}

fn report_stack(outcome: &StackOutcome) {
    for missing in &outcome.missing {
        if missing.period.is_empty() {
            warn!("Missing band {}", missing.band);
        } else {
            warn!("Missing band {} for {}", missing.band, missing.period);
        }
    }
    let (rows, cols) = outcome.stack.shape();
    println!("Bands: {} ({} x {})", outcome.stack.len(), cols, rows);
    println!("  {}", outcome.stack.labels().join(", "));
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn print_prediction(summary: &PredictionSummary) {
    println!("Green space prediction ({} bands, {})", summary.n_bands, summary.dimensions);
    println!("  Green pixels: {}", summary.green_pixels);
    println!("  Valid pixels: {}", summary.total_pixels);
    println!("  Green coverage: {:.1}%", summary.green_percentage);
}

fn print_landcover(summary: &LandCoverSummary) {
    println!("Land cover distribution:");
    for class in &summary.classes {
        println!(
            "  {:.<30} {:>10} pixels ({:>5.2}%)",
            class.name, class.pixels, class.percentage
        );
    }
    if summary.nodata_pixels > 0 {
        println!("  {:.<30} {:>10} pixels", "No data", summary.nodata_pixels);
    }
    println!(
        "  {:.<30} {:>10} pixels ({:>5.2}%)",
        "Total green (10,20,30,95)", summary.green_pixels, summary.green_percentage
    );
    println!(
        "  {:.<30} {:>10} pixels ({:>5.2}%)",
        "Non-green", summary.non_green_pixels, summary.non_green_percentage
    );
}

/// Failure report printed on stdout when JSON output was requested
fn error_json(e: &anyhow::Error) -> serde_json::Value {
    serde_json::json!({ "error": format!("{:#}", e) })
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run(command: Commands, first_feature: bool) -> Result<()> {
    match command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let stack = read_bands(&input)?;
            let Some(first) = stack.band(0) else {
                bail!("{} has no bands", input.display());
            };
            let (rows, cols) = first.shape();
            let bounds = first.bounds();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, first.len());
            println!("Bands: {}", stack.len());
            println!("Cell size: {}", first.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = stack.crs() {
                println!("CRS: {}", crs);
            }

            println!("\nStatistics:");
            for (label, band) in stack.iter() {
                let stats = band.statistics();
                let fmt = |v: Option<f64>| v.map_or("-".to_string(), |v| format!("{:.4}", v));
                println!(
                    "  {:<12} min {}  max {}  mean {}  valid {} ({:.1}%)",
                    label,
                    fmt(stats.min.map(f64::from)),
                    fmt(stats.max.map(f64::from)),
                    fmt(stats.mean),
                    stats.valid_count,
                    100.0 * stats.valid_count as f64 / band.len().max(1) as f64
                );
            }
        }

        // ── AOI ──────────────────────────────────────────────────────
        Commands::Aoi { input } => {
            let aoi = read_aoi(&input, first_feature)?;
            println!("AOI: {}", input.display());
            println!("CRS: {}", aoi.crs());
            println!("Features: {}", aoi.feature_count());
            println!("Polygons: {}", aoi.polygon_count());
            if let Some((min_x, min_y, max_x, max_y)) = aoi.bounds() {
                println!(
                    "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                    min_x, min_y, max_x, max_y
                );
            }
        }

        // ── Clip ─────────────────────────────────────────────────────
        Commands::Clip { input, aoi, output } => {
            let stack = read_bands(&input)?;
            let aoi = read_aoi(&aoi, first_feature)?;
            let start = Instant::now();

            let mut clipped = BandStack::new();
            for (label, band) in stack.iter() {
                let band = clip_raster(band, &aoi)
                    .with_context(|| format!("Failed to clip band {}", label))?;
                clipped.push(label, band)?;
            }
            let elapsed = start.elapsed();
            let (rows, cols) = clipped.shape();
            info!("Clipped: {} x {}", cols, rows);
            write_bands(&clipped, &output)?;
            done("Clipped raster", &output, elapsed);
        }

        // ── Indices ──────────────────────────────────────────────────
        Commands::Indices {
            dir,
            aoi,
            output,
            strict,
        } => {
            let aoi = read_aoi(&aoi, first_feature)?;
            let start = Instant::now();
            let pb = spinner("Stacking bands...");
            let outcome = stack_single(&BandSource::Directory(dir), &aoi, &stack_params(strict))
                .context("Failed to build band stack")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();
            report_stack(&outcome);
            write_bands(&outcome.stack, &output)?;
            done("Band stack", &output, elapsed);
        }

        // ── Stack ────────────────────────────────────────────────────
        Commands::Stack {
            periods,
            aoi,
            output,
            strict,
        } => {
            let aoi = read_aoi(&aoi, first_feature)?;
            let inputs: Vec<PeriodInput> = periods
                .into_iter()
                .map(|(period, dir)| PeriodInput::new(period, BandSource::Directory(dir)))
                .collect();

            let start = Instant::now();
            let pb = spinner("Stacking periods...");
            let outcome = stack_periods(&inputs, &aoi, &stack_params(strict))
                .context("Failed to build multi-period stack")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            let names: Vec<&str> = outcome.periods.iter().map(Period::key).collect();
            println!("Periods: {}", names.join(", "));
            report_stack(&outcome);
            write_bands(&outcome.stack, &output)?;
            done("Multi-period stack", &output, elapsed);
        }

        // ── Predict ──────────────────────────────────────────────────
        Commands::Predict {
            input,
            output,
            model,
            threshold,
            median,
            summary,
            json,
        } => {
            let stack = read_bands(&input)?;

            let classifier: Box<dyn PixelClassifier> = if let Some(path) = model {
                let model = CentroidClassifier::from_json_file(&path)
                    .with_context(|| format!("Failed to load model {}", path.display()))?;
                info!("Using centroid model with {} classes", model.classes().len());
                Box::new(model)
            } else if median {
                let split = MedianSplit::from_stack(&stack)
                    .context("Failed to compute the median split")?;
                info!("Using median split at {:.4}", split.median());
                Box::new(split)
            } else {
                let clf = NdviThreshold::new(stack.len(), ThresholdParams { threshold })?;
                info!(
                    "Using NDVI threshold {} on bands {:?}",
                    threshold,
                    clf.offsets()
                );
                Box::new(clf)
            };

            let start = Instant::now();
            let pb = spinner("Classifying...");
            let prediction = predict_green_space(&stack, classifier.as_ref())
                .context("Failed to classify stack")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            write_result(&prediction.labels, &output)?;
            if let Some(path) = summary {
                let text = serde_json::to_string_pretty(&prediction.summary)?;
                std::fs::write(&path, text)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }

            if json {
                println!("{}", serde_json::to_string(&prediction.summary)?);
            } else {
                print_prediction(&prediction.summary);
                done("Prediction", &output, elapsed);
            }
        }

        // ── Mosaic ───────────────────────────────────────────────────
        Commands::Mosaic {
            output,
            inputs,
            aoi,
        } => {
            let aoi = aoi
                .as_deref()
                .map(|p| read_aoi(p, first_feature))
                .transpose()?;
            let pb = spinner("Reading tiles...");
            let tiles = inputs
                .iter()
                .map(|p| read_band_f32(p).with_context(|| format!("Failed to read {}", p.display())))
                .collect::<Result<Vec<_>>>()?;
            pb.finish_and_clear();

            let start = Instant::now();
            let mut merged = mosaic(&tiles).context("Failed to mosaic tiles")?;
            if let Some(aoi) = &aoi {
                merged = clip_raster(&merged, aoi).context("Failed to clip mosaic")?;
            }
            let elapsed = start.elapsed();
            info!("Mosaic: {} x {}", merged.cols(), merged.rows());
            write_result(&merged, &output)?;
            done("Mosaic", &output, elapsed);
        }

        // ── Land cover ───────────────────────────────────────────────
        Commands::Landcover { input, json } => {
            let raster = read_band_f32(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let summary = summarize_landcover(&raster);
            if json {
                println!("{}", serde_json::to_string(&summary)?);
            } else {
                print_landcover(&summary);
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let json = cli.command.json_output();
    match run(cli.command, cli.first_feature) {
        Ok(()) => Ok(()),
        Err(e) if json => {
            error!("{:#}", e);
            println!("{}", error_json(&e));
            std::process::exit(1);
        }
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}
