//! skydiff command-line interface.
//!
//! Runs transient detection on FITS frames against a reference image.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use ndarray::Array2;
use skydiff_algorithms::{
    detect_batch_with, difference_image, finite_values, sigma_clipped_stats, Detector,
    FrameFailure, ScienceFrame,
};
use skydiff_core::{Connectivity, DetectionConfig, Image, SigmaClipConfig};
use skydiff_io::{
    discover_fits_files, read_fits, EventFileWriter, EventFormat, FitsImageReader,
    FitsImageWriter,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    SkydiffIo(#[from] skydiff_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] skydiff_core::Error),

    #[error("no science frames given (use positional files or --science-dir)")]
    NoScienceFrames,

    #[error("unknown output format for {0} (expected .csv or .json)")]
    UnknownFormat(PathBuf),

    #[error("all {0} science frames failed")]
    AllFramesFailed(usize),
}

/// Pixel connectivity selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConnectivityArg {
    /// Edge neighbours only
    Four,
    /// Edge and corner neighbours
    Eight,
}

impl From<ConnectivityArg> for Connectivity {
    fn from(value: ConnectivityArg) -> Self {
        match value {
            ConnectivityArg::Four => Connectivity::Four,
            ConnectivityArg::Eight => Connectivity::Eight,
        }
    }
}

/// Transient detection by image differencing.
#[derive(Parser)]
#[command(name = "skydiff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect transients in science frames against a reference image
    Detect {
        /// Reference FITS image
        #[arg(short, long)]
        reference: PathBuf,

        /// Science FITS image(s)
        science: Vec<PathBuf>,

        /// Directory searched recursively for science frames
        #[arg(long)]
        science_dir: Option<PathBuf>,

        /// Output event file (.csv or .json)
        #[arg(short, long)]
        output: PathBuf,

        /// Significance threshold in units of the noise deviation
        #[arg(long, default_value = "5.0")]
        threshold_multiplier: f64,

        /// Minimum region area (pixels)
        #[arg(long, default_value = "10")]
        min_area: usize,

        /// Minimum signal-to-noise ratio
        #[arg(long, default_value = "10.0")]
        min_snr: f64,

        /// Edge margin excluded from detection (pixels)
        #[arg(long, default_value = "100")]
        border_size: usize,

        /// Pixel connectivity for region labeling
        #[arg(long, value_enum, default_value = "four")]
        connectivity: ConnectivityArg,

        /// Use this noise deviation instead of the estimated one
        #[arg(long)]
        noise_override: Option<f64>,

        /// Measure regions in parallel
        #[arg(long)]
        parallel: bool,

        /// Write each difference image to this directory
        #[arg(long)]
        difference_dir: Option<PathBuf>,
    },

    /// Show information about a FITS image
    Info {
        /// Input FITS file
        input: PathBuf,
    },

    /// Show noise statistics of a difference image
    Stats {
        /// Reference FITS image
        #[arg(short, long)]
        reference: PathBuf,

        /// Science FITS image
        science: PathBuf,

        /// Clipping threshold in standard deviations
        #[arg(long, default_value = "3.0")]
        sigma: f64,

        /// Maximum clipping passes
        #[arg(long, default_value = "5")]
        max_iterations: usize,

        /// Significance threshold in units of the noise deviation
        #[arg(long, default_value = "5.0")]
        threshold_multiplier: f64,
    },
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    let env = env_logger::Env::default().default_filter_or(log_level(verbose));
    env_logger::Builder::from_env(env).init();
}

fn stats_config(
    sigma: f64,
    max_iterations: usize,
    threshold_multiplier: f64,
) -> Result<DetectionConfig> {
    let config = DetectionConfig::new()
        .with_threshold_multiplier(threshold_multiplier)
        .with_sigma_clip(SigmaClipConfig {
            sigma,
            max_iterations,
            ..SigmaClipConfig::default()
        });
    config.validate()?;
    Ok(config)
}

fn load_frame(path: &Path) -> std::result::Result<ScienceFrame, FrameFailure> {
    let source = path.display().to_string();
    match read_fits(path) {
        Ok(image) => Ok(ScienceFrame::new(source, image)),
        Err(err) => Err(FrameFailure::new(source, err)),
    }
}

/// `<dir>/<sequence>_<stem>_diff.fits`; the sequence number keeps frames
/// with the same file name in different directories apart.
fn difference_path(dir: &Path, sequence: usize, source: &str) -> PathBuf {
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    dir.join(format!("{sequence:04}_{stem}_diff.fits"))
}

fn write_difference(path: &Path, frame: &ScienceFrame, difference: &Array2<f64>) {
    let mut image = Image::new(difference.clone()).with_metadata(frame.image.metadata.clone());
    image.wcs.clone_from(&frame.image.wcs);

    let result = FitsImageWriter::create(path).and_then(|mut w| w.write_image(&image));
    match result {
        Ok(()) => info!("Wrote difference image {}", path.display()),
        Err(err) => warn!("Failed to write {}: {err}", path.display()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Detect {
            reference,
            science,
            science_dir,
            output,
            threshold_multiplier,
            min_area,
            min_snr,
            border_size,
            connectivity,
            noise_override,
            parallel,
            difference_dir,
        } => {
            let format = EventFormat::from_path(&output)
                .ok_or_else(|| CliError::UnknownFormat(output.clone()))?;

            let mut paths = science;
            if let Some(dir) = &science_dir {
                paths.extend(discover_fits_files(dir)?);
            }
            if paths.is_empty() {
                return Err(CliError::NoScienceFrames);
            }

            let mut config = DetectionConfig::new()
                .with_threshold_multiplier(threshold_multiplier)
                .with_min_area(min_area)
                .with_min_snr(min_snr)
                .with_border_size(border_size)
                .with_connectivity(connectivity.into())
                .with_parallel(parallel)
                .with_keep_difference(difference_dir.is_some());
            if let Some(deviation) = noise_override {
                config = config.with_noise_override(deviation);
            }
            let detector = Detector::new(config)?;

            if let Some(dir) = &difference_dir {
                std::fs::create_dir_all(dir)?;
            }

            info!("Reference: {}", reference.display());
            let reference_image = read_fits(&reference)?;

            let start = Instant::now();
            let frames = paths.iter().map(|path| load_frame(path));
            let mut written = 0usize;
            let batch = detect_batch_with(&detector, &reference_image, frames, |frame, report| {
                if let (Some(dir), Some(difference)) = (&difference_dir, &report.difference) {
                    written += 1;
                    let path = difference_path(dir, written, &frame.source);
                    write_difference(&path, frame, difference);
                }
            });
            let elapsed = start.elapsed();

            let mut writer = EventFileWriter::create(&output)?;
            writer.write(&batch.events, format)?;

            println!(
                "Processed {} of {} frames in {:.2}s",
                batch.frames_processed,
                paths.len(),
                elapsed.as_secs_f64()
            );
            println!("Events: {}", batch.events.len());
            println!("Skipped regions: {}", batch.statistics.skipped.total());
            for failure in &batch.failures {
                println!("Failed: {} ({})", failure.source, failure.message);
            }
            println!("Wrote {}", output.display());

            if batch.frames_processed == 0 {
                return Err(CliError::AllFramesFailed(batch.failures.len()));
            }
        }

        Commands::Info { input } => {
            let mut reader = FitsImageReader::open(&input)?;
            let image = reader.read_image()?;
            let (rows, cols) = image.shape();
            let total = rows * cols;
            let invalid = image.non_finite_count();

            println!("File: {}", input.display());
            println!("BITPIX: {}", reader.bitpix().value());
            println!("Shape: {} x {} (rows x cols)", rows, cols);
            println!(
                "Non-finite pixels: {} ({:.2}%)",
                invalid,
                if total == 0 {
                    0.0
                } else {
                    100.0 * invalid as f64 / total as f64
                }
            );

            let meta = &image.metadata;
            if let Some(exposure) = meta.exposure_time {
                println!("Exposure: {} s", exposure);
            }
            if let Some(filter) = &meta.filter {
                println!("Filter: {}", filter);
            }
            if let Some(date) = &meta.date_obs {
                println!("Date: {}", date);
            }
            if let Some(unit) = &meta.unit {
                println!("Unit: {}", unit);
            }

            match &image.wcs {
                Some(wcs) => {
                    println!("WCS: TAN, {:.4} arcsec/pixel", wcs.pixel_scale_arcsec());
                    let (ra, dec) =
                        wcs.pixel_to_sky((cols as f64 - 1.0) / 2.0, (rows as f64 - 1.0) / 2.0);
                    println!("Center: RA {:.6}, Dec {:.6}", ra, dec);
                }
                None => println!("WCS: none"),
            }
        }

        Commands::Stats {
            reference,
            science,
            sigma,
            max_iterations,
            threshold_multiplier,
        } => {
            let config = stats_config(sigma, max_iterations, threshold_multiplier)?;

            let reference_image = read_fits(&reference)?;
            let science_image = read_fits(&science)?;
            let difference =
                difference_image(&reference_image.data.view(), &science_image.data.view())?;
            let values = finite_values(&difference.view());

            println!("Valid pixels: {} of {}", values.len(), difference.len());
            match sigma_clipped_stats(&values, &config.sigma_clip) {
                Some(noise) => {
                    println!("Mean: {}", noise.mean);
                    println!("Median: {}", noise.median);
                    println!("Deviation: {}", noise.deviation);
                    if noise.is_usable() {
                        println!("Threshold: {}", noise.threshold(config.threshold_multiplier));
                    } else {
                        println!("Threshold: undefined (degenerate noise)");
                    }
                }
                None => println!("All pixels are invalid"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_difference_path() {
        let path = difference_path(Path::new("/tmp/out"), 3, "night/frame_003.fits");
        assert_eq!(path, PathBuf::from("/tmp/out/0003_frame_003_diff.fits"));
    }

    #[test]
    fn test_difference_paths_unique_across_directories() {
        let dir = Path::new("/tmp/out");
        let first = difference_path(dir, 1, "night1/frame.fits");
        let second = difference_path(dir, 2, "night2/frame.fits");
        assert_ne!(first, second);
    }

    #[test]
    fn test_single_verbose_shows_debug() {
        assert_eq!(log_level(0), "warn");
        assert_eq!(log_level(1), "debug");
        assert_eq!(log_level(2), "trace");
        assert_eq!(log_level(7), "trace");
    }

    #[test]
    fn test_stats_config_validation() {
        let config = stats_config(2.5, 3, 4.0).unwrap();
        assert_eq!(config.sigma_clip.max_iterations, 3);
        assert!(matches!(
            stats_config(-3.0, 5, 5.0),
            Err(CliError::Core(skydiff_core::Error::ConfigError(_)))
        ));
        assert!(stats_config(3.0, 0, 5.0).is_err());
        assert!(stats_config(3.0, 5, f64::NAN).is_err());
    }

    #[test]
    fn test_parse_detect() {
        let cli = Cli::try_parse_from([
            "skydiff",
            "detect",
            "--reference",
            "ref.fits",
            "a.fits",
            "b.fits",
            "--output",
            "events.csv",
            "--connectivity",
            "eight",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Detect {
                science,
                connectivity,
                ..
            } => {
                assert_eq!(science.len(), 2);
                assert!(matches!(connectivity, ConnectivityArg::Eight));
            }
            _ => panic!("expected detect"),
        }
    }
}
