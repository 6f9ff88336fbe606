//! `fisheye`: calibrate a fisheye lens from checkerboard photos and
//! undistort an image.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{info, warn, LevelFilter};

use fisheye::{BorderMode, UndistortOptions};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

const SAMPLE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Parser)]
#[command(name = "fisheye")]
#[command(about = "Calibrate a fisheye lens from checkerboard photos and undistort an image")]
#[command(version)]
struct Cli {
    /// Distorted source image to correct.
    src: PathBuf,

    /// Destination path for the corrected image.
    dest: PathBuf,

    /// Directory of checkerboard sample photos (.jpg/.jpeg/.png/.webp).
    samples_dir: PathBuf,

    /// Interior corners across the checkerboard width.
    #[arg(value_parser = clap::value_parser!(u32).range(2..))]
    width: u32,

    /// Interior corners across the checkerboard height.
    #[arg(value_parser = clap::value_parser!(u32).range(2..))]
    height: u32,

    /// Output scale for the corrected image (1.0 keeps the source size).
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Write the calibration result (K, D, per-view residuals) as JSON.
    #[arg(long)]
    calib_out: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = fisheye::core::init_with_level(level);

    if let Err(err) = run(&cli) {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    let files = collect_samples(&cli.samples_dir)?;
    if files.is_empty() {
        return Err(format!("no images found in {}", cli.samples_dir.display()).into());
    }

    info!(
        "loading {} samples from {}",
        files.len(),
        cli.samples_dir.display()
    );
    let buffers: Vec<Vec<u8>> = files
        .iter()
        .map(fs::read)
        .collect::<Result<_, _>>()?;

    info!("calibrating...");
    let summary = fisheye::calibrate_images(&buffers, cli.width, cli.height)?;
    for sample in &summary.skipped {
        warn!(
            "skipped {}: {}",
            files[sample.index].display(),
            sample.reason
        );
    }
    let camera = summary.result.camera;
    info!(
        "calibration done ({}/{} samples, rms reprojection error {:.4} px)",
        summary.used_images, summary.total_images, summary.result.rms
    );
    info!(
        "K: fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        camera.k.fx, camera.k.fy, camera.k.cx, camera.k.cy
    );
    info!(
        "D: [{:+.6}, {:+.6}, {:+.6}, {:+.6}]",
        camera.d.k1, camera.d.k2, camera.d.k3, camera.d.k4
    );

    if let Some(path) = &cli.calib_out {
        fs::write(path, serde_json::to_vec_pretty(&summary.result)?)?;
        info!("calibration written to {}", path.display());
    }

    info!("undistorting {}", cli.src.display());
    let src_bytes = fs::read(&cli.src)?;
    let hint = cli
        .src
        .extension()
        .and_then(OsStr::to_str)
        .unwrap_or("png")
        .to_string();
    let corrected = fisheye::undistort_encoded(
        &src_bytes,
        &camera.k.to_matrix(),
        &camera.d.as_array(),
        &UndistortOptions {
            format_hint: hint,
            scale: cli.scale,
            border: BorderMode::default(),
        },
    )?;
    fs::write(&cli.dest, corrected)?;
    info!("saved to {}", cli.dest.display());

    Ok(())
}

/// Image files under `dir` with a supported extension, sorted for a
/// deterministic sample order.
fn collect_samples(dir: &Path) -> CliResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|err| format!("cannot read samples directory {}: {err}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(OsStr::to_str)
                .map(|ext| SAMPLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
