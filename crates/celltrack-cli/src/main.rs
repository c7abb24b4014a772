//! celltrack CLI — label, split, consolidate and track segmented cells.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use celltrack::{
    Cell3d, CellTrackConfig, CellTracker, LabelTrackDiagnostics, OverlapMode, Pixel, Plane,
    SegmentationStats, TrackingResult, Volume,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "celltrack")]
#[command(about = "Assign 3D identities to segmented cells and track them through time")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment every time point of a manifest and track the cells.
    Track(CliTrackArgs),

    /// Post-process a single time point of a manifest.
    Segment(CliSegmentArgs),

    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CliInputArgs {
    /// Path to the input manifest (JSON).
    #[arg(long)]
    manifest: PathBuf,

    /// Path to a configuration file (JSON). Missing fields keep defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the z-labeling distance threshold (microns).
    #[arg(long)]
    distance_th_z: Option<f64>,

    /// Override the pixel size in xy (microns), for labeling and tracking.
    #[arg(long)]
    xy_resolution: Option<f64>,

    /// Override the overlap normalization.
    #[arg(long, value_enum)]
    overlap_mode: Option<OverlapModeArg>,

    /// Override the maximum frame-to-frame match distance (microns).
    #[arg(long)]
    max_match_distance: Option<f64>,
}

#[derive(Debug, Clone, Args)]
struct CliTrackArgs {
    #[command(flatten)]
    input: CliInputArgs,

    /// Path to write tracking results (JSON).
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct CliSegmentArgs {
    #[command(flatten)]
    input: CliInputArgs,

    /// Time point to process.
    #[arg(long, default_value = "0")]
    time: usize,

    /// Path to write labels, 3D cells and diagnostics (JSON).
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OverlapModeArg {
    Relative,
    Absolute,
}

impl From<OverlapModeArg> for OverlapMode {
    fn from(arg: OverlapModeArg) -> Self {
        match arg {
            OverlapModeArg::Relative => OverlapMode::Relative,
            OverlapModeArg::Absolute => OverlapMode::Absolute,
        }
    }
}

/// Input description: per time point, per plane, an image and its outlines.
#[derive(Debug, Deserialize)]
struct Manifest {
    times: Vec<ManifestTime>,
}

#[derive(Debug, Deserialize)]
struct ManifestTime {
    planes: Vec<ManifestPlane>,
}

#[derive(Debug, Deserialize)]
struct ManifestPlane {
    /// Raw plane image, relative to the manifest directory.
    image: PathBuf,
    #[serde(default)]
    outlines: Vec<Vec<Pixel>>,
}

#[derive(Serialize)]
struct TrackReport<'a> {
    config: &'a CellTrackConfig,
    stats: &'a [SegmentationStats],
    tracking: &'a TrackingResult,
}

#[derive(Serialize)]
struct SegmentReport<'a> {
    time: usize,
    stats: &'a SegmentationStats,
    labels: Vec<Vec<usize>>,
    cells_3d: &'a [Cell3d],
    diagnostics: &'a [LabelTrackDiagnostics],
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track(args) => run_track(&args),
        Commands::Segment(args) => run_segment(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

fn load_config(args: &CliInputArgs) -> CliResult<CellTrackConfig> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading config: {}", path.display());
            CellTrackConfig::from_json_file(path)?
        }
        None => CellTrackConfig::default(),
    };
    if let Some(v) = args.distance_th_z {
        config.segmentation.distance_th_z = v;
    }
    if let Some(v) = args.xy_resolution {
        config.segmentation.xy_resolution = v;
        config.tracking.xy_resolution = v;
    }
    if let Some(mode) = args.overlap_mode {
        config.segmentation.overlap_mode = mode.into();
    }
    if let Some(v) = args.max_match_distance {
        config.tracking.max_match_distance = v;
    }
    config.validate()?;
    Ok(config)
}

fn load_manifest(path: &Path) -> CliResult<Manifest> {
    tracing::info!("Loading manifest: {}", path.display());
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn load_stack(time: &ManifestTime, base: &Path, config: &CellTrackConfig) -> CliResult<Vec<Plane>> {
    time.planes
        .iter()
        .map(|plane| -> CliResult<Plane> {
            let image_path = base.join(&plane.image);
            let image = image::open(&image_path)?.to_luma8();
            tracing::debug!(
                "Plane {}: {} outlines, {}x{}",
                image_path.display(),
                plane.outlines.len(),
                image.width(),
                image.height()
            );
            Ok(Plane::from_outlines(
                &plane.outlines,
                &image,
                config.segmentation.min_outline_length,
            ))
        })
        .collect()
}

fn manifest_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn run_track(args: &CliTrackArgs) -> CliResult<()> {
    let config = load_config(&args.input)?;
    let manifest = load_manifest(&args.input.manifest)?;
    let base = manifest_dir(&args.input.manifest);

    let stacks = manifest
        .times
        .iter()
        .map(|time| load_stack(time, &base, &config))
        .collect::<CliResult<Vec<_>>>()?;
    tracing::info!("Loaded {} time points", stacks.len());

    let tracker = CellTracker::run(stacks, config);
    let report = TrackReport {
        config: tracker.config(),
        stats: tracker.stats(),
        tracking: tracker.tracking(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!(
        "Tracked {} time points, {} track ids; results written to {}",
        tracker.n_times(),
        tracker.tracking().next_track_id(),
        args.out.display()
    );
    Ok(())
}

fn run_segment(args: &CliSegmentArgs) -> CliResult<()> {
    let config = load_config(&args.input)?;
    let manifest = load_manifest(&args.input.manifest)?;
    let base = manifest_dir(&args.input.manifest);

    let time = manifest.times.get(args.time).ok_or_else(|| {
        format!(
            "time point {} out of range (manifest has {})",
            args.time,
            manifest.times.len()
        )
    })?;
    let planes = load_stack(time, &base, &config)?;
    let (volume, stats) = Volume::segment(planes, config.segmentation);

    let report = SegmentReport {
        time: args.time,
        stats: &stats,
        labels: (0..volume.n_planes())
            .map(|z| volume.labels(z).unwrap_or_default())
            .collect(),
        cells_3d: volume.cells_3d(),
        diagnostics: volume.diagnostics(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!(
        "{} labels at time {}; results written to {}",
        stats.n_labels,
        args.time,
        args.out.display()
    );
    Ok(())
}

fn run_default_config() -> CliResult<()> {
    let json = serde_json::to_string_pretty(&CellTrackConfig::default())?;
    println!("{}", json);
    Ok(())
}
