use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use weldtrim::{
    config::{BrightnessSettings, DetectionSettings},
    video::FfmpegBackend,
    Config, MotionService,
};

#[derive(Parser)]
#[command(
    name = "weldtrim",
    version,
    about = "Trim welding inspection recordings down to the moments that matter",
    long_about = "Weldtrim detects motion in fixed-camera welding recordings, writes trimmed copies holding only the active segments, and extracts the post-processing footage that follows the welding arc."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory relative recording paths are resolved against
    #[arg(long, global = true)]
    recordings_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report motion segments of a recording
    Detect {
        input: PathBuf,
        #[command(flatten)]
        detection: DetectionArgs,
    },
    /// Write a copy holding only the motion segments
    Trim {
        input: PathBuf,
        /// Output file (defaults to `<stem>_trimmed.<ext>` next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keep only the longest segment
        #[arg(long)]
        longest_only: bool,
        #[command(flatten)]
        detection: DetectionArgs,
    },
    /// Write the footage that follows the welding arc
    PostProcess {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        brightness: BrightnessArgs,
    },
    /// Report the frame range of the welding arc
    WeldingWindow {
        input: PathBuf,
        #[command(flatten)]
        brightness: BrightnessArgs,
    },
    /// Analyze every recording in a directory
    Batch {
        dir: PathBuf,
        #[command(flatten)]
        detection: DetectionArgs,
    },
}

#[derive(Args)]
struct DetectionArgs {
    /// Pixel difference threshold (0-255)
    #[arg(long)]
    threshold: Option<i64>,

    /// Minimum changed area in percent of the frame
    #[arg(long)]
    min_area: Option<f64>,

    /// Minimum segment length in frames
    #[arg(long)]
    min_segment_frames: Option<i64>,

    /// Frames of context added around each segment
    #[arg(long)]
    padding: Option<i64>,

    /// Analyze every n-th frame
    #[arg(long)]
    step: Option<i64>,
}

impl From<DetectionArgs> for DetectionSettings {
    fn from(args: DetectionArgs) -> Self {
        Self {
            threshold: args.threshold,
            min_area_percent: args.min_area,
            min_segment_frames: args.min_segment_frames,
            padding_frames: args.padding,
            analyze_step: args.step,
            max_gap_seconds: None,
        }
    }
}

#[derive(Args)]
struct BrightnessArgs {
    /// Luma level above which a pixel counts as lit (0-255)
    #[arg(long)]
    brightness_threshold: Option<i64>,

    /// Share of lit pixels that makes a frame bright, in percent
    #[arg(long)]
    min_bright_percent: Option<f64>,
}

impl From<BrightnessArgs> for BrightnessSettings {
    fn from(args: BrightnessArgs) -> Self {
        Self::thresholds(args.brightness_threshold, args.min_bright_percent)
    }
}

#[derive(Serialize)]
struct BatchEntry {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    segments: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    motion_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct BatchReport {
    recordings: Vec<BatchEntry>,
}

#[derive(Serialize)]
struct WindowReport {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_frame: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_frame: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Weldtrim v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };
    if let Some(dir) = cli.recordings_dir {
        config.paths.recordings_dir = dir;
    }

    if !FfmpegBackend::check_ffmpeg_available() {
        warn!("ffmpeg was not found on PATH, video decoding will fail");
    }

    let service = MotionService::new(config);

    match cli.command {
        Command::Detect { input, detection } => {
            let analysis = service
                .detect_motion_async(input.clone(), detection.into())
                .await
                .with_context(|| format!("motion detection failed for {}", input.display()))?;
            print_toml(&analysis)?;
        }
        Command::Trim { input, output, longest_only, detection } => {
            let result = service
                .trim_to_motion_async(input.clone(), output, detection.into(), !longest_only)
                .await
                .with_context(|| format!("trimming failed for {}", input.display()))?;
            print_toml(&result)?;
        }
        Command::PostProcess { input, output, brightness } => {
            match service.trim_to_post_processing_async(input, output, brightness.into()).await {
                Ok(result) => print_toml(&result)?,
                Err(e) => {
                    error!("{}", e);
                    anyhow::bail!(e.user_message());
                }
            }
        }
        Command::WeldingWindow { input, brightness } => {
            let settings: BrightnessSettings = brightness.into();
            let region = service.find_welding_window(&input, &settings)?;
            print_toml(&WindowReport {
                found: region.is_some(),
                start_frame: region.map(|r| r.start_frame),
                end_frame: region.map(|r| r.end_frame),
            })?;
        }
        Command::Batch { dir, detection } => {
            let settings: DetectionSettings = detection.into();
            let results = tokio::task::spawn_blocking(move || service.detect_motion_batch(&dir, &settings))
                .await
                .context("batch worker panicked")??;

            let recordings = results
                .into_iter()
                .map(|(path, result)| match result {
                    Ok(analysis) => BatchEntry {
                        path: path.display().to_string(),
                        segments: Some(analysis.segments.len()),
                        motion_percentage: Some(analysis.motion_percentage),
                        error: None,
                    },
                    Err(e) => {
                        warn!("{}: {}", path.display(), e);
                        BatchEntry {
                            path: path.display().to_string(),
                            segments: None,
                            motion_percentage: None,
                            error: Some(e.user_message()),
                        }
                    }
                })
                .collect();
            print_toml(&BatchReport { recordings })?;
        }
    }

    Ok(())
}

fn print_toml<T: Serialize>(value: &T) -> Result<()> {
    let text = toml::to_string_pretty(value).context("failed to render report")?;
    println!("{}", text);
    Ok(())
}
