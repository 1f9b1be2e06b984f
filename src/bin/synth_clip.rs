// Generates a synthetic welding inspection clip for trying out the pipeline

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::info;

use weldtrim::video::{FfmpegBackend, Frame, OutputSpec, VideoBackend, VideoSink};

#[derive(Parser)]
#[command(name = "synth_clip", about = "Write a synthetic welding recording")]
struct Cli {
    /// Output video file
    output: PathBuf,

    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    #[arg(long, default_value_t = 320)]
    width: u32,

    #[arg(long, default_value_t = 240)]
    height: u32,

    /// Output codec passed to ffmpeg
    #[arg(long, default_value = "mpeg4")]
    codec: String,
}

/// Phases of a recorded weld, in seconds
const TIMELINE: [(Phase, f64); 6] = [
    (Phase::Idle, 2.0),
    (Phase::Setup, 2.0),
    (Phase::Arc, 3.0),
    (Phase::Cooldown, 1.0),
    (Phase::Inspection, 2.0),
    (Phase::Idle, 2.0),
];

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Setup,
    Arc,
    Cooldown,
    Inspection,
}

const BACKGROUND: u8 = 60;

fn render(phase: Phase, tick: usize, width: u32, height: u32) -> Frame {
    let mut frame = Frame::new_gray(width, height, BACKGROUND);
    match phase {
        Phase::Idle => {}
        Phase::Setup | Phase::Inspection => {
            // A hand-sized block sweeping across the workpiece
            let size = (width.min(height) / 4).max(1);
            let span = width.saturating_sub(size).max(1);
            let x0 = (tick as u32 * 6) % span;
            let y0 = height / 2 - size / 2;
            fill(&mut frame, x0, y0, size, size, [200, 170, 140]);
        }
        Phase::Arc => {
            let size = (width.min(height) / 3).max(1);
            let level = if tick % 3 == 0 { 255 } else { 235 };
            fill(&mut frame, width / 2 - size / 2, height / 2 - size / 2, size, size, [level, level, level]);
        }
        Phase::Cooldown => {
            let size = (width.min(height) / 6).max(1);
            fill(&mut frame, width / 2 - size / 2, height / 2 - size / 2, size, size, [140, 60, 20]);
        }
    }
    frame
}

fn fill(frame: &mut Frame, x0: u32, y0: u32, w: u32, h: u32, color: [u8; 3]) {
    for y in y0..(y0 + h).min(frame.height()) {
        for x in x0..(x0 + w).min(frame.width()) {
            frame.set_pixel(x, y, color);
        }
    }
}

fn write_clip(backend: &dyn VideoBackend, path: &Path, spec: &OutputSpec) -> Result<usize> {
    let mut sink: Box<dyn VideoSink> = backend.create(path, spec)?;
    let mut written = 0;

    for (phase, seconds) in TIMELINE {
        let frames = (seconds * spec.fps).round() as usize;
        info!("{:?}: {} frames starting at {}", phase, frames, written);
        for tick in 0..frames {
            sink.write(&render(phase, tick, spec.width, spec.height))?;
            written += 1;
        }
    }

    sink.finish()?;
    Ok(written)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let cli = Cli::parse();
    if !FfmpegBackend::check_ffmpeg_available() {
        anyhow::bail!("ffmpeg is required to encode the clip");
    }

    let spec = OutputSpec { fps: cli.fps, width: cli.width, height: cli.height };
    let backend = FfmpegBackend::new(cli.codec, 85);
    let written = write_clip(&backend, &cli.output, &spec)?;

    println!("Wrote {} frames to {}", written, cli.output.display());
    Ok(())
}
