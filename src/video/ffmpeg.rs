use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::{Result, VideoError};
use crate::video::source::{FrameSource, VideoBackend, VideoSink};
use crate::video::types::{Frame, OutputSpec, VideoMetadata, DEFAULT_FPS};

/// Backend driving the external `ffmpeg` / `ffprobe` binaries
///
/// Frames travel as raw rgb24 over pipes, which keeps seeking frame-exact
/// regardless of the container's keyframe layout.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    codec: String,
    quality: u8,
}

impl FfmpegBackend {
    pub fn new<S: Into<String>>(codec: S, quality: u8) -> Self {
        Self {
            codec: codec.into(),
            quality: quality.min(100),
        }
    }

    pub fn check_ffmpeg_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Query stream dimensions, rate and frame count with ffprobe
    pub fn probe(path: &Path) -> Result<VideoMetadata> {
        let output = Command::new("ffprobe")
            .args([
                "-v", "error",
                "-select_streams", "v:0",
                "-show_entries", "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames:format=duration",
                "-of", "default=noprint_wrappers=1",
            ])
            .arg(path)
            .output()
            .map_err(|e| VideoError::DecodingFailed {
                reason: format!("ffprobe execution failed: {}", e),
            })?;

        if !output.status.success() {
            return Err(VideoError::DecodingFailed {
                reason: format!("ffprobe could not open {}", path.display()),
            }.into());
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let metadata = parse_probe_output(&text).ok_or_else(|| VideoError::DecodingFailed {
            reason: format!("{}: no video stream", path.display()),
        })?;

        info!("Video metadata: {}x{} @ {:.1}fps, {} frames",
              metadata.width, metadata.height, metadata.fps, metadata.frame_count);
        Ok(metadata)
    }

    fn quality_args(&self) -> [String; 2] {
        match self.codec.as_str() {
            "libx264" | "h264" | "libx265" => {
                let crf = (51 - ((self.quality as f32 / 100.0) * 51.0) as u8).clamp(0, 51);
                ["-crf".to_string(), crf.to_string()]
            }
            _ => {
                let qscale = (31 - ((self.quality as f32 / 100.0) * 30.0) as u8).clamp(1, 31);
                ["-q:v".to_string(), qscale.to_string()]
            }
        }
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("mpeg4", 85)
    }
}

impl VideoBackend for FfmpegBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegSource::open(path)?))
    }

    fn create(&self, path: &Path, spec: &OutputSpec) -> Result<Box<dyn VideoSink>> {
        Ok(Box::new(FfmpegSink::create(path, spec, &self.codec, self.quality_args())?))
    }
}

/// Parse `key=value` lines printed by ffprobe
fn parse_probe_output(text: &str) -> Option<VideoMetadata> {
    let mut width = None;
    let mut height = None;
    let mut avg_rate = None;
    let mut real_rate = None;
    let mut nb_frames = None;
    let mut duration = None;

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = value.parse::<u32>().ok(),
            "height" => height = value.parse::<u32>().ok(),
            "avg_frame_rate" => avg_rate = parse_rate(value),
            "r_frame_rate" => real_rate = parse_rate(value),
            "nb_frames" => nb_frames = value.parse::<usize>().ok(),
            "duration" => duration = value.parse::<f64>().ok(),
            _ => {}
        }
    }

    let fps = avg_rate.or(real_rate).filter(|fps| *fps > 0.0).unwrap_or(DEFAULT_FPS);
    let frame_count = nb_frames
        .or_else(|| duration.map(|d| (d * fps).round() as usize))
        .unwrap_or(0);

    Some(VideoMetadata {
        frame_count,
        fps,
        width: width.filter(|w| *w > 0)?,
        height: height.filter(|h| *h > 0)?,
    })
}

/// Parse an ffprobe rational such as `30000/1001`
fn parse_rate(value: &str) -> Option<f64> {
    match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den != 0.0 { Some(num / den) } else { None }
        }
        None => value.parse().ok(),
    }
}

/// Read up to `buf.len()` bytes, returning how many arrived before EOF
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

struct Decoder {
    child: Child,
    stdout: ChildStdout,
}

impl Decoder {
    fn spawn(path: &Path) -> Result<Self> {
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-vsync", "passthrough", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VideoError::DecodingFailed {
                reason: format!("Failed to spawn ffmpeg decoder: {}", e),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| VideoError::DecodingFailed {
            reason: "ffmpeg decoder has no stdout".to_string(),
        })?;

        Ok(Self { child, stdout })
    }

    fn shutdown(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Frame source decoding through an `ffmpeg` child process
pub struct FfmpegSource {
    path: PathBuf,
    metadata: VideoMetadata,
    decoder: Option<Decoder>,
    position: usize,
    buffer: Vec<u8>,
}

impl FfmpegSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = FfmpegBackend::probe(&path)?;
        let decoder = Decoder::spawn(&path)?;
        let buffer = vec![0u8; metadata.frame_size()];

        Ok(Self {
            path,
            metadata,
            decoder: Some(decoder),
            position: 0,
            buffer,
        })
    }

    fn restart(&mut self) -> Result<()> {
        if let Some(decoder) = self.decoder.take() {
            decoder.shutdown();
        }
        debug!("Restarting decoder for {}", self.path.display());
        self.decoder = Some(Decoder::spawn(&self.path)?);
        self.position = 0;
        Ok(())
    }

    fn read_raw(&mut self) -> Result<bool> {
        let decoder = self.decoder.as_mut().ok_or_else(|| VideoError::DecodingFailed {
            reason: "decoder already closed".to_string(),
        })?;

        let filled = read_full(&mut decoder.stdout, &mut self.buffer)
            .map_err(|e| VideoError::DecodingFailed {
                reason: format!("read failed at frame {}: {}", self.position, e),
            })?;

        if filled == 0 {
            let status = decoder.child.wait().map_err(|e| VideoError::DecodingFailed {
                reason: format!("ffmpeg decoder wait failed: {}", e),
            })?;
            if !status.success() {
                return Err(VideoError::DecodingFailed {
                    reason: format!("ffmpeg exited with {} on {}", status, self.path.display()),
                }.into());
            }
            return Ok(false);
        }

        if filled < self.buffer.len() {
            return Err(VideoError::DecodingFailed {
                reason: format!("truncated frame {} ({} of {} bytes)", self.position, filled, self.buffer.len()),
            }.into());
        }

        self.position += 1;
        Ok(true)
    }
}

impl FrameSource for FfmpegSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if !self.read_raw()? {
            return Ok(None);
        }
        let frame = Frame::from_rgb_bytes(self.metadata.width, self.metadata.height, self.buffer.clone())
            .ok_or_else(|| VideoError::DecodingFailed {
                reason: "frame buffer does not match stream dimensions".to_string(),
            })?;
        Ok(Some(frame))
    }

    fn seek(&mut self, frame_index: usize) -> Result<()> {
        if frame_index < self.position {
            self.restart()?;
        }
        while self.position < frame_index {
            if !self.read_raw()? {
                return Err(VideoError::DecodingFailed {
                    reason: format!("seek to frame {} past end of stream ({})", frame_index, self.position),
                }.into());
            }
        }
        Ok(())
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            decoder.shutdown();
        }
    }
}

/// Video sink encoding through an `ffmpeg` child process
pub struct FfmpegSink {
    path: PathBuf,
    spec: OutputSpec,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl FfmpegSink {
    fn create(path: &Path, spec: &OutputSpec, codec: &str, quality_args: [String; 2]) -> Result<Self> {
        if spec.width == 0 || spec.height == 0 || spec.fps <= 0.0 {
            return Err(VideoError::InvalidParameters {
                details: format!("{}x{} @ {}fps", spec.width, spec.height, spec.fps),
            }.into());
        }

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-y", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", spec.width, spec.height)])
            .args(["-r", &spec.fps.to_string()])
            .args(["-i", "-", "-c:v", codec])
            .args(&quality_args)
            .args(["-pix_fmt", "yuv420p"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VideoError::EncodingFailed {
                reason: format!("Failed to spawn ffmpeg encoder: {}", e),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| VideoError::EncodingFailed {
            reason: "ffmpeg encoder has no stdin".to_string(),
        })?;

        debug!("Encoding {} with {} at {}x{} @ {:.2}fps",
               path.display(), codec, spec.width, spec.height, spec.fps);

        Ok(Self {
            path: path.to_path_buf(),
            spec: spec.clone(),
            child: Some(child),
            stdin: Some(stdin),
        })
    }
}

impl VideoSink for FfmpegSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != (self.spec.width, self.spec.height) {
            return Err(VideoError::EncodingFailed {
                reason: format!("frame is {}x{}, output is {}x{}",
                                frame.width(), frame.height(), self.spec.width, self.spec.height),
            }.into());
        }

        let stdin = self.stdin.as_mut().ok_or_else(|| VideoError::EncodingFailed {
            reason: "encoder already finished".to_string(),
        })?;

        stdin.write_all(frame.as_rgb_bytes()).map_err(|e| VideoError::EncodingFailed {
            reason: format!("ffmpeg encoder rejected frame: {}", e),
        })?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // Closing stdin signals end of input
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait().map_err(|e| VideoError::EncodingFailed {
            reason: format!("ffmpeg encoder wait failed: {}", e),
        })?;

        if !status.success() {
            return Err(VideoError::EncodingFailed {
                reason: format!("ffmpeg exited with {} writing {}", status, self.path.display()),
            }.into());
        }
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            warn!("Encoder for {} dropped before finish, killing it", self.path.display());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
