//! In-memory video backend.
//!
//! Clips are plain frame vectors, sinks collect frames and optionally mirror
//! the raw rgb24 bytes to disk so that file-size accounting behaves like a
//! real container. Used by the test suite and the synthetic clip tooling.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, VideoError};
use crate::video::source::{FrameSource, VideoBackend, VideoSink};
use crate::video::types::{Frame, OutputSpec, VideoMetadata};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A decoded clip held in memory
#[derive(Debug, Clone)]
pub struct MemoryClip {
    pub fps: f64,
    frames: Arc<Vec<Frame>>,
}

impl MemoryClip {
    pub fn new(fps: f64, frames: Vec<Frame>) -> Self {
        Self {
            fps,
            frames: Arc::new(frames),
        }
    }

    /// Every frame the same gray level
    pub fn solid(count: usize, width: u32, height: u32, level: u8, fps: f64) -> Self {
        Self::from_levels(&vec![level; count], width, height, fps)
    }

    /// Black and white frames alternating every frame
    pub fn alternating(count: usize, width: u32, height: u32, fps: f64) -> Self {
        let levels: Vec<u8> = (0..count).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
        Self::from_levels(&levels, width, height, fps)
    }

    /// One uniform gray frame per entry in `levels`
    pub fn from_levels(levels: &[u8], width: u32, height: u32, fps: f64) -> Self {
        let frames = levels
            .iter()
            .map(|&level| Frame::new_gray(width, height, level))
            .collect();
        Self::new(fps, frames)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn metadata(&self) -> VideoMetadata {
        let (width, height) = self.frames.first().map(Frame::dimensions).unwrap_or((0, 0));
        VideoMetadata {
            frame_count: self.frames.len(),
            fps: self.fps,
            width,
            height,
        }
    }

    /// Raw rgb24 bytes of the whole clip
    pub fn raw_bytes(&self) -> Vec<u8> {
        self.frames.iter().flat_map(|f| f.as_rgb_bytes().iter().copied()).collect()
    }

    pub fn source(&self) -> MemorySource {
        MemorySource {
            metadata: self.metadata(),
            frames: Arc::clone(&self.frames),
            position: 0,
            fail_at: None,
        }
    }
}

/// Frame source over a [`MemoryClip`]
#[derive(Debug)]
pub struct MemorySource {
    metadata: VideoMetadata,
    frames: Arc<Vec<Frame>>,
    position: usize,
    fail_at: Option<usize>,
}

impl MemorySource {
    /// Make `read_next` fail whenever it would return frame `frame_index`
    pub fn with_read_failure_at(mut self, frame_index: usize) -> Self {
        self.fail_at = Some(frame_index);
        self
    }

    /// Override the frame count the container claims to have
    pub fn with_reported_frame_count(mut self, frame_count: usize) -> Self {
        self.metadata.frame_count = frame_count;
        self
    }
}

impl FrameSource for MemorySource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.position) {
            return Err(VideoError::DecodingFailed {
                reason: format!("injected read failure at frame {}", self.position),
            }.into());
        }
        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }

    fn seek(&mut self, frame_index: usize) -> Result<()> {
        if frame_index > self.frames.len() {
            return Err(VideoError::DecodingFailed {
                reason: format!("seek to frame {} past end of stream ({})", frame_index, self.frames.len()),
            }.into());
        }
        self.position = frame_index;
        Ok(())
    }
}

/// Sink collecting frames in memory, optionally mirroring them to a file
#[derive(Debug)]
pub struct MemorySink {
    spec: OutputSpec,
    frames: Arc<Mutex<Vec<Frame>>>,
    file: Option<File>,
    fail_write_at: Option<usize>,
    reject_empty: bool,
    finished: bool,
}

impl MemorySink {
    pub fn new(spec: OutputSpec) -> Self {
        Self {
            spec,
            frames: Arc::new(Mutex::new(Vec::new())),
            file: None,
            fail_write_at: None,
            reject_empty: false,
            finished: false,
        }
    }

    /// Mirror every written frame to `path` as raw rgb24
    pub fn persisted(spec: OutputSpec, path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| VideoError::EncodingFailed {
            reason: format!("cannot create {}: {}", path.display(), e),
        })?;
        let mut sink = Self::new(spec);
        sink.file = Some(file);
        Ok(sink)
    }

    /// Fail the write of the `count`-th frame (0-based)
    pub fn with_write_failure_at(mut self, count: usize) -> Self {
        self.fail_write_at = Some(count);
        self
    }

    /// Fail `finish` when nothing was written, as ffmpeg does
    pub fn rejecting_empty(mut self) -> Self {
        self.reject_empty = true;
        self
    }

    pub fn frames(&self) -> Vec<Frame> {
        lock(&self.frames).clone()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl VideoSink for MemorySink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if self.finished {
            return Err(VideoError::EncodingFailed {
                reason: "sink already finished".to_string(),
            }.into());
        }
        if frame.dimensions() != (self.spec.width, self.spec.height) {
            return Err(VideoError::EncodingFailed {
                reason: format!("frame is {}x{}, output is {}x{}",
                                frame.width(), frame.height(), self.spec.width, self.spec.height),
            }.into());
        }

        let mut frames = lock(&self.frames);
        if self.fail_write_at == Some(frames.len()) {
            return Err(VideoError::EncodingFailed {
                reason: format!("injected write failure at frame {}", frames.len()),
            }.into());
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(frame.as_rgb_bytes())?;
        }
        frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.reject_empty && lock(&self.frames).is_empty() {
            return Err(VideoError::EncodingFailed {
                reason: "encoder received no frames".to_string(),
            }.into());
        }
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        self.finished = true;
        Ok(())
    }
}

/// Backend serving registered clips and recording what was written
#[derive(Debug, Default)]
pub struct MemoryBackend {
    clips: Mutex<HashMap<PathBuf, (MemoryClip, Option<usize>)>>,
    outputs: Mutex<HashMap<PathBuf, Arc<Mutex<Vec<Frame>>>>>,
    fail_write_at: Option<usize>,
    reject_empty: bool,
    fail_create: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every sink created by this backend fails on its `count`-th frame
    pub fn with_write_failure_at(mut self, count: usize) -> Self {
        self.fail_write_at = Some(count);
        self
    }

    /// Sinks created by this backend fail `finish` when they received no frames
    pub fn rejecting_empty_outputs(mut self) -> Self {
        self.reject_empty = true;
        self
    }

    /// Every `create` fails without touching the output path
    pub fn with_create_failure(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Register `clip` under `path` and write its raw bytes to disk there
    pub fn insert<P: AsRef<Path>>(&self, path: P, clip: MemoryClip) -> Result<()> {
        self.register(path.as_ref(), clip, None)
    }

    /// Like [`insert`](Self::insert) but reads of frame `frame_index` fail
    pub fn insert_with_read_failure<P: AsRef<Path>>(&self, path: P, clip: MemoryClip, frame_index: usize) -> Result<()> {
        self.register(path.as_ref(), clip, Some(frame_index))
    }

    fn register(&self, path: &Path, clip: MemoryClip, fail_at: Option<usize>) -> Result<()> {
        std::fs::write(path, clip.raw_bytes())?;
        lock(&self.clips).insert(path.to_path_buf(), (clip, fail_at));
        Ok(())
    }

    /// Frames written to `path` so far, if a sink was ever created there
    pub fn written<P: AsRef<Path>>(&self, path: P) -> Option<Vec<Frame>> {
        lock(&self.outputs)
            .get(path.as_ref())
            .map(|frames| lock(frames).clone())
    }
}

impl VideoBackend for MemoryBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        let clips = lock(&self.clips);
        let (clip, fail_at) = clips.get(path).ok_or_else(|| VideoError::DecodingFailed {
            reason: format!("{} is not a registered clip", path.display()),
        })?;

        let source = match fail_at {
            Some(index) => clip.source().with_read_failure_at(*index),
            None => clip.source(),
        };
        Ok(Box::new(source))
    }

    fn create(&self, path: &Path, spec: &OutputSpec) -> Result<Box<dyn VideoSink>> {
        if self.fail_create {
            return Err(VideoError::EncodingFailed {
                reason: format!("cannot start encoder for {}", path.display()),
            }.into());
        }
        let mut sink = MemorySink::persisted(spec.clone(), path)?;
        if let Some(count) = self.fail_write_at {
            sink = sink.with_write_failure_at(count);
        }
        if self.reject_empty {
            sink = sink.rejecting_empty();
        }
        lock(&self.outputs).insert(path.to_path_buf(), Arc::clone(&sink.frames));
        Ok(Box::new(sink))
    }
}
