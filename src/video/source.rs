use std::path::Path;

use crate::error::Result;
use crate::video::types::{Frame, OutputSpec, VideoMetadata};

/// A decoded, seekable stream of frames
///
/// Implementations own their decoder for their whole lifetime and release it
/// on drop, on every exit path.
pub trait FrameSource: Send {
    /// Stream facts reported when the source was opened
    fn metadata(&self) -> &VideoMetadata;

    /// Decode the next frame, `Ok(None)` at end of stream
    fn read_next(&mut self) -> Result<Option<Frame>>;

    /// Position the stream so the next `read_next` returns frame `frame_index`
    fn seek(&mut self, frame_index: usize) -> Result<()>;
}

/// An output container accepting frames in presentation order
pub trait VideoSink: Send {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the container. Writing after `finish` is an error.
    fn finish(&mut self) -> Result<()>;
}

/// Factory for sources and sinks
///
/// The engine only talks to video files through this trait, so the decoding
/// stack can be swapped (subprocess ffmpeg in production, memory in tests).
pub trait VideoBackend: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>>;

    fn create(&self, path: &Path, spec: &OutputSpec) -> Result<Box<dyn VideoSink>>;
}
