//! # Video Module
//!
//! Frame types and the decode/encode collaborators the engine talks to.

pub mod ffmpeg;
pub mod memory;
pub mod source;
pub mod types;

pub use ffmpeg::{FfmpegBackend, FfmpegSink, FfmpegSource};
pub use memory::{MemoryBackend, MemoryClip, MemorySink, MemorySource};
pub use source::{FrameSource, VideoBackend, VideoSink};
pub use types::{is_supported_video, Frame, OutputSpec, VideoMetadata, DEFAULT_FPS};
