//! # Weldtrim
//!
//! Find the moments that matter in fixed-camera welding inspection recordings.
//!
//! This library detects motion in a recording with classical frame
//! differencing, groups it into padded activity segments, and writes trimmed
//! copies holding only those segments. It can also locate the welding arc by
//! its brightness and extract the post-processing footage that follows it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use weldtrim::{config::DetectionSettings, Config, MotionService};
//!
//! # fn main() -> weldtrim::Result<()> {
//! let service = MotionService::new(Config::default());
//!
//! let analysis = service.detect_motion("weld_01.mp4", &DetectionSettings::default())?;
//! println!("{} segments, {:.1}% motion", analysis.segments.len(), analysis.motion_percentage);
//!
//! let result = service.trim_to_motion("weld_01.mp4", None, &DetectionSettings::default(), true)?;
//! println!("{:?}", result.output_path);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - Frame sources and sinks (ffmpeg subprocess and in-memory)
//! - [`motion`] - Motion detection, segment building and brightness analysis
//! - [`trim`] - Writing selected frame ranges to a new container
//! - [`service`] - Request-level operations with validation and reporting
//! - [`config`] - Configuration management and per-request overrides
//!
//! ## Custom Backends
//!
//! Decoding and encoding go through the [`VideoBackend`](video::VideoBackend)
//! trait, so the analysis can run on any frame provider:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weldtrim::{video::{MemoryBackend, MemoryClip}, Config, MotionService};
//!
//! # fn main() -> weldtrim::Result<()> {
//! let backend = Arc::new(MemoryBackend::new());
//! backend.insert("clip.raw", MemoryClip::alternating(90, 64, 48, 30.0))?;
//!
//! let service = MotionService::with_backend(Config::default(), backend);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod motion;
pub mod service;
pub mod trim;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{Result, WeldTrimError},
    service::MotionService,
};
