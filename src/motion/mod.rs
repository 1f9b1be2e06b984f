//! # Motion Analysis Module
//!
//! Classical pixel-difference motion detection over decoded frames, the
//! segment builder turning raw motion frames into padded activity windows,
//! and the brightness detector locating the welding arc.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use weldtrim::motion::{DetectionConfig, MotionDetector, SegmentBuilder};
//! use weldtrim::video::MemoryClip;
//!
//! # fn main() -> weldtrim::Result<()> {
//! let clip = MemoryClip::alternating(90, 64, 48, 30.0);
//! let config = DetectionConfig::default();
//!
//! let motion = MotionDetector::new(config.clone()).detect(&mut clip.source())?;
//! let segments = SegmentBuilder::new(&config).build(&motion.frames, motion.total_frames, motion.fps);
//!
//! println!("{} segments, {:.1}% motion", segments.len(), motion.motion_percentage());
//! # Ok(())
//! # }
//! ```

pub mod brightness;
pub mod detector;
pub mod segments;
pub mod types;

pub use brightness::{BrightRegion, BrightnessConfig, BrightnessCutFinder, BrightnessSample, BrightnessScan};
pub use detector::{MotionDetector, MotionFrames};
pub use segments::SegmentBuilder;
pub use types::{DetectionConfig, MotionAnalysisResult, MotionSegment};
