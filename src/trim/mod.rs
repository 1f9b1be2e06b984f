//! # Trim Module
//!
//! Writes new containers holding only the selected frame ranges of a
//! recording and reports exact output statistics.

pub mod trimmer;
pub mod types;

pub use trimmer::VideoTrimmer;
pub use types::{SizeReport, TrimResult, TrimStats, TrimStatus};
