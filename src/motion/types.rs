use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// A contiguous, padded and merged range of frames containing motion
///
/// Frames are 0-based and inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionSegment {
    pub start_frame: usize,
    pub end_frame: usize,
    pub start_time_ms: f64,
    pub end_time_ms: f64,
    pub duration_ms: f64,
}

impl MotionSegment {
    /// Build a segment and derive its timestamps from `fps`
    pub fn from_frames(start_frame: usize, end_frame: usize, fps: f64) -> Self {
        debug_assert!(start_frame <= end_frame);
        Self {
            start_frame,
            end_frame,
            start_time_ms: frame_to_ms(start_frame, fps),
            end_time_ms: frame_to_ms(end_frame, fps),
            duration_ms: frame_to_ms(end_frame - start_frame, fps),
        }
    }

    /// Number of frames covered, both ends included
    pub fn frame_count(&self) -> usize {
        self.end_frame - self.start_frame + 1
    }
}

fn frame_to_ms(frames: usize, fps: f64) -> f64 {
    frames as f64 / fps * 1000.0
}

/// Outcome of a motion analysis over one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionAnalysisResult {
    pub filename: String,
    /// Container frame count, or the decoded count when larger
    pub total_frames: usize,
    /// Frames that could actually be decoded
    pub decoded_frames: usize,
    /// Decoding failed before the end of the stream, segments only cover
    /// the decoded prefix
    pub truncated: bool,
    pub fps: f64,
    pub duration_seconds: f64,
    pub segments: Vec<MotionSegment>,
    /// Motion frames over the frames sampled at the analysis stride, 0-100
    pub motion_percentage: f64,
}

impl MotionAnalysisResult {
    pub fn has_motion(&self) -> bool {
        !self.segments.is_empty()
    }

    /// Longest segment by duration, the earliest one wins ties
    pub fn longest_segment(&self) -> Option<&MotionSegment> {
        self.segments.iter().fold(None, |best: Option<&MotionSegment>, seg| match best {
            Some(b) if b.duration_ms >= seg.duration_ms => Some(b),
            _ => Some(seg),
        })
    }

    /// Frames covered by all segments
    pub fn motion_frame_total(&self) -> usize {
        self.segments.iter().map(MotionSegment::frame_count).sum()
    }
}

/// Tuning for the pixel-difference motion detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Per-pixel luma difference that counts as a change
    pub threshold: u8,

    /// Minimum share of changed pixels (0-100) for a motion frame
    pub min_area_percent: f64,

    /// Padded runs shorter than this are dropped as noise
    pub min_segment_frames: usize,

    /// Frames added before and after each run
    pub padding_frames: usize,

    /// Analyze every n-th frame
    pub analyze_step: usize,

    /// Gap between motion frames still joined into one run, in seconds
    pub max_gap_seconds: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 25,
            min_area_percent: 0.5,
            min_segment_frames: 5,
            padding_frames: 30,
            analyze_step: 1,
            max_gap_seconds: 0.5,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.min_area_percent) {
            return Err(ConfigError::InvalidValue {
                key: "detection.min_area_percent".to_string(),
                value: self.min_area_percent.to_string(),
            }.into());
        }

        if self.analyze_step == 0 {
            return Err(ConfigError::InvalidValue {
                key: "detection.analyze_step".to_string(),
                value: self.analyze_step.to_string(),
            }.into());
        }

        if !(self.max_gap_seconds >= 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "detection.max_gap_seconds".to_string(),
                value: self.max_gap_seconds.to_string(),
            }.into());
        }

        Ok(())
    }

    /// Largest frame gap still joining two motion frames into one run
    pub fn max_gap_frames(&self, fps: f64) -> usize {
        (fps * self.max_gap_seconds).floor().max(0.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_timestamps() {
        let seg = MotionSegment::from_frames(30, 90, 30.0);
        assert_eq!(seg.start_time_ms, 1000.0);
        assert_eq!(seg.end_time_ms, 3000.0);
        assert_eq!(seg.duration_ms, 2000.0);
        assert_eq!(seg.frame_count(), 61);
    }

    #[test]
    fn test_longest_segment_prefers_earliest_on_tie() {
        let result = MotionAnalysisResult {
            filename: "a.mp4".to_string(),
            total_frames: 300,
            decoded_frames: 300,
            truncated: false,
            fps: 30.0,
            duration_seconds: 10.0,
            segments: vec![
                MotionSegment::from_frames(0, 10, 30.0),
                MotionSegment::from_frames(50, 80, 30.0),
                MotionSegment::from_frames(100, 130, 30.0),
            ],
            motion_percentage: 20.0,
        };
        assert_eq!(result.longest_segment().unwrap().start_frame, 50);
        assert_eq!(result.motion_frame_total(), 11 + 31 + 31);
    }

    #[test]
    fn test_detection_config_validation() {
        assert!(DetectionConfig::default().validate().is_ok());

        let config = DetectionConfig { min_area_percent: 120.0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = DetectionConfig { analyze_step: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = DetectionConfig { max_gap_seconds: f64::NAN, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_gap_frames() {
        let config = DetectionConfig::default();
        assert_eq!(config.max_gap_frames(30.0), 15);
        assert_eq!(config.max_gap_frames(25.0), 12);
        assert_eq!(config.max_gap_frames(59.94), 29);
    }
}
