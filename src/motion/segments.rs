use tracing::debug;

use crate::motion::types::{DetectionConfig, MotionSegment};

/// Turns sparse motion frame indices into padded, merged segments
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    padding_frames: usize,
    min_segment_frames: usize,
    max_gap_seconds: f64,
}

impl SegmentBuilder {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            padding_frames: config.padding_frames,
            min_segment_frames: config.min_segment_frames,
            max_gap_seconds: config.max_gap_seconds,
        }
    }

    /// Group, pad, filter and merge
    ///
    /// The result is sorted by `start_frame`, pairwise disjoint and clamped to
    /// `[0, total_frames - 1]`.
    pub fn build(&self, motion_frames: &[usize], total_frames: usize, fps: f64) -> Vec<MotionSegment> {
        if motion_frames.is_empty() || total_frames == 0 || fps <= 0.0 {
            return Vec::new();
        }

        let max_gap = (fps * self.max_gap_seconds).floor().max(0.0) as usize;
        let mut frames = motion_frames.iter().copied().filter(|&f| f < total_frames);

        let Some(first) = frames.next() else {
            return Vec::new();
        };

        let mut padded = Vec::new();
        let (mut start, mut end) = (first, first);

        for frame in frames {
            if frame.saturating_sub(end) <= max_gap {
                end = end.max(frame);
            } else {
                padded.extend(self.pad_run(start, end, total_frames, fps));
                start = frame;
                end = frame;
            }
        }
        padded.extend(self.pad_run(start, end, total_frames, fps));

        let merged = self.merge(padded, fps);
        debug!("Built {} segments from {} motion frames (gap tolerance {} frames)",
               merged.len(), motion_frames.len(), max_gap);
        merged
    }

    /// Pad a raw run and drop it if it is still too short
    fn pad_run(&self, start: usize, end: usize, total_frames: usize, fps: f64) -> Option<MotionSegment> {
        let seg_start = start.saturating_sub(self.padding_frames);
        let seg_end = (end + self.padding_frames).min(total_frames - 1);

        if seg_end - seg_start < self.min_segment_frames {
            debug!("Dropping short run {}-{}", seg_start, seg_end);
            return None;
        }
        Some(MotionSegment::from_frames(seg_start, seg_end, fps))
    }

    /// Merge segments whose start lies within `padding_frames` of the previous end
    ///
    /// Expects segments in ascending start order. Idempotent.
    pub fn merge(&self, segments: Vec<MotionSegment>, fps: f64) -> Vec<MotionSegment> {
        let mut merged: Vec<MotionSegment> = Vec::with_capacity(segments.len());

        for seg in segments {
            match merged.last_mut() {
                Some(last) if seg.start_frame <= last.end_frame + self.padding_frames => {
                    let end = last.end_frame.max(seg.end_frame);
                    *last = MotionSegment::from_frames(last.start_frame, end, fps);
                }
                _ => merged.push(seg),
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(padding_frames: usize, min_segment_frames: usize) -> SegmentBuilder {
        SegmentBuilder::new(&DetectionConfig {
            padding_frames,
            min_segment_frames,
            ..Default::default()
        })
    }

    fn assert_invariants(segments: &[MotionSegment], total_frames: usize) {
        for seg in segments {
            assert!(seg.start_frame <= seg.end_frame);
            assert!(seg.end_frame <= total_frames - 1);
        }
        for pair in segments.windows(2) {
            assert!(pair[0].end_frame < pair[1].start_frame, "{:?} overlaps", pair);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(builder(30, 5).build(&[], 100, 30.0).is_empty());
        assert!(builder(30, 5).build(&[1, 2], 0, 30.0).is_empty());
    }

    #[test]
    fn test_padding_clamps_at_zero() {
        let segments = builder(30, 5).build(&[0, 1, 2], 300, 30.0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_frame, 0);
        assert_eq!(segments[0].end_frame, 32);
        assert_eq!(segments[0].start_time_ms, 0.0);
    }

    #[test]
    fn test_padding_clamps_at_end() {
        let segments = builder(30, 5).build(&[95, 99], 100, 30.0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_frame, 65);
        assert_eq!(segments[0].end_frame, 99);
    }

    #[test]
    fn test_gap_tolerance_is_half_a_second() {
        // 15 frame gap at 30fps joins, 16 does not
        let joined = builder(0, 0).build(&[10, 25], 100, 30.0);
        assert_eq!(joined.len(), 1);
        assert_eq!((joined[0].start_frame, joined[0].end_frame), (10, 25));

        let split = builder(0, 0).build(&[10, 26], 100, 30.0);
        assert_eq!(split.len(), 2);
    }

    #[test]
    fn test_short_runs_are_dropped() {
        // Without padding a lone frame spans 0 frames
        let segments = builder(0, 5).build(&[10, 50, 51, 52, 53, 54, 55], 100, 30.0);
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].start_frame, segments[0].end_frame), (50, 55));
    }

    #[test]
    fn test_padded_runs_merge() {
        // Runs 20 frames apart are separate runs but their padding touches
        let segments = builder(10, 5).build(&[100, 120], 300, 30.0);
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].start_frame, segments[0].end_frame), (90, 130));
        assert_eq!(segments[0].duration_ms, 40.0 / 30.0 * 1000.0);
    }

    #[test]
    fn test_distant_runs_stay_separate() {
        let segments = builder(30, 5).build(&[40, 45, 51, 150, 161, 260, 271], 300, 30.0);
        assert_eq!(segments.len(), 3);
        assert_eq!((segments[0].start_frame, segments[0].end_frame), (10, 81));
        assert_eq!((segments[1].start_frame, segments[1].end_frame), (120, 191));
        assert_eq!((segments[2].start_frame, segments[2].end_frame), (230, 299));
        assert_invariants(&segments, 300);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let b = builder(30, 5);
        let motion: Vec<usize> = vec![5, 6, 7, 60, 61, 130, 200, 201, 202, 203, 290];
        let once = b.build(&motion, 300, 30.0);
        let twice = b.merge(once.clone(), 30.0);
        assert_eq!(once, twice);
        assert_invariants(&once, 300);
    }

    #[test]
    fn test_invariants_over_many_patterns() {
        let b = builder(12, 3);
        for seed in 1..40usize {
            let motion: Vec<usize> = (0..500).filter(|i| (i * seed) % 37 < 3 || i % (seed + 20) == 0).collect();
            let segments = b.build(&motion, 500, 25.0);
            assert_invariants(&segments, 500);
            assert_eq!(b.merge(segments.clone(), 25.0), segments);
        }
    }

    #[test]
    fn test_out_of_range_frames_are_ignored() {
        let segments = builder(2, 0).build(&[3, 4, 500], 10, 30.0);
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].start_frame, segments[0].end_frame), (1, 6));
    }
}
