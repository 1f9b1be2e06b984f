use tracing::{debug, info, warn};

use crate::error::Result;
use crate::motion::MotionSegment;
use crate::trim::types::TrimStats;
use crate::video::{FrameSource, VideoSink, DEFAULT_FPS};

/// Copies selected frame ranges from a source into a sink
///
/// Frames are copied verbatim. Read failures truncate the range being copied
/// and the job carries on; sink failures abort it. The reported frame count is
/// always what reached the sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct VideoTrimmer;

impl VideoTrimmer {
    pub fn new() -> Self {
        Self
    }

    /// Write every segment, in ascending start order, then close the sink
    pub fn write_segments(
        &self,
        source: &mut dyn FrameSource,
        segments: &[MotionSegment],
        sink: &mut dyn VideoSink,
    ) -> Result<TrimStats> {
        let fps = source_fps(source);
        let mut ordered: Vec<&MotionSegment> = segments.iter().collect();
        ordered.sort_by_key(|seg| seg.start_frame);

        let mut frames_written = 0;
        for (i, seg) in ordered.iter().enumerate() {
            let requested = seg.frame_count();
            let copied = self.copy_range(source, sink, seg.start_frame, Some(requested))?;
            if copied < requested {
                warn!("Segment {} ({}-{}) truncated: {} of {} frames",
                      i, seg.start_frame, seg.end_frame, copied, requested);
            } else {
                debug!("Segment {} ({}-{}): {} frames", i, seg.start_frame, seg.end_frame, copied);
            }
            frames_written += copied;
        }

        sink.finish()?;
        info!("Wrote {} frames from {} segments", frames_written, ordered.len());
        Ok(TrimStats::new(frames_written, fps))
    }

    /// Write everything from `start_frame` to the end of the stream, then close the sink
    pub fn write_from(
        &self,
        source: &mut dyn FrameSource,
        start_frame: usize,
        sink: &mut dyn VideoSink,
    ) -> Result<TrimStats> {
        let fps = source_fps(source);
        let frames_written = self.copy_range(source, sink, start_frame, None)?;

        sink.finish()?;
        info!("Wrote {} frames starting at frame {}", frames_written, start_frame);
        Ok(TrimStats::new(frames_written, fps))
    }

    /// Copy up to `limit` frames starting at `start`, returns how many were copied
    fn copy_range(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn VideoSink,
        start: usize,
        limit: Option<usize>,
    ) -> Result<usize> {
        if let Err(e) = source.seek(start) {
            warn!("Cannot seek to frame {}: {}", start, e);
            return Ok(0);
        }

        let mut copied = 0;
        while limit.map_or(true, |limit| copied < limit) {
            match source.read_next() {
                Ok(Some(frame)) => {
                    sink.write(&frame)?;
                    copied += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Read failed at frame {}: {}", start + copied, e);
                    break;
                }
            }
        }
        Ok(copied)
    }
}

fn source_fps(source: &dyn FrameSource) -> f64 {
    let fps = source.metadata().fps;
    if fps > 0.0 { fps } else { DEFAULT_FPS }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{Frame, MemoryClip, MemorySink, OutputSpec};

    fn numbered_clip(count: usize) -> MemoryClip {
        // Frame i carries gray level i so copies can be traced back
        let levels: Vec<u8> = (0..count).map(|i| i as u8).collect();
        MemoryClip::from_levels(&levels, 4, 4, 30.0)
    }

    fn sink_for(clip: &MemoryClip) -> MemorySink {
        MemorySink::new(OutputSpec::from(&clip.metadata()))
    }

    fn levels_of(frames: &[Frame]) -> Vec<u8> {
        frames.iter().map(|f| f.as_rgb_bytes()[0]).collect()
    }

    #[test]
    fn test_three_segments_totalling_150_frames() {
        let clip = numbered_clip(250);
        let segments = vec![
            MotionSegment::from_frames(0, 49, 30.0),
            MotionSegment::from_frames(100, 139, 30.0),
            MotionSegment::from_frames(180, 239, 30.0),
        ];
        let mut sink = sink_for(&clip);

        let stats = VideoTrimmer::new()
            .write_segments(&mut clip.source(), &segments, &mut sink)
            .unwrap();

        assert_eq!(stats.frames_written, 150);
        assert_eq!(stats.duration_seconds, 5.0);
        assert!(sink.is_finished());

        let written = levels_of(&sink.frames());
        assert_eq!(written[0], 0);
        assert_eq!(written[50], 100);
        assert_eq!(written[90], 180);
        assert_eq!(written[149], 239);
    }

    #[test]
    fn test_segments_are_written_in_ascending_order() {
        let clip = numbered_clip(40);
        let segments = vec![
            MotionSegment::from_frames(30, 31, 30.0),
            MotionSegment::from_frames(5, 6, 30.0),
        ];
        let mut sink = sink_for(&clip);
        VideoTrimmer::new().write_segments(&mut clip.source(), &segments, &mut sink).unwrap();
        assert_eq!(levels_of(&sink.frames()), vec![5, 6, 30, 31]);
    }

    #[test]
    fn test_read_failure_truncates_only_that_segment() {
        let clip = numbered_clip(100);
        let segments = vec![
            MotionSegment::from_frames(10, 19, 30.0),
            MotionSegment::from_frames(50, 59, 30.0),
        ];
        let mut source = clip.source().with_read_failure_at(15);
        let mut sink = sink_for(&clip);

        let stats = VideoTrimmer::new().write_segments(&mut source, &segments, &mut sink).unwrap();

        assert_eq!(stats.frames_written, 15);
        assert_eq!(sink.frames().len(), 15);
    }

    #[test]
    fn test_segment_past_end_of_stream() {
        let clip = numbered_clip(20);
        let segments = vec![
            MotionSegment::from_frames(15, 29, 30.0),
            MotionSegment::from_frames(40, 45, 30.0),
        ];
        let mut sink = sink_for(&clip);
        let stats = VideoTrimmer::new().write_segments(&mut clip.source(), &segments, &mut sink).unwrap();
        assert_eq!(stats.frames_written, 5);
    }

    #[test]
    fn test_sink_failure_aborts() {
        let clip = numbered_clip(20);
        let segments = vec![MotionSegment::from_frames(0, 19, 30.0)];
        let mut sink = sink_for(&clip).with_write_failure_at(3);
        let result = VideoTrimmer::new().write_segments(&mut clip.source(), &segments, &mut sink);
        assert!(result.is_err());
        assert!(!sink.is_finished());
    }

    #[test]
    fn test_write_from() {
        let clip = numbered_clip(60);
        let mut sink = sink_for(&clip);
        let stats = VideoTrimmer::new().write_from(&mut clip.source(), 45, &mut sink).unwrap();

        assert_eq!(stats.frames_written, 15);
        assert_eq!(stats.duration_seconds, 0.5);
        assert_eq!(levels_of(&sink.frames()).first(), Some(&45));
    }

    #[test]
    fn test_write_from_end_writes_nothing() {
        let clip = numbered_clip(10);
        let mut sink = sink_for(&clip);
        let stats = VideoTrimmer::new().write_from(&mut clip.source(), 10, &mut sink).unwrap();
        assert_eq!(stats.frames_written, 0);
        assert!(sink.is_finished());
    }
}
