use image::GrayImage;
use tracing::{debug, info, warn};

use crate::error::{Result, VideoError};
use crate::motion::types::DetectionConfig;
use crate::video::{Frame, FrameSource, DEFAULT_FPS};

/// Gaussian sigma matching a 21x21 kernel
pub const BLUR_SIGMA: f32 = 3.5;

/// Raw detector output, before segment building
#[derive(Debug, Clone, PartialEq)]
pub struct MotionFrames {
    /// Indices of frames flagged as motion, ascending
    pub frames: Vec<usize>,
    /// Length of the recording: the container's frame count or the decoded
    /// count, whichever is larger
    pub total_frames: usize,
    /// Frames actually decoded before the stream ended
    pub decoded_frames: usize,
    /// Decoding stopped on a read error rather than at end of stream
    pub truncated: bool,
    pub fps: f64,
    pub analyze_step: usize,
    /// Frames compared against a reference
    pub analyzed_frames: usize,
}

impl MotionFrames {
    fn empty(fps: f64, total_frames: usize, analyze_step: usize) -> Self {
        Self {
            frames: Vec::new(),
            total_frames,
            decoded_frames: 0,
            truncated: false,
            fps,
            analyze_step,
            analyzed_frames: 0,
        }
    }

    /// Motion frames over the frames the stride would sample, rounded to 2 decimals
    pub fn motion_percentage(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        let sampled = self.total_frames as f64 / self.analyze_step.max(1) as f64;
        let pct = self.frames.len() as f64 / sampled * 100.0;
        (pct.clamp(0.0, 100.0) * 100.0).round() / 100.0
    }
}

/// Grayscale frame differencing with a sliding reference
///
/// Every analyzed frame is compared to the previous *analyzed* frame, not to
/// a fixed baseline, so slow drift is ignored and continuous movement is
/// picked up.
pub struct MotionDetector {
    config: DetectionConfig,
}

impl MotionDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Scan the whole source and return the frames containing motion
    pub fn detect(&self, source: &mut dyn FrameSource) -> Result<MotionFrames> {
        let reported = source.metadata().clone();
        let fps = if reported.fps > 0.0 { reported.fps } else { DEFAULT_FPS };
        let step = self.config.analyze_step.max(1);

        let Some(first) = source.read_next()? else {
            debug!("Source has no frames, nothing to analyze");
            return Ok(MotionFrames::empty(fps, reported.frame_count, step));
        };

        let dimensions = first.dimensions();
        let total_pixels = first.pixel_count();
        let min_changed_pixels = (total_pixels as f64 * self.config.min_area_percent / 100.0) as usize;

        debug!("Motion threshold {} on {}x{}, need {} changed pixels, step {}",
               self.config.threshold, dimensions.0, dimensions.1, min_changed_pixels, step);

        let mut reference = prepare(&first);
        let mut motion_frames = Vec::new();
        let mut analyzed = 0usize;
        let mut index = 1usize;
        let mut truncated = false;

        loop {
            let frame = match source.read_next() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("Stopping motion analysis at frame {}: {}", index, e);
                    truncated = true;
                    break;
                }
            };

            if frame.dimensions() != dimensions {
                return Err(VideoError::DecodingFailed {
                    reason: format!("frame {} is {}x{}, stream started at {}x{}",
                                    index, frame.width(), frame.height(), dimensions.0, dimensions.1),
                }.into());
            }

            if index % step == 0 {
                let current = prepare(&frame);
                let changed = count_changed(&reference, &current, self.config.threshold);
                if changed >= min_changed_pixels {
                    motion_frames.push(index);
                }
                analyzed += 1;
                reference = current;
            }

            index += 1;
        }

        if truncated {
            warn!("Decoded only {} of {} reported frames", index, reported.frame_count);
        } else if reported.frame_count != 0 && reported.frame_count != index {
            debug!("Container reported {} frames, decoded {}", reported.frame_count, index);
        }

        info!("Analyzed {} of {} frames, {} with motion", analyzed, index, motion_frames.len());

        Ok(MotionFrames {
            frames: motion_frames,
            total_frames: index.max(reported.frame_count),
            decoded_frames: index,
            truncated,
            fps,
            analyze_step: step,
            analyzed_frames: analyzed,
        })
    }
}

/// Luma conversion followed by the noise-suppressing blur
fn prepare(frame: &Frame) -> GrayImage {
    image::imageops::blur(&frame.to_luma(), BLUR_SIGMA)
}

/// Pixels whose absolute difference exceeds `threshold`
fn count_changed(reference: &GrayImage, current: &GrayImage, threshold: u8) -> usize {
    reference
        .as_raw()
        .iter()
        .zip(current.as_raw())
        .filter(|(a, b)| a.abs_diff(**b) > threshold)
        .count()
}
