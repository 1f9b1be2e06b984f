use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};
use crate::video::{Frame, FrameSource};

/// Tuning for the welding-arc brightness detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessConfig {
    /// Luma above which a pixel counts as lit by the arc
    pub threshold: u8,

    /// Share of lit pixels (0-100) a frame needs to count as bright
    pub min_bright_percent: f64,

    /// Dim frames tolerated inside the bright region
    pub gap_tolerance_frames: usize,

    /// Bright frames a region needs before it counts as a weld
    pub min_region_frames: usize,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            threshold: 150,
            min_bright_percent: 2.0,
            gap_tolerance_frames: 10,
            min_region_frames: 3,
        }
    }
}

impl BrightnessConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.min_bright_percent) {
            return Err(ConfigError::InvalidValue {
                key: "brightness.min_bright_percent".to_string(),
                value: self.min_bright_percent.to_string(),
            }.into());
        }

        if self.min_region_frames == 0 {
            return Err(ConfigError::InvalidValue {
                key: "brightness.min_region_frames".to_string(),
                value: self.min_region_frames.to_string(),
            }.into());
        }

        Ok(())
    }
}

/// Per-frame brightness measurements
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessSample {
    pub mean_luma: f64,
    /// Share of pixels above the threshold, 0-100
    pub bright_percent: f64,
}

/// The detected welding arc, inclusive frame range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrightRegion {
    pub start_frame: usize,
    pub end_frame: usize,
}

impl BrightRegion {
    /// First frame after the arc
    pub fn cut_frame(&self) -> usize {
        self.end_frame + 1
    }
}

/// Outcome of one brightness pass over a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessScan {
    pub region: Option<BrightRegion>,
    /// Frames read before the scan stopped
    pub frames_scanned: usize,
}

impl BrightnessScan {
    /// Whether any frame follows the arc
    pub fn has_frames_after_region(&self) -> bool {
        self.region.map_or(false, |region| region.cut_frame() < self.frames_scanned)
    }
}

/// Finds where the welding arc ends
///
/// The weld is modeled as one contiguous bright region. Dips of up to
/// `gap_tolerance_frames` dim frames do not end it. The first region with at
/// least `min_region_frames` bright frames wins.
pub struct BrightnessCutFinder {
    config: BrightnessConfig,
}

impl BrightnessCutFinder {
    pub fn new(config: BrightnessConfig) -> Self {
        Self { config }
    }

    pub fn sample(&self, frame: &Frame) -> BrightnessSample {
        let luma = frame.to_luma();
        let pixels = luma.as_raw();
        if pixels.is_empty() {
            return BrightnessSample { mean_luma: 0.0, bright_percent: 0.0 };
        }

        let sum: u64 = pixels.iter().map(|&p| p as u64).sum();
        let lit = pixels.iter().filter(|&&p| p > self.config.threshold).count();

        BrightnessSample {
            mean_luma: sum as f64 / pixels.len() as f64,
            bright_percent: lit as f64 / pixels.len() as f64 * 100.0,
        }
    }

    pub fn is_bright(&self, sample: &BrightnessSample) -> bool {
        sample.bright_percent > self.config.min_bright_percent
    }

    /// Scan until the first sufficiently long bright region has ended
    pub fn find_region(&self, source: &mut dyn FrameSource) -> Result<Option<BrightRegion>> {
        Ok(self.scan(source)?.region)
    }

    /// Like [`find_region`](Self::find_region), also reporting how far the scan got
    pub fn scan(&self, source: &mut dyn FrameSource) -> Result<BrightnessScan> {
        let mut current: Option<(BrightRegion, usize)> = None;
        let mut index = 0usize;

        loop {
            let frame = match source.read_next() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) if index > 0 => {
                    warn!("Stopping brightness scan at frame {}: {}", index, e);
                    break;
                }
                Err(e) => return Err(e),
            };

            let sample = self.sample(&frame);
            if self.is_bright(&sample) {
                current = match current {
                    Some((region, count)) => Some((BrightRegion { end_frame: index, ..region }, count + 1)),
                    None => {
                        debug!("Bright frame at {} (mean luma {:.1}, {:.2}% lit)",
                               index, sample.mean_luma, sample.bright_percent);
                        Some((BrightRegion { start_frame: index, end_frame: index }, 1))
                    }
                };
            } else if let Some((region, count)) = current {
                if index - region.end_frame > self.config.gap_tolerance_frames {
                    if count >= self.config.min_region_frames {
                        info!("Welding arc at frames {}-{}", region.start_frame, region.end_frame);
                        return Ok(BrightnessScan { region: Some(region), frames_scanned: index + 1 });
                    }
                    debug!("Ignoring short bright flash at {}-{}", region.start_frame, region.end_frame);
                    current = None;
                }
            }

            index += 1;
        }

        let region = current
            .filter(|(_, count)| *count >= self.config.min_region_frames)
            .map(|(region, _)| region);

        match region {
            Some(region) => info!("Welding arc at frames {}-{} (runs to end of stream)",
                                  region.start_frame, region.end_frame),
            None => info!("No welding arc in {} frames", index),
        }
        Ok(BrightnessScan { region, frames_scanned: index })
    }

    /// First frame after the welding arc, `None` when no arc was found
    pub fn find_post_processing_start(&self, source: &mut dyn FrameSource) -> Result<Option<usize>> {
        Ok(self.find_region(source)?.map(|region| region.cut_frame()))
    }
}
