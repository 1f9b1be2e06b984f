use image::{GrayImage, ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Frame rate assumed when the container does not report one
pub const DEFAULT_FPS: f64 = 30.0;

/// Represents a single decoded video frame
///
/// Thin wrapper around an RGB image buffer. Frames are copied verbatim
/// from source to sink, the engine never edits pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgb(color));
        Self { buffer }
    }

    /// Create a gray frame where every channel carries `level`
    pub fn new_gray(width: u32, height: u32, level: u8) -> Self {
        Self::new_filled(width, height, [level, level, level])
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Width and height as a tuple
    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Number of pixels in the frame
    pub fn pixel_count(&self) -> usize {
        self.buffer.width() as usize * self.buffer.height() as usize
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Single-channel luma version of the frame
    pub fn to_luma(&self) -> GrayImage {
        image::imageops::grayscale(&self.buffer)
    }

    /// Raw interleaved RGB bytes
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }
}

/// Container-level facts about a video stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Frame count as reported by the container (may be 0 when unknown)
    pub frame_count: usize,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoMetadata {
    /// Size in bytes of one rgb24 frame
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Duration implied by the frame count
    pub fn duration_seconds(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// Parameters for a new output container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl From<&VideoMetadata> for OutputSpec {
    fn from(metadata: &VideoMetadata) -> Self {
        Self {
            fps: metadata.fps,
            width: metadata.width,
            height: metadata.height,
        }
    }
}

/// Check if a path has a video extension the engine accepts
pub fn is_supported_video<P: AsRef<std::path::Path>>(path: P) -> bool {
    matches!(
        path.as_ref().extension().and_then(|ext| ext.to_str()),
        Some(ext) if matches!(
            ext.to_lowercase().as_str(),
            "mp4" | "avi" | "mov" | "mkv" | "webm" | "m4v"
        )
    )
}
