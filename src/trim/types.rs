use serde::{Deserialize, Serialize};

/// Terminal state of a trim request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimStatus {
    Completed,
    NoMotion,
}

/// What the trimmer actually wrote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimStats {
    pub frames_written: usize,
    pub duration_seconds: f64,
}

impl TrimStats {
    pub fn new(frames_written: usize, fps: f64) -> Self {
        let duration_seconds = if fps > 0.0 {
            round_to(frames_written as f64 / fps, 2)
        } else {
            0.0
        };
        Self { frames_written, duration_seconds }
    }
}

/// Report returned to the caller of a trim operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimResult {
    pub status: TrimStatus,
    pub input_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_written: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduction_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TrimResult {
    pub fn no_motion<S: Into<String>>(input_filename: S) -> Self {
        Self {
            status: TrimStatus::NoMotion,
            input_filename: input_filename.into(),
            output_filename: None,
            output_path: None,
            segments_count: None,
            frames_written: None,
            duration_seconds: None,
            original_size_mb: None,
            output_size_mb: None,
            reduction_percent: None,
            message: Some("No motion segments detected".to_string()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TrimStatus::Completed
    }
}

/// Size figures of an input/output pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeReport {
    pub original_size_mb: f64,
    pub output_size_mb: f64,
    pub reduction_percent: f64,
}

impl SizeReport {
    /// Sizes in bytes in, MB (2 decimals) and reduction (1 decimal, never negative) out
    pub fn from_bytes(original: u64, output: u64) -> Self {
        let original_mb = original as f64 / (1024.0 * 1024.0);
        let output_mb = output as f64 / (1024.0 * 1024.0);
        let reduction = if original > 0 {
            ((1.0 - output as f64 / original as f64) * 100.0).max(0.0)
        } else {
            0.0
        };

        Self {
            original_size_mb: round_to(original_mb, 2),
            output_size_mb: round_to(output_mb, 2),
            reduction_percent: round_to(reduction, 1),
        }
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
