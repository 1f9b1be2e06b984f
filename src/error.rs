use thiserror::Error;

/// Main error type for the weldtrim library
#[derive(Error, Debug)]
pub enum WeldTrimError {
    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Video container errors (decode and encode side)
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Video file not found: {path}")]
    NotFound { path: String },

    #[error("Video decoding failed: {reason}")]
    DecodingFailed { reason: String },

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Invalid video parameters: {details}")]
    InvalidParameters { details: String },
}

/// Errors raised by the motion and brightness analysis
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No bright welding region found in {path}")]
    NoBrightRegionFound { path: String },

    #[error("Bright region in {path} runs to the end of the video (cut at frame {cut_frame})")]
    NothingAfterBrightRegion { path: String, cut_frame: usize },

    #[error("Invalid analysis settings: {details}")]
    InvalidSettings { details: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using WeldTrimError
pub type Result<T> = std::result::Result<T, WeldTrimError>;

impl WeldTrimError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // IO errors might be temporary
            Self::Io(_) => true,
            // Encoder might have been killed or the disk was full
            Self::Video(VideoError::EncodingFailed { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Video(VideoError::NotFound { path }) => {
                format!("Recording '{}' does not exist.", path)
            }
            Self::Video(VideoError::DecodingFailed { .. }) => {
                "Could not read the recording. Please check it is a supported video file.".to_string()
            }
            Self::Analysis(AnalysisError::NoBrightRegionFound { .. }) => {
                "No welding arc detected in this recording.".to_string()
            }
            Self::Analysis(AnalysisError::NothingAfterBrightRegion { .. }) => {
                "The welding arc lasts until the end of the recording, there is no post-processing footage.".to_string()
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
