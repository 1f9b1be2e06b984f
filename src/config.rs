use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{AnalysisError, ConfigError, Result},
    motion::{BrightnessConfig, DetectionConfig},
};

/// Main configuration for weldtrim
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Motion detection defaults
    pub detection: DetectionConfig,

    /// Welding-arc detection defaults
    pub brightness: BrightnessConfig,

    /// Output naming and encoding
    pub output: OutputConfig,

    /// Where recordings live
    pub paths: PathsConfig,

    /// Batch processing
    pub processing: ProcessingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string(),
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;
        self.brightness.validate()?;
        self.output.validate()?;
        self.processing.validate()?;
        Ok(())
    }
}

/// Output naming and encoder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Appended to the input stem for default output names
    pub suffix: String,

    /// Used when the input has no extension
    pub default_extension: String,

    /// ffmpeg encoder name
    pub codec: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: "_trimmed".to_string(),
            default_extension: "mp4".to_string(),
            codec: "mpeg4".to_string(),
            quality: 85,
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.suffix.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "output.suffix".to_string(),
                value: String::new(),
            }.into());
        }

        if self.quality > 100 {
            return Err(ConfigError::InvalidValue {
                key: "output.quality".to_string(),
                value: self.quality.to_string(),
            }.into());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Relative inputs that do not exist are looked up here
    pub recordings_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            recordings_dir: PathBuf::from("recordings"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Worker threads for batch analysis
    pub threads: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
        }
    }
}

impl ProcessingConfig {
    fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "processing.threads".to_string(),
                value: self.threads.to_string(),
            }.into());
        }
        Ok(())
    }
}

/// Outcome of one field of a settings payload
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOutcome {
    pub field: &'static str,
    pub value: String,
    /// `None` when the value was applied
    pub error: Option<String>,
}

/// Per-field report produced when applying a settings payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsReport {
    pub outcomes: Vec<FieldOutcome>,
}

impl SettingsReport {
    pub fn applied(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_none())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }

    pub fn is_ok(&self) -> bool {
        self.rejected().next().is_none()
    }

    /// Fail with every rejected field listed
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            return Ok(());
        }
        Err(AnalysisError::InvalidSettings { details: self.to_string() }.into())
    }

    fn record<V: fmt::Display, T>(
        &mut self,
        field: &'static str,
        value: Option<V>,
        target: &mut T,
        convert: impl FnOnce(&V) -> std::result::Result<T, String>,
    ) {
        let Some(value) = value else {
            return;
        };
        let error = match convert(&value) {
            Ok(converted) => {
                *target = converted;
                None
            }
            Err(reason) => Some(reason),
        };
        self.outcomes.push(FieldOutcome {
            field,
            value: value.to_string(),
            error,
        });
    }
}

impl fmt::Display for SettingsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rejected: Vec<String> = self
            .rejected()
            .map(|o| format!("{}={}: {}", o.field, o.value, o.error.as_deref().unwrap_or("")))
            .collect();
        if rejected.is_empty() {
            write!(f, "{} field(s) applied", self.outcomes.len())
        } else {
            write!(f, "{}", rejected.join("; "))
        }
    }
}

fn in_range_int<T: TryFrom<i64>>(value: &i64, min: i64, max: i64) -> std::result::Result<T, String> {
    if *value < min || *value > max {
        return Err(format!("must be within {}-{}", min, max));
    }
    T::try_from(*value).map_err(|_| format!("must be within {}-{}", min, max))
}

fn percent(value: &f64) -> std::result::Result<f64, String> {
    if (0.0..=100.0).contains(value) {
        Ok(*value)
    } else {
        Err("must be within 0-100".to_string())
    }
}

/// Per-call motion detection overrides
///
/// Fields are loosely typed so payloads from an API layer can be checked
/// field by field instead of failing to deserialize as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub threshold: Option<i64>,
    pub min_area_percent: Option<f64>,
    pub min_segment_frames: Option<i64>,
    pub padding_frames: Option<i64>,
    pub analyze_step: Option<i64>,
    pub max_gap_seconds: Option<f64>,
}

impl DetectionSettings {
    /// Just the two knobs operators usually touch
    pub fn thresholds(threshold: Option<i64>, min_area_percent: Option<f64>) -> Self {
        Self {
            threshold,
            min_area_percent,
            ..Default::default()
        }
    }

    /// Produce a new config with every valid override applied
    pub fn apply(&self, base: &DetectionConfig) -> (DetectionConfig, SettingsReport) {
        let mut config = base.clone();
        let mut report = SettingsReport::default();

        report.record("threshold", self.threshold, &mut config.threshold, |v| in_range_int(v, 0, 255));
        report.record("min_area_percent", self.min_area_percent, &mut config.min_area_percent, percent);
        report.record("min_segment_frames", self.min_segment_frames, &mut config.min_segment_frames,
                      |v| in_range_int(v, 0, i64::MAX));
        report.record("padding_frames", self.padding_frames, &mut config.padding_frames,
                      |v| in_range_int(v, 0, i64::MAX));
        report.record("analyze_step", self.analyze_step, &mut config.analyze_step,
                      |v| in_range_int(v, 1, i64::MAX));
        report.record("max_gap_seconds", self.max_gap_seconds, &mut config.max_gap_seconds, |v| {
            if *v >= 0.0 && v.is_finite() { Ok(*v) } else { Err("must be a non-negative number".to_string()) }
        });

        (config, report)
    }
}

/// Per-call welding-arc detection overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessSettings {
    pub brightness_threshold: Option<i64>,
    pub min_bright_percent: Option<f64>,
    pub gap_tolerance_frames: Option<i64>,
    pub min_region_frames: Option<i64>,
}

impl BrightnessSettings {
    pub fn thresholds(brightness_threshold: Option<i64>, min_bright_percent: Option<f64>) -> Self {
        Self {
            brightness_threshold,
            min_bright_percent,
            ..Default::default()
        }
    }

    pub fn apply(&self, base: &BrightnessConfig) -> (BrightnessConfig, SettingsReport) {
        let mut config = base.clone();
        let mut report = SettingsReport::default();

        report.record("brightness_threshold", self.brightness_threshold, &mut config.threshold,
                      |v| in_range_int(v, 0, 255));
        report.record("min_bright_percent", self.min_bright_percent, &mut config.min_bright_percent, percent);
        report.record("gap_tolerance_frames", self.gap_tolerance_frames, &mut config.gap_tolerance_frames,
                      |v| in_range_int(v, 0, i64::MAX));
        report.record("min_region_frames", self.min_region_frames, &mut config.min_region_frames,
                      |v| in_range_int(v, 1, i64::MAX));

        (config, report)
    }
}
