use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tokio::task;
use tracing::{debug, info, warn};

use crate::{
    config::{BrightnessSettings, Config, DetectionSettings},
    error::{AnalysisError, Result, VideoError, WeldTrimError},
    motion::{BrightRegion, BrightnessConfig, BrightnessCutFinder, DetectionConfig,
             MotionAnalysisResult, MotionDetector, MotionSegment, SegmentBuilder},
    trim::{types::round_to, SizeReport, TrimResult, TrimStats, TrimStatus, VideoTrimmer},
    video::{is_supported_video, FfmpegBackend, FrameSource, OutputSpec, VideoBackend, VideoSink, DEFAULT_FPS},
};

/// Entry point for motion analysis and trimming
///
/// Holds only immutable configuration and a backend handle, so one instance
/// can serve concurrent calls on different files. Each call opens and
/// releases its own decoder and encoder.
#[derive(Clone)]
pub struct MotionService {
    config: Config,
    backend: Arc<dyn VideoBackend>,
}

impl MotionService {
    /// Service backed by the system `ffmpeg`
    pub fn new(config: Config) -> Self {
        let backend = FfmpegBackend::new(config.output.codec.clone(), config.output.quality);
        Self::with_backend(config, Arc::new(backend))
    }

    pub fn with_backend(config: Config, backend: Arc<dyn VideoBackend>) -> Self {
        info!("Motion service ready (recordings in {})", config.paths.recordings_dir.display());
        Self { config, backend }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Absolute or existing paths are used as-is, anything else is looked up
    /// in the recordings directory
    pub fn resolve_path<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() || path.exists() {
            path.to_path_buf()
        } else {
            self.config.paths.recordings_dir.join(path)
        }
    }

    /// `{stem}{suffix}.{ext}` next to the input
    pub fn default_output_path(&self, input: &Path) -> PathBuf {
        let stem = input.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        let ext = input
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.config.output.default_extension.clone());
        input.with_file_name(format!("{}{}.{}", stem, self.config.output.suffix, ext))
    }

    /// Detect motion segments in a recording
    pub fn detect_motion<P: AsRef<Path>>(&self, path: P, settings: &DetectionSettings) -> Result<MotionAnalysisResult> {
        let config = self.detection_config(settings)?;
        let path = self.existing_input(path.as_ref())?;
        self.analyze(&path, &config)
    }

    /// Write a copy of the recording holding only its motion segments
    ///
    /// With `include_all_segments` false only the longest segment is kept.
    pub fn trim_to_motion<P: AsRef<Path>>(
        &self,
        path: P,
        output_path: Option<&Path>,
        settings: &DetectionSettings,
        include_all_segments: bool,
    ) -> Result<TrimResult> {
        let config = self.detection_config(settings)?;
        let path = self.existing_input(path.as_ref())?;
        let out_path = self.output_path_for(&path, output_path)?;

        let analysis = self.analyze(&path, &config)?;
        if !analysis.has_motion() {
            warn!("No motion detected in {}", analysis.filename);
            return Ok(TrimResult::no_motion(analysis.filename));
        }

        let segments: Vec<MotionSegment> = if include_all_segments {
            analysis.segments.clone()
        } else {
            analysis.longest_segment().cloned().into_iter().collect()
        };

        let stats = self.write_output(&path, &out_path, |trimmer, source, sink| {
            trimmer.write_segments(source, &segments, sink)
        })?;

        info!("Trimmed {} -> {} ({} frames)", analysis.filename, display_name(&out_path), stats.frames_written);
        let message = analysis.truncated.then(|| {
            format!("Recording could only be decoded up to frame {} of {}",
                    analysis.decoded_frames, analysis.total_frames)
        });
        self.completed_result(&path, &out_path, segments.len(), stats, message)
    }

    /// Locate the welding arc as an inclusive frame range
    pub fn find_welding_window<P: AsRef<Path>>(&self, path: P, settings: &BrightnessSettings) -> Result<Option<BrightRegion>> {
        let config = self.brightness_config(settings)?;
        let path = self.existing_input(path.as_ref())?;

        let mut source = self.backend.open(&path)?;
        BrightnessCutFinder::new(config).find_region(source.as_mut())
    }

    /// Write a copy of the recording starting right after the welding arc
    pub fn trim_to_post_processing<P: AsRef<Path>>(
        &self,
        path: P,
        output_path: Option<&Path>,
        settings: &BrightnessSettings,
    ) -> Result<TrimResult> {
        let config = self.brightness_config(settings)?;
        let path = self.existing_input(path.as_ref())?;
        let out_path = self.output_path_for(&path, output_path)?;

        let scan = {
            let mut source = self.backend.open(&path)?;
            BrightnessCutFinder::new(config).scan(source.as_mut())?
        };
        let region = scan
            .region
            .ok_or_else(|| AnalysisError::NoBrightRegionFound { path: path.display().to_string() })?;
        let cut_frame = region.cut_frame();
        if !scan.has_frames_after_region() {
            return Err(AnalysisError::NothingAfterBrightRegion {
                path: path.display().to_string(),
                cut_frame,
            }.into());
        }
        debug!("Post-processing footage of {} starts at frame {}", path.display(), cut_frame);

        let stats = self.write_output(&path, &out_path, |trimmer, source, sink| {
            trimmer.write_from(source, cut_frame, sink)
        })?;

        info!("Extracted post-processing of {} -> {} ({} frames)",
              display_name(&path), display_name(&out_path), stats.frames_written);
        let message = format!("Welding arc ends before frame {}", cut_frame);
        self.completed_result(&path, &out_path, 1, stats, Some(message))
    }

    /// Analyze every supported video in `dir` on the processing pool
    ///
    /// Failures are reported per file, they do not stop the batch.
    pub fn detect_motion_batch<P: AsRef<Path>>(
        &self,
        dir: P,
        settings: &DetectionSettings,
    ) -> Result<Vec<(PathBuf, Result<MotionAnalysisResult>)>> {
        let dir = self.resolve_path(dir);
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() && is_supported_video(&path) {
                files.push(path);
            }
        }
        files.sort();

        info!("Analyzing {} recordings in {} with {} threads",
              files.len(), dir.display(), self.config.processing.threads);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.processing.threads)
            .build()
            .map_err(|e| WeldTrimError::generic(format!("cannot build thread pool: {}", e)))?;

        Ok(pool.install(|| {
            files
                .into_par_iter()
                .map(|path| {
                    let result = self.detect_motion(&path, settings);
                    (path, result)
                })
                .collect()
        }))
    }

    pub async fn detect_motion_async(&self, path: PathBuf, settings: DetectionSettings) -> Result<MotionAnalysisResult> {
        let service = self.clone();
        run_blocking(move || service.detect_motion(&path, &settings)).await
    }

    pub async fn trim_to_motion_async(
        &self,
        path: PathBuf,
        output_path: Option<PathBuf>,
        settings: DetectionSettings,
        include_all_segments: bool,
    ) -> Result<TrimResult> {
        let service = self.clone();
        run_blocking(move || {
            service.trim_to_motion(&path, output_path.as_deref(), &settings, include_all_segments)
        }).await
    }

    pub async fn trim_to_post_processing_async(
        &self,
        path: PathBuf,
        output_path: Option<PathBuf>,
        settings: BrightnessSettings,
    ) -> Result<TrimResult> {
        let service = self.clone();
        run_blocking(move || service.trim_to_post_processing(&path, output_path.as_deref(), &settings)).await
    }

    fn detection_config(&self, settings: &DetectionSettings) -> Result<DetectionConfig> {
        let (config, report) = settings.apply(&self.config.detection);
        report.into_result()?;
        config.validate()?;
        Ok(config)
    }

    fn brightness_config(&self, settings: &BrightnessSettings) -> Result<BrightnessConfig> {
        let (config, report) = settings.apply(&self.config.brightness);
        report.into_result()?;
        config.validate()?;
        Ok(config)
    }

    fn existing_input(&self, path: &Path) -> Result<PathBuf> {
        let resolved = self.resolve_path(path);
        if !resolved.is_file() {
            return Err(VideoError::NotFound { path: resolved.display().to_string() }.into());
        }
        Ok(resolved)
    }

    fn output_path_for(&self, input: &Path, requested: Option<&Path>) -> Result<PathBuf> {
        let out_path = requested
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_output_path(input));

        let same_file = match (input.canonicalize(), out_path.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => input == out_path,
        };
        if same_file {
            return Err(VideoError::InvalidParameters {
                details: format!("output {} would overwrite the input", out_path.display()),
            }.into());
        }
        Ok(out_path)
    }

    fn analyze(&self, path: &Path, config: &DetectionConfig) -> Result<MotionAnalysisResult> {
        let filename = display_name(path);
        info!("Analyzing motion in {}", filename);

        let motion = {
            let mut source = self.backend.open(path)?;
            MotionDetector::new(config.clone()).detect(source.as_mut())?
        };

        let segments = SegmentBuilder::new(config).build(&motion.frames, motion.decoded_frames, motion.fps);
        let motion_percentage = motion.motion_percentage();

        if motion.truncated {
            warn!("{} could only be decoded up to frame {} of {}",
                  filename, motion.decoded_frames, motion.total_frames);
        }
        info!("Found {} motion segments in {} ({:.1}% motion)", segments.len(), filename, motion_percentage);

        Ok(MotionAnalysisResult {
            filename,
            total_frames: motion.total_frames,
            decoded_frames: motion.decoded_frames,
            truncated: motion.truncated,
            fps: motion.fps,
            duration_seconds: round_to(motion.total_frames as f64 / motion.fps, 2),
            segments,
            motion_percentage,
        })
    }

    /// Open input and output, run `write`, and remove the output on any failure
    fn write_output<F>(&self, input: &Path, out_path: &Path, write: F) -> Result<TrimStats>
    where
        F: FnOnce(&VideoTrimmer, &mut dyn FrameSource, &mut dyn VideoSink) -> Result<TrimStats>,
    {
        if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut source = self.backend.open(input)?;
        let mut spec = OutputSpec::from(source.metadata());
        if spec.fps <= 0.0 {
            spec.fps = DEFAULT_FPS;
        }

        // Only a file this call created may be removed
        let mut sink = self.backend.create(out_path, &spec)?;
        let mut guard = PartialOutput::new(out_path);
        let written = write(&VideoTrimmer::new(), source.as_mut(), sink.as_mut());
        drop(sink);
        let stats = written?;

        guard.commit();
        Ok(stats)
    }

    fn completed_result(
        &self,
        input: &Path,
        out_path: &Path,
        segments_count: usize,
        stats: TrimStats,
        message: Option<String>,
    ) -> Result<TrimResult> {
        let original = std::fs::metadata(input)?.len();
        let output = std::fs::metadata(out_path)?.len();
        let sizes = SizeReport::from_bytes(original, output);

        Ok(TrimResult {
            status: TrimStatus::Completed,
            input_filename: display_name(input),
            output_filename: Some(display_name(out_path)),
            output_path: Some(out_path.display().to_string()),
            segments_count: Some(segments_count),
            frames_written: Some(stats.frames_written),
            duration_seconds: Some(stats.duration_seconds),
            original_size_mb: Some(sizes.original_size_mb),
            output_size_mb: Some(sizes.output_size_mb),
            reduction_percent: Some(sizes.reduction_percent),
            message,
        })
    }
}

/// Deletes a half-written output file unless committed
struct PartialOutput {
    path: PathBuf,
    committed: bool,
}

impl PartialOutput {
    fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf(), committed: false }
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if !self.committed && self.path.exists() {
            warn!("Removing incomplete output {}", self.path.display());
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn run_blocking<T, F>(job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(job)
        .await
        .map_err(|e| WeldTrimError::generic(format!("worker task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{MemoryBackend, MemoryClip};
    use tempfile::{tempdir, TempDir};

    const W: u32 = 32;
    const H: u32 = 24;

    struct Fixture {
        dir: TempDir,
        backend: Arc<MemoryBackend>,
        service: MotionService,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_backend(MemoryBackend::new())
        }

        fn with_backend(backend: MemoryBackend) -> Self {
            let dir = tempdir().unwrap();
            let backend = Arc::new(backend);
            let mut config = Config::default();
            config.paths.recordings_dir = dir.path().to_path_buf();
            config.processing.threads = 2;
            let service = MotionService::with_backend(config, backend.clone());
            Self { dir, backend, service }
        }

        fn clip(&self, name: &str, clip: MemoryClip) -> PathBuf {
            let path = self.dir.path().join(name);
            self.backend.insert(&path, clip).unwrap();
            path
        }
    }

    /// 300 static frames with three bursts of flicker
    fn burst_clip() -> MemoryClip {
        let bursts = [(40, 50), (150, 160), (260, 270)];
        let levels: Vec<u8> = (0..300usize)
            .map(|i| {
                if bursts.iter().any(|&(s, e)| (s..=e).contains(&i)) {
                    if i % 2 == 0 { 0 } else { 255 }
                } else {
                    128
                }
            })
            .collect();
        MemoryClip::from_levels(&levels, W, H, 30.0)
    }

    fn weld_clip(parts: &[(u8, usize)]) -> MemoryClip {
        let levels: Vec<u8> = parts.iter().flat_map(|&(l, n)| std::iter::repeat(l).take(n)).collect();
        MemoryClip::from_levels(&levels, W, H, 30.0)
    }

    #[test]
    fn test_no_motion_scenario() {
        let fx = Fixture::new();
        let path = fx.clip("static.mp4", MemoryClip::solid(30, W, H, 90, 30.0));

        let analysis = fx.service.detect_motion(&path, &DetectionSettings::default()).unwrap();
        assert!(analysis.segments.is_empty());
        assert_eq!(analysis.motion_percentage, 0.0);
        assert_eq!(analysis.total_frames, 30);
        assert_eq!(analysis.duration_seconds, 1.0);

        let result = fx.service.trim_to_motion(&path, None, &DetectionSettings::default(), true).unwrap();
        assert_eq!(result.status, TrimStatus::NoMotion);
        assert_eq!(result.input_filename, "static.mp4");
        assert!(!fx.dir.path().join("static_trimmed.mp4").exists());
    }

    #[test]
    fn test_full_motion_scenario() {
        let fx = Fixture::new();
        let path = fx.clip("flicker.mp4", MemoryClip::alternating(90, W, H, 30.0));

        let settings = DetectionSettings::thresholds(Some(25), Some(0.5));
        let analysis = fx.service.detect_motion(&path, &settings).unwrap();

        assert_eq!(analysis.segments.len(), 1);
        assert_eq!(analysis.segments[0].start_frame, 0);
        assert_eq!(analysis.segments[0].end_frame, 89);
        assert_eq!(analysis.motion_percentage, 98.89);
        assert!(!analysis.truncated);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let fx = Fixture::new();
        let path = fx.clip("bursts.mp4", burst_clip());

        let first = fx.service.detect_motion(&path, &DetectionSettings::default()).unwrap();
        let second = fx.service.detect_motion(&path, &DetectionSettings::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(toml::to_string(&first).unwrap(), toml::to_string(&second).unwrap());
    }

    #[test]
    fn test_trim_all_segments() {
        let fx = Fixture::new();
        let path = fx.clip("bursts.mp4", burst_clip());

        let analysis = fx.service.detect_motion(&path, &DetectionSettings::default()).unwrap();
        let spans: Vec<(usize, usize)> = analysis.segments.iter().map(|s| (s.start_frame, s.end_frame)).collect();
        assert_eq!(spans, vec![(10, 81), (120, 191), (230, 299)]);

        let result = fx.service.trim_to_motion(&path, None, &DetectionSettings::default(), true).unwrap();
        let out_path = fx.dir.path().join("bursts_trimmed.mp4");

        assert!(result.is_completed());
        assert_eq!(result.segments_count, Some(3));
        assert_eq!(result.frames_written, Some(214));
        assert_eq!(result.output_filename.as_deref(), Some("bursts_trimmed.mp4"));
        assert_eq!(fx.backend.written(&out_path).unwrap().len(), 214);
        assert_eq!(result.duration_seconds, Some(7.13));

        assert!(result.output_size_mb.unwrap() <= result.original_size_mb.unwrap());
        assert_eq!(result.reduction_percent, Some(28.7));
    }

    #[test]
    fn test_trim_longest_segment_only() {
        let fx = Fixture::new();
        let path = fx.clip("bursts.mp4", burst_clip());
        let out_path = fx.dir.path().join("out").join("longest.mp4");

        let result = fx.service
            .trim_to_motion(&path, Some(&out_path), &DetectionSettings::default(), false)
            .unwrap();

        assert_eq!(result.segments_count, Some(1));
        assert_eq!(result.frames_written, Some(72));
        assert!(out_path.exists());
        assert!(result.reduction_percent.unwrap() >= 0.0);

        let written = fx.backend.written(&out_path).unwrap();
        assert_eq!(written.first(), Some(&burst_clip().frames()[10]));
    }

    #[test]
    fn test_settings_rejected_before_any_io() {
        let fx = Fixture::new();
        let settings = DetectionSettings::thresholds(Some(300), None);
        let err = fx.service.detect_motion("missing.mp4", &settings).unwrap_err();
        assert!(matches!(err, WeldTrimError::Analysis(AnalysisError::InvalidSettings { .. })));

        let settings = BrightnessSettings::thresholds(None, Some(101.0));
        let err = fx.service.trim_to_post_processing("missing.mp4", None, &settings).unwrap_err();
        assert!(matches!(err, WeldTrimError::Analysis(AnalysisError::InvalidSettings { .. })));
    }

    #[test]
    fn test_missing_input_is_not_found() {
        let fx = Fixture::new();
        let err = fx.service.detect_motion("missing.mp4", &DetectionSettings::default()).unwrap_err();
        assert!(matches!(err, WeldTrimError::Video(VideoError::NotFound { .. })));
    }

    #[test]
    fn test_unreadable_input_is_decode_error() {
        let fx = Fixture::new();
        let path = fx.dir.path().join("garbage.mp4");
        std::fs::write(&path, b"not a video").unwrap();

        let err = fx.service.detect_motion(&path, &DetectionSettings::default()).unwrap_err();
        assert!(matches!(err, WeldTrimError::Video(VideoError::DecodingFailed { .. })));
    }

    #[test]
    fn test_relative_paths_resolve_to_recordings_dir() {
        let fx = Fixture::new();
        fx.clip("rec_20260105_120000.mp4", MemoryClip::solid(10, W, H, 0, 30.0));

        let analysis = fx.service
            .detect_motion("rec_20260105_120000.mp4", &DetectionSettings::default())
            .unwrap();
        assert_eq!(analysis.filename, "rec_20260105_120000.mp4");
        assert_eq!(fx.service.config().paths.recordings_dir, fx.dir.path());
    }

    #[test]
    fn test_default_output_path() {
        let fx = Fixture::new();
        assert_eq!(
            fx.service.default_output_path(Path::new("/rec/weld_01.mkv")),
            PathBuf::from("/rec/weld_01_trimmed.mkv")
        );
        assert_eq!(
            fx.service.default_output_path(Path::new("/rec/weld_02")),
            PathBuf::from("/rec/weld_02_trimmed.mp4")
        );
    }

    #[test]
    fn test_output_must_not_overwrite_input() {
        let fx = Fixture::new();
        let path = fx.clip("bursts.mp4", burst_clip());
        let err = fx.service
            .trim_to_motion(&path, Some(&path), &DetectionSettings::default(), true)
            .unwrap_err();
        assert!(matches!(err, WeldTrimError::Video(VideoError::InvalidParameters { .. })));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), burst_clip().raw_bytes().len() as u64);
    }

    #[test]
    fn test_encode_failure_removes_partial_output() {
        let fx = Fixture::with_backend(MemoryBackend::new().with_write_failure_at(5));
        let path = fx.clip("bursts.mp4", burst_clip());

        let err = fx.service.trim_to_motion(&path, None, &DetectionSettings::default(), true).unwrap_err();
        assert!(matches!(err, WeldTrimError::Video(VideoError::EncodingFailed { .. })));
        assert!(!fx.dir.path().join("bursts_trimmed.mp4").exists());
    }

    #[test]
    fn test_post_processing_extraction() {
        let fx = Fixture::new();
        let path = fx.clip("weld.mp4", weld_clip(&[(10, 20), (250, 30), (10, 25)]));

        let region = fx.service.find_welding_window(&path, &BrightnessSettings::default()).unwrap();
        assert_eq!(region, Some(BrightRegion { start_frame: 20, end_frame: 49 }));

        let result = fx.service.trim_to_post_processing(&path, None, &BrightnessSettings::default()).unwrap();
        assert!(result.is_completed());
        assert_eq!(result.frames_written, Some(25));
        assert_eq!(result.segments_count, Some(1));

        let written = fx.backend.written(fx.dir.path().join("weld_trimmed.mp4")).unwrap();
        assert_eq!(written.len(), 25);
    }

    #[test]
    fn test_post_processing_without_arc() {
        let fx = Fixture::new();
        let path = fx.clip("dark.mp4", MemoryClip::solid(40, W, H, 10, 30.0));

        let err = fx.service.trim_to_post_processing(&path, None, &BrightnessSettings::default()).unwrap_err();
        assert!(matches!(err, WeldTrimError::Analysis(AnalysisError::NoBrightRegionFound { .. })));
        assert_eq!(err.user_message(), "No welding arc detected in this recording.");
    }

    #[test]
    fn test_post_processing_arc_until_end() {
        let fx = Fixture::with_backend(MemoryBackend::new().rejecting_empty_outputs());
        let path = fx.clip("arc_end.mp4", weld_clip(&[(10, 10), (250, 20)]));
        let out_path = fx.dir.path().join("arc_end_trimmed.mp4");

        let err = fx.service.trim_to_post_processing(&path, None, &BrightnessSettings::default()).unwrap_err();
        assert!(matches!(err, WeldTrimError::Analysis(AnalysisError::NothingAfterBrightRegion { cut_frame: 30, .. })));
        assert!(fx.backend.written(&out_path).is_none());
        assert!(!out_path.exists());
    }

    #[test]
    fn test_post_processing_with_short_tail() {
        let fx = Fixture::with_backend(MemoryBackend::new().rejecting_empty_outputs());
        let path = fx.clip("tail.mp4", weld_clip(&[(10, 10), (250, 20), (10, 4)]));

        let result = fx.service.trim_to_post_processing(&path, None, &BrightnessSettings::default()).unwrap();
        assert_eq!(result.frames_written, Some(4));
    }

    #[test]
    fn test_failed_create_keeps_existing_output() {
        let fx = Fixture::with_backend(MemoryBackend::new().with_create_failure());
        let path = fx.clip("bursts.mp4", burst_clip());
        let out_path = fx.dir.path().join("bursts_trimmed.mp4");
        std::fs::write(&out_path, b"earlier trim").unwrap();

        let err = fx.service.trim_to_motion(&path, None, &DetectionSettings::default(), true).unwrap_err();
        assert!(matches!(err, WeldTrimError::Video(VideoError::EncodingFailed { .. })));
        assert_eq!(std::fs::read(&out_path).unwrap(), b"earlier trim");
    }

    #[test]
    fn test_read_failure_marks_analysis_truncated() {
        let fx = Fixture::new();
        let path = fx.dir.path().join("cut_short.mp4");
        fx.backend
            .insert_with_read_failure(&path, MemoryClip::alternating(90, W, H, 30.0), 60)
            .unwrap();

        let analysis = fx.service.detect_motion(&path, &DetectionSettings::default()).unwrap();
        assert!(analysis.truncated);
        assert_eq!(analysis.total_frames, 90);
        assert_eq!(analysis.decoded_frames, 60);
        assert_eq!(analysis.duration_seconds, 3.0);
        let spans: Vec<(usize, usize)> = analysis.segments.iter().map(|s| (s.start_frame, s.end_frame)).collect();
        assert_eq!(spans, vec![(0, 59)]);

        let result = fx.service.trim_to_motion(&path, None, &DetectionSettings::default(), true).unwrap();
        assert_eq!(result.frames_written, Some(60));
        assert_eq!(
            result.message.as_deref(),
            Some("Recording could only be decoded up to frame 60 of 90")
        );
    }

    #[test]
    fn test_batch_reports_each_file() {
        let fx = Fixture::new();
        fx.clip("a.mp4", MemoryClip::solid(10, W, H, 0, 30.0));
        fx.clip("b.mp4", MemoryClip::alternating(20, W, H, 30.0));
        std::fs::write(fx.dir.path().join("labels.json"), b"{}").unwrap();
        std::fs::write(fx.dir.path().join("broken.mp4"), b"junk").unwrap();

        let results = fx.service.detect_motion_batch(fx.dir.path(), &DetectionSettings::default()).unwrap();
        let names: Vec<String> = results.iter().map(|(p, _)| display_name(p)).collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4", "broken.mp4"]);

        assert!(!results[0].1.as_ref().unwrap().has_motion());
        assert!(results[1].1.as_ref().unwrap().has_motion());
        assert!(results[2].1.is_err());
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let fx = Fixture::new();
        let path = fx.clip("bursts.mp4", burst_clip());

        let analysis = fx.service
            .detect_motion_async(path.clone(), DetectionSettings::default())
            .await
            .unwrap();
        assert_eq!(analysis.segments.len(), 3);

        let result = fx.service
            .trim_to_motion_async(path, None, DetectionSettings::default(), true)
            .await
            .unwrap();
        assert_eq!(result.frames_written, Some(214));
    }
}
