use crate::analyzer::{self, MediaMetadata, SceneCut};
use crate::encoder::{self, EncodeConfig};
use crate::error::AppError;
use crate::utils::CancelFlag;
use crate::verifier::{self, VmafOptions, VmafResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// External media operations the search depends on.
///
/// Every call is blocking and runs at most one external command. A raised
/// cancel flag makes the current call return [`AppError::Cancelled`].
pub trait MediaTools {
    fn probe_metadata(&self, path: &Path) -> Result<MediaMetadata, AppError>;

    /// Scene-change candidates of the first video stream, in stream order
    fn detect_scene_cuts(&self, path: &Path) -> Result<Vec<SceneCut>, AppError>;

    fn encode(&self, source: &Path, dest: &Path, config: &EncodeConfig) -> Result<(), AppError>;

    /// Pooled VMAF of `distorted` against `reference`
    fn measure_quality(
        &self,
        distorted: &Path,
        reference: &Path,
        speed: u32,
    ) -> Result<f64, AppError>;

    fn extract_stream_copy(
        &self,
        source: &Path,
        dest: &Path,
        start_secs: f64,
        frame_count: u64,
    ) -> Result<(), AppError>;

    fn concat_stream_copy(&self, segments: &[PathBuf], dest: &Path) -> Result<(), AppError>;
}

/// [`MediaTools`] backed by the `ffmpeg` and `ffprobe` binaries
///
/// Encode sources and VMAF references are probed once and cached by path.
/// They are never rewritten during a run, unlike encode outputs.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    cancel: CancelFlag,
    scene_threshold: f64,
    vmaf_threads: u32,
    inputs: Arc<Mutex<HashMap<PathBuf, MediaMetadata>>>,
}

impl FfmpegTools {
    pub fn new(cancel: CancelFlag, scene_threshold: f64, vmaf_threads: u32) -> Self {
        Self {
            cancel,
            scene_threshold,
            vmaf_threads,
            inputs: Arc::default(),
        }
    }

    /// Metadata of a file that only ever serves as input
    fn input_metadata(&self, path: &Path) -> Result<MediaMetadata, AppError> {
        let cached = self
            .inputs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(path)
            .cloned();
        if let Some(metadata) = cached {
            return Ok(metadata);
        }

        let metadata = self.probe_metadata(path)?;
        self.inputs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.to_path_buf(), metadata.clone());
        Ok(metadata)
    }

    /// Full VMAF result, including the frame score range when available
    pub fn vmaf(
        &self,
        distorted: &Path,
        reference: &Path,
        speed: u32,
    ) -> Result<VmafResult, AppError> {
        let size_of =
            |metadata: MediaMetadata| metadata.primary_video().map(|v| (v.width, v.height));

        let options = VmafOptions {
            speed,
            threads: self.vmaf_threads,
            reference_size: size_of(self.input_metadata(reference)?),
            distorted_size: size_of(self.probe_metadata(distorted)?),
        };
        verifier::measure_vmaf(distorted, reference, &options, &self.cancel)
    }
}

impl MediaTools for FfmpegTools {
    fn probe_metadata(&self, path: &Path) -> Result<MediaMetadata, AppError> {
        analyzer::probe(path, &self.cancel)
    }

    fn detect_scene_cuts(&self, path: &Path) -> Result<Vec<SceneCut>, AppError> {
        analyzer::detect_scene_cuts(path, self.scene_threshold, &self.cancel)
    }

    fn encode(&self, source: &Path, dest: &Path, config: &EncodeConfig) -> Result<(), AppError> {
        // Duration only drives progress logging, so a failed probe is not fatal here
        let duration = self
            .input_metadata(source)
            .ok()
            .and_then(|m| m.duration_secs);
        encoder::encode(source, dest, config, duration, &self.cancel)
    }

    fn measure_quality(
        &self,
        distorted: &Path,
        reference: &Path,
        speed: u32,
    ) -> Result<f64, AppError> {
        self.vmaf(distorted, reference, speed).map(|r| r.score)
    }

    fn extract_stream_copy(
        &self,
        source: &Path,
        dest: &Path,
        start_secs: f64,
        frame_count: u64,
    ) -> Result<(), AppError> {
        encoder::extract_stream_copy(source, dest, start_secs, frame_count, &self.cancel)
    }

    fn concat_stream_copy(&self, segments: &[PathBuf], dest: &Path) -> Result<(), AppError> {
        encoder::concat_stream_copy(segments, dest, &self.cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::metadata::VideoTrack;
    use std::sync::atomic::AtomicBool;

    fn tools() -> FfmpegTools {
        FfmpegTools::new(Arc::new(AtomicBool::new(false)), 0.3, 4)
    }

    fn metadata(path: &Path) -> MediaMetadata {
        MediaMetadata {
            path: path.to_path_buf(),
            format_name: None,
            duration_secs: Some(120.0),
            size_bytes: None,
            bitrate_kbps: None,
            video_tracks: vec![VideoTrack {
                width: 1280,
                height: 720,
                ..Default::default()
            }],
            audio_tracks: Vec::new(),
        }
    }

    #[test]
    fn test_input_metadata_served_from_cache() {
        let tools = tools();
        let path = Path::new("/nonexistent/sample.mp4");
        tools
            .inputs
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), metadata(path));

        let cached = tools.input_metadata(path).unwrap();
        assert_eq!(cached.duration_secs, Some(120.0));
        assert_eq!(cached.primary_video().map(|v| v.width), Some(1280));
    }

    #[test]
    fn test_cache_shared_between_clones() {
        let tools = tools();
        let clone = tools.clone();
        let path = Path::new("/nonexistent/source.mkv");
        tools
            .inputs
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), metadata(path));

        assert!(clone.input_metadata(path).is_ok());
    }
}
