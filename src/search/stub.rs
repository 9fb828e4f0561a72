//! In-memory [`MediaTools`] for exercising the search without ffmpeg.
//!
//! Encodes write the CRF into the destination file and quality is looked up
//! from `scores` by that CRF, so trial files really exist on disk while a
//! test runs.

use crate::analyzer::metadata::VideoTrack;
use crate::analyzer::{MediaMetadata, SceneCut};
use crate::encoder::EncodeConfig;
use crate::error::AppError;
use crate::tools::MediaTools;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct StubTools {
    pub duration_secs: f64,
    pub frame_rate: (u32, u32),
    pub has_video: bool,
    pub cuts: Vec<SceneCut>,
    /// VMAF by CRF
    pub scores: HashMap<i32, f64>,
    pub fail_encode_at: Option<i32>,
    /// Fail every encode after this many
    pub fail_encode_after: Option<usize>,
    pub fail_extract: bool,
    /// Raise cancellation during the n-th encode
    pub cancel_on_encode: Option<usize>,
    pub encodes: RefCell<Vec<i32>>,
    pub extracts: RefCell<Vec<(f64, u64)>>,
    pub concats: Cell<usize>,
    pub cancelled: Cell<bool>,
}

impl Default for StubTools {
    fn default() -> Self {
        Self {
            duration_secs: 600.0,
            frame_rate: (24000, 1001),
            has_video: true,
            cuts: Vec::new(),
            scores: HashMap::new(),
            fail_encode_at: None,
            fail_encode_after: None,
            fail_extract: false,
            cancel_on_encode: None,
            encodes: RefCell::new(Vec::new()),
            extracts: RefCell::new(Vec::new()),
            concats: Cell::new(0),
            cancelled: Cell::new(false),
        }
    }
}

impl StubTools {
    fn check_cancel(&self) -> Result<(), AppError> {
        if self.cancelled.get() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl MediaTools for StubTools {
    fn probe_metadata(&self, path: &Path) -> Result<MediaMetadata, AppError> {
        self.check_cancel()?;
        let video_tracks = if self.has_video {
            vec![VideoTrack {
                codec_name: "h264".to_string(),
                width: 1920,
                height: 1080,
                frame_rate_num: self.frame_rate.0,
                frame_rate_den: self.frame_rate.1,
                bitrate_kbps: Some(2500),
                max_bitrate_kbps: Some(4100),
                stream_size_kb: Some(1875),
                ..Default::default()
            }]
        } else {
            Vec::new()
        };

        Ok(MediaMetadata {
            path: path.to_path_buf(),
            format_name: Some("mov,mp4,m4a,3gp,3g2,mj2".to_string()),
            duration_secs: Some(self.duration_secs),
            size_bytes: Some(2_000_000),
            bitrate_kbps: Some(2700),
            video_tracks,
            audio_tracks: Vec::new(),
        })
    }

    fn detect_scene_cuts(&self, _path: &Path) -> Result<Vec<SceneCut>, AppError> {
        self.check_cancel()?;
        Ok(self.cuts.clone())
    }

    fn encode(&self, _source: &Path, dest: &Path, config: &EncodeConfig) -> Result<(), AppError> {
        self.check_cancel()?;
        let crf = config
            .crf
            .ok_or_else(|| AppError::Encode("stub needs a crf".to_string()))?;
        self.encodes.borrow_mut().push(crf);
        let count = self.encodes.borrow().len();

        if self.cancel_on_encode == Some(count) {
            self.cancelled.set(true);
            return Err(AppError::Cancelled);
        }
        if self.fail_encode_at == Some(crf) || self.fail_encode_after.is_some_and(|n| count > n) {
            return Err(AppError::Encode(format!("stub refused crf {}", crf)));
        }

        std::fs::write(dest, crf.to_string())?;
        Ok(())
    }

    fn measure_quality(
        &self,
        distorted: &Path,
        _reference: &Path,
        _speed: u32,
    ) -> Result<f64, AppError> {
        self.check_cancel()?;
        let crf: i32 = std::fs::read_to_string(distorted)?
            .trim()
            .parse()
            .map_err(|e| AppError::Score(format!("unreadable stub encode: {}", e)))?;
        self.scores
            .get(&crf)
            .copied()
            .ok_or_else(|| AppError::Score(format!("no stub score for crf {}", crf)))
    }

    fn extract_stream_copy(
        &self,
        _source: &Path,
        dest: &Path,
        start_secs: f64,
        frame_count: u64,
    ) -> Result<(), AppError> {
        self.check_cancel()?;
        if self.fail_extract {
            return Err(AppError::SampleExtraction("stub extraction failure".to_string()));
        }
        self.extracts.borrow_mut().push((start_secs, frame_count));
        std::fs::write(dest, b"segment")?;
        Ok(())
    }

    fn concat_stream_copy(&self, segments: &[PathBuf], dest: &Path) -> Result<(), AppError> {
        self.check_cancel()?;
        self.concats.set(self.concats.get() + 1);
        std::fs::write(dest, format!("{} segments", segments.len()))?;
        Ok(())
    }
}
