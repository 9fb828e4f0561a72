use crate::error::AppError;
use serde::Serialize;
use std::path::PathBuf;

/// Container and stream facts for one media file
#[derive(Debug, Clone, Serialize)]
pub struct MediaMetadata {
    pub path: PathBuf,
    pub format_name: Option<String>,
    pub duration_secs: Option<f64>,
    pub size_bytes: Option<u64>,
    pub bitrate_kbps: Option<u64>,
    pub video_tracks: Vec<VideoTrack>,
    pub audio_tracks: Vec<AudioTrack>,
}

impl MediaMetadata {
    /// The first video track, which is the one every tool operates on
    pub fn primary_video(&self) -> Option<&VideoTrack> {
        self.video_tracks.first()
    }

    /// Container duration, failing when the probe did not report one
    pub fn duration(&self) -> Result<f64, AppError> {
        self.duration_secs.ok_or_else(|| {
            AppError::Probe(format!("no duration reported for {}", self.path.display()))
        })
    }
}

/// Video stream facts
#[derive(Debug, Clone, Default, Serialize)]
pub struct VideoTrack {
    pub index: usize,
    pub codec_name: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    pub pixel_format: Option<String>,
    pub bitrate_kbps: Option<u64>,
    pub max_bitrate_kbps: Option<u64>,
    pub stream_size_kb: Option<u64>,
}

impl VideoTrack {
    /// Frames per second, `None` when the stream reports no usable rate
    pub fn frame_rate(&self) -> Option<f64> {
        if self.frame_rate_num > 0 && self.frame_rate_den > 0 {
            Some(self.frame_rate_num as f64 / self.frame_rate_den as f64)
        } else {
            None
        }
    }

    /// Get resolution string
    pub fn resolution_string(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Get frame rate string
    pub fn frame_rate_string(&self) -> String {
        match self.frame_rate() {
            Some(fps) => format!("{:.3} fps", fps),
            None => "Unknown".to_string(),
        }
    }
}

/// Audio stream facts
#[derive(Debug, Clone, Default, Serialize)]
pub struct AudioTrack {
    pub index: usize,
    pub codec_name: String,
    pub channels: Option<u16>,
    pub sample_rate: Option<u32>,
    pub bitrate_kbps: Option<u64>,
    pub language: Option<String>,
}
