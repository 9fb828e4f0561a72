use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CRF search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// VMAF score to aim for (0-100)
    pub target_vmaf: f64,
    /// Accepted absolute distance from the target
    pub tolerance: f64,
    /// First CRF to try
    pub initial_crf: i32,
    /// Lowest-quality end of the range (search position 0)
    pub min_crf: i32,
    /// Highest-quality end of the range
    pub max_crf: i32,
    /// Safety cap on interpolation steps
    pub max_iterations: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            target_vmaf: 95.0,
            tolerance: 0.5,
            initial_crf: 20,
            min_crf: 30,
            max_crf: 15,
            max_iterations: 20,
        }
    }
}

/// Scene sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Sources shorter than this are scored directly
    pub min_source_secs: f64,
    /// Cuts closer than this to the next cut are dropped
    pub min_scene_secs: f64,
    /// Cap on the length of a single sampled scene
    pub max_scene_secs: f64,
    /// Cap on the number of sampled scenes
    pub max_scenes: usize,
    /// ffmpeg scene-change threshold (0-1)
    pub scene_threshold: f64,
    /// Where temporary samples and trial encodes are written
    pub work_dir: Option<PathBuf>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            min_source_secs: 60.0,
            min_scene_secs: 2.0,
            max_scene_secs: 10.0,
            max_scenes: 15,
            scene_threshold: 0.3,
            work_dir: None,
        }
    }
}

/// Default encode settings, overridable from the command line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeDefaults {
    /// FFmpeg video encoder name
    pub codec: String,
    /// FFmpeg audio encoder name, audio is dropped when unset
    pub audio_codec: Option<String>,
    pub audio_bitrate_kbps: Option<u32>,
}

impl Default for EncodeDefaults {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            audio_codec: None,
            audio_bitrate_kbps: None,
        }
    }
}

/// VMAF configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VmafConfig {
    /// Speed used while searching (1 = every frame, 10 = every 10th frame)
    pub speed: u32,
    /// Speed used to score the final full encode
    pub final_speed: u32,
    /// libvmaf threads (0 = one less than the number of cores)
    pub threads: u32,
}

impl Default for VmafConfig {
    fn default() -> Self {
        Self {
            speed: 5,
            final_speed: 5,
            threads: 0,
        }
    }
}
