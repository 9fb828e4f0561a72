use crate::analyzer::MediaMetadata;
use crate::encoder::EncodeConfig;
use crate::error::AppError;
use crate::tools::MediaTools;
use std::path::Path;
use tracing::info;

/// Quality and size of one trial encode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialScore {
    pub vmaf: f64,
    pub avg_bitrate_kbps: Option<u64>,
    pub max_bitrate_kbps: Option<u64>,
    pub stream_size_kb: Option<u64>,
}

impl TrialScore {
    /// Score with the size statistics of `encoded`
    pub fn from_metadata(vmaf: f64, encoded: &MediaMetadata) -> Self {
        let video = encoded.primary_video();
        Self {
            vmaf,
            avg_bitrate_kbps: video
                .and_then(|v| v.bitrate_kbps)
                .or(encoded.bitrate_kbps),
            max_bitrate_kbps: video.and_then(|v| v.max_bitrate_kbps),
            stream_size_kb: video
                .and_then(|v| v.stream_size_kb)
                .or(encoded.size_bytes.map(|b| b / 1000)),
        }
    }
}

/// Encode `sample` with `config` into a temporary file under `work_dir` and
/// score it against `sample`. The trial file is removed on return.
pub fn score_trial<T: MediaTools + ?Sized>(
    tools: &T,
    sample: &Path,
    config: &EncodeConfig,
    vmaf_speed: u32,
    work_dir: &Path,
) -> Result<TrialScore, AppError> {
    let trial = tempfile::Builder::new()
        .prefix("dynacrf_trial_")
        .suffix(".mp4")
        .tempfile_in(work_dir)?;

    tools.encode(sample, trial.path(), config)?;
    let vmaf = tools.measure_quality(trial.path(), sample, vmaf_speed)?;
    let metadata = tools.probe_metadata(trial.path())?;

    let score = TrialScore::from_metadata(vmaf, &metadata);
    info!(
        "Trial {}: VMAF {:.2}, avg {} max {} size {}",
        config.rate_control(),
        score.vmaf,
        crate::utils::format_kbps(score.avg_bitrate_kbps),
        crate::utils::format_kbps(score.max_bitrate_kbps),
        score
            .stream_size_kb
            .map_or_else(|| "n/a".to_string(), |kb| format!("{}KB", kb)),
    );
    Ok(score)
}
