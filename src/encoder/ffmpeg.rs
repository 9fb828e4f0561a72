use crate::encoder::command_builder::{
    EncodeConfig, build_concat_args, build_encode_args, build_extract_args,
};
use crate::error::AppError;
use crate::utils::run_command;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use tracing::{debug, info};

/// Encode `source` into `dest` with FFmpeg.
///
/// When `duration_secs` is known, progress is read from FFmpeg's `-progress`
/// file and logged in 10% steps. A failed or cancelled encode removes the
/// partial output.
pub fn encode(
    source: &Path,
    dest: &Path,
    config: &EncodeConfig,
    duration_secs: Option<f64>,
    cancel: &AtomicBool,
) -> Result<(), AppError> {
    let mut args = build_encode_args(source, dest, config)?;

    let progress_file = tempfile::Builder::new()
        .prefix("dynacrf_progress_")
        .tempfile()
        .map_err(|e| AppError::Encode(format!("Failed to create progress file: {}", e)))?;

    // Insert progress args after -nostdin
    args.insert(2, "-progress".to_string());
    args.insert(3, progress_file.path().to_string_lossy().to_string());

    info!(
        "Encoding: {} -> {} with {} ({})",
        source.display(),
        dest.display(),
        config.codec.as_deref().unwrap_or("no video"),
        config.rate_control()
    );

    let mut last_step = 0u32;
    let mut report = || {
        let Some(duration) = duration_secs.filter(|d| *d > 0.0) else {
            return;
        };
        let Some(done_secs) = std::fs::read_to_string(progress_file.path())
            .ok()
            .and_then(|content| parse_progress(&content))
        else {
            return;
        };
        let percent = (done_secs / duration * 100.0).min(100.0);
        let step = (percent / 10.0) as u32;
        if step > last_step {
            last_step = step;
            info!("Encode progress: {:.0}%", percent);
        }
    };

    let tick: &mut dyn FnMut() = &mut report;
    let result = run_command("ffmpeg", &args, cancel, AppError::Encode, Some(tick));
    if result.is_err() {
        let _ = std::fs::remove_file(dest);
    }
    result.map(|_| ())
}

/// Latest `out_time_us` in an FFmpeg progress file, in seconds
pub fn parse_progress(content: &str) -> Option<f64> {
    let mut latest_time_us: Option<f64> = None;
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("out_time_us=")
            && let Ok(time_us) = value.trim().parse::<f64>()
            && time_us > 0.0
        {
            latest_time_us = Some(time_us);
        }
    }
    latest_time_us.map(|us| us / 1_000_000.0)
}

/// Copy `frame_count` frames of the first video stream starting at
/// `start_secs`, without re-encoding
pub fn extract_stream_copy(
    source: &Path,
    dest: &Path,
    start_secs: f64,
    frame_count: u64,
    cancel: &AtomicBool,
) -> Result<(), AppError> {
    debug!(
        "Extracting {} frames at {:.3}s into {}",
        frame_count,
        start_secs,
        dest.display()
    );
    let args = build_extract_args(source, dest, start_secs, frame_count);
    run_command("ffmpeg", &args, cancel, AppError::SampleExtraction, None)?;
    Ok(())
}

/// Join `segments` in order into `dest` without re-encoding
pub fn concat_stream_copy(
    segments: &[PathBuf],
    dest: &Path,
    cancel: &AtomicBool,
) -> Result<(), AppError> {
    if segments.is_empty() {
        return Err(AppError::SampleExtraction(
            "No segments to concatenate".to_string(),
        ));
    }
    debug!("Concatenating {} segments into {}", segments.len(), dest.display());
    let args = build_concat_args(segments, dest);
    run_command("ffmpeg", &args, cancel, AppError::SampleExtraction, None)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_takes_latest() {
        let content = "frame=10\nout_time_us=0\nprogress=continue\n\
                       frame=240\nout_time_us=10010000\nprogress=continue\n\
                       out_time_us=N/A\n";
        assert_eq!(parse_progress(content), Some(10.01));
    }

    #[test]
    fn test_parse_progress_empty() {
        assert_eq!(parse_progress(""), None);
        assert_eq!(parse_progress("out_time_us=0\n"), None);
    }

    #[test]
    fn test_concat_without_segments_fails_early() {
        let cancel = AtomicBool::new(false);
        let err = concat_stream_copy(&[], Path::new("out.mp4"), &cancel).unwrap_err();
        assert!(matches!(err, AppError::SampleExtraction(_)));
    }

    #[test]
    fn test_encode_without_rate_control_never_spawns() {
        let cancel = AtomicBool::new(false);
        let config = EncodeConfig {
            codec: Some("libx264".to_string()),
            ..Default::default()
        };
        let err = encode(Path::new("in.mp4"), Path::new("out.mp4"), &config, None, &cancel)
            .unwrap_err();
        assert!(matches!(err, AppError::Encode(_)));
    }
}
