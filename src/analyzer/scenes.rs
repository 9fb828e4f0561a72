use crate::error::AppError;
use crate::utils::{escape_filter_value, run_command};
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use tracing::info;

/// A frame ffmpeg's scene filter flagged as a cut
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneCut {
    /// Presentation time in seconds
    pub pts_secs: f64,
    /// `lavfi.scene_score`, 0-1, higher means a harder cut
    pub significance: f64,
    pub is_key_frame: bool,
}

/// Detect scene cuts with ffprobe's lavfi `select=gt(scene,threshold)`
pub fn detect_scene_cuts(
    path: &Path,
    threshold: f64,
    cancel: &AtomicBool,
) -> Result<Vec<SceneCut>, AppError> {
    let args = vec![
        "-hide_banner".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-show_frames".to_string(),
        "-of".to_string(),
        "json".to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        scene_filter(path, threshold),
    ];

    info!("Running scene detection on {}", path.display());

    let output = run_command("ffprobe", &args, cancel, AppError::Detection, None)?;
    parse_scene_frames(&output.stdout)
}

/// The lavfi source graph: decode `path` and keep only scene-change frames
fn scene_filter(path: &Path, threshold: f64) -> String {
    format!(
        "movie={},select=gt(scene\\,{})",
        escape_filter_value(&path.to_string_lossy()),
        threshold
    )
}

/// Parse ffprobe `-show_frames` JSON into scene cuts, in stream order
pub fn parse_scene_frames(json: &str) -> Result<Vec<SceneCut>, AppError> {
    let data: FramesOutput = serde_json::from_str(json)
        .map_err(|e| AppError::Detection(format!("Failed to parse ffprobe frames: {}", e)))?;

    Ok(data
        .frames
        .into_iter()
        .filter_map(|frame| {
            let pts_secs = frame
                .pts_time
                .as_deref()
                .or(frame.best_effort_timestamp_time.as_deref())
                .and_then(|t| t.parse::<f64>().ok())?;
            let significance = frame
                .tags
                .scene_score
                .as_deref()
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(0.0);
            Some(SceneCut {
                pts_secs,
                significance,
                is_key_frame: frame.key_frame == Some(1),
            })
        })
        .collect())
}

// JSON deserialization structures

#[derive(Debug, Deserialize)]
struct FramesOutput {
    #[serde(default)]
    frames: Vec<RawFrame>,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    key_frame: Option<u8>,
    pts_time: Option<String>,
    best_effort_timestamp_time: Option<String>,
    #[serde(default)]
    tags: FrameTags,
}

#[derive(Debug, Default, Deserialize)]
struct FrameTags {
    #[serde(rename = "lavfi.scene_score")]
    scene_score: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frames() {
        let json = r#"{
            "frames": [
                {
                    "media_type": "video",
                    "key_frame": 0,
                    "pts_time": "4.004000",
                    "tags": { "lavfi.scene_score": "0.412000" }
                },
                {
                    "media_type": "video",
                    "key_frame": 1,
                    "best_effort_timestamp_time": "12.512000",
                    "tags": { "lavfi.scene_score": "0.876500" }
                },
                { "media_type": "video", "key_frame": 0 }
            ]
        }"#;

        let cuts = parse_scene_frames(json).unwrap();
        assert_eq!(cuts.len(), 2);
        assert_eq!(cuts[0].pts_secs, 4.004);
        assert_eq!(cuts[0].significance, 0.412);
        assert!(!cuts[0].is_key_frame);
        assert_eq!(cuts[1].pts_secs, 12.512);
        assert!(cuts[1].is_key_frame);
    }

    #[test]
    fn test_empty_output_means_no_cuts() {
        assert!(parse_scene_frames("{}").unwrap().is_empty());
    }

    #[test]
    fn test_bad_json_is_detection_error() {
        assert!(matches!(parse_scene_frames("["), Err(AppError::Detection(_))));
    }

    #[test]
    fn test_scene_filter_escapes_path() {
        let filter = scene_filter(Path::new("/media/a,b.mp4"), 0.3);
        assert_eq!(filter, r"movie=/media/a\,b.mp4,select=gt(scene\,0.3)");
    }
}
