use crate::analyzer::{MediaMetadata, SceneCut};
use crate::config::types::SamplingConfig;
use crate::error::AppError;
use crate::tools::MediaTools;
use std::path::Path;
use tracing::{debug, info};

/// A time range of the source chosen for the sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scene {
    pub start_secs: f64,
    pub duration_secs: f64,
    pub significance: f64,
    pub starts_on_key_frame: bool,
}

/// Bounds applied while turning scene cuts into scenes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLimits {
    pub min_scene_secs: f64,
    pub max_scene_secs: f64,
    pub max_scenes: usize,
}

impl From<&SamplingConfig> for SceneLimits {
    fn from(config: &SamplingConfig) -> Self {
        Self {
            min_scene_secs: config.min_scene_secs,
            max_scene_secs: config.max_scene_secs,
            max_scenes: config.max_scenes,
        }
    }
}

/// Probe `source` for its frame rate and scene cuts and select the scenes to
/// sample. Returns the scenes in time order together with the frame rate.
pub fn select_source_scenes<T: MediaTools + ?Sized>(
    tools: &T,
    source: &Path,
    metadata: &MediaMetadata,
    limits: &SceneLimits,
) -> Result<(Vec<Scene>, f64), AppError> {
    let video = metadata
        .primary_video()
        .ok_or_else(|| AppError::NoVideoStream(source.to_path_buf()))?;
    let frame_rate = video.frame_rate().ok_or_else(|| {
        AppError::Probe(format!(
            "unusable frame rate {}/{} in {}",
            video.frame_rate_num,
            video.frame_rate_den,
            source.display()
        ))
    })?;
    let duration = metadata.duration()?;

    let cuts = tools.detect_scene_cuts(source)?;
    info!("Detected {} scene cut candidates", cuts.len());

    let scenes = select_scenes(cuts, duration, limits);
    info!(
        "Selected {} scenes ({:.1}s of {:.1}s)",
        scenes.len(),
        scenes.iter().map(|s| s.duration_secs).sum::<f64>(),
        duration
    );
    Ok((scenes, frame_rate))
}

/// Turn raw scene cuts into at most `max_scenes` sampled scenes.
///
/// A cut is dropped when the next cut (or the end of the stream) is closer
/// than `min_scene_secs`. Over the cap, the most significant cuts win. Every
/// scene lasts at most `max_scene_secs` and never runs past the next kept
/// scene or the end of the stream.
pub fn select_scenes(mut cuts: Vec<SceneCut>, duration_secs: f64, limits: &SceneLimits) -> Vec<Scene> {
    cuts.sort_by(|a, b| a.pts_secs.total_cmp(&b.pts_secs));

    let mut kept: Vec<SceneCut> = cuts
        .iter()
        .enumerate()
        .filter(|(i, cut)| {
            let next = cuts.get(i + 1).map_or(duration_secs, |n| n.pts_secs);
            next - cut.pts_secs >= limits.min_scene_secs
        })
        .map(|(_, cut)| *cut)
        .collect();

    if kept.len() > limits.max_scenes {
        debug!(
            "Keeping the {} most significant of {} scenes",
            limits.max_scenes,
            kept.len()
        );
        kept.sort_by(|a, b| b.significance.total_cmp(&a.significance));
        kept.truncate(limits.max_scenes);
        kept.sort_by(|a, b| a.pts_secs.total_cmp(&b.pts_secs));
    }

    if kept.is_empty() {
        debug!("No usable scene cuts, sampling from the start");
        return vec![Scene {
            start_secs: 0.0,
            duration_secs: limits.max_scene_secs.min(duration_secs),
            significance: 0.0,
            starts_on_key_frame: true,
        }];
    }

    kept.iter()
        .enumerate()
        .map(|(i, cut)| {
            let end = kept.get(i + 1).map_or(duration_secs, |n| n.pts_secs);
            Scene {
                start_secs: cut.pts_secs,
                duration_secs: limits.max_scene_secs.min(end - cut.pts_secs),
                significance: cut.significance,
                starts_on_key_frame: cut.is_key_frame,
            }
        })
        .collect()
}
