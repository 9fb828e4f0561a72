use crate::config::types::SamplingConfig;
use crate::error::AppError;
use crate::search::scenes::{Scene, SceneLimits, select_source_scenes};
use crate::tools::MediaTools;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The clip every trial is encoded from and scored against.
///
/// A built sample lives in its own temporary directory, removed on drop.
#[derive(Debug)]
pub enum Sample {
    /// The source itself, for sources too short to be worth sampling
    Source(PathBuf),
    Built { path: PathBuf, _workspace: TempDir },
}

impl Sample {
    pub fn path(&self) -> &Path {
        match self {
            Sample::Source(path) => path,
            Sample::Built { path, .. } => path,
        }
    }
}

/// Probe `source` and build its sample, or use it directly when it is
/// shorter than `min_source_secs`.
pub fn prepare_sample<T: MediaTools + ?Sized>(
    tools: &T,
    source: &Path,
    sampling: &SamplingConfig,
    work_dir: &Path,
) -> Result<Sample, AppError> {
    let metadata = tools.probe_metadata(source)?;
    if metadata.primary_video().is_none() {
        return Err(AppError::NoVideoStream(source.to_path_buf()));
    }

    let duration = metadata.duration()?;
    if duration < sampling.min_source_secs {
        info!(
            "Source is {:.1}s (< {:.0}s), scoring it directly",
            duration, sampling.min_source_secs
        );
        return Ok(Sample::Source(source.to_path_buf()));
    }

    let (scenes, frame_rate) =
        select_source_scenes(tools, source, &metadata, &SceneLimits::from(sampling))?;
    build_sample(tools, source, &scenes, frame_rate, work_dir)
}

/// Extract every scene with stream copy and join them into one sample
pub fn build_sample<T: MediaTools + ?Sized>(
    tools: &T,
    source: &Path,
    scenes: &[Scene],
    frame_rate: f64,
    work_dir: &Path,
) -> Result<Sample, AppError> {
    let workspace = tempfile::Builder::new()
        .prefix("dynacrf_sample_")
        .tempdir_in(work_dir)
        .map_err(|e| AppError::SampleExtraction(format!("Failed to create sample dir: {}", e)))?;

    let mut segments = Vec::with_capacity(scenes.len());
    for (i, scene) in scenes.iter().enumerate() {
        let frame_count = (frame_rate * scene.duration_secs).round() as u64;
        if frame_count == 0 {
            debug!("Skipping empty scene at {:.3}s", scene.start_secs);
            continue;
        }

        let segment = workspace.path().join(format!("segment_{:03}.ts", i));
        debug!(
            "Scene {}: {:.3}s + {:.3}s ({} frames, significance {:.3})",
            i, scene.start_secs, scene.duration_secs, frame_count, scene.significance
        );
        tools.extract_stream_copy(source, &segment, scene.start_secs, frame_count)?;
        segments.push(segment);
    }

    let path = workspace.path().join("sample.mp4");
    tools.concat_stream_copy(&segments, &path)?;

    info!("Built sample from {} scenes", segments.len());
    Ok(Sample::Built {
        path,
        _workspace: workspace,
    })
}
