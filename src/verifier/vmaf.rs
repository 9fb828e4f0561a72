use crate::error::AppError;
use crate::utils::{escape_filter_value, run_command};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use tracing::{debug, info, warn};

/// Width from which the 4K model is used
const UHD_WIDTH: u32 = 3840;

/// VMAF quality result
#[derive(Debug, Clone, PartialEq)]
pub struct VmafResult {
    /// Mean VMAF score (0-100, higher is better)
    pub score: f64,
    /// Minimum frame score, unknown when read from the log line
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
}

impl VmafResult {
    /// Get human-readable quality grade
    pub fn quality_grade(&self) -> &'static str {
        match self.score as u32 {
            95..=100 => "Excellent",
            90..=94 => "Very Good",
            80..=89 => "Good",
            70..=79 => "Fair",
            60..=69 => "Poor",
            _ => "Bad",
        }
    }
}

impl std::fmt::Display for VmafResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VMAF: {:.2} ({})", self.score, self.quality_grade())?;
        if let (Some(min), Some(max)) = (self.min_score, self.max_score) {
            write!(f, " [min: {:.2}, max: {:.2}]", min, max)?;
        }
        Ok(())
    }
}

/// How a VMAF comparison is run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VmafOptions {
    /// 1 scores every frame, 10 every tenth frame
    pub speed: u32,
    /// libvmaf threads, 0 picks one less than the core count
    pub threads: u32,
    /// Reference (width, height), when known
    pub reference_size: Option<(u32, u32)>,
    /// Distorted (width, height), when known
    pub distorted_size: Option<(u32, u32)>,
}

impl VmafOptions {
    fn thread_count(&self) -> u32 {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| (n.get() as u32).saturating_sub(1).max(1))
            .unwrap_or(1)
    }

    fn uses_4k_model(&self) -> bool {
        self.reference_size.is_some_and(|(w, _)| w >= UHD_WIDTH)
    }
}

/// Measure VMAF of `distorted` against `reference`
pub fn measure_vmaf(
    distorted: &Path,
    reference: &Path,
    options: &VmafOptions,
    cancel: &AtomicBool,
) -> Result<VmafResult, AppError> {
    let log_file = tempfile::Builder::new()
        .prefix("dynacrf_vmaf_")
        .suffix(".json")
        .tempfile()
        .map_err(|e| AppError::Score(format!("Failed to create VMAF log: {}", e)))?;

    let filter = build_vmaf_filter(&log_file.path().to_string_lossy(), options);
    let args = vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-i".to_string(),
        distorted.to_string_lossy().to_string(),
        "-i".to_string(),
        reference.to_string_lossy().to_string(),
        "-an".to_string(),
        "-lavfi".to_string(),
        filter,
        "-f".to_string(),
        "null".to_string(),
        "-".to_string(),
    ];

    info!(
        "Calculating VMAF: {} vs {} (model: {}, subsample: {})",
        distorted.display(),
        reference.display(),
        if options.uses_4k_model() {
            "vmaf_4k_v0.6.1"
        } else {
            "vmaf_v0.6.1 (default)"
        },
        options.speed
    );

    let output = run_command("ffmpeg", &args, cancel, AppError::Score, None).map_err(|e| {
        match e {
            AppError::Score(msg) if msg.contains("No such filter: 'libvmaf'") => AppError::Score(
                "VMAF not available. FFmpeg must be compiled with libvmaf support.".to_string(),
            ),
            other => other,
        }
    })?;

    let result = match std::fs::read_to_string(log_file.path())
        .ok()
        .and_then(|json| parse_vmaf_json(&json).ok())
    {
        Some(result) => result,
        None => {
            warn!("VMAF log unreadable, falling back to ffmpeg output");
            parse_vmaf_stderr(&output.stderr)?
        }
    };

    info!("VMAF result: {}", result);
    Ok(result)
}

/// The libvmaf filtergraph. The distorted input is upscaled to the reference
/// size when both sizes are known and differ.
pub fn build_vmaf_filter(log_path: &str, options: &VmafOptions) -> String {
    let scale = match (options.distorted_size, options.reference_size) {
        (Some(dist), Some((w, h))) if dist != (w, h) => {
            format!("scale={}:{}:flags=bicubic,", w, h)
        }
        _ => String::new(),
    };

    let model = if options.uses_4k_model() {
        ":model=version=vmaf_4k_v0.6.1"
    } else {
        ""
    };

    let filter = format!(
        "[0:v]{}setpts=PTS-STARTPTS[distorted];\
         [1:v]setpts=PTS-STARTPTS[reference];\
         [distorted][reference]libvmaf=log_path={}:log_fmt=json:n_threads={}:n_subsample={}{}",
        scale,
        escape_filter_value(log_path),
        options.thread_count(),
        options.speed,
        model
    );
    debug!("VMAF filter: {}", filter);
    filter
}

/// Pooled VMAF statistics from a libvmaf JSON log
pub fn parse_vmaf_json(json: &str) -> Result<VmafResult, AppError> {
    let data: VmafJson = serde_json::from_str(json)
        .map_err(|e| AppError::Score(format!("Failed to parse VMAF JSON: {}", e)))?;

    Ok(VmafResult {
        score: data.pooled_metrics.vmaf.mean,
        min_score: data.pooled_metrics.vmaf.min,
        max_score: data.pooled_metrics.vmaf.max,
    })
}

/// Last `VMAF score: N` line in ffmpeg's stderr
pub fn parse_vmaf_stderr(stderr: &str) -> Result<VmafResult, AppError> {
    let re = Regex::new(r"VMAF score:\s*([0-9]+(?:\.[0-9]+)?)")
        .map_err(|e| AppError::Score(format!("Invalid VMAF pattern: {}", e)))?;

    re.captures_iter(stderr)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|score| VmafResult {
            score,
            min_score: None,
            max_score: None,
        })
        .ok_or_else(|| AppError::Score("No VMAF score in ffmpeg output".to_string()))
}

// JSON deserialization structures

#[derive(Debug, Deserialize)]
struct VmafJson {
    pooled_metrics: PooledMetrics,
}

#[derive(Debug, Deserialize)]
struct PooledMetrics {
    vmaf: MetricStats,
}

#[derive(Debug, Deserialize)]
struct MetricStats {
    mean: f64,
    min: Option<f64>,
    max: Option<f64>,
}
