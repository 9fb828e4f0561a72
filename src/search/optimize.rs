use crate::error::AppError;
use crate::search::{SearchOutcome, SearchRequest, TrialScore, run_search};
use crate::tools::MediaTools;
use crate::utils::{format_file_size, has_enough_space};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Search, then encode the full source at the selected CRF
#[derive(Debug, Clone)]
pub struct OptimizeRequest {
    pub search: SearchRequest,
    pub output: PathBuf,
    /// VMAF speed for scoring the final encode
    pub final_vmaf_speed: u32,
}

/// Result of an optimized encode
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeReport {
    pub selected_crf: i32,
    pub outcome: SearchOutcome,
    /// Score of the selected CRF on the sample
    pub search_vmaf: f64,
    /// Score of the final encode against the full source
    pub final_vmaf: f64,
    pub avg_bitrate_kbps: Option<u64>,
    pub stream_size_mb: Option<f64>,
}

/// Run the CRF search and one final encode at the selected CRF.
///
/// A failed search is reported as [`AppError::SearchFailed`] and no final
/// encode is attempted.
pub fn run_optimized_encode<T: MediaTools + ?Sized>(
    tools: &T,
    request: &OptimizeRequest,
) -> Result<OptimizeReport, AppError> {
    let source = &request.search.source;

    let result = run_search(tools, &request.search).map_err(|e| {
        if e.is_cancelled() {
            AppError::Cancelled
        } else {
            error!("CRF search failed at {} stage: {}", e.stage(), e);
            AppError::SearchFailed(Box::new(e))
        }
    })?;

    warn_if_low_space(source, &request.output);

    let config = request.search.base_config.with_crf(result.crf);
    info!(
        "Final encode at crf {}: {} -> {}",
        result.crf,
        source.display(),
        request.output.display()
    );
    tools.encode(source, &request.output, &config)?;

    let final_vmaf = tools.measure_quality(&request.output, source, request.final_vmaf_speed)?;
    let metadata = tools.probe_metadata(&request.output)?;
    let stats = TrialScore::from_metadata(final_vmaf, &metadata);

    let report = OptimizeReport {
        selected_crf: result.crf,
        outcome: result.outcome,
        search_vmaf: result.vmaf,
        final_vmaf,
        avg_bitrate_kbps: stats.avg_bitrate_kbps,
        stream_size_mb: stats.stream_size_kb.map(|kb| kb as f64 / 1000.0),
    };
    info!(
        "Final encode: crf {}, VMAF {:.2} (sample {:.2})",
        report.selected_crf, report.final_vmaf, report.search_vmaf
    );
    Ok(report)
}

/// Warn when the output directory has less free space than the source size
fn warn_if_low_space(source: &Path, output: &Path) {
    let Ok(source_size) = std::fs::metadata(source).map(|m| m.len()) else {
        return;
    };
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    if !has_enough_space(dir, source_size) {
        warn!(
            "Less than {} free in {}, the final encode may not fit",
            format_file_size(source_size),
            dir.display()
        );
    }
}
