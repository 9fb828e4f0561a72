use crate::cli::{Command, EncodeArgs, SearchArgs};
use crate::config::AppConfig;
use crate::encoder::EncodeConfig;
use crate::search::{
    OptimizeReport, OptimizeRequest, SearchRequest, SearchResult, TrialScore, run_optimized_encode,
    run_search,
};
use crate::tools::{FfmpegTools, MediaTools};
use crate::utils::{format_duration, format_file_size, format_kbps};
use anyhow::{Context, Result, bail};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

/// Run one action. `config_file` is the `--config` path, if any.
pub fn dispatch(
    command: Command,
    config_file: Option<&Path>,
    config: &AppConfig,
    tools: &FfmpegTools,
) -> Result<()> {
    match command {
        Command::Optimize {
            input,
            output,
            search,
            encode,
        } => optimize(config, tools, input, output, &search, &encode),
        Command::Search {
            input,
            search,
            encode,
        } => search_only(config, tools, input, &search, &encode),
        Command::Encode {
            input,
            output,
            crf,
            bitrate,
            encode,
        } => encode_fixed(config, tools, &input, &output, crf, bitrate, &encode),
        Command::Score {
            input,
            output,
            speed,
        } => score(tools, &input, &output, speed.unwrap_or(config.vmaf.final_speed)),
        Command::Inspect { input } => inspect(tools, &input),
        Command::InitConfig { force } => init_config(config_file, force),
    }
}

fn search_request(
    config: &AppConfig,
    input: PathBuf,
    search: &SearchArgs,
    encode: &EncodeArgs,
) -> Result<SearchRequest> {
    let mut merged = config.clone();
    search.apply(&mut merged.search);
    merged.validate().context("invalid search settings")?;

    Ok(SearchRequest {
        source: input,
        params: merged.search,
        sampling: merged.sampling,
        base_config: encode.to_config(&merged.encode),
        vmaf_speed: merged.vmaf.speed,
    })
}

fn optimize(
    config: &AppConfig,
    tools: &FfmpegTools,
    input: PathBuf,
    output: PathBuf,
    search: &SearchArgs,
    encode: &EncodeArgs,
) -> Result<()> {
    let request = OptimizeRequest {
        search: search_request(config, input, search, encode)?,
        output,
        final_vmaf_speed: config.vmaf.final_speed,
    };

    let started = Instant::now();
    let report = run_optimized_encode(tools, &request)
        .with_context(|| format!("optimize {}", request.search.source.display()))?;

    print_report(&report, &request.output);
    info!("Done in {}", format_duration(started.elapsed()));
    Ok(())
}

fn search_only(
    config: &AppConfig,
    tools: &FfmpegTools,
    input: PathBuf,
    search: &SearchArgs,
    encode: &EncodeArgs,
) -> Result<()> {
    let request = search_request(config, input, search, encode)?;
    let result = run_search(tools, &request)
        .with_context(|| format!("search {}", request.source.display()))?;

    print_search(&result);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn encode_fixed(
    config: &AppConfig,
    tools: &FfmpegTools,
    input: &Path,
    output: &Path,
    crf: Option<i32>,
    bitrate: Option<u32>,
    encode: &EncodeArgs,
) -> Result<()> {
    let encode_config = EncodeConfig {
        crf,
        bitrate_kbps: bitrate,
        ..encode.to_config(&config.encode)
    };

    tools
        .encode(input, output, &encode_config)
        .with_context(|| format!("encode {}", input.display()))?;
    score(tools, input, output, config.vmaf.final_speed)
}

fn score(tools: &FfmpegTools, reference: &Path, distorted: &Path, speed: u32) -> Result<()> {
    let vmaf = tools
        .vmaf(distorted, reference, speed)
        .with_context(|| format!("score {}", distorted.display()))?;
    let metadata = tools
        .probe_metadata(distorted)
        .with_context(|| format!("probe {}", distorted.display()))?;
    let stats = TrialScore::from_metadata(vmaf.score, &metadata);

    println!("{}", vmaf);
    println!(
        "Bitrate: avg {}, max {}",
        format_kbps(stats.avg_bitrate_kbps),
        format_kbps(stats.max_bitrate_kbps)
    );
    if let Some(bytes) = metadata.size_bytes {
        println!("Size: {}", format_file_size(bytes));
    }
    Ok(())
}

fn inspect(tools: &FfmpegTools, input: &Path) -> Result<()> {
    let metadata = tools
        .probe_metadata(input)
        .with_context(|| format!("probe {}", input.display()))?;

    let dest = inspect_path(input);
    let json = serde_json::to_string_pretty(&metadata).context("serialize metadata")?;
    std::fs::write(&dest, json).with_context(|| format!("write {}", dest.display()))?;

    if let Some(video) = metadata.primary_video() {
        println!(
            "Video: {} {} @ {}",
            video.codec_name,
            video.resolution_string(),
            video.frame_rate_string()
        );
    }
    println!(
        "Audio tracks: {}, duration: {}",
        metadata.audio_tracks.len(),
        metadata
            .duration_secs
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| format_duration(Duration::from_secs_f64(d)))
            .unwrap_or_else(|| "unknown".to_string())
    );
    println!("Wrote {}", dest.display());
    Ok(())
}

/// `<input>_inspect.json`, next to the input
fn inspect_path(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push("_inspect.json");
    PathBuf::from(name)
}

/// Write the default config to `path`, or the default location
pub fn init_config(path: Option<&Path>, force: bool) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);
    if path.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite",
            path.display()
        );
    }

    AppConfig::default()
        .save(&path)
        .with_context(|| format!("write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn print_search(result: &SearchResult) {
    for trial in &result.trials {
        println!("  crf {:>3}  VMAF {:6.2}", trial.crf, trial.vmaf);
    }
    println!(
        "Selected crf {} (VMAF {:.2}, {})",
        result.crf, result.vmaf, result.outcome
    );
}

fn print_report(report: &OptimizeReport, output: &Path) {
    println!("Output:      {}", output.display());
    println!("CRF:         {} ({})", report.selected_crf, report.outcome);
    println!("Sample VMAF: {:.2}", report.search_vmaf);
    println!("Final VMAF:  {:.2}", report.final_vmaf);
    println!("Bitrate:     {}", format_kbps(report.avg_bitrate_kbps));
    if let Some(mb) = report.stream_size_mb {
        println!("Video size:  {:.2} MB", mb);
    }
}
