use crate::config::types::{EncodeDefaults, SearchConfig};
use crate::encoder::{EncodeConfig, Tune};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dynacrf")]
#[command(version, about = "Find the CRF that reaches a VMAF target, then encode at it", long_about = None)]
pub struct Cli {
    /// Config file, defaults to <config dir>/dynacrf/config.toml
    #[arg(long, global = true, value_name = "PATH", value_parser = expand_path)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search for the CRF on a sample, then encode the whole source with it
    Optimize {
        #[arg(short, long, value_parser = expand_path)]
        input: PathBuf,
        #[arg(short, long, value_parser = mp4_path)]
        output: PathBuf,
        #[command(flatten)]
        search: SearchArgs,
        #[command(flatten)]
        encode: EncodeArgs,
    },

    /// Only search for the CRF and print it
    Search {
        #[arg(short, long, value_parser = expand_path)]
        input: PathBuf,
        #[command(flatten)]
        search: SearchArgs,
        #[command(flatten)]
        encode: EncodeArgs,
    },

    /// Encode at a fixed CRF or bitrate and score the result
    Encode {
        #[arg(short, long, value_parser = expand_path)]
        input: PathBuf,
        #[arg(short, long, value_parser = mp4_path)]
        output: PathBuf,
        #[arg(long, conflicts_with = "bitrate", required_unless_present = "bitrate")]
        crf: Option<i32>,
        /// Target video bitrate in Kbps
        #[arg(long, value_name = "KBPS")]
        bitrate: Option<u32>,
        #[command(flatten)]
        encode: EncodeArgs,
    },

    /// Score a distorted file against its reference
    Score {
        /// Reference file
        #[arg(short, long, value_parser = expand_path)]
        input: PathBuf,
        /// Distorted file
        #[arg(short, long, value_parser = expand_path)]
        output: PathBuf,
        /// 1 scores every frame, 10 every tenth frame
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10))]
        speed: Option<u32>,
    },

    /// Write probe metadata to <input>_inspect.json
    Inspect {
        #[arg(short, long, value_parser = expand_path)]
        input: PathBuf,
    },

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Search overrides, unset flags keep the configured value
#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
    #[arg(long)]
    pub target_vmaf: Option<f64>,
    #[arg(long)]
    pub tolerance: Option<f64>,
    #[arg(long)]
    pub initial_crf: Option<i32>,
    /// Lowest-quality CRF allowed
    #[arg(long)]
    pub min_crf: Option<i32>,
    /// Highest-quality CRF allowed
    #[arg(long)]
    pub max_crf: Option<i32>,
}

impl SearchArgs {
    pub fn apply(&self, config: &mut SearchConfig) {
        if let Some(v) = self.target_vmaf {
            config.target_vmaf = v;
        }
        if let Some(v) = self.tolerance {
            config.tolerance = v;
        }
        if let Some(v) = self.initial_crf {
            config.initial_crf = v;
        }
        if let Some(v) = self.min_crf {
            config.min_crf = v;
        }
        if let Some(v) = self.max_crf {
            config.max_crf = v;
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct EncodeArgs {
    /// FFmpeg video encoder
    #[arg(long)]
    pub codec: Option<String>,
    #[arg(short = 'W', long)]
    pub width: Option<u32>,
    #[arg(short = 'H', long)]
    pub height: Option<u32>,
    #[arg(long = "maxbitrate", value_name = "KBPS")]
    pub max_bitrate: Option<u32>,
    #[arg(long = "minbitrate", value_name = "KBPS")]
    pub min_bitrate: Option<u32>,
    #[arg(long = "buffersize", value_name = "KBPS")]
    pub buffer_size: Option<u32>,
    /// Output frame rate, e.g. 30 or 24000/1001
    #[arg(long, value_parser = parse_frame_rate)]
    pub frame_rate: Option<(u32, u32)>,
    #[arg(long, value_enum)]
    pub tune: Option<Tune>,
    #[arg(long)]
    pub audio_codec: Option<String>,
    /// Audio bitrate in Kbps
    #[arg(long, value_name = "KBPS")]
    pub audio_bitrate: Option<u32>,
}

impl EncodeArgs {
    /// Encode settings from these flags over the configured defaults
    pub fn to_config(&self, defaults: &EncodeDefaults) -> EncodeConfig {
        EncodeConfig {
            codec: Some(self.codec.clone().unwrap_or_else(|| defaults.codec.clone())),
            width: self.width,
            height: self.height,
            crf: None,
            bitrate_kbps: None,
            min_bitrate_kbps: self.min_bitrate,
            max_bitrate_kbps: self.max_bitrate,
            buffer_size_kbps: self.buffer_size,
            frame_rate: self.frame_rate,
            tune: self.tune,
            audio_codec: self.audio_codec.clone().or_else(|| defaults.audio_codec.clone()),
            audio_bitrate_kbps: self.audio_bitrate.or(defaults.audio_bitrate_kbps),
        }
    }
}

/// Expand a leading `~/` to the home directory
fn expand_path(value: &str) -> Result<PathBuf, String> {
    match value.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .ok_or_else(|| "cannot expand ~: no home directory".to_string()),
        None => Ok(PathBuf::from(value)),
    }
}

fn mp4_path(value: &str) -> Result<PathBuf, String> {
    let path = expand_path(value)?;
    let is_mp4 = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
    if is_mp4 {
        Ok(path)
    } else {
        Err(format!("{} must be an .mp4 file", value))
    }
}

fn parse_frame_rate(value: &str) -> Result<(u32, u32), String> {
    let (num, den) = value.split_once('/').unwrap_or((value, "1"));
    match (num.trim().parse::<u32>(), den.trim().parse::<u32>()) {
        (Ok(num), Ok(den)) if num > 0 && den > 0 => Ok((num, den)),
        _ => Err(format!("invalid frame rate: {}", value)),
    }
}
