use crate::analyzer::metadata::{AudioTrack, MediaMetadata, VideoTrack};
use crate::error::AppError;
use crate::utils::run_command;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;

/// Probe container and stream metadata with ffprobe
pub fn probe(path: &Path, cancel: &AtomicBool) -> Result<MediaMetadata, AppError> {
    let args = vec![
        "-hide_banner".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        "-of".to_string(),
        "json".to_string(),
        path.to_string_lossy().to_string(),
    ];

    let output = run_command("ffprobe", &args, cancel, AppError::Probe, None)?;
    parse_metadata(path, &output.stdout)
}

/// Build metadata from ffprobe's `-show_format -show_streams` JSON
pub fn parse_metadata(path: &Path, json: &str) -> Result<MediaMetadata, AppError> {
    let data: FfprobeOutput = serde_json::from_str(json).map_err(|e| {
        AppError::Probe(format!(
            "Failed to parse ffprobe output for {}: {}",
            path.display(),
            e
        ))
    })?;

    let format = data.format.unwrap_or_default();
    let duration_secs = parse_number::<f64>(format.duration.as_deref());

    let mut video_tracks = Vec::new();
    let mut audio_tracks = Vec::new();

    for stream in data.streams {
        match stream.codec_type.as_deref() {
            Some("video") => video_tracks.push(video_track(&stream, duration_secs)),
            Some("audio") => audio_tracks.push(AudioTrack {
                index: stream.index,
                codec_name: codec_name(&stream),
                channels: stream.channels,
                sample_rate: parse_number(stream.sample_rate.as_deref()),
                bitrate_kbps: stream_bitrate_bps(&stream).map(|b| b / 1000),
                language: stream.tags.get("language").cloned(),
            }),
            _ => {}
        }
    }

    Ok(MediaMetadata {
        path: path.to_path_buf(),
        format_name: format.format_name,
        duration_secs,
        size_bytes: parse_number(format.size.as_deref()),
        bitrate_kbps: parse_number::<u64>(format.bit_rate.as_deref()).map(|b| b / 1000),
        video_tracks,
        audio_tracks,
    })
}

fn video_track(stream: &RawStream, container_duration: Option<f64>) -> VideoTrack {
    let (frame_rate_num, frame_rate_den) = parse_frame_rate(
        stream
            .r_frame_rate
            .as_deref()
            .filter(|r| *r != "0/0")
            .or(stream.avg_frame_rate.as_deref()),
    );

    let bitrate_bps = stream_bitrate_bps(stream);
    let duration = parse_number::<f64>(stream.duration.as_deref()).or(container_duration);

    // Matroska muxers record the exact stream size as a tag
    let stream_size_kb = tag_value(&stream.tags, "NUMBER_OF_BYTES")
        .and_then(|v| v.parse::<u64>().ok())
        .map(|bytes| bytes / 1000)
        .or_else(|| match (bitrate_bps, duration) {
            (Some(bps), Some(secs)) => Some((bps as f64 * secs / 8.0 / 1000.0).round() as u64),
            _ => None,
        });

    VideoTrack {
        index: stream.index,
        codec_name: codec_name(stream),
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        frame_rate_num,
        frame_rate_den,
        pixel_format: stream.pix_fmt.clone(),
        bitrate_kbps: bitrate_bps.map(|b| b / 1000),
        max_bitrate_kbps: parse_number::<u64>(stream.max_bit_rate.as_deref()).map(|b| b / 1000),
        stream_size_kb,
    }
}

fn codec_name(stream: &RawStream) -> String {
    stream
        .codec_name
        .clone()
        .unwrap_or_else(|| "unknown".to_string())
}

fn stream_bitrate_bps(stream: &RawStream) -> Option<u64> {
    parse_number(stream.bit_rate.as_deref())
        .or_else(|| tag_value(&stream.tags, "BPS").and_then(|v| v.parse().ok()))
}

/// Look up a tag that some muxers suffix with a language, e.g. `BPS-eng`
fn tag_value<'a>(tags: &'a HashMap<String, String>, key: &str) -> Option<&'a String> {
    tags.get(key).or_else(|| {
        tags.iter()
            .find(|(k, _)| k.strip_prefix(key).is_some_and(|rest| rest.starts_with('-')))
            .map(|(_, v)| v)
    })
}

/// ffprobe reports numbers as strings, with "N/A" for unknown values
fn parse_number<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse::<T>().ok())
}

/// Parse frame rate from ffprobe format ("30000/1001")
pub fn parse_frame_rate(rate_str: Option<&str>) -> (u32, u32) {
    rate_str
        .and_then(|s| {
            let (num, den) = s.split_once('/')?;
            let num = num.trim().parse::<u32>().ok()?;
            let den = den.trim().parse::<u32>().ok()?;
            (den > 0).then_some((num, den))
        })
        .unwrap_or((0, 1))
}

// JSON deserialization structures

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<RawStream>,
    format: Option<FormatInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct FormatInfo {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    #[serde(default)]
    index: usize,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    bit_rate: Option<String>,
    max_bit_rate: Option<String>,
    duration: Option<String>,
    channels: Option<u16>,
    sample_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}
