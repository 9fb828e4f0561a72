use crate::error::AppError;
use clap::ValueEnum;
use std::path::{Path, PathBuf};

/// Encoder tuning hint passed through as `-tune`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Tune {
    Animation,
    Film,
    Grain,
    Psnr,
    Ssim,
}

impl Tune {
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Tune::Animation => "animation",
            Tune::Film => "film",
            Tune::Grain => "grain",
            Tune::Psnr => "psnr",
            Tune::Ssim => "ssim",
        }
    }
}

/// Settings for one encode. Trials copy a base config and swap the CRF.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodeConfig {
    /// Video encoder, video is dropped when unset
    pub codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub crf: Option<i32>,
    /// Target bitrate, takes precedence over `crf`
    pub bitrate_kbps: Option<u32>,
    /// Forces CBR-like behaviour, only useful for comparing legacy ladders
    pub min_bitrate_kbps: Option<u32>,
    pub max_bitrate_kbps: Option<u32>,
    pub buffer_size_kbps: Option<u32>,
    /// Output frame rate as (numerator, denominator)
    pub frame_rate: Option<(u32, u32)>,
    pub tune: Option<Tune>,
    pub audio_codec: Option<String>,
    pub audio_bitrate_kbps: Option<u32>,
}

impl EncodeConfig {
    /// Copy of this config at a different CRF
    pub fn with_crf(&self, crf: i32) -> Self {
        Self {
            crf: Some(crf),
            ..self.clone()
        }
    }

    /// Short description of the rate control, for logs
    pub fn rate_control(&self) -> String {
        match (self.bitrate_kbps, self.crf) {
            (Some(kbps), _) => format!("bitrate: {}Kbps", kbps),
            (None, Some(crf)) => format!("crf: {}", crf),
            (None, None) => "default".to_string(),
        }
    }
}

/// Build FFmpeg arguments for encoding `source` into `dest`
pub fn build_encode_args(
    source: &Path,
    dest: &Path,
    config: &EncodeConfig,
) -> Result<Vec<String>, AppError> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-i".to_string(),
        source.to_string_lossy().to_string(),
        "-y".to_string(),
    ];

    match &config.codec {
        Some(codec) => {
            args.extend(["-c:v".to_string(), codec.clone()]);
            args.extend(rate_control_args(config)?);
            args.extend(scale_args(config.width, config.height));

            if let Some((num, den)) = config.frame_rate
                && num > 0
                && den > 0
            {
                args.extend(["-r".to_string(), format!("{}/{}", num, den)]);
            }
            if let Some(tune) = config.tune {
                args.extend(["-tune".to_string(), tune.ffmpeg_name().to_string()]);
            }
        }
        None => args.push("-vn".to_string()),
    }

    match &config.audio_codec {
        Some(codec) => {
            args.extend(["-c:a".to_string(), codec.clone()]);
            if let Some(kbps) = config.audio_bitrate_kbps {
                args.extend(["-b:a".to_string(), format!("{}k", kbps)]);
            }
        }
        None => args.push("-an".to_string()),
    }

    args.push(dest.to_string_lossy().to_string());
    Ok(args)
}

fn rate_control_args(config: &EncodeConfig) -> Result<Vec<String>, AppError> {
    let mut args = match (config.bitrate_kbps, config.crf) {
        (Some(kbps), _) => vec!["-b:v".to_string(), format!("{}k", kbps)],
        (None, Some(crf)) => vec!["-crf".to_string(), crf.to_string()],
        (None, None) => {
            return Err(AppError::Encode(
                "bitrate or crf required for encode".to_string(),
            ));
        }
    };

    if let Some(kbps) = config.max_bitrate_kbps {
        args.extend(["-maxrate".to_string(), format!("{}k", kbps)]);
    }
    if let Some(kbps) = config.min_bitrate_kbps {
        args.extend(["-minrate".to_string(), format!("{}k", kbps)]);
    }
    if let Some(kbps) = config.buffer_size_kbps {
        args.extend(["-bufsize".to_string(), format!("{}k", kbps)]);
    }
    Ok(args)
}

/// Lanczos scale filter; an unset dimension keeps the aspect ratio at an even size
fn scale_args(width: Option<u32>, height: Option<u32>) -> Vec<String> {
    let dimension = |d: Option<u32>| d.map(|v| v.to_string()).unwrap_or_else(|| "-2".to_string());
    match (width, height) {
        (None, None) => Vec::new(),
        (w, h) => vec![
            "-vf".to_string(),
            format!("scale={}:{}:flags=lanczos", dimension(w), dimension(h)),
        ],
    }
}

/// Arguments to copy `frame_count` video frames starting at `start_secs`
pub fn build_extract_args(
    source: &Path,
    dest: &Path,
    start_secs: f64,
    frame_count: u64,
) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-i".to_string(),
        source.to_string_lossy().to_string(),
        "-ss".to_string(),
        format!("{:.6}", start_secs),
        "-frames:v".to_string(),
        frame_count.to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-an".to_string(),
        "-y".to_string(),
        dest.to_string_lossy().to_string(),
    ]
}

/// Arguments to join `segments` in order with the concat protocol
pub fn build_concat_args(segments: &[PathBuf], dest: &Path) -> Vec<String> {
    let joined = segments
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("|");

    vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-i".to_string(),
        format!("concat:{}", joined),
        "-c:v".to_string(),
        "copy".to_string(),
        "-y".to_string(),
        dest.to_string_lossy().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x264() -> EncodeConfig {
        EncodeConfig {
            codec: Some("libx264".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_crf_encode_args() {
        let config = x264().with_crf(23);
        let args = build_encode_args(Path::new("in.mp4"), Path::new("out.mp4"), &config).unwrap();
        assert_eq!(
            args,
            vec![
                "-hide_banner", "-nostdin", "-i", "in.mp4", "-y", "-c:v", "libx264", "-crf",
                "23", "-an", "out.mp4"
            ]
        );
    }

    #[test]
    fn test_bitrate_wins_over_crf() {
        let config = EncodeConfig {
            bitrate_kbps: Some(4000),
            max_bitrate_kbps: Some(6000),
            min_bitrate_kbps: Some(4000),
            buffer_size_kbps: Some(9000),
            ..x264().with_crf(23)
        };
        let args = build_encode_args(Path::new("a"), Path::new("b"), &config).unwrap();
        let joined = args.join(" ");
        assert!(joined.contains("-b:v 4000k -maxrate 6000k -minrate 4000k -bufsize 9000k"));
        assert!(!joined.contains("-crf"));
        assert_eq!(config.rate_control(), "bitrate: 4000Kbps");
    }

    #[test]
    fn test_missing_rate_control_is_error() {
        let err = build_encode_args(Path::new("a"), Path::new("b"), &x264()).unwrap_err();
        assert!(matches!(err, AppError::Encode(_)));
    }

    #[test]
    fn test_scale_keeps_aspect_for_missing_dimension() {
        let config = EncodeConfig {
            width: Some(1280),
            ..x264().with_crf(20)
        };
        let args = build_encode_args(Path::new("a"), Path::new("b"), &config).unwrap();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "scale=1280:-2:flags=lanczos");
    }

    #[test]
    fn test_tune_frame_rate_and_audio() {
        let config = EncodeConfig {
            tune: Some(Tune::Animation),
            frame_rate: Some((24000, 1001)),
            audio_codec: Some("aac".to_string()),
            audio_bitrate_kbps: Some(128),
            ..x264().with_crf(21)
        };
        let joined = build_encode_args(Path::new("a"), Path::new("b"), &config)
            .unwrap()
            .join(" ");
        assert!(joined.contains("-r 24000/1001"));
        assert!(joined.contains("-tune animation"));
        assert!(joined.contains("-c:a aac -b:a 128k"));
        assert!(!joined.contains("-an"));
    }

    #[test]
    fn test_no_codec_drops_video() {
        let config = EncodeConfig::default();
        let args = build_encode_args(Path::new("a"), Path::new("b"), &config).unwrap();
        assert!(args.contains(&"-vn".to_string()));
    }

    #[test]
    fn test_with_crf_keeps_other_fields() {
        let base = EncodeConfig {
            max_bitrate_kbps: Some(8000),
            ..x264().with_crf(20)
        };
        let trial = base.with_crf(27);
        assert_eq!(trial.crf, Some(27));
        assert_eq!(trial.max_bitrate_kbps, Some(8000));
        assert_eq!(base.crf, Some(20));
    }

    #[test]
    fn test_extract_and_concat_args() {
        let extract = build_extract_args(Path::new("src.mkv"), Path::new("s0.ts"), 12.5, 240);
        let joined = extract.join(" ");
        assert!(joined.contains("-ss 12.500000 -frames:v 240 -c:v copy -an"));

        let concat = build_concat_args(
            &[PathBuf::from("s0.ts"), PathBuf::from("s1.ts")],
            Path::new("sample.mp4"),
        );
        assert_eq!(concat[3], "concat:s0.ts|s1.ts");
        assert_eq!(concat.last().unwrap(), "sample.mp4");
    }
}
