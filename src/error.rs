use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while probing, sampling, encoding or scoring.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("no video stream found in {}", .0.display())]
    NoVideoStream(PathBuf),

    #[error("probe failed: {0}")]
    Probe(String),

    #[error("scene detection failed: {0}")]
    Detection(String),

    #[error("sample extraction failed: {0}")]
    SampleExtraction(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("VMAF scoring failed: {0}")]
    Score(String),

    /// A trial at `crf` failed; wraps the collaborator error.
    #[error("trial at crf {crf} failed: {source}")]
    Trial {
        crf: i32,
        #[source]
        source: Box<AppError>,
    },

    /// The CRF search itself failed, so no final encode was attempted.
    #[error("crf search failed: {0}")]
    SearchFailed(#[source] Box<AppError>),

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Pipeline stage the error originated from, looking through wrappers.
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::NoVideoStream(_) | AppError::Probe(_) => "probe",
            AppError::Detection(_) => "scene detection",
            AppError::SampleExtraction(_) => "sampling",
            AppError::Encode(_) => "encode",
            AppError::Score(_) => "vmaf",
            AppError::Trial { source, .. } | AppError::SearchFailed(source) => source.stage(),
            AppError::Cancelled => "cancelled",
            AppError::Config(_) | AppError::ConfigParse(_) | AppError::ConfigSerialize(_) => {
                "config"
            }
            AppError::Io(_) => "io",
        }
    }

    /// True when the error (or the error it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            AppError::Cancelled => true,
            AppError::Trial { source, .. } | AppError::SearchFailed(source) => {
                source.is_cancelled()
            }
            _ => false,
        }
    }
}
