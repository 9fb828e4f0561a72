pub mod types;

pub use types::*;

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// CRF search settings
    pub search: SearchConfig,
    /// Scene sampling settings
    pub sampling: SamplingConfig,
    /// Encoder defaults
    pub encode: EncodeDefaults,
    /// VMAF settings
    pub vmaf: VmafConfig,
}

impl AppConfig {
    /// Load configuration from `path` (or the default location), falling back to defaults
    pub fn load(path: Option<&Path>) -> Self {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path);

        if config_path.exists() {
            match Self::load_from_file(&config_path) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config: {}. Using defaults.", e);
                }
            }
        }

        Self::default()
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)
            .map_err(|e| AppError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dynacrf")
            .join("config.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), AppError> {
        let search = &self.search;
        if !(0.0..=100.0).contains(&search.target_vmaf) {
            return Err(AppError::Config(
                "Target VMAF must be between 0 and 100".to_string(),
            ));
        }
        if search.tolerance <= 0.0 {
            return Err(AppError::Config("Tolerance must be positive".to_string()));
        }
        if search.max_crf < 0 || search.min_crf <= search.max_crf {
            return Err(AppError::Config(format!(
                "min_crf ({}) must be greater than max_crf ({}), higher crf means lower quality",
                search.min_crf, search.max_crf
            )));
        }
        if search.initial_crf < search.max_crf || search.initial_crf > search.min_crf {
            return Err(AppError::Config(format!(
                "initial_crf ({}) must lie between max_crf ({}) and min_crf ({})",
                search.initial_crf, search.max_crf, search.min_crf
            )));
        }
        if search.max_iterations == 0 {
            return Err(AppError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        let sampling = &self.sampling;
        if sampling.min_scene_secs <= 0.0 || sampling.max_scene_secs < sampling.min_scene_secs {
            return Err(AppError::Config(
                "Scene durations must satisfy 0 < min_scene_secs <= max_scene_secs".to_string(),
            ));
        }
        if sampling.max_scenes == 0 {
            return Err(AppError::Config("max_scenes must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&sampling.scene_threshold) {
            return Err(AppError::Config(
                "Scene threshold must be between 0 and 1".to_string(),
            ));
        }

        for speed in [self.vmaf.speed, self.vmaf.final_speed] {
            if !(1..=10).contains(&speed) {
                return Err(AppError::Config(
                    "VMAF speed must be between 1 and 10".to_string(),
                ));
            }
        }
        if self.encode.codec.trim().is_empty() {
            return Err(AppError::Config("Video codec must not be empty".to_string()));
        }
        Ok(())
    }
}
