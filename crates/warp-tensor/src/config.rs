//! Configuration for lossless encoding and preview building
//!
//! Values come from, in increasing priority:
//! 1. Defaults
//! 2. A TOML file
//! 3. `WARP_VIEW_*` environment variables

use std::path::Path;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::{TensorError, TensorResult};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "WARP_VIEW";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorConfig {
    /// Preview payload settings
    pub preview: PreviewConfig,
    /// Lossless envelope settings
    pub lossless: LosslessConfig,
}

impl TensorConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> TensorResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| TensorError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> TensorResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Apply `WARP_VIEW_*` environment overrides
    pub fn apply_env(mut self) -> TensorResult<Self> {
        if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_PREVIEW_MAX_DIM")) {
            self.preview.max_dim = val.parse().map_err(|_| {
                TensorError::ConfigError(format!("invalid preview max_dim: {val}"))
            })?;
        }
        if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_PREVIEW_FILTER")) {
            self.preview.filter = val.parse()?;
        }
        if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_LOSSLESS_MAX_RANK")) {
            self.lossless.max_rank = val.parse().map_err(|_| {
                TensorError::ConfigError(format!("invalid lossless max_rank: {val}"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check values for consistency
    pub fn validate(&self) -> TensorResult<()> {
        if self.preview.max_dim == 0 {
            return Err(TensorError::ConfigError(
                "preview max_dim must be greater than zero".to_string(),
            ));
        }
        if self.preview.image_channels.is_empty() {
            return Err(TensorError::ConfigError(
                "preview image_channels must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .preview
            .image_channels
            .iter()
            .find(|&&c| !matches!(c, 3 | 4))
        {
            return Err(TensorError::ConfigError(format!(
                "preview image_channels only supports 3 (RGB) and 4 (RGBA), got {bad}"
            )));
        }
        Ok(())
    }
}

/// Preview payload configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Largest spatial extent kept before downsampling
    pub max_dim: usize,
    /// Trailing dimension sizes treated as image channels for rank-3 arrays
    pub image_channels: Vec<usize>,
    /// Resampling filter used when downsampling
    pub filter: ResampleFilter,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_dim: 256,
            image_channels: vec![3, 4],
            filter: ResampleFilter::default(),
        }
    }
}

/// Lossless envelope configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LosslessConfig {
    /// Maximum array rank accepted
    pub max_rank: usize,
}

impl Default for LosslessConfig {
    fn default() -> Self {
        Self { max_rank: 3 }
    }
}

/// Resampling filter for preview downsampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFilter {
    /// Nearest neighbour
    Nearest,
    /// Linear (triangle)
    Triangle,
    /// Bicubic (Catmull-Rom)
    #[default]
    CatmullRom,
    /// Gaussian
    Gaussian,
    /// Lanczos with window 3
    Lanczos3,
}

impl ResampleFilter {
    /// Matching `image` crate filter
    #[must_use]
    pub fn to_filter_type(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl std::str::FromStr for ResampleFilter {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "triangle" | "bilinear" => Ok(Self::Triangle),
            "catmull_rom" | "catmullrom" | "bicubic" => Ok(Self::CatmullRom),
            "gaussian" => Ok(Self::Gaussian),
            "lanczos3" | "lanczos" => Ok(Self::Lanczos3),
            _ => Err(TensorError::ConfigError(format!(
                "invalid resample filter: {s}"
            ))),
        }
    }
}
