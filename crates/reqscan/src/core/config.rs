//! Configuration loading and management.
//!
//! This module provides utilities for loading pipeline configuration from various
//! sources (TOML, YAML, JSON) and discovering configuration files in the project hierarchy.

use crate::{ExtractionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main pipeline configuration.
///
/// Every field has a default, so an empty file is a valid configuration.
///
/// # Example
///
/// ```rust
/// use reqscan::core::config::ReqscanConfig;
///
/// let config = ReqscanConfig::default();
/// assert_eq!(config.ocr.max_retries, 3);
/// assert_eq!(config.cache.ttl_days, 7);
///
/// // let config = ReqscanConfig::from_toml_file("reqscan.toml")?;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReqscanConfig {
    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub preprocessing: PreprocessingConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Recognition engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrConfig {
    /// Enable the primary engine (PaddleOCR)
    #[serde(default = "default_true")]
    pub use_primary: bool,

    /// Enable the secondary engine (Tesseract)
    #[serde(default = "default_true")]
    pub use_secondary: bool,

    /// Language codes, e.g. `ch_sim`, `ch_tra`, `en`
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Full-pipeline attempts before degrading
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Rasterization DPI for PDF pages
    #[serde(default = "default_pdf_dpi")]
    pub pdf_dpi: u32,

    #[serde(default = "default_paddle_command")]
    pub paddle_command: String,

    #[serde(default = "default_tesseract_command")]
    pub tesseract_command: String,

    /// Tesseract page segmentation mode
    #[serde(default = "default_psm")]
    pub tesseract_psm: u8,
}

/// Image normalization parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreprocessingConfig {
    /// Gaussian kernel size (odd)
    #[serde(default = "default_denoise_kernel")]
    pub denoise_kernel: u32,

    #[serde(default = "default_clip_limit")]
    pub clahe_clip_limit: f32,

    /// Tiles per axis for adaptive equalization
    #[serde(default = "default_tile_grid")]
    pub clahe_tile_grid: u32,

    #[serde(default = "default_canny_low")]
    pub canny_low: f32,

    #[serde(default = "default_canny_high")]
    pub canny_high: f32,

    /// Minimum accumulator votes for a Hough line
    #[serde(default = "default_hough_threshold")]
    pub hough_threshold: u32,

    #[serde(default = "default_max_skew_lines")]
    pub max_skew_lines: usize,

    /// Angles below this magnitude are treated as noise
    #[serde(default = "default_min_skew_degrees")]
    pub min_skew_degrees: f32,

    #[serde(default = "default_true")]
    pub deskew: bool,
}

/// Result cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache directory (defaults to the user cache dir)
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,

    /// Sweep expired entries every N writes (0 disables)
    #[serde(default = "default_sweep_every")]
    pub sweep_every_writes: usize,
}

fn default_true() -> bool {
    true
}
fn default_languages() -> Vec<String> {
    vec!["ch_sim".to_string(), "en".to_string()]
}
fn default_max_retries() -> u32 {
    3
}
fn default_pdf_dpi() -> u32 {
    300
}
fn default_paddle_command() -> String {
    "paddleocr".to_string()
}
fn default_tesseract_command() -> String {
    "tesseract".to_string()
}
fn default_psm() -> u8 {
    6
}
fn default_denoise_kernel() -> u32 {
    5
}
fn default_clip_limit() -> f32 {
    2.0
}
fn default_tile_grid() -> u32 {
    8
}
fn default_canny_low() -> f32 {
    50.0
}
fn default_canny_high() -> f32 {
    150.0
}
fn default_hough_threshold() -> u32 {
    200
}
fn default_max_skew_lines() -> usize {
    10
}
fn default_min_skew_degrees() -> f32 {
    0.5
}
fn default_ttl_days() -> u64 {
    7
}
fn default_sweep_every() -> usize {
    100
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            use_primary: true,
            use_secondary: true,
            languages: default_languages(),
            max_retries: default_max_retries(),
            pdf_dpi: default_pdf_dpi(),
            paddle_command: default_paddle_command(),
            tesseract_command: default_tesseract_command(),
            tesseract_psm: default_psm(),
        }
    }
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            denoise_kernel: default_denoise_kernel(),
            clahe_clip_limit: default_clip_limit(),
            clahe_tile_grid: default_tile_grid(),
            canny_low: default_canny_low(),
            canny_high: default_canny_high(),
            hough_threshold: default_hough_threshold(),
            max_skew_lines: default_max_skew_lines(),
            min_skew_degrees: default_min_skew_degrees(),
            deskew: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            ttl_days: default_ttl_days(),
            sweep_every_writes: default_sweep_every(),
        }
    }
}

impl CacheConfig {
    /// Resolved cache directory: the configured one, or `<user cache dir>/reqscan/ocr`.
    pub fn resolved_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".reqscan_cache"))
            .join("reqscan")
            .join("ocr")
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days.saturating_mul(24 * 60 * 60))
    }
}

impl ReqscanConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::Config` if the file can't be read or is invalid TOML.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        toml::from_str(&content).map_err(|e| {
            ExtractionError::config_with_source(format!("Invalid TOML in {}", path.as_ref().display()), e)
        })
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_yaml_ng::from_str(&content).map_err(|e| {
            ExtractionError::config_with_source(format!("Invalid YAML in {}", path.as_ref().display()), e)
        })
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            ExtractionError::config_with_source(format!("Invalid JSON in {}", path.as_ref().display()), e)
        })
    }

    /// Load configuration, picking the parser from the file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "toml" => Self::from_toml_file(path),
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            other => Err(ExtractionError::config(format!(
                "Unsupported config file extension '{}' for {}",
                other,
                path.display()
            ))),
        }
    }

    /// Discover configuration file in parent directories.
    ///
    /// Searches for `reqscan.toml` in current directory and parent directories.
    pub fn discover() -> Result<Option<Self>> {
        let mut current = std::env::current_dir().map_err(ExtractionError::Io)?;

        loop {
            let reqscan_toml = current.join("reqscan.toml");
            if reqscan_toml.exists() {
                return Ok(Some(Self::from_toml_file(reqscan_toml)?));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.ocr.use_primary && !self.ocr.use_secondary {
            return Err(ExtractionError::config("At least one OCR engine must be enabled"));
        }
        if self.ocr.languages.is_empty() {
            return Err(ExtractionError::config("At least one OCR language is required"));
        }
        if !(72..=600).contains(&self.ocr.pdf_dpi) {
            return Err(ExtractionError::config(format!(
                "pdf_dpi must be within 72..=600, got {}",
                self.ocr.pdf_dpi
            )));
        }

        let pre = &self.preprocessing;
        if pre.denoise_kernel == 0 || pre.denoise_kernel % 2 == 0 {
            return Err(ExtractionError::config(format!(
                "denoise_kernel must be a positive odd number, got {}",
                pre.denoise_kernel
            )));
        }
        if pre.clahe_clip_limit <= 0.0 {
            return Err(ExtractionError::config("clahe_clip_limit must be positive"));
        }
        if pre.clahe_tile_grid == 0 {
            return Err(ExtractionError::config("clahe_tile_grid must be at least 1"));
        }

        if self.cache.ttl_days == 0 {
            return Err(ExtractionError::config("cache ttl_days must be at least 1"));
        }

        Ok(())
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| ExtractionError::config_with_source(format!("Failed to read config file {}", path.display()), e))
}
