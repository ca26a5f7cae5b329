//! Session configuration.
//!
//! Every parameter is fixed at launch. The file format is TOML with one
//! table per stage; missing tables and fields fall back to defaults.
//!
//! ```toml
//! [capture]
//! device = "/dev/video0"
//! width = 640
//! height = 480
//!
//! [kernel]
//! lanes = 2
//! vector_width = 16
//! smoothing_shift = 1
//!
//! [output]
//! directory = "frames"
//! frame_count = 20
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::capture::CaptureConfig;
use crate::kernel::MAX_VECTOR_WIDTH;

/// Largest accepted smoothing shift.
pub const MAX_SMOOTHING_SHIFT: u32 = 16;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("lane count must be at least 1")]
    InvalidLaneCount,
    #[error("vector width must be 1-{max}, got {0}", max = MAX_VECTOR_WIDTH)]
    InvalidVectorWidth(usize),
    #[error("smoothing shift must be 0-{max}, got {0}", max = MAX_SMOOTHING_SHIFT)]
    InvalidSmoothingShift(u32),
    #[error("frame of {pixels} pixels is not a multiple of lane stride {stride}")]
    StrideMismatch { pixels: usize, stride: usize },
    #[error("at least one capture buffer is required")]
    InvalidBufferCount,
    #[error("acquisition timeout must be non-zero")]
    InvalidTimeout,
    #[error("output file prefix must not be empty")]
    EmptyPrefix,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Kernel launch parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Parallel lanes.
    pub lanes: usize,
    /// Pixels per vector group.
    pub vector_width: usize,
    /// IIR smoothing shift `K`; the filter keeps `1 - 2^-K` of its state per frame.
    pub smoothing_shift: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            lanes: 2,
            vector_width: 16,
            smoothing_shift: 1,
        }
    }
}

impl KernelConfig {
    /// Pixels covered by one step of every lane.
    pub fn stride(&self) -> usize {
        self.lanes * self.vector_width
    }

    /// Validates the parameters against a frame of `pixels` pixels.
    pub fn validate(&self, pixels: usize) -> Result<(), ConfigError> {
        self.validate_params()?;
        if pixels % self.stride() != 0 {
            return Err(ConfigError::StrideMismatch {
                pixels,
                stride: self.stride(),
            });
        }
        Ok(())
    }

    /// Checks lane count, vector width and shift, independent of frame size.
    pub fn validate_params(&self) -> Result<(), ConfigError> {
        if self.lanes == 0 {
            return Err(ConfigError::InvalidLaneCount);
        }
        if self.vector_width == 0 || self.vector_width > MAX_VECTOR_WIDTH {
            return Err(ConfigError::InvalidVectorWidth(self.vector_width));
        }
        if self.smoothing_shift > MAX_SMOOTHING_SHIFT {
            return Err(ConfigError::InvalidSmoothingShift(self.smoothing_shift));
        }
        Ok(())
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the numbered images are written to.
    pub directory: PathBuf,
    /// File name prefix (`img` gives `img000.ppm`, `img001.ppm`, ...).
    pub prefix: String,
    /// Run continuously (true) or process fixed number of frames (false).
    pub continuous: bool,
    /// Number of frames to process if not continuous.
    pub frame_count: u32,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            prefix: "img".to_string(),
            continuous: false,
            frame_count: 20,
            metrics_port: 9090,
        }
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[capture]` table.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// `[kernel]` table.
    #[serde(default)]
    pub kernel: KernelConfig,
    /// `[output]` table.
    #[serde(default)]
    pub output: OutputConfig,
}

impl FileConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file without validating it, so overrides can still be
    /// applied before [`FileConfig::validate`].
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text without validating it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates every section and their combination.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.kernel.validate(self.capture.pixel_count())?;
        if self.output.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.kernel.stride(), 32);
    }

    #[test]
    fn test_kernel_rejects_misaligned_frame() {
        let kernel = KernelConfig::default();
        assert!(matches!(
            kernel.validate(100),
            Err(ConfigError::StrideMismatch {
                pixels: 100,
                stride: 32
            })
        ));
    }

    #[test]
    fn test_kernel_rejects_bad_parameters() {
        let mut kernel = KernelConfig::default();
        kernel.lanes = 0;
        assert!(matches!(
            kernel.validate(64),
            Err(ConfigError::InvalidLaneCount)
        ));

        let mut kernel = KernelConfig::default();
        kernel.vector_width = MAX_VECTOR_WIDTH + 1;
        assert!(matches!(
            kernel.validate(0),
            Err(ConfigError::InvalidVectorWidth(_))
        ));

        let mut kernel = KernelConfig::default();
        kernel.smoothing_shift = MAX_SMOOTHING_SHIFT + 1;
        assert!(matches!(
            kernel.validate(64),
            Err(ConfigError::InvalidSmoothingShift(_))
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [capture]
            width = 4
            height = 1

            [kernel]
            lanes = 1
            vector_width = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.capture.width, 4);
        assert_eq!(config.capture.device, "/dev/video0");
        assert_eq!(config.kernel.smoothing_shift, 1);
        assert_eq!(config.output.prefix, "img");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            FileConfig::from_toml("[kernel]\nlanes = \"two\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_read_defers_validation() {
        let path = std::env::temp_dir().join(format!(
            "motion-filter-config-{}.toml",
            std::process::id()
        ));
        // 10 pixels do not fill one stride of the default kernel
        std::fs::write(&path, "[capture]\nwidth = 10\nheight = 1\n").unwrap();

        assert!(matches!(
            FileConfig::from_file(&path),
            Err(ConfigError::StrideMismatch { .. })
        ));

        let mut config = FileConfig::read(&path).unwrap();
        config.capture.width = 64;
        assert!(config.validate().is_ok());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_params_checked_without_frame_size() {
        assert!(KernelConfig::default().validate_params().is_ok());

        let wide = KernelConfig {
            vector_width: 128,
            ..KernelConfig::default()
        };
        assert!(matches!(
            wide.validate_params(),
            Err(ConfigError::InvalidVectorWidth(128))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            FileConfig::from_file("/nonexistent/motion-filter.toml"),
            Err(ConfigError::FileReadError(_))
        ));
    }
}
