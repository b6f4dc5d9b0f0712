//! Immutable processing and device configuration.
//!
//! Both structs are read once from JSON, validated, then handed around by
//! value. Every processing field has a default so a partial file is enough.

use crate::domain::{CalibrationError, SpectroError, WavelengthCalibration};
use crate::numerics::{DerivativeConfig, DerivativeError, DerivativeMethod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SENSOR_SATURATION: f64 = 65535.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse configuration '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid configuration value '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("invalid calibration: {0}")]
    Calibration(#[from] CalibrationError),
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

impl From<DerivativeError> for ConfigError {
    fn from(error: DerivativeError) -> Self {
        Self::invalid("peaks.derivative", error.to_string())
    }
}

impl From<ConfigError> for SpectroError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Read { .. } => SpectroError::io_system("IO.CONFIG", error.to_string()),
            _ => SpectroError::configuration("CONFIG.LOAD", error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DarkCorrectionConfig {
    pub saturation_value: f64,
    /// A saturated pixel is bad when its dark value exceeds this multiple of
    /// the neighbouring dark mean.
    pub saturation_dark_ratio: f64,
}

impl Default for DarkCorrectionConfig {
    fn default() -> Self {
        Self {
            saturation_value: SENSOR_SATURATION,
            saturation_dark_ratio: 1.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BaselineConfig {
    pub enabled: bool,
    pub lambda: f64,
    pub itermax: usize,
    pub tolerance: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lambda: 1.0e7,
            itermax: 20,
            tolerance: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PeakDetectionConfig {
    pub enabled: bool,
    pub min_peak_height: f64,
    /// Minimum pseudo-height of a concave region.
    pub region_threshold: f64,
    pub local_max_radius: usize,
    pub derivative: DerivativeConfig,
}

impl Default for PeakDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_peak_height: 2000.0,
            region_threshold: 50.0,
            local_max_radius: 2,
            derivative: DerivativeConfig::savitzky_golay(2, 3, 3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessingConfig {
    pub dark: DarkCorrectionConfig,
    pub baseline: BaselineConfig,
    pub peaks: PeakDetectionConfig,
}

impl ProcessingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dark = &self.dark;
        if !(dark.saturation_value.is_finite() && dark.saturation_value > 0.0) {
            return Err(ConfigError::invalid(
                "dark.saturationValue",
                format!("must be finite and > 0, got {}", dark.saturation_value),
            ));
        }
        if !(dark.saturation_dark_ratio.is_finite() && dark.saturation_dark_ratio >= 0.0) {
            return Err(ConfigError::invalid(
                "dark.saturationDarkRatio",
                format!("must be finite and >= 0, got {}", dark.saturation_dark_ratio),
            ));
        }

        let baseline = &self.baseline;
        if !(baseline.lambda.is_finite() && baseline.lambda >= 0.0) {
            return Err(ConfigError::invalid(
                "baseline.lambda",
                format!("must be finite and >= 0, got {}", baseline.lambda),
            ));
        }
        if baseline.itermax == 0 {
            return Err(ConfigError::invalid("baseline.itermax", "must be >= 1"));
        }
        if !(baseline.tolerance.is_finite() && baseline.tolerance >= 0.0) {
            return Err(ConfigError::invalid(
                "baseline.tolerance",
                format!("must be finite and >= 0, got {}", baseline.tolerance),
            ));
        }

        let peaks = &self.peaks;
        if !peaks.min_peak_height.is_finite() {
            return Err(ConfigError::invalid(
                "peaks.minPeakHeight",
                format!("must be finite, got {}", peaks.min_peak_height),
            ));
        }
        if !peaks.region_threshold.is_finite() {
            return Err(ConfigError::invalid(
                "peaks.regionThreshold",
                format!("must be finite, got {}", peaks.region_threshold),
            ));
        }
        if peaks.derivative.method != DerivativeMethod::SavitzkyGolay {
            return Err(ConfigError::invalid(
                "peaks.derivative.method",
                "peak detection always uses SavitzkyGolay",
            ));
        }
        peaks.derivative.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceFamily {
    #[default]
    Simulated,
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntegrationTimeUnit {
    #[default]
    Milliseconds,
    Microseconds,
}

impl IntegrationTimeUnit {
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Milliseconds => "ms",
            Self::Microseconds => "us",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedLine {
    pub center: f64,
    pub height: f64,
    pub sigma: f64,
}

/// Synthetic source used by the simulated device family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    pub dark_level: f64,
    /// Integration time at which line heights are reached unscaled.
    pub reference_integration_time: u32,
    pub lines: Vec<SimulatedLine>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dark_level: 500.0,
            reference_integration_time: 100,
            lines: vec![
                SimulatedLine {
                    center: 546.07,
                    height: 30000.0,
                    sigma: 1.5,
                },
                SimulatedLine {
                    center: 611.6,
                    height: 12000.0,
                    sigma: 2.0,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    #[serde(default)]
    pub family: DeviceFamily,
    #[serde(default)]
    pub model: String,
    pub pixel_count: usize,
    pub calibration: WavelengthCalibration,
    #[serde(default = "default_integration_time_min")]
    pub integration_time_min: u32,
    #[serde(default)]
    pub integration_time_unit: IntegrationTimeUnit,
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Recorded frames served by the replay family.
    #[serde(default)]
    pub recording: Option<PathBuf>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_integration_time_min() -> u32 {
    1
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pixel_count == 0 {
            return Err(ConfigError::invalid("pixelCount", "must be >= 1"));
        }
        self.calibration.validate(self.pixel_count)?;
        if self.integration_time_min == 0 {
            return Err(ConfigError::invalid("integrationTimeMin", "must be >= 1"));
        }
        if self.family == DeviceFamily::Replay && self.recording.is_none() {
            return Err(ConfigError::invalid(
                "recording",
                "replay devices need a recording path",
            ));
        }
        Ok(())
    }
}

pub fn load_processing_config(
    config_path: impl AsRef<Path>,
) -> Result<ProcessingConfig, ConfigError> {
    let config: ProcessingConfig = read_json(config_path.as_ref())?;
    config.validate()?;
    Ok(config)
}

pub fn load_device_config(config_path: impl AsRef<Path>) -> Result<DeviceConfig, ConfigError> {
    let config_path = config_path.as_ref();
    let mut config: DeviceConfig = read_json(config_path)?;
    if let Some(recording) = config.recording.take() {
        config.recording = Some(match config_path.parent() {
            Some(parent) if recording.is_relative() => parent.join(recording),
            _ => recording,
        });
    }
    config.validate()?;
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
