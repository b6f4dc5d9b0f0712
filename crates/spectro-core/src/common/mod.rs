pub mod config;

pub use config::{
    BaselineConfig, ConfigError, DarkCorrectionConfig, DeviceConfig, DeviceFamily,
    IntegrationTimeUnit, PeakDetectionConfig, ProcessingConfig, SENSOR_SATURATION, SimulatedLine,
    SimulationConfig, load_device_config, load_processing_config,
};
