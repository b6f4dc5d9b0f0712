use super::{AcquisitionError, Spectrometer, check_integration_time};
use crate::common::{DeviceConfig, DeviceFamily};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Raw frames captured from a real device, as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub frames: Vec<Vec<u16>>,
    #[serde(default)]
    pub dark: Option<Vec<u16>>,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self, AcquisitionError> {
        let source = fs::read_to_string(path).map_err(|source| AcquisitionError::RecordingRead {
            path: path.to_path_buf(),
            source,
        })?;
        let recording: Self =
            serde_json::from_str(&source).map_err(|source| AcquisitionError::RecordingParse {
                path: path.to_path_buf(),
                source,
            })?;
        if recording.frames.is_empty() {
            return Err(AcquisitionError::EmptyRecording {
                path: path.to_path_buf(),
            });
        }
        Ok(recording)
    }

    fn check_pixel_count(&self, pixel_count: usize) -> Result<(), AcquisitionError> {
        self.frames
            .iter()
            .chain(self.dark.iter())
            .find(|frame| frame.len() != pixel_count)
            .map_or(Ok(()), |frame| {
                Err(AcquisitionError::FrameLengthMismatch {
                    expected: pixel_count,
                    actual: frame.len(),
                })
            })
    }
}

/// Plays recorded frames back in order, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct ReplaySpectrometer {
    config: DeviceConfig,
    recording: Option<Recording>,
    connected: bool,
    cursor: usize,
    integration_time: u32,
}

impl ReplaySpectrometer {
    pub fn new(config: DeviceConfig) -> Self {
        let integration_time = config.integration_time_min;
        Self {
            config,
            recording: None,
            connected: false,
            cursor: 0,
            integration_time,
        }
    }

    /// Uses an in-memory recording instead of the configured file.
    pub fn with_recording(config: DeviceConfig, recording: Recording) -> Self {
        let mut device = Self::new(config);
        device.recording = Some(recording);
        device
    }

    fn recording(&self) -> Result<&Recording, AcquisitionError> {
        match &self.recording {
            Some(recording) if self.connected => Ok(recording),
            _ => Err(AcquisitionError::NotConnected {
                model: self.config.model.clone(),
            }),
        }
    }
}

impl Spectrometer for ReplaySpectrometer {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::Replay
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<(), AcquisitionError> {
        if self.recording.is_none() {
            let Some(path) = self.config.recording.as_deref() else {
                return Err(AcquisitionError::MissingRecordingPath);
            };
            self.recording = Some(Recording::load(path)?);
        }
        let Some(recording) = &self.recording else {
            return Err(AcquisitionError::MissingRecordingPath);
        };
        recording.check_pixel_count(self.config.pixel_count)?;
        debug!(frames = recording.frames.len(), "recording loaded");
        self.connected = true;
        self.cursor = 0;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.cursor = 0;
    }

    fn read_frame(&mut self, count: usize) -> Result<Vec<u16>, AcquisitionError> {
        if count == 0 {
            return Err(AcquisitionError::ZeroFrameCount);
        }
        let cursor = self.cursor;
        let recording = self.recording()?;
        let total = recording.frames.len();
        let raw: Vec<u16> = (0..count)
            .flat_map(|offset| recording.frames[(cursor + offset) % total].iter().copied())
            .collect();
        self.cursor = (cursor + count) % total;
        Ok(raw)
    }

    fn set_integration_time(&mut self, time: u32) -> Result<(), AcquisitionError> {
        check_integration_time(
            time,
            self.config.integration_time_min,
            self.config.integration_time_unit,
        )?;
        self.integration_time = time;
        Ok(())
    }

    fn integration_time(&self) -> u32 {
        self.integration_time
    }

    fn get_dark_scan(&mut self) -> Result<Vec<u16>, AcquisitionError> {
        self.recording()?
            .dark
            .clone()
            .ok_or(AcquisitionError::MissingDarkScan)
    }
}

#[cfg(test)]
mod tests {
    use super::{Recording, ReplaySpectrometer};
    use crate::common::{DeviceConfig, DeviceFamily};
    use crate::device::{AcquisitionError, Spectrometer};
    use crate::domain::WavelengthCalibration;
    use std::fs;
    use tempfile::TempDir;

    fn config(recording: Option<std::path::PathBuf>) -> DeviceConfig {
        DeviceConfig {
            family: DeviceFamily::Replay,
            model: "replay".to_string(),
            pixel_count: 3,
            calibration: WavelengthCalibration::new([500.0, 1.0, 0.0, 0.0], 0, 2),
            integration_time_min: 1,
            integration_time_unit: Default::default(),
            simulation: Default::default(),
            recording,
            properties: Default::default(),
        }
    }

    #[test]
    fn frames_are_served_in_order_and_wrap() {
        let recording = Recording {
            frames: vec![vec![1, 2, 3], vec![4, 5, 6]],
            dark: None,
        };
        let mut device = ReplaySpectrometer::with_recording(config(None), recording);
        assert!(!device.is_connected());
        device.connect().expect("connect");
        assert_eq!(device.read_frame(1).expect("read"), vec![1, 2, 3]);
        assert_eq!(device.read_frame(2).expect("read"), vec![4, 5, 6, 1, 2, 3]);
        assert!(matches!(
            device.get_dark_scan(),
            Err(AcquisitionError::MissingDarkScan)
        ));
    }

    #[test]
    fn recording_is_loaded_from_disk_on_connect() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("capture.json");
        fs::write(&path, r#"{"frames": [[10, 20, 30]], "dark": [1, 2, 3]}"#)
            .expect("recording should be written");

        let mut device = ReplaySpectrometer::new(config(Some(path)));
        assert!(!device.is_connected());
        device.connect().expect("connect");
        assert_eq!(device.get_dark_scan().expect("dark"), vec![1, 2, 3]);
        assert_eq!(device.read_frame(1).expect("read"), vec![10, 20, 30]);
    }

    #[test]
    fn mismatched_recordings_are_rejected() {
        let recording = Recording {
            frames: vec![vec![1, 2]],
            dark: None,
        };
        let mut device = ReplaySpectrometer::with_recording(config(None), recording);
        assert!(matches!(
            device.connect(),
            Err(AcquisitionError::FrameLengthMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(!device.is_connected());

        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("empty.json");
        fs::write(&path, r#"{"frames": []}"#).expect("recording should be written");
        assert!(matches!(
            ReplaySpectrometer::new(config(Some(path))).connect(),
            Err(AcquisitionError::EmptyRecording { .. })
        ));
    }
}
