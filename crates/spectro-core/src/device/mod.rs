//! Device capability interface and frame handling.
//!
//! Vendor SDK families stay outside this crate; the two families here cover
//! synthetic acquisition and playback of recorded raw frames.

pub mod replay;
pub mod session;
pub mod simulated;

pub use replay::{Recording, ReplaySpectrometer};
pub use session::AcquisitionSession;
pub use simulated::SimulatedSpectrometer;

use crate::common::{DeviceConfig, DeviceFamily, IntegrationTimeUnit};
use crate::domain::{SpectroError, WavelengthCalibration};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("device '{model}' is not connected")]
    NotConnected { model: String },
    #[error("frame count must be >= 1")]
    ZeroFrameCount,
    #[error("raw read length mismatch: expected {expected} values, got {actual}")]
    FrameLengthMismatch { expected: usize, actual: usize },
    #[error("active window ends at pixel {x_max} but frames have {pixel_count} pixels")]
    WindowOutsideFrame { x_max: usize, pixel_count: usize },
    #[error("integration time {requested}{unit} is below the device minimum {minimum}{unit}")]
    IntegrationTimeTooShort {
        requested: u32,
        minimum: u32,
        unit: &'static str,
    },
    #[error("failed to read recording '{}': {source}", path.display())]
    RecordingRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse recording '{}': {source}", path.display())]
    RecordingParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("replay device has no recording path")]
    MissingRecordingPath,
    #[error("recording '{}' holds no frames", path.display())]
    EmptyRecording { path: PathBuf },
    #[error("recording has no dark scan")]
    MissingDarkScan,
    #[error("frame averaging needs at least one frame")]
    NothingToAverage,
}

impl From<AcquisitionError> for SpectroError {
    fn from(error: AcquisitionError) -> Self {
        SpectroError::acquisition("DEVICE.ACQUISITION", error.to_string())
    }
}

/// Operations every device family provides.
pub trait Spectrometer: Send {
    fn family(&self) -> DeviceFamily;

    fn is_connected(&self) -> bool;

    fn connect(&mut self) -> Result<(), AcquisitionError>;

    fn disconnect(&mut self);

    /// Reads `count` full-sensor frames back to back, flattened frame-major.
    fn read_frame(&mut self, count: usize) -> Result<Vec<u16>, AcquisitionError>;

    fn set_integration_time(&mut self, time: u32) -> Result<(), AcquisitionError>;

    fn integration_time(&self) -> u32;

    /// One full-sensor frame taken with the optical input closed.
    fn get_dark_scan(&mut self) -> Result<Vec<u16>, AcquisitionError>;
}

/// Builds the implementation for the configured family. The device starts
/// disconnected.
pub fn open_device(config: &DeviceConfig) -> Box<dyn Spectrometer> {
    match config.family {
        DeviceFamily::Simulated => Box::new(SimulatedSpectrometer::new(config.clone())),
        DeviceFamily::Replay => Box::new(ReplaySpectrometer::new(config.clone())),
    }
}

pub(crate) fn check_integration_time(
    requested: u32,
    minimum: u32,
    unit: IntegrationTimeUnit,
) -> Result<(), AcquisitionError> {
    if requested < minimum {
        return Err(AcquisitionError::IntegrationTimeTooShort {
            requested,
            minimum,
            unit: unit.suffix(),
        });
    }
    Ok(())
}

/// Cuts a flat frame-major read into frames and keeps each frame's active
/// window `[x_min, x_max]`.
pub fn split_frames(
    raw: &[u16],
    frame_count: usize,
    pixel_count: usize,
    calibration: &WavelengthCalibration,
) -> Result<Vec<Vec<f64>>, AcquisitionError> {
    if frame_count == 0 {
        return Err(AcquisitionError::ZeroFrameCount);
    }
    let expected = frame_count * pixel_count;
    if raw.len() != expected {
        return Err(AcquisitionError::FrameLengthMismatch {
            expected,
            actual: raw.len(),
        });
    }
    if calibration.x_min > calibration.x_max || calibration.x_max >= pixel_count {
        return Err(AcquisitionError::WindowOutsideFrame {
            x_max: calibration.x_max,
            pixel_count,
        });
    }

    Ok(raw
        .chunks_exact(pixel_count)
        .map(|frame| {
            frame[calibration.x_min..=calibration.x_max]
                .iter()
                .map(|&count| f64::from(count))
                .collect()
        })
        .collect())
}

/// Elementwise mean of equally long frames.
pub fn average_frames(frames: &[Vec<f64>]) -> Result<Vec<f64>, AcquisitionError> {
    let Some(first) = frames.first() else {
        return Err(AcquisitionError::NothingToAverage);
    };
    let mut sum = vec![0.0; first.len()];
    for frame in frames {
        if frame.len() != sum.len() {
            return Err(AcquisitionError::FrameLengthMismatch {
                expected: sum.len(),
                actual: frame.len(),
            });
        }
        for (total, value) in sum.iter_mut().zip(frame) {
            *total += value;
        }
    }
    let count = frames.len() as f64;
    Ok(sum.into_iter().map(|total| total / count).collect())
}

#[cfg(test)]
mod tests {
    use super::{AcquisitionError, average_frames, split_frames};
    use crate::domain::{SpectroError, SpectroErrorCategory, WavelengthCalibration};

    fn window(x_min: usize, x_max: usize) -> WavelengthCalibration {
        WavelengthCalibration::new([400.0, 1.0, 0.0, 0.0], x_min, x_max)
    }

    #[test]
    fn split_keeps_the_active_window_of_each_frame() {
        let raw: Vec<u16> = (0..12).collect();
        let frames = split_frames(&raw, 2, 6, &window(1, 4)).expect("split");
        assert_eq!(
            frames,
            vec![vec![1.0, 2.0, 3.0, 4.0], vec![7.0, 8.0, 9.0, 10.0]]
        );
    }

    #[test]
    fn short_read_is_an_acquisition_error() {
        let raw = vec![0_u16; 11];
        let error = split_frames(&raw, 2, 6, &window(0, 5)).expect_err("short");
        assert!(matches!(
            error,
            AcquisitionError::FrameLengthMismatch {
                expected: 12,
                actual: 11
            }
        ));
        let mapped = SpectroError::from(error);
        assert_eq!(mapped.category(), SpectroErrorCategory::AcquisitionError);
        assert_eq!(mapped.exit_code(), 2);
    }

    #[test]
    fn window_must_fit_the_frame() {
        let raw = vec![0_u16; 6];
        assert!(matches!(
            split_frames(&raw, 1, 6, &window(0, 6)),
            Err(AcquisitionError::WindowOutsideFrame { .. })
        ));
        assert!(matches!(
            split_frames(&raw, 0, 6, &window(0, 5)),
            Err(AcquisitionError::ZeroFrameCount)
        ));
    }

    #[test]
    fn averaging_is_elementwise() {
        let frames = vec![vec![1.0, 10.0], vec![3.0, 20.0], vec![5.0, 30.0]];
        assert_eq!(average_frames(&frames).expect("mean"), vec![3.0, 20.0]);
        assert!(matches!(
            average_frames(&[]),
            Err(AcquisitionError::NothingToAverage)
        ));
        assert!(matches!(
            average_frames(&[vec![1.0], vec![1.0, 2.0]]),
            Err(AcquisitionError::FrameLengthMismatch { .. })
        ));
    }
}
