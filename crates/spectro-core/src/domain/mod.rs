pub mod errors;

pub use errors::{SpectroError, SpectroErrorCategory, SpectroResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpectrumError {
    #[error("spectrum length mismatch: wavelengths={wavelengths}, intensities={intensities}")]
    LengthMismatch {
        wavelengths: usize,
        intensities: usize,
    },
    #[error("wavelengths must be finite, index {index} got {value}")]
    NonFiniteWavelength { index: usize, value: f64 },
    #[error(
        "wavelengths must be strictly increasing, index {index} has {current} after {previous}"
    )]
    NonIncreasingWavelength {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("peak indices must satisfy begin <= peak <= end, got begin={begin}, peak={peak}, end={end}")]
    InvalidPeakOrder { begin: usize, peak: usize, end: usize },
    #[error("peak end index {end} is outside a spectrum of {len} samples")]
    PeakOutOfRange { end: usize, len: usize },
}

impl From<SpectrumError> for SpectroError {
    fn from(error: SpectrumError) -> Self {
        SpectroError::validation("DATA.SPECTRUM", error.to_string())
    }
}

/// Hands out spectrum ids. Owned by the caller and threaded into every call
/// that creates a spectrum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumIdSequence {
    next: u64,
}

impl SpectrumIdSequence {
    pub const fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub const fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for SpectrumIdSequence {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// Region of a spectrum recognised as a peak. All indices point into the
/// owning spectrum's arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peak {
    #[serde(rename = "PeakIndex")]
    peak_index: usize,
    #[serde(rename = "PeakBeginIndex")]
    begin_index: usize,
    #[serde(rename = "PeakEndIndex")]
    end_index: usize,
}

impl Peak {
    pub fn new(
        peak_index: usize,
        begin_index: usize,
        end_index: usize,
    ) -> Result<Self, SpectrumError> {
        if begin_index > peak_index || peak_index > end_index {
            return Err(SpectrumError::InvalidPeakOrder {
                begin: begin_index,
                peak: peak_index,
                end: end_index,
            });
        }
        Ok(Self {
            peak_index,
            begin_index,
            end_index,
        })
    }

    pub const fn peak_index(&self) -> usize {
        self.peak_index
    }

    pub const fn begin_index(&self) -> usize {
        self.begin_index
    }

    pub const fn end_index(&self) -> usize {
        self.end_index
    }
}

/// A peak together with the quantities derived while detecting it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedPeak {
    pub peak: Peak,
    pub wavelength: f64,
    pub intensity: f64,
    pub fwhm: f64,
    pub pseudo_height: f64,
}

/// Calibrated intensity-vs-wavelength signal.
///
/// Wavelengths and intensities are fixed at construction; only metadata and
/// the peak list change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    id: u64,
    name: String,
    enabled: bool,
    wavelengths: Vec<f64>,
    intensities: Vec<f64>,
    peaks: Vec<Peak>,
}

impl Spectrum {
    pub fn new(
        id: u64,
        name: impl Into<String>,
        wavelengths: Vec<f64>,
        intensities: Vec<f64>,
    ) -> Result<Self, SpectrumError> {
        validate_axes(&wavelengths, &intensities)?;
        Ok(Self {
            id,
            name: name.into(),
            enabled: true,
            wavelengths,
            intensities,
            peaks: Vec::new(),
        })
    }

    /// New spectrum on the same wavelength axis, e.g. the output of a
    /// correction or an arithmetic operation.
    pub fn derive(
        &self,
        id: u64,
        name: impl Into<String>,
        intensities: Vec<f64>,
    ) -> Result<Self, SpectrumError> {
        if intensities.len() != self.wavelengths.len() {
            return Err(SpectrumError::LengthMismatch {
                wavelengths: self.wavelengths.len(),
                intensities: intensities.len(),
            });
        }
        Ok(Self {
            id,
            name: name.into(),
            enabled: true,
            wavelengths: self.wavelengths.clone(),
            intensities,
            peaks: Vec::new(),
        })
    }

    pub const fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Replaces the whole peak list.
    pub fn set_peaks(&mut self, peaks: Vec<Peak>) -> Result<(), SpectrumError> {
        let len = self.len();
        if let Some(peak) = peaks.iter().find(|peak| peak.end_index >= len) {
            return Err(SpectrumError::PeakOutOfRange {
                end: peak.end_index,
                len,
            });
        }
        self.peaks = peaks;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }
}

fn validate_axes(wavelengths: &[f64], intensities: &[f64]) -> Result<(), SpectrumError> {
    if wavelengths.len() != intensities.len() {
        return Err(SpectrumError::LengthMismatch {
            wavelengths: wavelengths.len(),
            intensities: intensities.len(),
        });
    }
    for (index, &value) in wavelengths.iter().enumerate() {
        if !value.is_finite() {
            return Err(SpectrumError::NonFiniteWavelength { index, value });
        }
        if index > 0 && value <= wavelengths[index - 1] {
            return Err(SpectrumError::NonIncreasingWavelength {
                index,
                previous: wavelengths[index - 1],
                current: value,
            });
        }
    }
    Ok(())
}

/// Reference acquisition taken with the optical input closed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DarkFrame {
    #[default]
    NotTaken,
    Taken(Vec<f64>),
}

impl DarkFrame {
    pub fn from_counts(counts: &[u16]) -> Self {
        Self::Taken(counts.iter().map(|&count| f64::from(count)).collect())
    }

    pub const fn is_taken(&self) -> bool {
        matches!(self, Self::Taken(_))
    }

    pub fn values(&self) -> Option<&[f64]> {
        match self {
            Self::NotTaken => None,
            Self::Taken(values) => Some(values),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("calibration window is empty: x_min={x_min} > x_max={x_max}")]
    EmptyWindow { x_min: usize, x_max: usize },
    #[error("calibration window end {x_max} exceeds the sensor's {pixel_count} pixels")]
    WindowOutsideSensor { x_max: usize, pixel_count: usize },
    #[error("calibration coefficient a{index} must be finite, got {value}")]
    NonFiniteCoefficient { index: usize, value: f64 },
    #[error("calibrated wavelengths are not strictly increasing at pixel {pixel}")]
    NonMonotonic { pixel: usize },
}

impl From<CalibrationError> for SpectroError {
    fn from(error: CalibrationError) -> Self {
        SpectroError::configuration("CONFIG.CALIBRATION", error.to_string())
    }
}

/// Cubic pixel-to-wavelength polynomial over the sensor's active window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WavelengthCalibration {
    pub coefficients: [f64; 4],
    pub x_min: usize,
    pub x_max: usize,
}

impl WavelengthCalibration {
    pub fn new(coefficients: [f64; 4], x_min: usize, x_max: usize) -> Self {
        Self {
            coefficients,
            x_min,
            x_max,
        }
    }

    pub fn wavelength_at(&self, pixel: usize) -> f64 {
        let [a0, a1, a2, a3] = self.coefficients;
        let x = pixel as f64;
        a0 + x * (a1 + x * (a2 + x * a3))
    }

    pub fn window_len(&self) -> usize {
        self.x_max.saturating_sub(self.x_min) + 1
    }

    pub fn wavelengths(&self) -> Vec<f64> {
        (self.x_min..=self.x_max)
            .map(|pixel| self.wavelength_at(pixel))
            .collect()
    }

    pub fn validate(&self, pixel_count: usize) -> Result<(), CalibrationError> {
        if self.x_min > self.x_max {
            return Err(CalibrationError::EmptyWindow {
                x_min: self.x_min,
                x_max: self.x_max,
            });
        }
        if self.x_max >= pixel_count {
            return Err(CalibrationError::WindowOutsideSensor {
                x_max: self.x_max,
                pixel_count,
            });
        }
        for (index, &value) in self.coefficients.iter().enumerate() {
            if !value.is_finite() {
                return Err(CalibrationError::NonFiniteCoefficient { index, value });
            }
        }
        let mut previous = self.wavelength_at(self.x_min);
        for pixel in (self.x_min + 1)..=self.x_max {
            let current = self.wavelength_at(pixel);
            if current <= previous {
                return Err(CalibrationError::NonMonotonic { pixel });
            }
            previous = current;
        }
        Ok(())
    }
}

impl Display for Peak {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}..={}]",
            self.peak_index, self.begin_index, self.end_index
        )
    }
}
