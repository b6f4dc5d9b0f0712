use crate::common::PeakDetectionConfig;
use crate::domain::{DetectedPeak, Peak, SpectroError, Spectrum, SpectrumError};
use crate::numerics::{
    DerivativeConfig, DerivativeError, DerivativeInput, IntegrationError, derivative, trapezoid,
};
use std::f64::consts::LN_2;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PeakDetectionError {
    #[error("peak detection input length mismatch: wavelengths={wavelengths}, intensities={intensities}")]
    LengthMismatch {
        wavelengths: usize,
        intensities: usize,
    },
    #[error(transparent)]
    Derivative(#[from] DerivativeError),
    #[error(transparent)]
    Integration(#[from] IntegrationError),
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
}

impl From<PeakDetectionError> for SpectroError {
    fn from(error: PeakDetectionError) -> Self {
        match error {
            PeakDetectionError::Derivative(inner) => inner.into(),
            PeakDetectionError::Spectrum(inner) => inner.into(),
            PeakDetectionError::LengthMismatch { .. } | PeakDetectionError::Integration(_) => {
                SpectroError::validation("DATA.PEAKS", error.to_string())
            }
        }
    }
}

/// Concave-down stretch of the second derivative, `[begin, end]` inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CurvatureRegion {
    begin: usize,
    end: usize,
}

/// Locates peaks from the curvature of the intensity profile.
///
/// A region starts where the second derivative turns negative and ends at
/// the first sample where it is positive again. Regions whose pseudo-height
/// does not exceed `region_threshold` are dropped, as are maxima not above
/// `min_peak_height` or not dominating `local_max_radius` samples on each side.
pub fn detect_peaks(
    wavelengths: &[f64],
    intensities: &[f64],
    config: &PeakDetectionConfig,
) -> Result<Vec<DetectedPeak>, PeakDetectionError> {
    if wavelengths.len() != intensities.len() {
        return Err(PeakDetectionError::LengthMismatch {
            wavelengths: wavelengths.len(),
            intensities: intensities.len(),
        });
    }

    let derivative_config = DerivativeConfig::savitzky_golay(
        2,
        config.derivative.half_window,
        config.derivative.poly_degree,
    );
    let curvature = derivative(DerivativeInput::new(
        intensities,
        Some(wavelengths),
        derivative_config,
    ))?;

    let mut peaks = Vec::new();
    for region in curvature_regions(&curvature) {
        let CurvatureRegion { begin, end } = region;
        let distance = wavelengths[end] - wavelengths[begin];
        let area = -trapezoid(&wavelengths[begin..=end], &curvature[begin..=end])?;
        let pseudo_height = (0.5_f64.exp() / 4.0) * area * distance;
        if pseudo_height <= config.region_threshold {
            debug!(begin, end, pseudo_height, "curvature region below threshold");
            continue;
        }

        let peak_index = argmax(intensities, begin, end);
        let intensity = intensities[peak_index];
        if intensity <= config.min_peak_height {
            continue;
        }
        if !is_local_maximum(intensities, peak_index, config.local_max_radius) {
            debug!(peak_index, "candidate is not a local maximum");
            continue;
        }

        peaks.push(DetectedPeak {
            peak: Peak::new(peak_index, begin, end)?,
            wavelength: wavelengths[peak_index],
            intensity,
            fwhm: (2.0 * LN_2).sqrt() * distance,
            pseudo_height,
        });
    }

    debug!(count = peaks.len(), "peak detection finished");
    Ok(peaks)
}

/// Detects peaks and replaces the spectrum's peak list with them.
pub fn assign_peaks(
    spectrum: &mut Spectrum,
    config: &PeakDetectionConfig,
) -> Result<Vec<DetectedPeak>, PeakDetectionError> {
    let detected = detect_peaks(spectrum.wavelengths(), spectrum.intensities(), config)?;
    spectrum.set_peaks(detected.iter().map(|found| found.peak).collect())?;
    Ok(detected)
}

fn curvature_regions(curvature: &[f64]) -> Vec<CurvatureRegion> {
    let mut regions = Vec::new();
    let mut open: Option<usize> = None;
    for (index, &value) in curvature.iter().enumerate() {
        match open {
            None if value < 0.0 => open = Some(index),
            Some(begin) if value > 0.0 => {
                regions.push(CurvatureRegion { begin, end: index });
                open = None;
            }
            _ => {}
        }
    }
    regions
}

fn argmax(values: &[f64], begin: usize, end: usize) -> usize {
    (begin..=end).fold(begin, |best, index| {
        if values[index] > values[best] {
            index
        } else {
            best
        }
    })
}

fn is_local_maximum(values: &[f64], index: usize, radius: usize) -> bool {
    if index <= radius || index.checked_add(radius).is_none_or(|last| last >= values.len()) {
        return false;
    }
    values[index - radius..=index + radius]
        .iter()
        .all(|value| values[index] >= *value)
}
