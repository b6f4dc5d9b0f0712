use super::derivative::{DerivativeConfig, DerivativeError, DerivativeInput, derivative};
use crate::domain::SpectroError;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Smoothing {
    #[serde(rename_all = "camelCase")]
    SavitzkyGolay {
        half_window: usize,
        poly_degree: usize,
    },
    #[serde(rename_all = "camelCase")]
    BoxCar { half_window: usize },
    /// Low-pass filter keeping the `degree` lowest frequency bins.
    Fft { degree: usize },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SmoothingError {
    #[error(transparent)]
    Derivative(#[from] DerivativeError),
    #[error("FFT smoothing must keep at least one frequency bin")]
    ZeroFftDegree,
}

impl From<SmoothingError> for SpectroError {
    fn from(error: SmoothingError) -> Self {
        match error {
            SmoothingError::Derivative(inner) => inner.into(),
            SmoothingError::ZeroFftDegree => {
                SpectroError::configuration("CONFIG.SMOOTHING", error.to_string())
            }
        }
    }
}

pub fn smooth(values: &[f64], smoothing: Smoothing) -> Result<Vec<f64>, SmoothingError> {
    match smoothing {
        Smoothing::SavitzkyGolay {
            half_window,
            poly_degree,
        } => Ok(derivative(DerivativeInput::new(
            values,
            None,
            DerivativeConfig::savitzky_golay(0, half_window, poly_degree),
        ))?),
        Smoothing::BoxCar { half_window } => Ok(box_car(values, half_window)),
        Smoothing::Fft { degree } => {
            if degree == 0 {
                return Err(SmoothingError::ZeroFftDegree);
            }
            Ok(fft_low_pass(values, degree))
        }
    }
}

/// Centered moving average; the window shrinks at the edges.
fn box_car(values: &[f64], half_window: usize) -> Vec<f64> {
    let len = values.len();
    let mut prefix = Vec::with_capacity(len + 1);
    prefix.push(0.0);
    for value in values {
        let running = prefix[prefix.len() - 1] + value;
        prefix.push(running);
    }

    (0..len)
        .map(|center| {
            let first = center.saturating_sub(half_window);
            let last = center.saturating_add(half_window).min(len - 1);
            (prefix[last + 1] - prefix[first]) / (last - first + 1) as f64
        })
        .collect()
}

/// Zeroes every bin whose frequency index is `>= degree`, together with its
/// conjugate mirror, and transforms back.
fn fft_low_pass(values: &[f64], degree: usize) -> Vec<f64> {
    let len = values.len();
    if len == 0 {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(len);
    let inverse = planner.plan_fft_inverse(len);

    let mut bins: Vec<Complex64> = values
        .iter()
        .map(|&value| Complex64::new(value, 0.0))
        .collect();
    forward.process(&mut bins);
    for (index, bin) in bins.iter_mut().enumerate() {
        if index.min(len - index) >= degree {
            *bin = Complex64::new(0.0, 0.0);
        }
    }
    inverse.process(&mut bins);

    // rustfft leaves the round trip scaled by `len`.
    let scale = len as f64;
    bins.iter().map(|bin| bin.re / scale).collect()
}
