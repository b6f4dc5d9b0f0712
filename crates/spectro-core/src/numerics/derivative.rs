use super::banded::{BandedSolveError, SymmetricBandMatrix, solve_symmetric_banded};
use crate::domain::SpectroError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DerivativeMethod {
    PointDiff,
    #[default]
    SavitzkyGolay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DerivativeConfig {
    pub method: DerivativeMethod,
    pub order: usize,
    pub half_window: usize,
    pub poly_degree: usize,
}

impl DerivativeConfig {
    pub const fn savitzky_golay(order: usize, half_window: usize, poly_degree: usize) -> Self {
        Self {
            method: DerivativeMethod::SavitzkyGolay,
            order,
            half_window,
            poly_degree,
        }
    }

    pub const fn point_diff(order: usize) -> Self {
        Self {
            method: DerivativeMethod::PointDiff,
            order,
            half_window: 0,
            poly_degree: 0,
        }
    }

    /// `2 * half_window + 1`, or `None` when that does not fit in `usize`.
    pub const fn window_len(&self) -> Option<usize> {
        match self.half_window.checked_mul(2) {
            Some(span) => span.checked_add(1),
            None => None,
        }
    }

    pub fn validate(&self) -> Result<(), DerivativeError> {
        if self.method != DerivativeMethod::SavitzkyGolay {
            return Ok(());
        }
        let Some(window_len) = self.window_len() else {
            return Err(DerivativeError::WindowTooLarge {
                half_window: self.half_window,
            });
        };
        if window_len <= self.poly_degree {
            return Err(DerivativeError::WindowTooSmall {
                window_len,
                poly_degree: self.poly_degree,
            });
        }
        Ok(())
    }
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self::savitzky_golay(2, 3, 3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivativeInput<'a> {
    pub values: &'a [f64],
    /// Sample positions; `None` differentiates against the sample index.
    pub axis: Option<&'a [f64]>,
    pub config: DerivativeConfig,
}

impl<'a> DerivativeInput<'a> {
    pub fn new(values: &'a [f64], axis: Option<&'a [f64]>, config: DerivativeConfig) -> Self {
        Self {
            values,
            axis,
            config,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DerivativeError {
    #[error(
        "savitzky-golay window of {window_len} samples cannot fit a degree {poly_degree} polynomial"
    )]
    WindowTooSmall {
        window_len: usize,
        poly_degree: usize,
    },
    #[error("savitzky-golay half window {half_window} is too large")]
    WindowTooLarge { half_window: usize },
    #[error("derivative axis length mismatch: values={values}, axis={axis}")]
    AxisLengthMismatch { values: usize, axis: usize },
    #[error("derivative axis must be strictly increasing at index {index}")]
    NonIncreasingAxis { index: usize },
    #[error("local polynomial fit is singular around index {index}: {source}")]
    SingularFit {
        index: usize,
        source: BandedSolveError,
    },
}

impl From<DerivativeError> for SpectroError {
    fn from(error: DerivativeError) -> Self {
        match error {
            DerivativeError::WindowTooSmall { .. } | DerivativeError::WindowTooLarge { .. } => {
                SpectroError::configuration("CONFIG.DERIVATIVE", error.to_string())
            }
            DerivativeError::AxisLengthMismatch { .. }
            | DerivativeError::NonIncreasingAxis { .. } => {
                SpectroError::validation("DATA.DERIVATIVE", error.to_string())
            }
            DerivativeError::SingularFit { .. } => {
                SpectroError::numerical("NUMERIC.DERIVATIVE", error.to_string())
            }
        }
    }
}

/// Derivative of `config.order` of a sampled signal. The output always has
/// the input's length; boundary samples use a clipped window.
pub fn derivative(input: DerivativeInput<'_>) -> Result<Vec<f64>, DerivativeError> {
    input.config.validate()?;
    let axis = resolve_axis(input.values, input.axis)?;

    match input.config.method {
        DerivativeMethod::PointDiff => {
            let mut current = input.values.to_vec();
            for _ in 0..input.config.order {
                current = central_difference(&current, &axis);
            }
            Ok(current)
        }
        DerivativeMethod::SavitzkyGolay => savitzky_golay(
            input.values,
            &axis,
            input.config.half_window,
            input.config.poly_degree,
            input.config.order,
        ),
    }
}

fn resolve_axis(values: &[f64], axis: Option<&[f64]>) -> Result<Vec<f64>, DerivativeError> {
    let Some(axis) = axis else {
        return Ok((0..values.len()).map(|index| index as f64).collect());
    };
    if axis.len() != values.len() {
        return Err(DerivativeError::AxisLengthMismatch {
            values: values.len(),
            axis: axis.len(),
        });
    }
    if let Some(index) = (1..axis.len()).find(|&index| !(axis[index] > axis[index - 1])) {
        return Err(DerivativeError::NonIncreasingAxis { index });
    }
    Ok(axis.to_vec())
}

/// One pass of first-order differencing: central inside, one-sided at the ends.
fn central_difference(values: &[f64], axis: &[f64]) -> Vec<f64> {
    let len = values.len();
    if len < 2 {
        return vec![0.0; len];
    }

    (0..len)
        .map(|index| {
            let before = index.saturating_sub(1);
            let after = (index + 1).min(len - 1);
            (values[after] - values[before]) / (axis[after] - axis[before])
        })
        .collect()
}

fn savitzky_golay(
    values: &[f64],
    axis: &[f64],
    half_window: usize,
    poly_degree: usize,
    order: usize,
) -> Result<Vec<f64>, DerivativeError> {
    let len = values.len();
    let mut output = Vec::with_capacity(len);

    for center in 0..len {
        let first = center.saturating_sub(half_window);
        let last = center.saturating_add(half_window).min(len - 1);
        let degree = poly_degree.min(last - first);
        if order > degree {
            output.push(0.0);
            continue;
        }

        let origin = axis[center];
        let scale = (origin - axis[first]).max(axis[last] - origin);
        let scale = if scale > 0.0 { scale } else { 1.0 };

        let mut normal = SymmetricBandMatrix::zeros(degree + 1, degree);
        let mut moments = vec![0.0; degree + 1];
        for sample in first..=last {
            let t = (axis[sample] - origin) / scale;
            let powers: Vec<f64> = (0..=2 * degree)
                .scan(1.0, |power, _| {
                    let current = *power;
                    *power *= t;
                    Some(current)
                })
                .collect();
            for row in 0..=degree {
                moments[row] += powers[row] * values[sample];
                for col in row..=degree {
                    normal
                        .add(row, col, powers[row + col])
                        .map_err(|source| DerivativeError::SingularFit {
                            index: center,
                            source,
                        })?;
                }
            }
        }

        let coefficients = solve_symmetric_banded(&normal, &moments).map_err(|source| {
            DerivativeError::SingularFit {
                index: center,
                source,
            }
        })?;
        output.push(factorial(order) * coefficients[order] / scale.powi(order as i32));
    }

    Ok(output)
}

fn factorial(value: usize) -> f64 {
    (1..=value).fold(1.0, |acc, factor| acc * factor as f64)
}
