use super::banded::{BandedSolveError, SymmetricBandMatrix, solve_symmetric_banded};
use crate::domain::SpectroError;
use tracing::{debug, warn};

const SECOND_DIFFERENCE: [f64; 3] = [1.0, -2.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirPlsInput<'a> {
    pub values: &'a [f64],
    pub lambda: f64,
    pub itermax: usize,
    /// Stop once `|s| < tolerance * sum(|y|)`, `s` being the sum of negative residuals.
    pub tolerance: f64,
}

impl<'a> AirPlsInput<'a> {
    pub fn new(values: &'a [f64], lambda: f64, itermax: usize, tolerance: f64) -> Self {
        Self {
            values,
            lambda,
            itermax,
            tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AirPlsOutcome {
    pub baseline: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    pub negative_residual_sum: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BaselineError {
    #[error("airPLS lambda must be finite and >= 0, got {value}")]
    InvalidLambda { value: f64 },
    #[error("airPLS needs at least one iteration")]
    ZeroIterations,
    #[error("airPLS tolerance must be finite and >= 0, got {value}")]
    InvalidTolerance { value: f64 },
    #[error("airPLS input must be finite, index {index} got {value}")]
    NonFiniteValue { index: usize, value: f64 },
    #[error("airPLS penalized system could not be solved at iteration {iteration}: {source}")]
    Solve {
        iteration: usize,
        source: BandedSolveError,
    },
}

impl From<BaselineError> for SpectroError {
    fn from(error: BaselineError) -> Self {
        match error {
            BaselineError::InvalidLambda { .. }
            | BaselineError::ZeroIterations
            | BaselineError::InvalidTolerance { .. } => {
                SpectroError::configuration("CONFIG.BASELINE", error.to_string())
            }
            BaselineError::NonFiniteValue { .. } => {
                SpectroError::validation("DATA.BASELINE", error.to_string())
            }
            BaselineError::Solve { .. } => {
                SpectroError::numerical("NUMERIC.BASELINE", error.to_string())
            }
        }
    }
}

/// `DᵗD` for the `(n-2) x n` second-difference operator, kept as a
/// pentadiagonal band.
pub fn second_difference_penalty(dimension: usize) -> SymmetricBandMatrix {
    let mut penalty = SymmetricBandMatrix::zeros(dimension, 2);
    for row in 0..dimension.saturating_sub(2) {
        for (a, weight_a) in SECOND_DIFFERENCE.iter().enumerate() {
            for (b, weight_b) in SECOND_DIFFERENCE.iter().enumerate().skip(a) {
                let added = penalty.add(row + a, row + b, weight_a * weight_b);
                debug_assert!(added.is_ok(), "second-difference entry outside the band");
            }
        }
    }
    penalty
}

/// Adaptive iteratively reweighted penalized least squares baseline.
pub fn estimate_baseline(input: AirPlsInput<'_>) -> Result<AirPlsOutcome, BaselineError> {
    validate_input(input)?;

    let values = input.values;
    let len = values.len();
    if len == 0 {
        return Ok(AirPlsOutcome {
            baseline: Vec::new(),
            iterations: 0,
            converged: true,
            negative_residual_sum: 0.0,
        });
    }

    let penalty = second_difference_penalty(len).scaled(input.lambda);
    let stop_criterion = input.tolerance * values.iter().map(|value| value.abs()).sum::<f64>();
    let mut weights = vec![1.0; len];
    let mut baseline = values.to_vec();
    let mut negative_residual_sum = 0.0;

    for iteration in 1..=input.itermax {
        let mut system = penalty.clone();
        system
            .add_to_diagonal(&weights)
            .map_err(|source| BaselineError::Solve { iteration, source })?;
        let rhs: Vec<f64> = weights
            .iter()
            .zip(values)
            .map(|(weight, value)| weight * value)
            .collect();
        baseline = solve_symmetric_banded(&system, &rhs)
            .map_err(|source| BaselineError::Solve { iteration, source })?;

        let residuals: Vec<f64> = values
            .iter()
            .zip(&baseline)
            .map(|(value, fit)| value - fit)
            .collect();
        negative_residual_sum = residuals.iter().filter(|residual| **residual < 0.0).sum();
        debug!(
            iteration,
            negative_residual_sum, stop_criterion, "airPLS iteration"
        );

        if negative_residual_sum.abs() < stop_criterion || negative_residual_sum == 0.0 {
            return Ok(AirPlsOutcome {
                baseline,
                iterations: iteration,
                converged: true,
                negative_residual_sum,
            });
        }

        let scale = negative_residual_sum.abs();
        for (weight, residual) in weights.iter_mut().zip(&residuals) {
            *weight = if *residual > 0.0 {
                0.0
            } else {
                (iteration as f64 * residual.abs() / scale).exp()
            };
        }
    }

    warn!(
        itermax = input.itermax,
        negative_residual_sum, stop_criterion, "airPLS stopped before converging"
    );
    Ok(AirPlsOutcome {
        baseline,
        iterations: input.itermax,
        converged: false,
        negative_residual_sum,
    })
}

fn validate_input(input: AirPlsInput<'_>) -> Result<(), BaselineError> {
    if !input.lambda.is_finite() || input.lambda < 0.0 {
        return Err(BaselineError::InvalidLambda {
            value: input.lambda,
        });
    }
    if input.itermax == 0 {
        return Err(BaselineError::ZeroIterations);
    }
    if !input.tolerance.is_finite() || input.tolerance < 0.0 {
        return Err(BaselineError::InvalidTolerance {
            value: input.tolerance,
        });
    }
    if let Some((index, &value)) = input
        .values
        .iter()
        .enumerate()
        .find(|(_, value)| !value.is_finite())
    {
        return Err(BaselineError::NonFiniteValue { index, value });
    }
    Ok(())
}
