#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntegrationError {
    #[error("trapezoid input length mismatch: x={x}, y={y}")]
    LengthMismatch { x: usize, y: usize },
}

/// Trapezoidal rule over a possibly non-uniform abscissa. Fewer than two
/// samples integrate to zero.
pub fn trapezoid(x: &[f64], y: &[f64]) -> Result<f64, IntegrationError> {
    if x.len() != y.len() {
        return Err(IntegrationError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }

    Ok(x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| 0.5 * (xs[1] - xs[0]) * (ys[0] + ys[1]))
        .sum())
}
