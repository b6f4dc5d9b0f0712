use crate::domain::{SpectroError, Spectrum, SpectrumError, SpectrumIdSequence};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }

    /// Zero divisors yield zero so the result keeps its length and stays finite.
    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            Self::Add => left + right,
            Self::Subtract => left - right,
            Self::Multiply => left * right,
            Self::Divide if right == 0.0 => 0.0,
            Self::Divide => left / right,
        }
    }
}

impl Display for ArithmeticOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArithmeticError {
    #[error("spectrum arithmetic length mismatch: left={left}, right={right}")]
    LengthMismatch { left: usize, right: usize },
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
}

impl From<ArithmeticError> for SpectroError {
    fn from(error: ArithmeticError) -> Self {
        SpectroError::validation("DATA.ARITHMETIC", error.to_string())
    }
}

/// Elementwise `left op right`, on the left operand's wavelength axis.
pub fn combine(
    left: &Spectrum,
    right: &Spectrum,
    op: ArithmeticOp,
    ids: &mut SpectrumIdSequence,
) -> Result<Spectrum, ArithmeticError> {
    ensure_same_len(left, right)?;
    let values = left
        .intensities()
        .iter()
        .zip(right.intensities())
        .map(|(l, r)| op.apply(*l, *r))
        .collect();
    let name = format!("{} {} {}", left.name(), op, right.name());
    Ok(left.derive(ids.next_id(), name, values)?)
}

pub fn apply_scalar(
    spectrum: &Spectrum,
    scalar: f64,
    op: ArithmeticOp,
    ids: &mut SpectrumIdSequence,
) -> Result<Spectrum, ArithmeticError> {
    let values = spectrum
        .intensities()
        .iter()
        .map(|value| op.apply(*value, scalar))
        .collect();
    let name = format!("{} {} {}", spectrum.name(), op, scalar);
    Ok(spectrum.derive(ids.next_id(), name, values)?)
}

pub fn average(
    left: &Spectrum,
    right: &Spectrum,
    ids: &mut SpectrumIdSequence,
) -> Result<Spectrum, ArithmeticError> {
    ensure_same_len(left, right)?;
    let values = left
        .intensities()
        .iter()
        .zip(right.intensities())
        .map(|(l, r)| 0.5 * (l + r))
        .collect();
    let name = format!("avg({}, {})", left.name(), right.name());
    Ok(left.derive(ids.next_id(), name, values)?)
}

fn ensure_same_len(left: &Spectrum, right: &Spectrum) -> Result<(), ArithmeticError> {
    if left.len() != right.len() {
        return Err(ArithmeticError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    Ok(())
}
