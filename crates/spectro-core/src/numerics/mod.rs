pub mod banded;
pub mod baseline;
pub mod derivative;
pub mod integration;
pub mod smoothing;

pub use banded::{
    BandCholesky, BandedSolveError, SymmetricBandMatrix, band_cholesky_factorize,
    solve_symmetric_banded,
};
pub use baseline::{
    AirPlsInput, AirPlsOutcome, BaselineError, estimate_baseline, second_difference_penalty,
};
pub use derivative::{
    DerivativeConfig, DerivativeError, DerivativeInput, DerivativeMethod, derivative,
};
pub use integration::{IntegrationError, trapezoid};
pub use smoothing::{Smoothing, SmoothingError, smooth};
