//! Processing core for array spectrometers: dark-frame correction,
//! Savitzky–Golay derivatives, airPLS baseline estimation and peak detection,
//! plus the device capability interface that feeds them raw frames.

pub mod common;
pub mod device;
pub mod domain;
pub mod modules;
pub mod numerics;

pub use domain::{
    DarkFrame, DetectedPeak, Peak, SpectroError, SpectroErrorCategory, SpectroResult, Spectrum,
    SpectrumIdSequence, WavelengthCalibration,
};
