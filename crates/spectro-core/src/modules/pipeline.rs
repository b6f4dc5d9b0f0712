//! Spectrum-level operations and the end-to-end processing chain:
//! raw frame, dark correction, optional baseline removal, peak detection.

use super::dark::correct_dark;
use super::peaks::detect_peaks;
use crate::common::{BaselineConfig, ProcessingConfig};
use crate::domain::{DarkFrame, DetectedPeak, SpectroResult, Spectrum, SpectrumIdSequence};
use crate::numerics::{
    AirPlsInput, AirPlsOutcome, DerivativeConfig, DerivativeInput, Smoothing, derivative,
    estimate_baseline, smooth,
};
use rayon::prelude::*;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct BaselineRemoval {
    pub spectrum: Spectrum,
    pub baseline: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaselineSummary {
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingReport {
    pub spectrum: Spectrum,
    pub baseline: Option<BaselineSummary>,
    pub peaks: Vec<DetectedPeak>,
}

/// Numerical results for one spectrum, before any new spectrum is allocated.
#[derive(Debug, Clone, PartialEq)]
struct Analysis {
    baseline: Option<AirPlsOutcome>,
    processed: Vec<f64>,
    peaks: Option<Vec<DetectedPeak>>,
}

fn run_airpls(values: &[f64], config: &BaselineConfig) -> SpectroResult<AirPlsOutcome> {
    Ok(estimate_baseline(AirPlsInput::new(
        values,
        config.lambda,
        config.itermax,
        config.tolerance,
    ))?)
}

/// `y - baseline` as a new spectrum named `<name>_baselineRemoved`.
pub fn remove_baseline(
    spectrum: &Spectrum,
    config: &BaselineConfig,
    ids: &mut SpectrumIdSequence,
) -> SpectroResult<BaselineRemoval> {
    let outcome = run_airpls(spectrum.intensities(), config)?;
    let corrected = subtract(spectrum.intensities(), &outcome.baseline);
    let name = format!("{}_baselineRemoved", spectrum.name());
    Ok(BaselineRemoval {
        spectrum: spectrum.derive(ids.next_id(), name, corrected)?,
        baseline: outcome.baseline,
        iterations: outcome.iterations,
        converged: outcome.converged,
    })
}

pub fn derivative_spectrum(
    spectrum: &Spectrum,
    config: &DerivativeConfig,
    ids: &mut SpectrumIdSequence,
) -> SpectroResult<Spectrum> {
    let values = derivative(DerivativeInput::new(
        spectrum.intensities(),
        Some(spectrum.wavelengths()),
        *config,
    ))?;
    let name = format!("{}_{}_derivative", spectrum.name(), ordinal(config.order));
    Ok(spectrum.derive(ids.next_id(), name, values)?)
}

pub fn smooth_spectrum(
    spectrum: &Spectrum,
    smoothing: Smoothing,
    ids: &mut SpectrumIdSequence,
) -> SpectroResult<Spectrum> {
    let values = smooth(spectrum.intensities(), smoothing)?;
    let name = format!("{}_smoothed", spectrum.name());
    Ok(spectrum.derive(ids.next_id(), name, values)?)
}

fn ordinal(order: usize) -> String {
    let suffix = match (order % 10, order % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{order}{suffix}")
}

fn subtract(values: &[f64], baseline: &[f64]) -> Vec<f64> {
    values
        .iter()
        .zip(baseline)
        .map(|(value, fit)| value - fit)
        .collect()
}

fn analyze(
    wavelengths: &[f64],
    intensities: &[f64],
    config: &ProcessingConfig,
) -> SpectroResult<Analysis> {
    let (baseline, processed) = if config.baseline.enabled {
        let outcome = run_airpls(intensities, &config.baseline)?;
        let corrected = subtract(intensities, &outcome.baseline);
        (Some(outcome), corrected)
    } else {
        (None, intensities.to_vec())
    };

    let peaks = if config.peaks.enabled {
        Some(detect_peaks(wavelengths, &processed, &config.peaks)?)
    } else {
        None
    };

    Ok(Analysis {
        baseline,
        processed,
        peaks,
    })
}

fn finish(
    spectrum: Spectrum,
    analysis: Analysis,
    ids: &mut SpectrumIdSequence,
) -> SpectroResult<ProcessingReport> {
    let (mut spectrum, baseline) = match analysis.baseline {
        Some(outcome) => {
            let name = format!("{}_baselineRemoved", spectrum.name());
            let corrected = spectrum.derive(ids.next_id(), name, analysis.processed)?;
            let summary = BaselineSummary {
                iterations: outcome.iterations,
                converged: outcome.converged,
            };
            (corrected, Some(summary))
        }
        None => (spectrum, None),
    };

    let peaks = match analysis.peaks {
        Some(peaks) => {
            spectrum.set_peaks(peaks.iter().map(|found| found.peak).collect())?;
            peaks
        }
        None => Vec::new(),
    };

    Ok(ProcessingReport {
        spectrum,
        baseline,
        peaks,
    })
}

/// Optional baseline removal followed by peak detection. With the baseline
/// step disabled the input spectrum is returned with its peaks replaced.
pub fn process_spectrum(
    spectrum: Spectrum,
    config: &ProcessingConfig,
    ids: &mut SpectrumIdSequence,
) -> SpectroResult<ProcessingReport> {
    let analysis = analyze(spectrum.wavelengths(), spectrum.intensities(), config)?;
    let report = finish(spectrum, analysis, ids)?;
    info!(
        spectrum = report.spectrum.name(),
        peaks = report.peaks.len(),
        "spectrum processed"
    );
    Ok(report)
}

/// Processes independent raw frames in parallel. Ids are handed out in frame
/// order afterwards, so the result matches a serial run.
pub fn process_frames(
    frames: &[Vec<f64>],
    wavelengths: &[f64],
    dark: &DarkFrame,
    config: &ProcessingConfig,
    name: &str,
    ids: &mut SpectrumIdSequence,
) -> SpectroResult<Vec<ProcessingReport>> {
    let analyses = frames
        .par_iter()
        .map(|frame| -> SpectroResult<(Vec<f64>, Analysis)> {
            let corrected = correct_dark(frame, dark, &config.dark)?;
            let analysis = analyze(wavelengths, &corrected, config)?;
            Ok((corrected, analysis))
        })
        .collect::<SpectroResult<Vec<_>>>()?;
    debug!(frames = analyses.len(), "frame analysis finished");

    analyses
        .into_iter()
        .enumerate()
        .map(|(index, (corrected, analysis))| -> SpectroResult<ProcessingReport> {
            let spectrum = Spectrum::new(
                ids.next_id(),
                format!("{name}_{}", index + 1),
                wavelengths.to_vec(),
                corrected,
            )?;
            finish(spectrum, analysis, ids)
        })
        .collect()
}
