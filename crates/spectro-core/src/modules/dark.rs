use crate::common::DarkCorrectionConfig;
use crate::domain::{DarkFrame, SpectroError};
use tracing::debug;

const NEIGHBOR_OFFSETS: [isize; 4] = [-2, -1, 1, 2];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DarkCorrectionError {
    #[error("dark frame length mismatch: raw={raw}, dark={dark}")]
    LengthMismatch { raw: usize, dark: usize },
}

impl From<DarkCorrectionError> for SpectroError {
    fn from(error: DarkCorrectionError) -> Self {
        SpectroError::validation("DATA.DARK", error.to_string())
    }
}

/// Run of consecutive bad pixels, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadPixelRun {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DarkCorrection {
    pub values: Vec<f64>,
    /// Interpolated runs. Endpoints are clamped and never classified, so
    /// every run has a good neighbour on both sides.
    pub repaired: Vec<BadPixelRun>,
}

/// Subtracts `dark` from `raw`. A dark frame that was never taken is a
/// pass-through.
pub fn correct_dark(
    raw: &[f64],
    dark: &DarkFrame,
    config: &DarkCorrectionConfig,
) -> Result<Vec<f64>, DarkCorrectionError> {
    correct_dark_detailed(raw, dark, config).map(|correction| correction.values)
}

pub fn correct_dark_detailed(
    raw: &[f64],
    dark: &DarkFrame,
    config: &DarkCorrectionConfig,
) -> Result<DarkCorrection, DarkCorrectionError> {
    let Some(dark) = dark.values() else {
        return Ok(DarkCorrection {
            values: raw.to_vec(),
            repaired: Vec::new(),
        });
    };
    if dark.len() != raw.len() {
        return Err(DarkCorrectionError::LengthMismatch {
            raw: raw.len(),
            dark: dark.len(),
        });
    }

    let len = raw.len();
    let mut values = raw.to_vec();
    let mut bad = vec![false; len];
    if len == 0 {
        return Ok(DarkCorrection {
            values,
            repaired: Vec::new(),
        });
    }

    values[0] = (raw[0] - dark[0]).max(0.0);
    values[len - 1] = (raw[len - 1] - dark[len - 1]).max(0.0);

    for index in 1..len.saturating_sub(1) {
        if is_bad_pixel(raw, dark, index, config) {
            bad[index] = true;
        } else {
            values[index] = raw[index] - dark[index];
        }
    }

    let mut repaired = Vec::new();
    for run in bad_runs(&bad) {
        let (Some(before_index), Some(&after)) =
            (run.start.checked_sub(1), values.get(run.end + 1))
        else {
            continue;
        };
        let before = values[before_index];
        let step = (after - before) / (run.end - run.start + 2) as f64;
        for (k, index) in (run.start..=run.end).enumerate() {
            values[index] = before + (k + 1) as f64 * step;
        }
        repaired.push(run);
    }
    debug!(
        pixels = len,
        repaired_runs = repaired.len(),
        "dark frame subtracted"
    );

    Ok(DarkCorrection { values, repaired })
}

fn is_bad_pixel(raw: &[f64], dark: &[f64], index: usize, config: &DarkCorrectionConfig) -> bool {
    if dark[index] > raw[index] {
        return true;
    }
    raw[index] == config.saturation_value
        && dark[index] > config.saturation_dark_ratio * neighbor_dark_mean(dark, index)
}

fn neighbor_dark_mean(dark: &[f64], index: usize) -> f64 {
    let (sum, count) = NEIGHBOR_OFFSETS
        .iter()
        .filter_map(|offset| index.checked_add_signed(*offset))
        .filter(|neighbor| *neighbor < dark.len())
        .fold((0.0, 0usize), |(sum, count), neighbor| {
            (sum + dark[neighbor], count + 1)
        });
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn bad_runs(bad: &[bool]) -> Vec<BadPixelRun> {
    let mut runs = Vec::new();
    let mut index = 0;
    while index < bad.len() {
        if !bad[index] {
            index += 1;
            continue;
        }
        let start = index;
        while index + 1 < bad.len() && bad[index + 1] {
            index += 1;
        }
        runs.push(BadPixelRun { start, end: index });
        index += 1;
    }
    runs
}
