use super::CliError;
use super::helpers::*;
use anyhow::Context;
use spectro_core::common::load_device_config;
use spectro_core::device::AcquisitionSession;
use spectro_core::domain::{Spectrum, SpectrumIdSequence};
use spectro_core::modules::{
    assign_peaks, correct_dark, derivative_spectrum, load_dark_frame, process_frames,
    process_spectrum, remove_baseline, smooth_spectrum,
};
use spectro_core::numerics::{DerivativeConfig, Smoothing};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(clap::Args)]
pub(super) struct DarkCorrectArgs {
    /// Spectrum to correct (.csv or .json)
    #[arg(long)]
    input: PathBuf,

    /// Dark frame, one value per line
    #[arg(long)]
    dark: PathBuf,

    /// Corrected spectrum output path
    #[arg(long)]
    output: PathBuf,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
pub(super) enum DerivativeMethodArg {
    #[default]
    SavitzkyGolay,
    PointDiff,
}

#[derive(clap::Args)]
pub(super) struct DerivativeArgs {
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    output: PathBuf,

    /// Derivative order
    #[arg(long, default_value_t = 2)]
    order: usize,

    #[arg(long, value_enum, default_value_t)]
    method: DerivativeMethodArg,

    /// Savitzky–Golay half window (window length is 2h+1)
    #[arg(long, default_value_t = 3)]
    half_window: usize,

    /// Savitzky–Golay polynomial degree
    #[arg(long, default_value_t = 3)]
    poly_degree: usize,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
pub(super) enum SmoothingArg {
    #[default]
    SavitzkyGolay,
    BoxCar,
    Fft,
}

#[derive(clap::Args)]
pub(super) struct SmoothArgs {
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t)]
    kind: SmoothingArg,

    #[arg(long, default_value_t = 3)]
    half_window: usize,

    /// Polynomial degree, Savitzky–Golay only
    #[arg(long, default_value_t = 3)]
    poly_degree: usize,

    /// Number of low-frequency bins kept, FFT only
    #[arg(long, default_value_t = 1)]
    fft_degree: usize,
}

#[derive(clap::Args)]
pub(super) struct BaselineArgs {
    #[arg(long)]
    input: PathBuf,

    /// Baseline-removed spectrum output path
    #[arg(long)]
    output: PathBuf,

    /// Also write the estimated baseline as a spectrum
    #[arg(long)]
    baseline_output: Option<PathBuf>,

    /// Smoothness penalty; overrides the configuration
    #[arg(long)]
    lambda: Option<f64>,

    /// Iteration cap; overrides the configuration
    #[arg(long)]
    itermax: Option<usize>,

    /// Relative convergence tolerance; overrides the configuration
    #[arg(long)]
    tolerance: Option<f64>,
}

#[derive(clap::Args)]
pub(super) struct PeaksArgs {
    #[arg(long)]
    input: PathBuf,

    /// Write the spectrum with its detected peaks
    #[arg(long)]
    output: Option<PathBuf>,

    /// Minimum peak intensity; overrides the configuration
    #[arg(long)]
    min_height: Option<f64>,
}

#[derive(clap::Args)]
pub(super) struct ProcessArgs {
    #[arg(long)]
    input: PathBuf,

    /// Optional dark frame subtracted before processing
    #[arg(long)]
    dark: Option<PathBuf>,

    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
pub(super) enum FormatArg {
    #[default]
    Json,
    Csv,
}

impl FormatArg {
    fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

#[derive(clap::Args)]
pub(super) struct AcquireArgs {
    /// Device configuration (JSON)
    #[arg(long)]
    device: PathBuf,

    /// Directory receiving the acquired spectra
    #[arg(long)]
    output_dir: PathBuf,

    /// Number of frames to read
    #[arg(long, default_value_t = 1)]
    frames: usize,

    /// Integration time in the device's unit
    #[arg(long)]
    integration_time: Option<u32>,

    /// Take a dark scan before reading
    #[arg(long, conflicts_with = "dark")]
    dark_scan: bool,

    /// Use a stored dark frame instead of taking one
    #[arg(long)]
    dark: Option<PathBuf>,

    /// Average all frames into a single spectrum
    #[arg(long)]
    average: bool,

    /// Run baseline removal and peak detection on every spectrum
    #[arg(long)]
    process: bool,

    /// Base name of the written spectra
    #[arg(long, default_value = "spectrum")]
    name: String,

    #[arg(long, value_enum, default_value_t)]
    format: FormatArg,
}

pub(super) fn run_dark_correct_command(
    args: DarkCorrectArgs,
    config: Option<&Path>,
) -> Result<i32, CliError> {
    let config = load_config(config)?;
    let mut ids = SpectrumIdSequence::default();
    let spectrum = read_spectrum(&args.input, &mut ids)?;
    let dark = compute(load_dark_frame(&args.dark))?;
    let corrected = compute(correct_dark(spectrum.intensities(), &dark, &config.dark))?;
    let name = format!("{}_darkCorrected", spectrum.name());
    let corrected = compute(spectrum.derive(ids.next_id(), name, corrected))?;
    write_spectrum(&args.output, &corrected)?;
    Ok(0)
}

pub(super) fn run_derivative_command(args: DerivativeArgs) -> Result<i32, CliError> {
    let config = match args.method {
        DerivativeMethodArg::SavitzkyGolay => {
            DerivativeConfig::savitzky_golay(args.order, args.half_window, args.poly_degree)
        }
        DerivativeMethodArg::PointDiff => DerivativeConfig::point_diff(args.order),
    };
    compute(config.validate())?;

    let mut ids = SpectrumIdSequence::default();
    let spectrum = read_spectrum(&args.input, &mut ids)?;
    let derived = compute(derivative_spectrum(&spectrum, &config, &mut ids))?;
    write_spectrum(&args.output, &derived)?;
    Ok(0)
}

pub(super) fn run_smooth_command(args: SmoothArgs) -> Result<i32, CliError> {
    let smoothing = match args.kind {
        SmoothingArg::SavitzkyGolay => Smoothing::SavitzkyGolay {
            half_window: args.half_window,
            poly_degree: args.poly_degree,
        },
        SmoothingArg::BoxCar => Smoothing::BoxCar {
            half_window: args.half_window,
        },
        SmoothingArg::Fft => Smoothing::Fft {
            degree: args.fft_degree,
        },
    };
    let mut ids = SpectrumIdSequence::default();
    let spectrum = read_spectrum(&args.input, &mut ids)?;
    let smoothed = compute(smooth_spectrum(&spectrum, smoothing, &mut ids))?;
    write_spectrum(&args.output, &smoothed)?;
    Ok(0)
}

pub(super) fn run_baseline_command(
    args: BaselineArgs,
    config: Option<&Path>,
) -> Result<i32, CliError> {
    let mut baseline = load_config(config)?.baseline;
    if let Some(lambda) = args.lambda {
        baseline.lambda = lambda;
    }
    if let Some(itermax) = args.itermax {
        baseline.itermax = itermax;
    }
    if let Some(tolerance) = args.tolerance {
        baseline.tolerance = tolerance;
    }

    let mut ids = SpectrumIdSequence::default();
    let spectrum = read_spectrum(&args.input, &mut ids)?;
    let removal = compute(remove_baseline(&spectrum, &baseline, &mut ids))?;
    info!(
        iterations = removal.iterations,
        converged = removal.converged,
        "baseline estimated"
    );
    write_spectrum(&args.output, &removal.spectrum)?;

    if let Some(path) = args.baseline_output.as_deref() {
        let name = format!("{}_baseline", spectrum.name());
        let curve = compute(spectrum.derive(ids.next_id(), name, removal.baseline))?;
        write_spectrum(path, &curve)?;
    }
    Ok(0)
}

pub(super) fn run_peaks_command(args: PeaksArgs, config: Option<&Path>) -> Result<i32, CliError> {
    let mut peaks_config = load_config(config)?.peaks;
    if let Some(min_height) = args.min_height {
        peaks_config.min_peak_height = min_height;
    }

    let mut ids = SpectrumIdSequence::default();
    let mut spectrum = read_spectrum(&args.input, &mut ids)?;
    let detected = compute(assign_peaks(&mut spectrum, &peaks_config))?;
    print!("{}", render_peak_table(spectrum.name(), &detected));
    if let Some(path) = args.output.as_deref() {
        write_spectrum(path, &spectrum)?;
    }
    Ok(0)
}

pub(super) fn run_process_command(
    args: ProcessArgs,
    config: Option<&Path>,
) -> Result<i32, CliError> {
    let config = load_config(config)?;
    let mut ids = SpectrumIdSequence::default();
    let mut spectrum = read_spectrum(&args.input, &mut ids)?;
    if let Some(path) = args.dark.as_deref() {
        let dark = compute(load_dark_frame(path))?;
        let corrected = compute(correct_dark(spectrum.intensities(), &dark, &config.dark))?;
        spectrum = compute(spectrum.derive(ids.next_id(), spectrum.name(), corrected))?;
    }

    let report = compute(process_spectrum(spectrum, &config, &mut ids))?;
    if let Some(baseline) = report.baseline {
        info!(
            iterations = baseline.iterations,
            converged = baseline.converged,
            "baseline removed"
        );
    }
    print!("{}", render_peak_table(report.spectrum.name(), &report.peaks));
    if let Some(path) = args.output.as_deref() {
        write_spectrum(path, &report.spectrum)?;
    }
    Ok(0)
}

pub(super) fn run_acquire_command(
    args: AcquireArgs,
    config: Option<&Path>,
) -> Result<i32, CliError> {
    let processing = load_config(config)?;
    let device = compute(load_device_config(&args.device))?;
    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "failed to create output directory '{}'",
            args.output_dir.display()
        )
    })?;

    let mut session = compute(AcquisitionSession::open(device))?;
    if let Some(time) = args.integration_time {
        compute(session.set_integration_time(time))?;
    }
    if args.dark_scan {
        compute(session.take_dark_scan())?;
    } else if let Some(path) = args.dark.as_deref() {
        session.set_dark_frame(compute(load_dark_frame(path))?);
    }

    let mut ids = SpectrumIdSequence::default();
    let spectra: Vec<Spectrum> = match (args.average, args.process) {
        (true, false) => vec![compute(session.read_averaged(
            args.frames,
            &processing.dark,
            &args.name,
            &mut ids,
        ))?],
        (true, true) => {
            let averaged = compute(session.read_averaged(
                args.frames,
                &processing.dark,
                &args.name,
                &mut ids,
            ))?;
            let report = compute(process_spectrum(averaged, &processing, &mut ids))?;
            print!("{}", render_peak_table(report.spectrum.name(), &report.peaks));
            vec![report.spectrum]
        }
        (false, false) => compute(session.read_spectra(
            args.frames,
            &processing.dark,
            &args.name,
            &mut ids,
        ))?,
        (false, true) => {
            let frames = compute(session.read_raw(args.frames))?;
            let reports = compute(process_frames(
                &frames,
                session.wavelengths(),
                session.dark_frame(),
                &processing,
                &args.name,
                &mut ids,
            ))?;
            reports
                .into_iter()
                .map(|report| {
                    print!("{}", render_peak_table(report.spectrum.name(), &report.peaks));
                    report.spectrum
                })
                .collect()
        }
    };
    session.close();

    for spectrum in &spectra {
        let path = spectrum_path(&args.output_dir, spectrum, args.format.extension());
        write_spectrum(&path, spectrum)?;
    }
    Ok(0)
}
