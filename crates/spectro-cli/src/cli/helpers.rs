use super::CliError;
use spectro_core::common::{ProcessingConfig, load_processing_config};
use spectro_core::domain::{DetectedPeak, SpectroError, Spectrum, SpectrumIdSequence};
use spectro_core::modules::{load_spectrum, save_spectrum};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub(super) fn compute<T, E>(result: Result<T, E>) -> Result<T, CliError>
where
    E: Into<SpectroError>,
{
    result.map_err(|error| CliError::Compute(error.into()))
}

pub(super) fn load_config(path: Option<&Path>) -> Result<ProcessingConfig, CliError> {
    match path {
        Some(path) => compute(load_processing_config(path)),
        None => Ok(ProcessingConfig::default()),
    }
}

pub(super) fn read_spectrum(
    path: &Path,
    ids: &mut SpectrumIdSequence,
) -> Result<Spectrum, CliError> {
    compute(load_spectrum(path, ids))
}

pub(super) fn write_spectrum(path: &Path, spectrum: &Spectrum) -> Result<(), CliError> {
    compute(save_spectrum(path, spectrum))?;
    println!("wrote {}", path.display());
    Ok(())
}

/// `<dir>/<spectrum name>.<extension>`
pub(super) fn spectrum_path(dir: &Path, spectrum: &Spectrum, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", spectrum.name(), extension))
}

pub(super) fn render_peak_table(name: &str, peaks: &[DetectedPeak]) -> String {
    let mut table = format!("# {name}: {} peak(s)\n", peaks.len());
    table.push_str("index\twavelength\tintensity\tfwhm\tbegin\tend\n");
    for found in peaks {
        let _ = writeln!(
            table,
            "{}\t{:.3}\t{:.1}\t{:.3}\t{}\t{}",
            found.peak.peak_index(),
            found.wavelength,
            found.intensity,
            found.fwhm,
            found.peak.begin_index(),
            found.peak.end_index()
        );
    }
    table
}

#[cfg(test)]
mod tests {
    use super::render_peak_table;
    use spectro_core::domain::{DetectedPeak, Peak};

    #[test]
    fn peak_table_has_one_row_per_peak() {
        let peaks = [DetectedPeak {
            peak: Peak::new(12, 8, 15).expect("peak"),
            wavelength: 546.0712,
            intensity: 30001.3,
            fwhm: 3.53,
            pseudo_height: 29000.0,
        }];
        let table = render_peak_table("lamp", &peaks);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "# lamp: 1 peak(s)");
        assert_eq!(lines[2], "12\t546.071\t30001.3\t3.530\t8\t15");
    }
}
