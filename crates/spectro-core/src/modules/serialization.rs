use crate::domain::{DarkFrame, Peak, SpectroError, Spectrum, SpectrumError, SpectrumIdSequence};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid spectrum JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid CSV at line {line}: {message}")]
    CsvField { line: usize, message: String },
    #[error("unsupported spectrum file extension for '{}' (expected .csv or .json)", path.display())]
    UnsupportedExtension { path: PathBuf },
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
}

impl From<SerializationError> for SpectroError {
    fn from(error: SerializationError) -> Self {
        match error {
            SerializationError::Read { .. } | SerializationError::Write { .. } => {
                SpectroError::io_system("IO.SPECTRUM", error.to_string())
            }
            _ => SpectroError::validation("DATA.FORMAT", error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumFormat {
    Csv,
    Json,
}

impl SpectrumFormat {
    pub fn from_path(path: &Path) -> Result<Self, SerializationError> {
        match path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            _ => Err(SerializationError::UnsupportedExtension {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// On-disk JSON layout of a spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SpectrumRecord {
    #[serde(rename = "Id", default)]
    id: u64,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Enabled", default = "enabled_by_default")]
    enabled: bool,
    #[serde(rename = "Wavelengths")]
    wavelengths: Vec<f64>,
    #[serde(rename = "DataValues")]
    data_values: Vec<f64>,
    #[serde(rename = "Peaks", default)]
    peaks: Vec<Peak>,
}

fn enabled_by_default() -> bool {
    true
}

pub fn spectrum_to_json(spectrum: &Spectrum) -> Result<String, SerializationError> {
    let record = SpectrumRecord {
        id: spectrum.id(),
        name: spectrum.name().to_string(),
        enabled: spectrum.enabled(),
        wavelengths: spectrum.wavelengths().to_vec(),
        data_values: spectrum.intensities().to_vec(),
        peaks: spectrum.peaks().to_vec(),
    };
    Ok(serde_json::to_string_pretty(&record)?)
}

/// Parses the JSON layout. The stored `Id` is ignored; the spectrum gets the
/// next id from `ids`.
pub fn spectrum_from_json(
    source: &str,
    ids: &mut SpectrumIdSequence,
) -> Result<Spectrum, SerializationError> {
    let record: SpectrumRecord = serde_json::from_str(source)?;
    let mut peaks = Vec::with_capacity(record.peaks.len());
    for peak in record.peaks {
        peaks.push(Peak::new(
            peak.peak_index(),
            peak.begin_index(),
            peak.end_index(),
        )?);
    }
    let mut spectrum = Spectrum::new(
        ids.next_id(),
        record.name,
        record.wavelengths,
        record.data_values,
    )?;
    spectrum.set_enabled(record.enabled);
    spectrum.set_peaks(peaks)?;
    Ok(spectrum)
}

pub fn spectrum_to_csv(spectrum: &Spectrum) -> String {
    spectrum
        .wavelengths()
        .iter()
        .zip(spectrum.intensities())
        .map(|(wavelength, intensity)| format!("{wavelength}, {intensity}\n"))
        .collect()
}

pub fn spectrum_from_csv(
    source: &str,
    name: impl Into<String>,
    ids: &mut SpectrumIdSequence,
) -> Result<Spectrum, SerializationError> {
    let (wavelengths, intensities) = numeric_rows::<2>(source, "'<wavelength>, <intensity>'")?
        .into_iter()
        .map(|[wavelength, intensity]| (wavelength, intensity))
        .unzip();
    Ok(Spectrum::new(ids.next_id(), name, wavelengths, intensities)?)
}

/// Headerless rows of exactly `N` numbers. Blank lines are skipped.
fn numeric_rows<const N: usize>(
    source: &str,
    layout: &str,
) -> Result<Vec<[f64; N]>, SerializationError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() == 1 && record[0].is_empty() {
            continue;
        }
        let line = record
            .position()
            .map_or(0, |position| position.line() as usize);
        if record.len() != N {
            return Err(SerializationError::CsvField {
                line,
                message: format!("expected {layout}, got {} field(s)", record.len()),
            });
        }
        let mut row = [0.0; N];
        for (slot, field) in row.iter_mut().zip(record.iter()) {
            *slot = parse_field(field, line)?;
        }
        rows.push(row);
    }
    Ok(rows)
}

fn parse_field(field: &str, line: usize) -> Result<f64, SerializationError> {
    field
        .parse::<f64>()
        .map_err(|error| SerializationError::CsvField {
            line,
            message: format!("'{field}': {error}"),
        })
}

pub fn dark_frame_to_csv(values: &[f64]) -> String {
    values.iter().map(|value| format!("{value}\n")).collect()
}

pub fn dark_frame_from_csv(source: &str) -> Result<DarkFrame, SerializationError> {
    let values = numeric_rows::<1>(source, "one value per line")?
        .into_iter()
        .map(|[value]| value)
        .collect();
    Ok(DarkFrame::Taken(values))
}

pub fn save_spectrum(path: &Path, spectrum: &Spectrum) -> Result<(), SerializationError> {
    let content = match SpectrumFormat::from_path(path)? {
        SpectrumFormat::Csv => spectrum_to_csv(spectrum),
        SpectrumFormat::Json => spectrum_to_json(spectrum)?,
    };
    write_text_artifact(path, &content).map_err(|source| SerializationError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads a `.csv` or `.json` spectrum. CSV spectra are named after the file stem.
pub fn load_spectrum(
    path: &Path,
    ids: &mut SpectrumIdSequence,
) -> Result<Spectrum, SerializationError> {
    let format = SpectrumFormat::from_path(path)?;
    let source = read_text(path)?;
    match format {
        SpectrumFormat::Csv => {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            spectrum_from_csv(&source, name, ids)
        }
        SpectrumFormat::Json => spectrum_from_json(&source, ids),
    }
}

pub fn save_dark_frame(path: &Path, values: &[f64]) -> Result<(), SerializationError> {
    write_text_artifact(path, &dark_frame_to_csv(values)).map_err(|source| {
        SerializationError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

pub fn load_dark_frame(path: &Path) -> Result<DarkFrame, SerializationError> {
    dark_frame_from_csv(&read_text(path)?)
}

fn read_text(path: &Path) -> Result<String, SerializationError> {
    fs::read_to_string(path).map_err(|source| SerializationError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

#[cfg(test)]
mod tests {
    use super::{
        SerializationError, SpectrumFormat, dark_frame_from_csv, load_dark_frame, load_spectrum,
        save_dark_frame, save_spectrum, spectrum_from_csv, spectrum_from_json, spectrum_to_csv,
        spectrum_to_json,
    };
    use crate::domain::{DarkFrame, Peak, Spectrum, SpectrumIdSequence};
    use std::path::Path;
    use tempfile::TempDir;

    fn sample() -> Spectrum {
        let mut spectrum = Spectrum::new(
            7,
            "lamp",
            vec![400.123456789, 400.5, 401.0000000001, 402.25],
            vec![0.1, 1.0e-7, 65535.0, -12.3456789012345],
        )
        .expect("spectrum");
        spectrum.set_enabled(false);
        spectrum
            .set_peaks(vec![Peak::new(2, 1, 3).expect("peak")])
            .expect("peaks");
        spectrum
    }

    #[test]
    fn json_round_trip_is_bit_exact_and_assigns_new_id() {
        let original = sample();
        let json = spectrum_to_json(&original).expect("serialize");
        assert!(json.contains("\"Wavelengths\""));
        assert!(json.contains("\"DataValues\""));
        assert!(json.contains("\"PeakBeginIndex\""));

        let mut ids = SpectrumIdSequence::starting_at(100);
        let restored = spectrum_from_json(&json, &mut ids).expect("deserialize");
        assert_eq!(restored.id(), 100);
        assert_eq!(restored.name(), "lamp");
        assert!(!restored.enabled());
        assert_eq!(restored.peaks(), original.peaks());
        for (a, b) in restored.wavelengths().iter().zip(original.wavelengths()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        for (a, b) in restored.intensities().iter().zip(original.intensities()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn json_without_peaks_or_enabled_uses_defaults() {
        let json = r#"{"Id": 3, "Name": "x", "Wavelengths": [1.0, 2.0], "DataValues": [5, 6]}"#;
        let mut ids = SpectrumIdSequence::default();
        let spectrum = spectrum_from_json(json, &mut ids).expect("deserialize");
        assert!(spectrum.enabled());
        assert!(spectrum.peaks().is_empty());
        assert_eq!(spectrum.intensities(), &[5.0, 6.0]);
    }

    #[test]
    fn json_with_inconsistent_axes_is_rejected() {
        let json = r#"{"Name": "x", "Wavelengths": [2.0, 1.0], "DataValues": [5, 6]}"#;
        let error = spectrum_from_json(json, &mut SpectrumIdSequence::default())
            .expect_err("decreasing axis");
        assert!(matches!(error, SerializationError::Spectrum(_)));
    }

    #[test]
    fn csv_round_trip_keeps_values() {
        let original = sample();
        let csv = spectrum_to_csv(&original);
        assert!(csv.starts_with("400.123456789, 0.1\n"));
        let mut ids = SpectrumIdSequence::default();
        let restored = spectrum_from_csv(&csv, "lamp", &mut ids).expect("parse");
        assert_eq!(restored.wavelengths(), original.wavelengths());
        assert_eq!(restored.intensities(), original.intensities());
        assert!(restored.enabled());
    }

    #[test]
    fn csv_errors_report_line_numbers() {
        let mut ids = SpectrumIdSequence::default();
        let error =
            spectrum_from_csv("1.0, 2.0\n\n3.0; 4.0\n", "x", &mut ids).expect_err("bad separator");
        assert!(matches!(error, SerializationError::CsvField { line: 3, .. }));
        let error = spectrum_from_csv("1.0, abc\n", "x", &mut ids).expect_err("bad number");
        assert!(matches!(error, SerializationError::CsvField { line: 1, .. }));
        let error =
            spectrum_from_csv("1.0, 2.0, 3.0\n", "x", &mut ids).expect_err("extra column");
        assert!(matches!(error, SerializationError::CsvField { line: 1, .. }));
    }

    #[test]
    fn csv_reader_tolerates_padding_and_crlf() {
        let mut ids = SpectrumIdSequence::default();
        let spectrum = spectrum_from_csv("  500.5 ,10\r\n\r\n501.5,\t12.25\r\n", "x", &mut ids)
            .expect("padded rows");
        assert_eq!(spectrum.wavelengths(), &[500.5, 501.5]);
        assert_eq!(spectrum.intensities(), &[10.0, 12.25]);

        let dark = dark_frame_from_csv("500\n   \n501.5\n").expect("blank padded line");
        assert_eq!(dark, DarkFrame::Taken(vec![500.0, 501.5]));
    }

    #[test]
    fn files_dispatch_on_extension() {
        let temp = TempDir::new().expect("tempdir should be created");
        let original = sample();
        let mut ids = SpectrumIdSequence::default();

        let csv_path = temp.path().join("lamp_scan.csv");
        save_spectrum(&csv_path, &original).expect("csv write");
        let from_csv = load_spectrum(&csv_path, &mut ids).expect("csv read");
        assert_eq!(from_csv.name(), "lamp_scan");
        assert_eq!(from_csv.id(), 1);

        let json_path = temp.path().join("lamp.json");
        save_spectrum(&json_path, &original).expect("json write");
        let from_json = load_spectrum(&json_path, &mut ids).expect("json read");
        assert_eq!(from_json.id(), 2);
        assert_eq!(from_json.intensities(), original.intensities());

        let error = save_spectrum(&temp.path().join("lamp.txt"), &original)
            .expect_err("unknown extension");
        assert!(matches!(error, SerializationError::UnsupportedExtension { .. }));
        assert_eq!(
            SpectrumFormat::from_path(Path::new("A.JSON")).expect("upper case"),
            SpectrumFormat::Json
        );
    }

    #[test]
    fn dark_frame_files_hold_one_value_per_line() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("dark.csv");
        save_dark_frame(&path, &[500.0, 501.5, 499.0]).expect("write");
        assert_eq!(
            std::fs::read_to_string(&path).expect("read back"),
            "500\n501.5\n499\n"
        );
        assert_eq!(
            load_dark_frame(&path).expect("load"),
            DarkFrame::Taken(vec![500.0, 501.5, 499.0])
        );
        assert!(dark_frame_from_csv("1\nx\n").is_err());
    }
}
