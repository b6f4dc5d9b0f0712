use super::{AcquisitionError, Spectrometer, average_frames, open_device, split_frames};
use crate::common::{DarkCorrectionConfig, DeviceConfig};
use crate::domain::{DarkFrame, SpectroResult, Spectrum, SpectrumIdSequence};
use crate::modules::correct_dark;
use tracing::info;

/// A connected device together with its immutable configuration and the
/// dark frame taken during this session.
pub struct AcquisitionSession {
    device: Box<dyn Spectrometer>,
    config: DeviceConfig,
    dark: DarkFrame,
    wavelengths: Vec<f64>,
}

impl AcquisitionSession {
    /// Validates the configuration, builds the configured device family and
    /// connects it.
    pub fn open(config: DeviceConfig) -> SpectroResult<Self> {
        config.validate()?;
        let device = open_device(&config);
        Self::with_device(device, config)
    }

    pub fn with_device(
        mut device: Box<dyn Spectrometer>,
        config: DeviceConfig,
    ) -> SpectroResult<Self> {
        if !device.is_connected() {
            device.connect()?;
        }
        let wavelengths = config.calibration.wavelengths();
        info!(
            family = ?device.family(),
            model = %config.model,
            pixels = wavelengths.len(),
            "acquisition session opened"
        );
        Ok(Self {
            device,
            config,
            dark: DarkFrame::NotTaken,
            wavelengths,
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn dark_frame(&self) -> &DarkFrame {
        &self.dark
    }

    /// Calibrated wavelengths of the active window.
    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn integration_time(&self) -> u32 {
        self.device.integration_time()
    }

    pub fn set_integration_time(&mut self, time: u32) -> Result<(), AcquisitionError> {
        self.device.set_integration_time(time)?;
        info!(
            time,
            unit = self.config.integration_time_unit.suffix(),
            "integration time set"
        );
        Ok(())
    }

    /// Replaces the session dark frame with a fresh dark scan.
    pub fn take_dark_scan(&mut self) -> Result<&DarkFrame, AcquisitionError> {
        let raw = self.device.get_dark_scan()?;
        let mut frames = split_frames(
            &raw,
            1,
            self.config.pixel_count,
            &self.config.calibration,
        )?;
        self.dark = DarkFrame::Taken(frames.pop().unwrap_or_default());
        info!(pixels = self.wavelengths.len(), "dark scan taken");
        Ok(&self.dark)
    }

    /// Installs a dark frame obtained elsewhere, e.g. loaded from disk.
    pub fn set_dark_frame(&mut self, dark: DarkFrame) {
        self.dark = dark;
    }

    /// Raw active-window frames, before dark correction.
    pub fn read_raw(&mut self, frame_count: usize) -> Result<Vec<Vec<f64>>, AcquisitionError> {
        let raw = self.device.read_frame(frame_count)?;
        split_frames(
            &raw,
            frame_count,
            self.config.pixel_count,
            &self.config.calibration,
        )
    }

    /// Reads `frame_count` frames and returns one dark-corrected spectrum per
    /// frame, named `<name>_<n>`.
    pub fn read_spectra(
        &mut self,
        frame_count: usize,
        dark_config: &DarkCorrectionConfig,
        name: &str,
        ids: &mut SpectrumIdSequence,
    ) -> SpectroResult<Vec<Spectrum>> {
        let frames = self.read_raw(frame_count)?;
        let spectra = frames
            .iter()
            .enumerate()
            .map(|(index, frame)| -> SpectroResult<Spectrum> {
                let corrected = correct_dark(frame, &self.dark, dark_config)?;
                Ok(Spectrum::new(
                    ids.next_id(),
                    format!("{name}_{}", index + 1),
                    self.wavelengths.clone(),
                    corrected,
                )?)
            })
            .collect::<SpectroResult<Vec<_>>>()?;
        info!(
            frames = spectra.len(),
            dark = self.dark.is_taken(),
            "spectra acquired"
        );
        Ok(spectra)
    }

    /// Averages `frame_count` raw frames, then applies dark correction once.
    pub fn read_averaged(
        &mut self,
        frame_count: usize,
        dark_config: &DarkCorrectionConfig,
        name: &str,
        ids: &mut SpectrumIdSequence,
    ) -> SpectroResult<Spectrum> {
        let frames = self.read_raw(frame_count)?;
        let mean = average_frames(&frames)?;
        let corrected = correct_dark(&mean, &self.dark, dark_config)?;
        info!(frames = frame_count, "averaged spectrum acquired");
        Ok(Spectrum::new(
            ids.next_id(),
            name,
            self.wavelengths.clone(),
            corrected,
        )?)
    }

    pub fn close(mut self) {
        self.device.disconnect();
        info!(model = %self.config.model, "acquisition session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::AcquisitionSession;
    use crate::common::{
        DarkCorrectionConfig, DeviceConfig, DeviceFamily, SimulatedLine, SimulationConfig,
    };
    use crate::device::{Recording, ReplaySpectrometer};
    use crate::domain::{
        DarkFrame, SpectroErrorCategory, SpectrumIdSequence, WavelengthCalibration,
    };

    fn simulated() -> DeviceConfig {
        DeviceConfig {
            family: DeviceFamily::Simulated,
            model: "sim".to_string(),
            pixel_count: 40,
            calibration: WavelengthCalibration::new([600.0, 0.5, 0.0, 0.0], 5, 34),
            integration_time_min: 1,
            integration_time_unit: Default::default(),
            simulation: SimulationConfig {
                dark_level: 200.0,
                reference_integration_time: 100,
                lines: vec![SimulatedLine {
                    center: 610.0,
                    height: 4000.0,
                    sigma: 1.0,
                }],
            },
            recording: None,
            properties: Default::default(),
        }
    }

    #[test]
    fn spectra_cover_the_active_window_and_use_the_dark_frame() {
        let mut session = AcquisitionSession::open(simulated()).expect("open");
        session.set_integration_time(100).expect("time");
        assert_eq!(session.wavelengths().len(), 30);
        assert_eq!(session.wavelengths()[0], 602.5);

        let mut ids = SpectrumIdSequence::default();
        let raw = session
            .read_spectra(1, &DarkCorrectionConfig::default(), "frame", &mut ids)
            .expect("raw read");
        assert_eq!(raw[0].intensities()[0], 200.0);

        session.take_dark_scan().expect("dark");
        let spectra = session
            .read_spectra(2, &DarkCorrectionConfig::default(), "frame", &mut ids)
            .expect("corrected read");
        assert_eq!(spectra.len(), 2);
        assert_eq!(spectra[1].name(), "frame_2");
        assert_eq!(spectra[1].id(), 3);
        // pixel 20 sits on the line center at 610 nm
        assert_eq!(spectra[0].intensities()[15], 4000.0);
        assert_eq!(spectra[0].intensities()[0], 0.0);
    }

    #[test]
    fn averaged_read_yields_one_spectrum() {
        let config = DeviceConfig {
            family: DeviceFamily::Replay,
            pixel_count: 4,
            calibration: WavelengthCalibration::new([500.0, 1.0, 0.0, 0.0], 0, 3),
            ..simulated()
        };
        let recording = Recording {
            frames: vec![vec![10, 20, 30, 40], vec![30, 40, 50, 60]],
            dark: Some(vec![5, 5, 5, 5]),
        };
        let device = Box::new(ReplaySpectrometer::with_recording(config.clone(), recording));
        let mut session = AcquisitionSession::with_device(device, config).expect("session");
        session.take_dark_scan().expect("dark");
        assert_eq!(session.dark_frame(), &DarkFrame::Taken(vec![5.0; 4]));

        let mut ids = SpectrumIdSequence::starting_at(7);
        let spectrum = session
            .read_averaged(2, &DarkCorrectionConfig::default(), "avg", &mut ids)
            .expect("average");
        assert_eq!(spectrum.id(), 7);
        assert_eq!(spectrum.intensities(), &[15.0, 25.0, 35.0, 45.0]);
        session.close();
    }

    #[test]
    fn invalid_configuration_is_rejected_before_connecting() {
        let config = DeviceConfig {
            calibration: WavelengthCalibration::new([600.0, 0.5, 0.0, 0.0], 5, 40),
            ..simulated()
        };
        let error = AcquisitionSession::open(config).err().expect("window too wide");
        assert_eq!(error.category(), SpectroErrorCategory::ConfigurationError);
    }
}
