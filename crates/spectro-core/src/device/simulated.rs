use super::{AcquisitionError, Spectrometer, check_integration_time};
use crate::common::{DeviceConfig, DeviceFamily, SENSOR_SATURATION, SimulationConfig};
use tracing::debug;

/// Deterministic synthetic source: Gaussian emission lines over a constant
/// dark level, with line heights proportional to integration time.
#[derive(Debug, Clone)]
pub struct SimulatedSpectrometer {
    config: DeviceConfig,
    connected: bool,
    integration_time: u32,
}

impl SimulatedSpectrometer {
    pub fn new(config: DeviceConfig) -> Self {
        let integration_time = config.integration_time_min;
        Self {
            config,
            connected: false,
            integration_time,
        }
    }

    fn ensure_connected(&self) -> Result<(), AcquisitionError> {
        if self.connected {
            Ok(())
        } else {
            Err(AcquisitionError::NotConnected {
                model: self.config.model.clone(),
            })
        }
    }

    fn light_frame(&self) -> Vec<u16> {
        let simulation = &self.config.simulation;
        let scale = f64::from(self.integration_time)
            / f64::from(simulation.reference_integration_time.max(1));
        (0..self.config.pixel_count)
            .map(|pixel| {
                let wavelength = self.config.calibration.wavelength_at(pixel);
                to_counts(simulation.dark_level + scale * emission(simulation, wavelength))
            })
            .collect()
    }
}

fn emission(simulation: &SimulationConfig, wavelength: f64) -> f64 {
    simulation
        .lines
        .iter()
        .filter(|line| line.sigma > 0.0)
        .map(|line| {
            let offset = wavelength - line.center;
            line.height * (-(offset * offset) / (2.0 * line.sigma * line.sigma)).exp()
        })
        .sum()
}

fn to_counts(value: f64) -> u16 {
    value.round().clamp(0.0, SENSOR_SATURATION) as u16
}

impl Spectrometer for SimulatedSpectrometer {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::Simulated
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<(), AcquisitionError> {
        self.connected = true;
        debug!(model = %self.config.model, "simulated device connected");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn read_frame(&mut self, count: usize) -> Result<Vec<u16>, AcquisitionError> {
        self.ensure_connected()?;
        if count == 0 {
            return Err(AcquisitionError::ZeroFrameCount);
        }
        let frame = self.light_frame();
        Ok(frame.repeat(count))
    }

    fn set_integration_time(&mut self, time: u32) -> Result<(), AcquisitionError> {
        check_integration_time(
            time,
            self.config.integration_time_min,
            self.config.integration_time_unit,
        )?;
        self.integration_time = time;
        Ok(())
    }

    fn integration_time(&self) -> u32 {
        self.integration_time
    }

    fn get_dark_scan(&mut self) -> Result<Vec<u16>, AcquisitionError> {
        self.ensure_connected()?;
        Ok(vec![
            to_counts(self.config.simulation.dark_level);
            self.config.pixel_count
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::SimulatedSpectrometer;
    use crate::common::{DeviceConfig, DeviceFamily, SimulatedLine, SimulationConfig};
    use crate::device::{AcquisitionError, Spectrometer};
    use crate::domain::WavelengthCalibration;

    fn config() -> DeviceConfig {
        DeviceConfig {
            family: DeviceFamily::Simulated,
            model: "sim".to_string(),
            pixel_count: 64,
            calibration: WavelengthCalibration::new([500.0, 1.0, 0.0, 0.0], 2, 61),
            integration_time_min: 10,
            integration_time_unit: Default::default(),
            simulation: SimulationConfig {
                dark_level: 100.0,
                reference_integration_time: 100,
                lines: vec![SimulatedLine {
                    center: 530.0,
                    height: 1000.0,
                    sigma: 2.0,
                }],
            },
            recording: None,
            properties: Default::default(),
        }
    }

    #[test]
    fn reads_require_a_connection() {
        let mut device = SimulatedSpectrometer::new(config());
        assert!(matches!(
            device.read_frame(1),
            Err(AcquisitionError::NotConnected { .. })
        ));
        device.connect().expect("connect");
        assert!(device.is_connected());
        device.disconnect();
        assert!(matches!(
            device.get_dark_scan(),
            Err(AcquisitionError::NotConnected { .. })
        ));
    }

    #[test]
    fn line_height_scales_with_integration_time() {
        let mut device = SimulatedSpectrometer::new(config());
        device.connect().expect("connect");
        device.set_integration_time(100).expect("time");
        let frame = device.read_frame(2).expect("read");
        assert_eq!(frame.len(), 128);
        assert_eq!(frame[30], 1100);
        assert_eq!(frame[0], 100);
        assert_eq!(&frame[..64], &frame[64..]);

        device.set_integration_time(50).expect("time");
        assert_eq!(device.read_frame(1).expect("read")[30], 600);
        assert_eq!(device.get_dark_scan().expect("dark"), vec![100; 64]);
    }

    #[test]
    fn output_saturates_and_minimum_time_is_enforced() {
        let mut device = SimulatedSpectrometer::new(config());
        device.connect().expect("connect");
        assert!(matches!(
            device.set_integration_time(5),
            Err(AcquisitionError::IntegrationTimeTooShort {
                requested: 5,
                minimum: 10,
                ..
            })
        ));
        device.set_integration_time(100_000).expect("time");
        assert_eq!(device.read_frame(1).expect("read")[30], u16::MAX);
    }
}
