use std::thread;
use std::time::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::drivers::source::{LoadCellAmplifier, PressureAdc};
use crate::drivers::AcquisitionError;
/// HX711 at 80 SPS.
const LOAD_CELL_CONVERSION: Duration = Duration::from_micros(12_500);
/// Bench stand-in for the load-cell amplifier: a slow sine around a fixed
/// zero offset plus noise, paced like the real converter.
pub struct SimulatedLoadCell {
    rng: StdRng,
    phase: f64,
    zero_offset: f64,
    amplitude: f64,
}
impl SimulatedLoadCell {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            phase: 0.0,
            zero_offset: 84_000.0,
            amplitude: 40_000.0,
        }
    }
}
impl LoadCellAmplifier for SimulatedLoadCell {
    fn reset(&mut self) -> Result<(), AcquisitionError> {
        self.phase = 0.0;
        Ok(())
    }
    fn read_raw(&mut self) -> Result<i32, AcquisitionError> {
        thread::sleep(LOAD_CELL_CONVERSION);
        self.phase += 0.002;
        let noise: f64 = self.rng.gen_range(-150.0..150.0);
        // compression only
        let load = self.amplitude * self.phase.sin().max(0.0);
        Ok((self.zero_offset + load + noise) as i32)
    }
}
/// Bench stand-in for the pressure ADC.
pub struct SimulatedPressureAdc {
    rng: StdRng,
    phase: f64,
    conversion: Duration,
}
impl SimulatedPressureAdc {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            phase: 0.0,
            conversion: Duration::from_secs_f64(1.0 / 860.0),
        }
    }
}
impl PressureAdc for SimulatedPressureAdc {
    fn configure(&mut self, gain: u8, data_rate: u16) -> Result<(), AcquisitionError> {
        if data_rate == 0 {
            return Err(AcquisitionError::init("pressure adc", "data rate must be non-zero"));
        }
        log::debug!("simulated adc: gain {gain}, {data_rate} SPS");
        self.conversion = Duration::from_secs_f64(1.0 / f64::from(data_rate));
        Ok(())
    }
    fn read_raw(&mut self) -> Result<i16, AcquisitionError> {
        thread::sleep(self.conversion);
        self.phase += 0.0002;
        let noise: f64 = self.rng.gen_range(-20.0..20.0);
        let counts = 12_000.0 + 8_000.0 * (self.phase * 0.7).sin() + noise;
        Ok(counts.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::source::{LoadCellSource, PressureSource, SensorSource};
    #[test]
    fn simulated_channels_produce_plausible_values() {
        let mut cell = LoadCellSource::init(SimulatedLoadCell::new(), 1.0).unwrap();
        let value = cell.read().unwrap();
        assert!(value.abs() < 5_000.0, "tared load cell near zero, got {value}");
        let mut pressure = PressureSource::init(SimulatedPressureAdc::new()).unwrap();
        let raw = pressure.read().unwrap();
        assert!((3_000.0..=21_000.0).contains(&raw));
    }
}
