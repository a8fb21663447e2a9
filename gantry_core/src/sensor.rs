//! Thermocouple sampling with variance-based outlier rejection.
//!
//! The sampler runs on every 10 ms tick and accumulates N samples into one
//! filtered reading. The heater runs on 100 ms ticks, so there can be at
//! most 10 samples in a period (the ticks are synchronized, so you actually
//! get 10, not just 9). The heater initiates each period by calling
//! `start_reading()`.
//!
//! Failure modes travel through the normal numeric path as sentinel
//! temperatures: a reading over the disconnect threshold means the
//! thermocouple is unplugged, a reading below the no-power threshold means
//! the amplifier is dark, and a sampler that cannot get inside the variance
//! window reports a value hot enough to force the heater off.

use crate::config::SensorCfg;
use crate::error::BuildError;
use crate::integrity::{check, MAGIC};
use gantry_traits::{Adc, Fault};

/// Reading reported while no trustworthy data is available. Hot enough that
/// any downstream consumer treats it as an immediate overheat.
pub const HOT_SENTINEL_C: f64 = 5_505.0;

/// Returned by the sampling hot path when the variance retries are
/// exhausted or the ADC is unreadable. Strictly hotter than the no-data
/// sentinel so the completion check trips on it.
const FAILED_SAMPLE_C: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    Off,
    NoData,
    Reading,
    HasData,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCode {
    Idle,
    IsReading,
    ReadingComplete,
    FailedBadReadings,
    FailedDisconnected,
    FailedNoPower,
}

/// Affine raw-to-temperature calibration: `T = raw * slope + offset`.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub slope: f64,
    pub offset: f64,
}

impl Calibration {
    pub fn to_celsius(&self, raw: u16) -> f64 {
        f64::from(raw) * self.slope + self.offset
    }
}

#[derive(Debug)]
pub struct Sensor<A: Adc> {
    magic_start: u16,
    adc: A,
    channel: u8,
    state: SensorState,
    code: SensorCode,
    samples_per_reading: u8,
    samples: u8,
    retries: u8,
    temperature: f64,
    previous_temp: f64,
    accumulator: f64,
    variance: f64,
    disconnect_temperature: f64,
    no_power_temperature: f64,
    calibration: Calibration,
    magic_end: u16,
}

impl<A: Adc> Sensor<A> {
    pub fn new(cfg: &SensorCfg, adc: A) -> Result<Self, BuildError> {
        cfg.validate()?;
        Ok(Self {
            magic_start: MAGIC,
            adc,
            channel: cfg.channel,
            state: SensorState::NoData,
            code: SensorCode::Idle,
            samples_per_reading: cfg.samples_per_reading,
            samples: 0,
            retries: cfg.retries,
            temperature: 0.0,
            previous_temp: 0.0,
            accumulator: 0.0,
            variance: cfg.variance_c,
            disconnect_temperature: cfg.disconnect_c,
            no_power_temperature: cfg.no_power_c,
            calibration: Calibration {
                slope: cfg.slope,
                offset: cfg.offset,
            },
            magic_end: MAGIC,
        })
    }

    /// Revive the sampler after `off()` or a shutdown.
    pub fn on(&mut self) {
        if matches!(self.state, SensorState::Off | SensorState::Shutdown) {
            self.state = SensorState::NoData;
            self.code = SensorCode::Idle;
            self.samples = 0;
        }
    }

    /// Stop taking readings. Idempotent.
    pub fn off(&mut self) {
        self.state = SensorState::Off;
    }

    /// Begin a new sampling period. Idempotent; clears the completed-reading
    /// latch so the next tick starts accumulating.
    pub fn start_reading(&mut self) {
        self.samples = 0;
        if self.code == SensorCode::ReadingComplete {
            self.code = SensorCode::Idle;
        }
    }

    /// Latest filtered reading when one is available; otherwise the hot
    /// sentinel, which says "shut me off, now" through the numeric path.
    pub fn temperature(&self) -> f64 {
        if self.state == SensorState::HasData {
            self.temperature
        } else {
            HOT_SENTINEL_C
        }
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    pub fn code(&self) -> SensorCode {
        self.code
    }

    /// 10 ms tick body: take one sample, fold it into the accumulator, and
    /// classify the reading once the period is full.
    pub fn sample_tick(&mut self) {
        if matches!(self.state, SensorState::Off | SensorState::Shutdown) {
            return;
        }
        if self.code == SensorCode::ReadingComplete {
            return;
        }

        let mut new_period = false;
        if self.samples == 0 {
            self.accumulator = 0.0;
            self.code = SensorCode::IsReading;
            if self.state != SensorState::HasData {
                self.state = SensorState::Reading;
            }
            new_period = true;
        }

        let sample = self.sample(new_period);
        if sample > HOT_SENTINEL_C {
            self.code = SensorCode::FailedBadReadings;
            self.state = SensorState::Shutdown;
            tracing::warn!("sensor shut down: samples outside the variance window");
            return;
        }
        self.accumulator += sample;

        self.samples += 1;
        if self.samples < self.samples_per_reading {
            return;
        }

        self.temperature = self.accumulator / f64::from(self.samples);

        if self.temperature > self.disconnect_temperature {
            self.code = SensorCode::FailedDisconnected;
            self.state = SensorState::NoData;
            tracing::warn!(temp = self.temperature, "thermocouple reads disconnected");
        } else if self.temperature < self.no_power_temperature {
            self.code = SensorCode::FailedNoPower;
            self.state = SensorState::NoData;
            tracing::warn!(temp = self.temperature, "thermocouple amplifier unpowered");
        } else {
            self.code = SensorCode::ReadingComplete;
            self.state = SensorState::HasData;
        }
    }

    /// Draw one sample, rejecting values that jump more than the variance
    /// window from their predecessor. The first sample of a period is
    /// accepted unconditionally. Redraws up to `retries` times, then gives
    /// up with the failed-sample sentinel.
    fn sample(&mut self, new_period: bool) -> f64 {
        let mut sample = match self.draw() {
            Some(t) => t,
            None => return FAILED_SAMPLE_C,
        };
        if new_period {
            self.previous_temp = sample;
            return sample;
        }
        for _ in 0..self.retries {
            if (sample - self.previous_temp).abs() < self.variance {
                self.previous_temp = sample;
                return sample;
            }
            sample = match self.draw() {
                Some(t) => t,
                None => return FAILED_SAMPLE_C,
            };
        }
        FAILED_SAMPLE_C
    }

    fn draw(&mut self) -> Option<f64> {
        match self.adc.read(self.channel) {
            Ok(raw) => Some(self.calibration.to_celsius(raw)),
            Err(e) => {
                tracing::warn!(error = %e, "adc read failed");
                None
            }
        }
    }

    pub fn assert_integrity(&self) -> Result<(), Fault> {
        check(self.magic_start, self.magic_end, Fault::ThermalAssertion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::FixedAdc;

    fn unit_cal() -> SensorCfg {
        SensorCfg {
            slope: 1.0,
            offset: 0.0,
            ..SensorCfg::default()
        }
    }

    #[test]
    fn off_is_idempotent() {
        let mut s = Sensor::new(&unit_cal(), FixedAdc(100)).unwrap();
        s.off();
        s.off();
        assert_eq!(s.state(), SensorState::Off);
    }

    #[test]
    fn sentinel_corruption_is_detected() {
        let mut s = Sensor::new(&unit_cal(), FixedAdc(100)).unwrap();
        assert!(s.assert_integrity().is_ok());
        s.magic_start = 0;
        assert_eq!(s.assert_integrity(), Err(Fault::ThermalAssertion));
    }

    #[test]
    fn zero_samples_per_reading_is_rejected() {
        let cfg = SensorCfg {
            samples_per_reading: 0,
            ..unit_cal()
        };
        assert!(Sensor::new(&cfg, FixedAdc(0)).is_err());
    }
}
