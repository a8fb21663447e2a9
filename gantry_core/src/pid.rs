//! PID regulator for the heater duty cycle.
//!
//! A pure calculation: no I/O, no clock. The caller supplies the sampling
//! cadence through `PidCfg::dt_s` and invokes `calculate` once per heater
//! tick. Output is clamped to the configured saturation window before it is
//! returned or stored.

use crate::config::PidCfg;
use crate::error::BuildError;
use crate::integrity::{check, MAGIC};
use gantry_traits::Fault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidState {
    Off,
    On,
}

#[derive(Debug)]
pub struct Pid {
    magic_start: u16,
    state: PidState,
    output: f64,
    output_max: f64,
    output_min: f64,
    error: f64,
    prev_error: f64,
    integral: f64,
    derivative: f64,
    dt: f64,
    kp: f64,
    ki: f64,
    kd: f64,
    epsilon: f64,
    windup_guard: bool,
    magic_end: u16,
}

impl Pid {
    pub fn new(cfg: &PidCfg) -> Result<Self, BuildError> {
        cfg.validate()?;
        Ok(Self {
            magic_start: MAGIC,
            state: PidState::On,
            output: 0.0,
            output_max: cfg.output_max,
            output_min: cfg.output_min,
            error: 0.0,
            prev_error: 0.0,
            integral: 0.0,
            derivative: 0.0,
            dt: cfg.dt_s,
            kp: cfg.kp,
            ki: cfg.ki,
            kd: cfg.kd,
            epsilon: cfg.epsilon,
            windup_guard: cfg.windup_guard,
            magic_end: MAGIC,
        })
    }

    /// Cold-start reset; used on every heater-on transition.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }

    pub fn on(&mut self) {
        self.state = PidState::On;
    }

    pub fn off(&mut self) {
        self.state = PidState::Off;
    }

    pub fn state(&self) -> PidState {
        self.state
    }

    /// Last computed (clamped) output.
    pub fn output(&self) -> f64 {
        self.output
    }

    /// One regulation step: `setpoint - measured` through P, I and D terms,
    /// saturated to [output_min, output_max].
    ///
    /// Integration is frozen while |error| <= epsilon. With `windup_guard`
    /// it is also frozen while the output sits on the saturation rail the
    /// error is pushing toward.
    pub fn calculate(&mut self, setpoint: f64, measured: f64) -> f64 {
        if self.state == PidState::Off {
            return 0.0;
        }

        self.error = setpoint - measured;

        let mut integrate = self.error.abs() > self.epsilon;
        if integrate && self.windup_guard {
            let pinned_high =
                (self.output - self.output_max).abs() < self.epsilon && self.error > 0.0;
            let pinned_low =
                (self.output - self.output_min).abs() < self.epsilon && self.error < 0.0;
            if pinned_high || pinned_low {
                integrate = false;
            }
        }
        if integrate {
            self.integral += self.error * self.dt;
        }

        self.derivative = (self.error - self.prev_error) / self.dt;
        self.output = self.kp * self.error + self.ki * self.integral + self.kd * self.derivative;

        if self.output > self.output_max {
            self.output = self.output_max;
        } else if self.output < self.output_min {
            self.output = self.output_min;
        }
        self.prev_error = self.error;
        self.output
    }

    pub fn assert_integrity(&self) -> Result<(), Fault> {
        check(self.magic_start, self.magic_end, Fault::ThermalAssertion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(cfg: &PidCfg) -> Pid {
        Pid::new(cfg).unwrap()
    }

    #[test]
    fn reset_then_zero_error_returns_zero() {
        let mut p = pid(&PidCfg::default());
        p.calculate(200.0, 150.0);
        p.reset();
        assert_eq!(p.calculate(200.0, 200.0), 0.0);
    }

    #[test]
    fn off_state_returns_zero() {
        let mut p = pid(&PidCfg::default());
        p.off();
        assert_eq!(p.calculate(200.0, 0.0), 0.0);
    }

    #[test]
    fn sentinel_corruption_is_detected() {
        let mut p = pid(&PidCfg::default());
        assert!(p.assert_integrity().is_ok());
        p.magic_end = 0xDEAD;
        assert_eq!(p.assert_integrity(), Err(Fault::ThermalAssertion));
    }

    #[test]
    fn windup_guard_freezes_integral_at_the_rail() {
        let cfg = PidCfg {
            windup_guard: true,
            kp: 100.0, // force saturation from the first step
            ..PidCfg::default()
        };
        let mut p = pid(&cfg);
        p.calculate(200.0, 0.0); // output rails at 100
        let frozen = p.integral;
        p.calculate(200.0, 0.0); // pinned high, error still positive
        assert_eq!(p.integral, frozen);
    }
}
