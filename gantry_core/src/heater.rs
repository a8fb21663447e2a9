//! Heater supervisor: drives PID output to the PWM on each 100 ms tick and
//! enforces the ambient and regulation timeouts plus the overheat cutoff.
//!
//! Shutdowns are sticky: once the heater has latched `Shutdown`, only a
//! fresh `on()` re-enables it. Any sensor shutdown propagates here on the
//! next tick because a dead sensor reads as the hot sentinel.

use crate::config::HeaterCfg;
use crate::error::{BuildError, Result};
use crate::hw_error::map_hw_error;
use crate::integrity::{check, MAGIC};
use crate::pid::Pid;
use crate::sensor::{Sensor, SensorState};
use eyre::WrapErr;
use gantry_traits::{Adc, Fault, Pwm, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterState {
    Off,
    Heating,
    AtTarget,
    Shutdown,
}

/// Subreason for the current heater state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterCode {
    Ok,
    AmbientTimedOut,
    RegulationTimedOut,
    SensorFailed,
    Overheat,
}

#[derive(Debug)]
pub struct Heater {
    magic_start: u16,
    state: HeaterState,
    code: HeaterCode,
    temperature: f64,
    setpoint: f64,
    /// Seconds elapsed since the current HEATING entry.
    regulation_timer_s: f64,
    ambient_timeout_s: f64,
    regulation_timeout_s: f64,
    ambient_temperature: f64,
    overheat_temperature: f64,
    at_target_band: f64,
    pwm_freq_hz: f64,
    tick_interval_s: f64,
    magic_end: u16,
}

impl Heater {
    pub fn new(cfg: &HeaterCfg) -> std::result::Result<Self, BuildError> {
        cfg.validate()?;
        Ok(Self {
            magic_start: MAGIC,
            state: HeaterState::Off,
            code: HeaterCode::Ok,
            temperature: 0.0,
            setpoint: 0.0,
            regulation_timer_s: 0.0,
            ambient_timeout_s: cfg.ambient_timeout_s,
            regulation_timeout_s: cfg.regulation_timeout_s,
            ambient_temperature: cfg.ambient_c,
            overheat_temperature: cfg.overheat_c,
            at_target_band: cfg.at_target_band_c,
            pwm_freq_hz: cfg.pwm_freq_hz,
            tick_interval_s: cfg.tick_interval_s,
            magic_end: MAGIC,
        })
    }

    /// Turn the heater on and begin regulating toward `setpoint`.
    /// No action if already heating or at target.
    pub fn on<A: Adc, W: Pwm>(
        &mut self,
        setpoint: f64,
        sensor: &mut Sensor<A>,
        pid: &mut Pid,
        pwm: &mut W,
    ) -> Result<()> {
        if matches!(self.state, HeaterState::Heating | HeaterState::AtTarget) {
            return Ok(());
        }
        sensor.on();
        pid.reset();
        // duty cycle will be set by the PID loop
        pwm.on(self.pwm_freq_hz, 0.0)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("pwm on")?;
        self.setpoint = setpoint;
        self.regulation_timer_s = 0.0;
        self.code = HeaterCode::Ok;
        self.state = HeaterState::Heating;
        tracing::info!(setpoint, "heater on");
        Ok(())
    }

    /// Stop sending current to the heater and stop taking readings. Used for
    /// both normal off and fault shutdown.
    pub fn off<A: Adc, W: Pwm>(
        &mut self,
        state: HeaterState,
        code: HeaterCode,
        sensor: &mut Sensor<A>,
        pwm: &mut W,
    ) {
        if let Err(e) = pwm.off() {
            tracing::warn!(error = %e, "pwm off failed");
        }
        sensor.off();
        self.state = state;
        self.code = code;
        tracing::info!(state = ?state, code = ?code, "heater off");
    }

    /// 100 ms tick body.
    pub fn tick<A: Adc, W: Pwm>(
        &mut self,
        sensor: &mut Sensor<A>,
        pid: &mut Pid,
        pwm: &mut W,
    ) -> Status {
        if matches!(self.state, HeaterState::Off | HeaterState::Shutdown) {
            return Status::Noop;
        }

        sensor.start_reading();

        // A shut-down sensor reports the hot sentinel; follow it down.
        if sensor.state() == SensorState::Shutdown {
            self.temperature = sensor.temperature();
            self.off(HeaterState::Shutdown, HeaterCode::SensorFailed, sensor, pwm);
            tracing::error!("sensor shut down; heater follows");
            return Status::Fault(Fault::SensorBadReadings);
        }
        if sensor.state() != SensorState::HasData {
            return Status::Noop;
        }
        self.temperature = sensor.temperature();

        if self.temperature >= self.overheat_temperature {
            self.off(HeaterState::Shutdown, HeaterCode::Overheat, sensor, pwm);
            tracing::error!(temp = self.temperature, "overheat cutoff");
            return Status::Fault(Fault::Overheat);
        }

        let duty = pid.calculate(self.setpoint, self.temperature);
        if let Err(e) = pwm.set_duty(duty) {
            tracing::warn!(error = %e, "pwm duty update failed");
        }

        match self.state {
            HeaterState::Heating => {
                self.regulation_timer_s += self.tick_interval_s;

                if self.temperature < self.ambient_temperature
                    && self.regulation_timer_s > self.ambient_timeout_s
                {
                    self.off(
                        HeaterState::Shutdown,
                        HeaterCode::AmbientTimedOut,
                        sensor,
                        pwm,
                    );
                    return Status::Fault(Fault::AmbientTimedOut);
                }
                if self.temperature < self.setpoint
                    && self.regulation_timer_s > self.regulation_timeout_s
                {
                    self.off(
                        HeaterState::Shutdown,
                        HeaterCode::RegulationTimedOut,
                        sensor,
                        pwm,
                    );
                    return Status::Fault(Fault::RegulationTimedOut);
                }
                if (self.temperature - self.setpoint).abs() <= self.at_target_band {
                    self.state = HeaterState::AtTarget;
                    tracing::info!(temp = self.temperature, "heater at target");
                }
            }
            HeaterState::AtTarget => {
                if (self.temperature - self.setpoint).abs() > self.at_target_band {
                    self.state = HeaterState::Heating;
                    self.regulation_timer_s = 0.0;
                }
            }
            _ => {}
        }
        Status::Ok
    }

    pub fn state(&self) -> HeaterState {
        self.state
    }

    pub fn code(&self) -> HeaterCode {
        self.code
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn assert_integrity(&self) -> std::result::Result<(), Fault> {
        check(self.magic_start, self.magic_end, Fault::ThermalAssertion)
    }
}
