//! Core-side configuration structs with compile-time defaults.
//!
//! These are plain structs; the serde/TOML layer lives in `gantry_config`
//! and is mapped onto these by the CLI. Defaults mirror the firmware's
//! factory constants.

use crate::error::BuildError;

/// PID regulator tuning.
#[derive(Debug, Clone)]
pub struct PidCfg {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Regulator time step in seconds (the heater tick interval).
    pub dt_s: f64,
    pub output_min: f64,
    pub output_max: f64,
    /// Error magnitude below which the integral term is frozen.
    pub epsilon: f64,
    /// Stricter anti-windup: also freeze integration while the output is
    /// saturated in the error's direction.
    pub windup_guard: bool,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            kp: 5.0,
            ki: 0.1,
            kd: 0.4,
            dt_s: 0.1,
            output_min: 0.0,
            output_max: 100.0,
            epsilon: 0.1,
            windup_guard: false,
        }
    }
}

impl PidCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.dt_s <= 0.0 {
            return Err(BuildError::InvalidConfig("pid dt must be > 0"));
        }
        if self.output_max <= self.output_min {
            return Err(BuildError::InvalidConfig(
                "pid output_max must be > output_min",
            ));
        }
        if self.epsilon < 0.0 {
            return Err(BuildError::InvalidConfig("pid epsilon must be >= 0"));
        }
        Ok(())
    }
}

/// Thermocouple sampling configuration.
#[derive(Debug, Clone)]
pub struct SensorCfg {
    /// ADC samples accumulated into one filtered reading. Must be >= 1.
    pub samples_per_reading: u8,
    /// Max allowable change between consecutive samples (outlier rejection).
    pub variance_c: f64,
    /// Redraws allowed per sample before the reading is declared bad.
    pub retries: u8,
    /// Filtered readings above this mean the thermocouple is disconnected.
    pub disconnect_c: f64,
    /// Filtered readings below this mean the amplifier has no power.
    pub no_power_c: f64,
    /// Affine calibration: T = raw * slope + offset.
    pub slope: f64,
    pub offset: f64,
    /// ADC channel the thermocouple amplifier is wired to.
    pub channel: u8,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            samples_per_reading: 8,
            variance_c: 20.0,
            retries: 4,
            disconnect_c: 400.0,
            no_power_c: -2.0,
            slope: 1.456_355_556,
            offset: -120.713_597,
            channel: 0,
        }
    }
}

impl SensorCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.samples_per_reading == 0 {
            return Err(BuildError::InvalidConfig(
                "sensor samples_per_reading must be >= 1",
            ));
        }
        if self.variance_c <= 0.0 {
            return Err(BuildError::InvalidConfig("sensor variance must be > 0"));
        }
        if self.disconnect_c <= self.no_power_c {
            return Err(BuildError::InvalidConfig(
                "sensor disconnect threshold must be above the no-power threshold",
            ));
        }
        Ok(())
    }
}

/// Heater supervision thresholds and timeouts.
#[derive(Debug, Clone)]
pub struct HeaterCfg {
    /// Seconds allowed to climb out of ambient before declaring failure.
    pub ambient_timeout_s: f64,
    /// Seconds allowed to reach the setpoint before declaring failure.
    pub regulation_timeout_s: f64,
    /// Below this the machine is considered at ambient temperature.
    pub ambient_c: f64,
    /// Hard cutoff temperature.
    pub overheat_c: f64,
    /// Band around the setpoint treated as "at target".
    pub at_target_band_c: f64,
    pub pwm_freq_hz: f64,
    /// Heater tick interval in seconds (the 100 ms cascade stage).
    pub tick_interval_s: f64,
}

impl Default for HeaterCfg {
    fn default() -> Self {
        Self {
            ambient_timeout_s: 90.0,
            regulation_timeout_s: 300.0,
            ambient_c: 40.0,
            overheat_c: 300.0,
            at_target_band_c: 1.0,
            pwm_freq_hz: 100.0,
            tick_interval_s: 0.1,
        }
    }
}

impl HeaterCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.ambient_timeout_s <= 0.0 || self.regulation_timeout_s <= 0.0 {
            return Err(BuildError::InvalidConfig("heater timeouts must be > 0"));
        }
        if self.overheat_c <= self.ambient_c {
            return Err(BuildError::InvalidConfig(
                "heater overheat cutoff must be above ambient",
            ));
        }
        if self.pwm_freq_hz <= 0.0 {
            return Err(BuildError::InvalidConfig("heater pwm frequency must be > 0"));
        }
        if self.tick_interval_s <= 0.0 {
            return Err(BuildError::InvalidConfig("heater tick interval must be > 0"));
        }
        if self.at_target_band_c < 0.0 {
            return Err(BuildError::InvalidConfig(
                "heater at-target band must be >= 0",
            ));
        }
        Ok(())
    }
}

/// The full thermal-loop configuration.
#[derive(Debug, Clone, Default)]
pub struct ThermalCfg {
    pub pid: PidCfg,
    pub sensor: SensorCfg,
    pub heater: HeaterCfg,
}

/// Motion controller / dispatcher configuration.
#[derive(Debug, Clone)]
pub struct ControllerCfg {
    /// Minimum free planner buffers before the parser may ingest a line.
    pub planner_headroom: usize,
    /// TX occupancy at or above which the dispatcher stops feeding output.
    pub tx_low_water: usize,
    /// Fixed capacity of the input line buffer, in bytes.
    pub input_buffer_len: usize,
    /// Capacity of the saved-line copy kept for reporting.
    pub saved_line_len: usize,
    /// LED blink period in the shutdown idler.
    pub led_alarm_ms: u64,
    /// LED blink period in the normal idler.
    pub led_normal_ms: u64,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            planner_headroom: 4,
            tx_low_water: 64,
            input_buffer_len: 255,
            saved_line_len: 100,
            led_alarm_ms: 100,
            led_normal_ms: 1000,
        }
    }
}

impl ControllerCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.planner_headroom == 0 {
            return Err(BuildError::InvalidConfig("planner headroom must be >= 1"));
        }
        if self.input_buffer_len < 16 {
            return Err(BuildError::InvalidConfig(
                "input buffer must hold at least 16 bytes",
            ));
        }
        if self.saved_line_len == 0 {
            return Err(BuildError::InvalidConfig("saved line length must be >= 1"));
        }
        Ok(())
    }
}
