//! Typed configuration for the gantry stack.
//!
//! The TOML schema mirrors the core's config structs; the CLI maps one onto
//! the other after `Config::validate()` has passed. Sections with sensible
//! factory defaults are optional in the file.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("calibration csv: {0}")]
    Calibration(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControllerSection {
    pub planner_headroom: usize,
    pub tx_low_water: usize,
    pub input_buffer_len: usize,
    pub saved_line_len: usize,
    pub led_alarm_ms: u64,
    pub led_normal_ms: u64,
}

impl Default for ControllerSection {
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PidSection {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub dt_s: f64,
    pub output_min: f64,
    pub output_max: f64,
    pub epsilon: f64,
    pub windup_guard: bool,
}

impl Default for PidSection {
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorSection {
    pub samples_per_reading: u8,
    pub variance_c: f64,
    pub retries: u8,
    pub disconnect_c: f64,
    pub no_power_c: f64,
    pub slope: f64,
    pub offset: f64,
    pub channel: u8,
}

impl Default for SensorSection {
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HeaterSection {
    pub ambient_timeout_s: f64,
    pub regulation_timeout_s: f64,
    pub ambient_c: f64,
    pub overheat_c: f64,
    pub at_target_band_c: f64,
    pub pwm_freq_hz: f64,
}

impl Default for HeaterSection {
    fn default() -> Self {
        Self {
            ambient_timeout_s: 90.0,
            regulation_timeout_s: 300.0,
            ambient_c: 40.0,
            overheat_c: 300.0,
            at_target_band_c: 1.0,
            pwm_freq_hz: 100.0,
        }
    }
}

/// GPIO wiring, only consulted when the `hardware` feature is active.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Pins {
    pub adc_cs: Option<u8>,
    pub adc_clk: Option<u8>,
    pub adc_miso: Option<u8>,
    pub adc_mosi: Option<u8>,
    pub heater_pwm_channel: Option<u8>,
    pub limit_in: Option<u8>,
    pub led: Option<u8>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Logging {
    /// Path to a .log file (JSON lines); console-only when absent.
    pub file: Option<String>,
    pub level: Option<String>,
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never).
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub controller: ControllerSection,
    pub pid: PidSection,
    pub sensor: SensorSection,
    pub heater: HeaterSection,
    pub pins: Pins,
    pub logging: Logging,
}

impl Config {
    /// First-error validation with stable, greppable messages.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.planner_headroom == 0 {
            return Err(ConfigError::Invalid("controller.planner_headroom must be >= 1"));
        }
        if self.controller.input_buffer_len < 16 {
            return Err(ConfigError::Invalid("controller.input_buffer_len must be >= 16"));
        }
        if self.pid.dt_s <= 0.0 {
            return Err(ConfigError::Invalid("pid.dt_s must be > 0"));
        }
        if self.pid.output_max <= self.pid.output_min {
            return Err(ConfigError::Invalid("pid.output_max must be > pid.output_min"));
        }
        if self.sensor.samples_per_reading == 0 {
            return Err(ConfigError::Invalid("sensor.samples_per_reading must be >= 1"));
        }
        if self.sensor.variance_c <= 0.0 {
            return Err(ConfigError::Invalid("sensor.variance_c must be > 0"));
        }
        if self.sensor.disconnect_c <= self.sensor.no_power_c {
            return Err(ConfigError::Invalid(
                "sensor.disconnect_c must be above sensor.no_power_c",
            ));
        }
        if self.heater.ambient_timeout_s <= 0.0 || self.heater.regulation_timeout_s <= 0.0 {
            return Err(ConfigError::Invalid("heater timeouts must be > 0"));
        }
        if self.heater.overheat_c <= self.heater.ambient_c {
            return Err(ConfigError::Invalid("heater.overheat_c must be above heater.ambient_c"));
        }
        if self.heater.pwm_freq_hz <= 0.0 {
            return Err(ConfigError::Invalid("heater.pwm_freq_hz must be > 0"));
        }
        Ok(())
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Thermocouple calibration loaded from a strict CSV:
/// `kind,key,value` rows with `thermocouple,slope,...` and
/// `thermocouple,offset,...`.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub slope: f64,
    pub offset: f64,
}

pub fn load_calibration_csv(path: &std::path::Path) -> Result<Calibration, ConfigError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| ConfigError::Calibration(e.to_string()))?;

    let mut slope = None;
    let mut offset = None;

    for rec in rdr.deserialize::<(String, String, String)>() {
        let (kind, key, value) = rec.map_err(|e| ConfigError::Calibration(e.to_string()))?;
        if kind != "thermocouple" {
            continue;
        }
        let parsed: f64 = value
            .parse()
            .map_err(|_| ConfigError::Calibration(format!("bad value for {key}: {value:?}")))?;
        match key.as_str() {
            "slope" => slope = Some(parsed),
            "offset" => offset = Some(parsed),
            _ => {}
        }
    }

    Ok(Calibration {
        slope: slope.ok_or_else(|| ConfigError::Calibration("missing slope row".into()))?,
        offset: offset.ok_or_else(|| ConfigError::Calibration("missing offset row".into()))?,
    })
}
