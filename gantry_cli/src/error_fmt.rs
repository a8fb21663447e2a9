//! Human-readable error descriptions and structured JSON error formatting.

use gantry_core::{BuildError, CoreError};
use gantry_traits::Fault;

/// Map an eyre::Report to a human-readable explanation with likely causes
/// and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See README for a sample."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<gantry_config::ConfigError>() {
        return format!(
            "What happened: {ce}.\nLikely causes: Missing or out-of-range values in the TOML or calibration CSV.\nHow to fix: Edit the file and rerun; `gantry self-check` validates the setup."
        );
    }

    if let Some(fault) = err.downcast_ref::<Fault>() {
        return match fault {
            Fault::AmbientTimedOut => {
                "What happened: The heater never climbed out of ambient temperature.\nLikely causes: Heater unplugged, dead cartridge, or thermocouple on the wrong element.\nHow to fix: Check heater wiring and power, then raise heater.ambient_timeout_s if the element is just slow.".to_string()
            }
            Fault::RegulationTimedOut => {
                "What happened: The heater climbed but never reached the setpoint in time.\nLikely causes: Under-powered heater, high setpoint, strong cooling.\nHow to fix: Lower the setpoint or raise heater.regulation_timeout_s.".to_string()
            }
            Fault::SensorBadReadings => {
                "What happened: Temperature samples kept jumping outside the variance window.\nLikely causes: Loose thermocouple wiring or electrical noise near the ADC.\nHow to fix: Check the probe connection; widen sensor.variance_c only if the signal is genuinely noisy.".to_string()
            }
            Fault::SensorDisconnected => {
                "What happened: The thermocouple reads as disconnected.\nLikely causes: Broken or unplugged probe.\nHow to fix: Reseat or replace the thermocouple.".to_string()
            }
            Fault::SensorNoPower => {
                "What happened: The thermocouple amplifier appears unpowered.\nLikely causes: Amplifier supply rail down or miswired.\nHow to fix: Check the amplifier's power and ground.".to_string()
            }
            Fault::Overheat => {
                "What happened: The heater crossed the overheat cutoff.\nLikely causes: Runaway duty cycle or a failed switching element.\nHow to fix: Let the machine cool and inspect the heater driver before re-enabling.".to_string()
            }
            Fault::LimitSwitchHit => {
                "What happened: A limit switch fired and the machine latched an alarm.\nLikely causes: Motion past the envelope or a wiring fault.\nHow to fix: Clear the obstruction, then reset the machine.".to_string()
            }
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CoreError>() {
        return format!(
            "What happened: {ce}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    let msg = err.to_string();
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: config problems 2, operational faults 3..6, other 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some()
        || err.downcast_ref::<gantry_config::ConfigError>().is_some()
    {
        return 2;
    }
    if let Some(fault) = err.downcast_ref::<Fault>() {
        return match fault {
            Fault::LimitSwitchHit => 3,
            Fault::SensorBadReadings | Fault::SensorDisconnected | Fault::SensorNoPower => 4,
            Fault::AmbientTimedOut | Fault::RegulationTimedOut | Fault::Overheat => 5,
            _ => 6,
        };
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(fault) = err.downcast_ref::<Fault>() {
        return json!({
            "reason": format!("{fault:?}"),
            "message": humanize(err),
        })
        .to_string();
    }
    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}
