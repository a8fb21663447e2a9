//! Drive the thermal loop against the simulated hardware until the heater
//! parks at its setpoint.
//!
//! Run with: cargo run -p gantry_core --example heat_to_target

use gantry_core::{HeaterState, SensorCfg, ThermalCfg, ThermalController};
use gantry_hardware::{SimAdc, SimPwm};

fn main() -> eyre::Result<()> {
    let cfg = ThermalCfg {
        sensor: SensorCfg {
            slope: 1.0,
            offset: 0.0,
            ..SensorCfg::default()
        },
        ..ThermalCfg::default()
    };

    let (adc, adc_handle) = SimAdc::new(20);
    let (pwm, pwm_handle) = SimPwm::with_freq_window(1.0, 1_000_000.0);
    let mut tc = ThermalController::new(&cfg, adc, pwm)?;
    let ticks = tc.tick_handle();

    tc.heater_on(200.0)?;

    // a crude plant: temperature follows the commanded duty cycle
    let mut temp_c = 20.0f64;
    for tick in 0..100_000u32 {
        ticks.fire();
        tc.poll();

        let duty = pwm_handle.snapshot().duty_pct;
        temp_c += (duty / 100.0 * 0.2) - (temp_c - 20.0) * 0.0002;
        adc_handle.set_raw(temp_c.round().clamp(0.0, 1023.0) as u16);

        if tc.heater_state() == HeaterState::AtTarget {
            println!(
                "at target after {:.1} simulated seconds: {:.1} C",
                f64::from(tick) * 0.01,
                tc.temperature()
            );
            return Ok(());
        }
    }
    println!(
        "never settled; heater {:?} at {:.1} C",
        tc.heater_state(),
        tc.temperature()
    );
    Ok(())
}
