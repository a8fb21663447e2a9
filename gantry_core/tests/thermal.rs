//! Thermal loop tests: tick cascade, heater supervision, fault latching.

use std::error::Error;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use gantry_core::{
    HeaterCfg, HeaterCode, HeaterState, PidCfg, SensorCfg, SensorState, ThermalCfg,
    ThermalController,
};
use gantry_traits::{Adc, Pwm};

/// Adc whose raw value can be steered after the controller takes ownership.
#[derive(Clone)]
struct SharedAdc(Arc<AtomicU16>);

impl SharedAdc {
    fn new(raw: u16) -> (Self, Arc<AtomicU16>) {
        let cell = Arc::new(AtomicU16::new(raw));
        (Self(Arc::clone(&cell)), cell)
    }
}

impl Adc for SharedAdc {
    fn read(&mut self, _channel: u8) -> Result<u16, Box<dyn Error + Send + Sync>> {
        Ok(self.0.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PwmSnapshot {
    freq_hz: f64,
    duty_pct: f64,
    enabled: bool,
}

/// Pwm recording its last commanded state behind a shared handle.
#[derive(Clone)]
struct SpyPwm(Arc<Mutex<PwmSnapshot>>);

impl SpyPwm {
    fn new() -> (Self, Arc<Mutex<PwmSnapshot>>) {
        let shared = Arc::new(Mutex::new(PwmSnapshot::default()));
        (Self(Arc::clone(&shared)), shared)
    }
}

impl Pwm for SpyPwm {
    fn on(&mut self, freq_hz: f64, duty_pct: f64) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut s = self.0.lock().map_err(|_| "pwm lock poisoned")?;
        *s = PwmSnapshot {
            freq_hz,
            duty_pct,
            enabled: true,
        };
        Ok(())
    }
    fn off(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut s = self.0.lock().map_err(|_| "pwm lock poisoned")?;
        s.enabled = false;
        s.duty_pct = 0.0;
        Ok(())
    }
    fn set_freq(&mut self, freq_hz: f64) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.0.lock().map_err(|_| "pwm lock poisoned")?.freq_hz = freq_hz;
        Ok(())
    }
    fn set_duty(&mut self, duty_pct: f64) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.0.lock().map_err(|_| "pwm lock poisoned")?.duty_pct = duty_pct;
        Ok(())
    }
}

/// Fast test config: unit calibration, 1 sample per reading, short timeouts.
fn fast_cfg() -> ThermalCfg {
    ThermalCfg {
        pid: PidCfg::default(),
        sensor: SensorCfg {
            samples_per_reading: 1,
            slope: 1.0,
            offset: 0.0,
            variance_c: 1_000.0,
            ..SensorCfg::default()
        },
        heater: HeaterCfg {
            ambient_timeout_s: 0.5,     // 5 heater ticks
            regulation_timeout_s: 2.0,  // 20 heater ticks
            ..HeaterCfg::default()
        },
    }
}

/// Fire the tick flag and poll once; ten of these make one heater tick.
fn run_ticks<A: Adc, W: Pwm>(tc: &mut ThermalController<A, W>, n: usize) {
    let handle = tc.tick_handle();
    for _ in 0..n {
        handle.fire();
        tc.poll();
    }
}

#[test]
fn poll_without_tick_is_a_noop() {
    let (adc, _) = SharedAdc::new(20);
    let (pwm, pwm_state) = SpyPwm::new();
    let mut tc = ThermalController::new(&fast_cfg(), adc, pwm).expect("thermal build");
    tc.heater_on(200.0).expect("heater on");

    // no tick fired: nothing moves
    for _ in 0..100 {
        tc.poll();
    }
    assert_eq!(tc.sensor_state(), SensorState::NoData);
    assert_eq!(pwm_state.lock().unwrap().duty_pct, 0.0);
}

#[test]
fn ten_ticks_make_one_heater_tick() {
    let (adc, _) = SharedAdc::new(100);
    let (pwm, pwm_state) = SpyPwm::new();
    let mut tc = ThermalController::new(&fast_cfg(), adc, pwm).expect("thermal build");
    tc.heater_on(200.0).expect("heater on");

    // nine base ticks: sensor has sampled but the heater has not run
    run_ticks(&mut tc, 9);
    assert_eq!(pwm_state.lock().unwrap().duty_pct, 0.0);

    // the tenth rolls the 100 ms counter over and drives the PID
    run_ticks(&mut tc, 1);
    assert!(pwm_state.lock().unwrap().duty_pct > 0.0);
    assert_eq!(tc.temperature(), 100.0);
}

#[test]
fn heater_on_is_idempotent() {
    let (adc, _) = SharedAdc::new(100);
    let (pwm, _) = SpyPwm::new();
    let mut tc = ThermalController::new(&fast_cfg(), adc, pwm).expect("thermal build");

    tc.heater_on(200.0).expect("heater on");
    run_ticks(&mut tc, 30);
    let t_before = tc.temperature();

    // second on() while heating must not reset anything
    tc.heater_on(200.0).expect("heater on again");
    assert_eq!(tc.heater_state(), HeaterState::Heating);
    assert_eq!(tc.setpoint(), 200.0);
    assert_eq!(tc.temperature(), t_before);
}

#[test]
fn ambient_timeout_shuts_down_a_cold_heater() {
    let (adc, _) = SharedAdc::new(20); // stuck at 20 C, below ambient_c = 40
    let (pwm, pwm_state) = SpyPwm::new();
    let mut tc = ThermalController::new(&fast_cfg(), adc, pwm).expect("thermal build");
    tc.heater_on(200.0).expect("heater on");

    // 0.5 s ambient timeout = 5 heater ticks; run 7 to cross it
    run_ticks(&mut tc, 70);
    assert_eq!(tc.heater_state(), HeaterState::Shutdown);
    assert_eq!(tc.heater_code(), HeaterCode::AmbientTimedOut);
    assert!(!pwm_state.lock().unwrap().enabled, "pwm must be disabled");
    assert_eq!(tc.sensor_state(), SensorState::Off);
}

#[test]
fn regulation_timeout_shuts_down_a_lukewarm_heater() {
    let (adc, _) = SharedAdc::new(100); // above ambient, below the 200 C setpoint
    let (pwm, pwm_state) = SpyPwm::new();
    let mut tc = ThermalController::new(&fast_cfg(), adc, pwm).expect("thermal build");
    tc.heater_on(200.0).expect("heater on");

    // 2 s regulation timeout = 20 heater ticks; run 25
    run_ticks(&mut tc, 250);
    assert_eq!(tc.heater_state(), HeaterState::Shutdown);
    assert_eq!(tc.heater_code(), HeaterCode::RegulationTimedOut);
    assert!(!pwm_state.lock().unwrap().enabled);
}

#[test]
fn reaching_the_setpoint_parks_at_target() {
    let (adc, raw) = SharedAdc::new(100);
    let (pwm, _) = SpyPwm::new();
    let mut tc = ThermalController::new(&fast_cfg(), adc, pwm).expect("thermal build");
    tc.heater_on(200.0).expect("heater on");

    run_ticks(&mut tc, 10);
    assert_eq!(tc.heater_state(), HeaterState::Heating);

    raw.store(200, Ordering::Relaxed);
    run_ticks(&mut tc, 20);
    assert_eq!(tc.heater_state(), HeaterState::AtTarget);

    // drifting out of the band resumes regulation with a fresh timer
    raw.store(150, Ordering::Relaxed);
    run_ticks(&mut tc, 20);
    assert_eq!(tc.heater_state(), HeaterState::Heating);
}

#[test]
fn disconnected_sensor_means_no_pwm_change() {
    let (adc, raw) = SharedAdc::new(100);
    let (pwm, pwm_state) = SpyPwm::new();
    let mut tc = ThermalController::new(&fast_cfg(), adc, pwm).expect("thermal build");
    tc.heater_on(200.0).expect("heater on");

    run_ticks(&mut tc, 10);
    let duty_before = pwm_state.lock().unwrap().duty_pct;
    assert!(duty_before > 0.0);

    // 1000 C reads as disconnected (threshold 400 C)
    raw.store(1000, Ordering::Relaxed);
    run_ticks(&mut tc, 10);
    assert_eq!(tc.sensor_state(), SensorState::NoData);
    // heater saw no HAS_DATA and did nothing: duty unchanged, still enabled
    assert_eq!(pwm_state.lock().unwrap().duty_pct, duty_before);
    assert!(pwm_state.lock().unwrap().enabled);
}

#[test]
fn sensor_shutdown_propagates_to_the_heater() {
    let cfg = ThermalCfg {
        sensor: SensorCfg {
            samples_per_reading: 2,
            slope: 1.0,
            offset: 0.0,
            variance_c: 5.0,
            retries: 1,
            ..SensorCfg::default()
        },
        ..fast_cfg()
    };
    // first sample 100, everything after jumps out of the variance window
    let (adc, raw) = SharedAdc::new(100);
    let (pwm, pwm_state) = SpyPwm::new();
    let mut tc = ThermalController::new(&cfg, adc, pwm).expect("thermal build");
    tc.heater_on(200.0).expect("heater on");

    run_ticks(&mut tc, 1); // first sample accepted
    raw.store(300, Ordering::Relaxed);
    run_ticks(&mut tc, 1); // variance exhausted: sensor shuts down
    assert_eq!(tc.sensor_state(), SensorState::Shutdown);

    // next heater tick follows the sensor down
    run_ticks(&mut tc, 8);
    assert_eq!(tc.heater_state(), HeaterState::Shutdown);
    assert_eq!(tc.heater_code(), HeaterCode::SensorFailed);
    assert!(!pwm_state.lock().unwrap().enabled);
}

#[test]
fn shutdown_is_sticky_until_heater_on() {
    let (adc, raw) = SharedAdc::new(20);
    let (pwm, _) = SpyPwm::new();
    let mut tc = ThermalController::new(&fast_cfg(), adc, pwm).expect("thermal build");
    tc.heater_on(200.0).expect("heater on");
    run_ticks(&mut tc, 70);
    assert_eq!(tc.heater_state(), HeaterState::Shutdown);

    // warm readings alone do not revive a latched shutdown
    raw.store(100, Ordering::Relaxed);
    run_ticks(&mut tc, 50);
    assert_eq!(tc.heater_state(), HeaterState::Shutdown);

    // an explicit on() does
    tc.heater_on(200.0).expect("heater restart");
    assert_eq!(tc.heater_state(), HeaterState::Heating);
    run_ticks(&mut tc, 10);
    assert_eq!(tc.sensor_state(), SensorState::HasData);
}

#[test]
fn overheat_reading_cuts_the_heater() {
    let cfg = ThermalCfg {
        sensor: SensorCfg {
            samples_per_reading: 1,
            slope: 1.0,
            offset: 0.0,
            variance_c: 1_000.0,
            disconnect_c: 500.0, // leave room between overheat and disconnect
            ..SensorCfg::default()
        },
        ..fast_cfg()
    };
    let (adc, raw) = SharedAdc::new(100);
    let (pwm, pwm_state) = SpyPwm::new();
    let mut tc = ThermalController::new(&cfg, adc, pwm).expect("thermal build");
    tc.heater_on(200.0).expect("heater on");

    run_ticks(&mut tc, 10);
    assert_eq!(tc.heater_state(), HeaterState::Heating);

    raw.store(320, Ordering::Relaxed); // above the 300 C cutoff
    run_ticks(&mut tc, 10);
    assert_eq!(tc.heater_state(), HeaterState::Shutdown);
    assert_eq!(tc.heater_code(), HeaterCode::Overheat);
    assert!(!pwm_state.lock().unwrap().enabled);
}

#[test]
fn thermal_assertions_pass_on_a_fresh_controller() {
    let (adc, _) = SharedAdc::new(100);
    let (pwm, _) = SpyPwm::new();
    let tc = ThermalController::new(&fast_cfg(), adc, pwm).expect("thermal build");
    assert!(tc.test_assertions().is_ok());
}
