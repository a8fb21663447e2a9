//! Tick source and the thermal mini-dispatcher.
//!
//! A periodic interrupt-analog sets an atomic flag at the 10 ms rate and
//! does nothing else; all real work happens in `tick_callback`, invoked
//! cooperatively from `poll()`. The callback clears the flag, runs the
//! 10 ms tasks (sensor sampling), and cascades into the 100 ms tasks
//! (heater supervision) and 1 s tasks as the down-counters roll over.
//! Sensor work therefore always precedes heater work within a 100 ms
//! window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ThermalCfg;
use crate::error::Result;
use crate::heater::{Heater, HeaterCode, HeaterState};
use crate::pid::Pid;
use crate::sensor::{Sensor, SensorCode, SensorState};
use gantry_traits::{Adc, Clock, Fault, Pwm, Status};

/// The 10 ms base tick rate.
pub const TICK_PERIOD: Duration = Duration::from_millis(10);

const TICKS_PER_100MS: u8 = 10;
const ROLLOVERS_PER_SEC: u8 = 10;

/// The ISR surface of the tick source: a single atomic store.
#[derive(Debug, Clone)]
pub struct TickHandle(Arc<AtomicBool>);

impl TickHandle {
    pub fn fire(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Fire `handle` every `period` on a background thread. Stands in for the
/// hardware timer interrupt; the thread touches nothing but the flag.
pub fn spawn_ticker<C>(handle: TickHandle, period: Duration, clock: C)
where
    C: Clock + Send + 'static,
{
    std::thread::spawn(move || loop {
        clock.sleep(period);
        handle.fire();
    });
}

/// Chip-level state for the thermal device.
#[derive(Debug)]
struct Device {
    magic_start: u16,
    tick_flag: Arc<AtomicBool>,
    tick_100ms_count: u8,
    tick_1sec_count: u8,
    pwm_freq_hz: f64,
    magic_end: u16,
}

impl Device {
    fn new(pwm_freq_hz: f64) -> Self {
        Self {
            magic_start: crate::integrity::MAGIC,
            tick_flag: Arc::new(AtomicBool::new(false)),
            tick_100ms_count: TICKS_PER_100MS,
            tick_1sec_count: ROLLOVERS_PER_SEC,
            pwm_freq_hz,
            magic_end: crate::integrity::MAGIC,
        }
    }

    fn assert_integrity(&self) -> std::result::Result<(), Fault> {
        crate::integrity::check(self.magic_start, self.magic_end, Fault::ThermalAssertion)
    }
}

/// The thermal control loop: sensor, PID, heater and tick cascade bundled
/// behind one owner, polled from the main loop alongside the motion
/// dispatcher.
pub struct ThermalController<A: Adc, W: Pwm> {
    device: Device,
    sensor: Sensor<A>,
    pid: Pid,
    heater: Heater,
    pwm: W,
}

impl<A: Adc, W: Pwm> ThermalController<A, W> {
    pub fn new(cfg: &ThermalCfg, adc: A, pwm: W) -> Result<Self> {
        let sensor = Sensor::new(&cfg.sensor, adc).map_err(eyre::Report::new)?;
        let pid = Pid::new(&cfg.pid).map_err(eyre::Report::new)?;
        let heater = Heater::new(&cfg.heater).map_err(eyre::Report::new)?;
        Ok(Self {
            device: Device::new(cfg.heater.pwm_freq_hz),
            sensor,
            pid,
            heater,
            pwm,
        })
    }

    /// Handle for the tick producer (timer thread or test driver).
    pub fn tick_handle(&self) -> TickHandle {
        TickHandle(Arc::clone(&self.device.tick_flag))
    }

    pub fn heater_on(&mut self, setpoint: f64) -> Result<()> {
        self.heater
            .on(setpoint, &mut self.sensor, &mut self.pid, &mut self.pwm)
    }

    pub fn heater_off(&mut self) {
        self.heater.off(
            HeaterState::Off,
            HeaterCode::Ok,
            &mut self.sensor,
            &mut self.pwm,
        );
    }

    /// One pass of the thermal dispatch list.
    pub fn poll(&mut self) -> Status {
        dispatch!(self.tick_callback());
        Status::Ok
    }

    /// Regular interval timer handler. Returns Noop when no tick has
    /// occurred; otherwise runs the cascade and returns Ok.
    fn tick_callback(&mut self) -> Status {
        if !self.device.tick_flag.swap(false, Ordering::AcqRel) {
            return Status::Noop;
        }

        self.tick_10ms();

        self.device.tick_100ms_count -= 1;
        if self.device.tick_100ms_count != 0 {
            return Status::Ok;
        }
        self.device.tick_100ms_count = TICKS_PER_100MS;
        self.tick_100ms();

        self.device.tick_1sec_count -= 1;
        if self.device.tick_1sec_count != 0 {
            return Status::Ok;
        }
        self.device.tick_1sec_count = ROLLOVERS_PER_SEC;
        self.tick_1sec();

        Status::Ok
    }

    fn tick_10ms(&mut self) {
        self.sensor.sample_tick();
    }

    fn tick_100ms(&mut self) {
        // faults latch in the heater state; nothing to propagate upward
        let _ = self
            .heater
            .tick(&mut self.sensor, &mut self.pid, &mut self.pwm);
    }

    fn tick_1sec(&mut self) {
        tracing::debug!(
            temp = self.heater.temperature(),
            heater = ?self.heater.state(),
            sensor = ?self.sensor.state(),
            "thermal heartbeat"
        );
    }

    /// Integrity assertions across all thermal state blocks.
    pub fn test_assertions(&self) -> std::result::Result<(), Fault> {
        self.device.assert_integrity()?;
        self.sensor.assert_integrity()?;
        self.pid.assert_integrity()?;
        self.heater.assert_integrity()?;
        Ok(())
    }

    pub fn heater_state(&self) -> HeaterState {
        self.heater.state()
    }

    pub fn heater_code(&self) -> HeaterCode {
        self.heater.code()
    }

    pub fn sensor_state(&self) -> SensorState {
        self.sensor.state()
    }

    pub fn sensor_code(&self) -> SensorCode {
        self.sensor.code()
    }

    /// Latest heater-visible temperature.
    pub fn temperature(&self) -> f64 {
        self.heater.temperature()
    }

    pub fn setpoint(&self) -> f64 {
        self.heater.setpoint()
    }

    /// Configured PWM carrier frequency.
    pub fn pwm_freq_hz(&self) -> f64 {
        self.device.pwm_freq_hz
    }

    /// Access to the PWM backend (sim inspection in tests and demos).
    pub fn pwm(&self) -> &W {
        &self.pwm
    }
}
