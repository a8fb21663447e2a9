//! Subcommand orchestration: self-check, standalone thermal regulation, and
//! the combined dispatcher + thermal main loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use gantry_core::{
    spawn_ticker, Controller, ControllerCfg, HeaterState, SourceId, Status, ThermalCfg,
    ThermalController, TICK_PERIOD,
};
use gantry_hardware::{SimAdcHandle, SimPwmHandle};
use gantry_traits::{Adc, MonotonicClock, Pwm};

use crate::hosts::{ConsoleParsers, IdleMachine, StdioHost};

/// First-order thermal plant for the simulation backend: heat input scales
/// with duty, cooling with distance from ambient. Keeps `heat` and `run`
/// honest without hardware.
pub struct SimPlant {
    temp_c: f64,
    slope: f64,
    offset: f64,
}

impl SimPlant {
    const AMBIENT_C: f64 = 20.0;
    const HEAT_RATE_C_PER_S: f64 = 60.0; // at 100% duty
    const COOLING_PER_S: f64 = 0.02;

    pub fn new(slope: f64, offset: f64) -> Self {
        Self {
            temp_c: Self::AMBIENT_C,
            slope,
            offset,
        }
    }

    pub fn step(&mut self, duty_pct: f64, dt_s: f64) {
        let heat = Self::HEAT_RATE_C_PER_S * (duty_pct / 100.0);
        let cooling = Self::COOLING_PER_S * (self.temp_c - Self::AMBIENT_C);
        self.temp_c += (heat - cooling) * dt_s;
    }

    /// Raw ADC counts that read back as the current plant temperature.
    pub fn raw(&self) -> u16 {
        let raw = (self.temp_c - self.offset) / self.slope;
        raw.round().clamp(0.0, f64::from(u16::MAX)) as u16
    }
}

/// Sim steering handles, present only on the simulation backend.
pub struct SimRig {
    pub adc: SimAdcHandle,
    pub pwm: SimPwmHandle,
}

fn drive_plant(plant: &mut Option<(SimPlant, SimRig)>, dt_s: f64) {
    if let Some((plant, rig)) = plant.as_mut() {
        plant.step(rig.pwm.snapshot().duty_pct, dt_s);
        rig.adc.set_raw(plant.raw());
    }
}

/// Probe the ADC and exercise the PWM lifecycle without heating anything.
pub fn self_check<A, W>(mut adc: A, mut pwm: W, channel: u8, freq_hz: f64) -> eyre::Result<()>
where
    A: Adc,
    W: Pwm,
{
    tracing::info!("self-check starting");

    match adc.read(channel) {
        Ok(raw) => tracing::info!(raw, "adc read ok"),
        Err(e) => return Err(eyre::eyre!("adc read failed: {e}")),
    }

    pwm.on(freq_hz, 0.0)
        .map_err(|e| eyre::eyre!("pwm on failed: {e}"))?;
    pwm.set_duty(0.0)
        .map_err(|e| eyre::eyre!("pwm duty failed: {e}"))?;
    pwm.off().map_err(|e| eyre::eyre!("pwm off failed: {e}"))?;

    tracing::info!("self-check ok");
    println!("OK");
    Ok(())
}

/// Regulate toward `setpoint` until at-target, fault, or the optional
/// deadline. Returns the reached temperature.
pub fn run_heat<A, W>(
    thermal_cfg: &ThermalCfg,
    adc: A,
    pwm: W,
    setpoint: f64,
    for_seconds: Option<u64>,
    mut plant: Option<(SimPlant, SimRig)>,
) -> eyre::Result<f64>
where
    A: Adc,
    W: Pwm,
{
    let mut tc = ThermalController::new(thermal_cfg, adc, pwm).wrap_err("build thermal loop")?;
    spawn_ticker(tc.tick_handle(), TICK_PERIOD, MonotonicClock::new());
    tc.heater_on(setpoint).wrap_err("heater on")?;
    tracing::info!(setpoint, "heat start");

    let started = Instant::now();
    let mut last_report = Instant::now();
    loop {
        tc.poll();
        drive_plant(&mut plant, 0.001);

        match tc.heater_state() {
            HeaterState::AtTarget => {
                let t = tc.temperature();
                tracing::info!(temp = t, "at target");
                println!("at target: {t:.1} C");
                return Ok(t);
            }
            HeaterState::Shutdown => {
                return Err(eyre::Report::new(heater_fault(&tc)));
            }
            _ => {}
        }

        if let Some(secs) = for_seconds {
            if started.elapsed() >= Duration::from_secs(secs) {
                let t = tc.temperature();
                println!("temperature after {secs} s: {t:.1} C");
                return Ok(t);
            }
        }

        if last_report.elapsed() >= Duration::from_secs(5) {
            last_report = Instant::now();
            tracing::info!(temp = tc.temperature(), "heating");
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn heater_fault<A: Adc, W: Pwm>(tc: &ThermalController<A, W>) -> gantry_traits::Fault {
    use gantry_core::HeaterCode;
    use gantry_traits::Fault;
    match tc.heater_code() {
        HeaterCode::AmbientTimedOut => Fault::AmbientTimedOut,
        HeaterCode::RegulationTimedOut => Fault::RegulationTimedOut,
        HeaterCode::SensorFailed => Fault::SensorBadReadings,
        HeaterCode::Overheat | HeaterCode::Ok => Fault::Overheat,
    }
}

/// The combined main loop: motion dispatcher plus thermal poll, reading
/// commands from stdin until EOF.
pub fn run_main_loop<A, W, B>(
    controller_cfg: ControllerCfg,
    thermal_cfg: &ThermalCfg,
    adc: A,
    pwm: W,
    board: B,
    mut plant: Option<(SimPlant, SimRig)>,
) -> eyre::Result<()>
where
    A: Adc,
    W: Pwm,
    B: gantry_traits::Board,
{
    let (io, saw_eof) = StdioHost::new();
    let mut controller = Controller::try_new(
        controller_cfg,
        SourceId(0),
        IdleMachine::default(),
        ConsoleParsers,
        io,
        board,
    )
    .wrap_err("build controller")?;

    let mut thermal = ThermalController::new(thermal_cfg, adc, pwm).wrap_err("build thermal loop")?;
    spawn_ticker(thermal.tick_handle(), TICK_PERIOD, MonotonicClock::new());

    tracing::info!(
        build = gantry_core::controller::FIRMWARE_BUILD,
        "controller running; reading commands from stdin"
    );

    let eof_seen: Arc<AtomicBool> = saw_eof;
    loop {
        let status = controller.cycle();
        thermal.poll();
        drive_plant(&mut plant, 0.001);

        // alarms latch in the machine; keep cycling so reset requests stay
        // serviceable
        if let Status::Fault(fault) = status {
            tracing::error!(%fault, "dispatcher fault");
        }
        if eof_seen.load(Ordering::Relaxed) {
            tracing::info!("input exhausted; stopping");
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
