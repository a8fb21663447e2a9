mod cli;
mod error_fmt;
mod hosts;
mod rt;
mod run;

use std::fs;

use clap::Parser;
use eyre::WrapErr;
use gantry_config::{Calibration, Config};
use gantry_core::{ControllerCfg, HeaterCfg, PidCfg, SensorCfg, ThermalCfg};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Commands, RtLock, FILE_GUARD};
use run::{SimPlant, SimRig};

type SimSetup = Option<(SimPlant, SimRig)>;

/// Build a file sink writer with optional rotation, storing the
/// non-blocking guard in OnceLock.
fn file_layer(
    file: Option<&str>,
    rotation: Option<&str>,
) -> Option<tracing_appender::non_blocking::NonBlocking> {
    let path = file?;
    let p = std::path::Path::new(path);
    if let Some(parent) = p.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let file_appender = match rotation.unwrap_or("never").to_ascii_lowercase().as_str() {
        "daily" => tracing_appender::rolling::daily(".", path),
        "hourly" => tracing_appender::rolling::hourly(".", path),
        _ => tracing_appender::rolling::never(".", path),
    };
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = FILE_GUARD.set(guard);
    Some(nb_writer)
}

/// Initialize tracing once for the whole app. Prefers RUST_LOG when set.
fn init_tracing(json: bool, level: &str, file: Option<&str>, rotation: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        let console = fmt::layer().json().with_target(false);
        if let Some(nb_writer) = file_layer(file, rotation) {
            let file_l = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(nb_writer);
            registry.with(console).with(file_l).init();
        } else {
            registry.with(console).init();
        }
    } else {
        let console = fmt::layer().pretty().with_target(false);
        if let Some(nb_writer) = file_layer(file, rotation) {
            let file_l = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(nb_writer);
            registry.with(console).with(file_l).init();
        } else {
            registry.with(console).init();
        }
    }
}

/// Map the serde config sections onto the core's config structs.
fn map_config(cfg: &Config, calibration: Option<&Calibration>) -> (ControllerCfg, ThermalCfg) {
    let controller = ControllerCfg {
        planner_headroom: cfg.controller.planner_headroom,
        tx_low_water: cfg.controller.tx_low_water,
        input_buffer_len: cfg.controller.input_buffer_len,
        saved_line_len: cfg.controller.saved_line_len,
        led_alarm_ms: cfg.controller.led_alarm_ms,
        led_normal_ms: cfg.controller.led_normal_ms,
    };
    let thermal = ThermalCfg {
        pid: PidCfg {
            kp: cfg.pid.kp,
            ki: cfg.pid.ki,
            kd: cfg.pid.kd,
            dt_s: cfg.pid.dt_s,
            output_min: cfg.pid.output_min,
            output_max: cfg.pid.output_max,
            epsilon: cfg.pid.epsilon,
            windup_guard: cfg.pid.windup_guard,
        },
        sensor: SensorCfg {
            samples_per_reading: cfg.sensor.samples_per_reading,
            variance_c: cfg.sensor.variance_c,
            retries: cfg.sensor.retries,
            disconnect_c: cfg.sensor.disconnect_c,
            no_power_c: cfg.sensor.no_power_c,
            slope: calibration.map_or(cfg.sensor.slope, |c| c.slope),
            offset: calibration.map_or(cfg.sensor.offset, |c| c.offset),
            channel: cfg.sensor.channel,
        },
        heater: HeaterCfg {
            ambient_timeout_s: cfg.heater.ambient_timeout_s,
            regulation_timeout_s: cfg.heater.regulation_timeout_s,
            ambient_c: cfg.heater.ambient_c,
            overheat_c: cfg.heater.overheat_c,
            at_target_band_c: cfg.heater.at_target_band_c,
            pwm_freq_hz: cfg.heater.pwm_freq_hz,
            tick_interval_s: 0.1,
        },
    };
    (controller, thermal)
}

fn main() {
    let json_errors = std::env::args().any(|a| a == "--json");
    if let Err(e) = real_main() {
        if json_errors {
            eprintln!("{}", error_fmt::format_error_json(&e));
        } else {
            eprintln!("{}", error_fmt::humanize(&e));
        }
        std::process::exit(error_fmt::exit_code_for_error(&e));
    }
}

fn real_main() -> eyre::Result<()> {
    let cli = Cli::parse();

    // 1) Load typed config (factory defaults when no file is given)
    let cfg: Config = match &cli.config {
        Some(path) => {
            let text =
                fs::read_to_string(path).wrap_err_with(|| format!("read config {path:?}"))?;
            gantry_config::load_toml(&text).wrap_err_with(|| format!("parse config {path:?}"))?
        }
        None => Config::default(),
    };
    cfg.validate().wrap_err("invalid configuration")?;

    init_tracing(
        cli.json,
        &cli.log_level,
        cfg.logging.file.as_deref(),
        cfg.logging.rotation.as_deref(),
    );

    // 2) Load calibration if provided
    let calibration: Option<Calibration> = match &cli.calibration {
        Some(p) => Some(
            gantry_config::load_calibration_csv(p)
                .wrap_err_with(|| format!("parse calibration {p:?}"))?,
        ),
        None => None,
    };

    let (controller_cfg, thermal_cfg) = map_config(&cfg, calibration.as_ref());

    // 3) Build hardware (feature-gated) or sim
    #[cfg(feature = "hardware")]
    {
        use gantry_hardware::{GpioBoard, HardwareAdc, HardwarePwm};
        let pins = &cfg.pins;
        let adc = HardwareAdc::try_new(
            pins.adc_cs.unwrap_or(8),
            pins.adc_clk.unwrap_or(11),
            pins.adc_miso.unwrap_or(9),
            pins.adc_mosi.unwrap_or(10),
        )
        .wrap_err("open ADC pins")?;
        let pwm = HardwarePwm::try_new(pins.heater_pwm_channel.unwrap_or(0))
            .wrap_err("open PWM channel")?;
        let board = GpioBoard::try_new(pins.led.unwrap_or(17), pins.limit_in.unwrap_or(27), true, 5)
            .wrap_err("open board pins")?;
        dispatch_command(cli, controller_cfg, &thermal_cfg, adc, pwm, board, None)
    }

    #[cfg(not(feature = "hardware"))]
    {
        use gantry_hardware::{SimAdc, SimBoard, SimPwm};
        let (adc, adc_handle) = SimAdc::new(0);
        let (pwm, pwm_handle) = SimPwm::with_freq_window(1.0, 1_000_000.0);
        let (board, _board_handle) = SimBoard::new();
        let rig = SimRig {
            adc: adc_handle,
            pwm: pwm_handle,
        };
        let plant = SimPlant::new(thermal_cfg.sensor.slope, thermal_cfg.sensor.offset);
        dispatch_command(
            cli,
            controller_cfg,
            &thermal_cfg,
            adc,
            pwm,
            board,
            Some((plant, rig)),
        )
    }
}

fn dispatch_command<A, W, B>(
    cli: Cli,
    controller_cfg: ControllerCfg,
    thermal_cfg: &ThermalCfg,
    adc: A,
    pwm: W,
    board: B,
    mut plant: SimSetup,
) -> eyre::Result<()>
where
    A: gantry_traits::Adc,
    W: gantry_traits::Pwm,
    B: gantry_traits::Board,
{
    match cli.cmd {
        Commands::SelfCheck => {
            let _ = plant.take(); // nothing heats during a self-check
            run::self_check(
                adc,
                pwm,
                thermal_cfg.sensor.channel,
                thermal_cfg.heater.pwm_freq_hz,
            )
        }
        Commands::Heat {
            setpoint,
            for_seconds,
            rt,
        } => {
            rt::setup_rt_once(
                rt.rt,
                rt.rt_prio,
                rt.rt_lock.unwrap_or_else(RtLock::os_default),
                rt.rt_cpu,
            );
            run::run_heat(thermal_cfg, adc, pwm, setpoint, for_seconds, plant).map(|_| ())
        }
        Commands::Run { rt } => {
            rt::setup_rt_once(
                rt.rt,
                rt.rt_prio,
                rt.rt_lock.unwrap_or_else(RtLock::os_default),
                rt.rt_cpu,
            );
            run::run_main_loop(controller_cfg, thermal_cfg, adc, pwm, board, plant)
        }
    }
}
