#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! gantry_hardware: hardware and simulation backends behind `gantry_traits`.
//!
//! Features:
//! - `hardware`: enable Raspberry Pi GPIO/PWM/MCP3008-backed implementations.
//! - (default) no `hardware` feature: use simulation types that satisfy the
//!   traits.
//!
//! Note: The `rppal` dependency is optional and only enabled when the
//!       `hardware` feature is active. This lets CI on x86 build without
//!       pulling GPIO libs.
//!
//! The sim types hand out cloneable handles so a test or demo can keep
//! steering and observing the hardware after ownership has moved into the
//! control core.

pub mod error;

#[cfg(feature = "hardware")]
mod mcp3008;

pub mod sim {
    use gantry_traits::{Adc, Board, Pwm};
    use std::error::Error;
    use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Simulated thermocouple ADC: returns whatever raw count the handle
    /// holds, on any channel.
    pub struct SimAdc {
        raw: Arc<AtomicU16>,
    }

    /// Steering handle for `SimAdc`.
    #[derive(Clone)]
    pub struct SimAdcHandle(Arc<AtomicU16>);

    impl SimAdcHandle {
        pub fn set_raw(&self, raw: u16) {
            self.0.store(raw, Ordering::Relaxed);
        }
    }

    impl SimAdc {
        pub fn new(raw: u16) -> (Self, SimAdcHandle) {
            let cell = Arc::new(AtomicU16::new(raw));
            (Self { raw: Arc::clone(&cell) }, SimAdcHandle(cell))
        }
    }

    impl Adc for SimAdc {
        fn read(&mut self, _channel: u8) -> Result<u16, Box<dyn Error + Send + Sync>> {
            Ok(self.raw.load(Ordering::Relaxed))
        }
    }

    /// Observable PWM state.
    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    pub struct PwmSnapshot {
        pub freq_hz: f64,
        pub duty_pct: f64,
        pub enabled: bool,
    }

    /// Simulated PWM channel; clamps like the real peripheral.
    pub struct SimPwm {
        state: Arc<Mutex<PwmSnapshot>>,
        min_freq_hz: f64,
        max_freq_hz: f64,
    }

    /// Observation handle for `SimPwm`.
    #[derive(Clone)]
    pub struct SimPwmHandle(Arc<Mutex<PwmSnapshot>>);

    impl SimPwmHandle {
        pub fn snapshot(&self) -> PwmSnapshot {
            self.0.lock().map(|s| *s).unwrap_or_default()
        }
    }

    impl SimPwm {
        /// Frequency window mirrors a small 8-bit timer: ~500 Hz to ~6 kHz.
        pub fn new() -> (Self, SimPwmHandle) {
            Self::with_freq_window(500.0, 6_000.0)
        }

        pub fn with_freq_window(min_freq_hz: f64, max_freq_hz: f64) -> (Self, SimPwmHandle) {
            let state = Arc::new(Mutex::new(PwmSnapshot::default()));
            (
                Self {
                    state: Arc::clone(&state),
                    min_freq_hz,
                    max_freq_hz,
                },
                SimPwmHandle(state),
            )
        }

        fn lock(&self) -> Result<std::sync::MutexGuard<'_, PwmSnapshot>, Box<dyn Error + Send + Sync>> {
            self.state
                .lock()
                .map_err(|_| Box::<dyn Error + Send + Sync>::from("pwm state poisoned"))
        }
    }

    impl Pwm for SimPwm {
        fn on(&mut self, freq_hz: f64, duty_pct: f64) -> Result<(), Box<dyn Error + Send + Sync>> {
            let clamped_freq = freq_hz.clamp(self.min_freq_hz, self.max_freq_hz);
            let mut s = self.lock()?;
            *s = PwmSnapshot {
                freq_hz: clamped_freq,
                duty_pct: duty_pct.clamp(0.0, 100.0),
                enabled: true,
            };
            Ok(())
        }

        fn off(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
            let mut s = self.lock()?;
            s.enabled = false;
            s.duty_pct = 0.0;
            Ok(())
        }

        fn set_freq(&mut self, freq_hz: f64) -> Result<(), Box<dyn Error + Send + Sync>> {
            let clamped = freq_hz.clamp(self.min_freq_hz, self.max_freq_hz);
            self.lock()?.freq_hz = clamped;
            Ok(())
        }

        fn set_duty(&mut self, duty_pct: f64) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.lock()?.duty_pct = duty_pct.clamp(0.0, 100.0);
            Ok(())
        }
    }

    /// Simulated board: LED toggle counter, a steerable limit switch, and
    /// latched reset/bootloader requests.
    pub struct SimBoard {
        led_lit: Arc<AtomicBool>,
        led_toggles: Arc<AtomicUsize>,
        limit: Arc<AtomicBool>,
        resets: Arc<AtomicUsize>,
        bootloader_entries: Arc<AtomicUsize>,
    }

    #[derive(Clone)]
    pub struct SimBoardHandle {
        led_toggles: Arc<AtomicUsize>,
        limit: Arc<AtomicBool>,
        resets: Arc<AtomicUsize>,
        bootloader_entries: Arc<AtomicUsize>,
    }

    impl SimBoardHandle {
        pub fn throw_limit(&self) {
            self.limit.store(true, Ordering::Relaxed);
        }
        pub fn release_limit(&self) {
            self.limit.store(false, Ordering::Relaxed);
        }
        pub fn led_toggles(&self) -> usize {
            self.led_toggles.load(Ordering::Relaxed)
        }
        pub fn resets(&self) -> usize {
            self.resets.load(Ordering::Relaxed)
        }
        pub fn bootloader_entries(&self) -> usize {
            self.bootloader_entries.load(Ordering::Relaxed)
        }
    }

    impl SimBoard {
        pub fn new() -> (Self, SimBoardHandle) {
            let board = Self {
                led_lit: Arc::new(AtomicBool::new(false)),
                led_toggles: Arc::new(AtomicUsize::new(0)),
                limit: Arc::new(AtomicBool::new(false)),
                resets: Arc::new(AtomicUsize::new(0)),
                bootloader_entries: Arc::new(AtomicUsize::new(0)),
            };
            let handle = SimBoardHandle {
                led_toggles: Arc::clone(&board.led_toggles),
                limit: Arc::clone(&board.limit),
                resets: Arc::clone(&board.resets),
                bootloader_entries: Arc::clone(&board.bootloader_entries),
            };
            (board, handle)
        }
    }

    impl Board for SimBoard {
        fn led_on(&mut self) {
            self.led_lit.store(true, Ordering::Relaxed);
        }
        fn led_off(&mut self) {
            self.led_lit.store(false, Ordering::Relaxed);
        }
        fn led_toggle(&mut self) {
            self.led_lit.fetch_xor(true, Ordering::Relaxed);
            self.led_toggles.fetch_add(1, Ordering::Relaxed);
        }
        fn limit_switch_thrown(&self) -> bool {
            self.limit.load(Ordering::Relaxed)
        }
        fn hard_reset(&mut self) {
            tracing::warn!("sim board: hard reset");
            self.resets.fetch_add(1, Ordering::Relaxed);
        }
        fn enter_bootloader(&mut self) {
            tracing::warn!("sim board: bootloader entry");
            self.bootloader_entries.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(feature = "hardware")]
pub mod hardware {
    use crate::error::{HwError, Result};
    use crate::mcp3008::Mcp3008;
    use gantry_traits::{Adc, Board, Pwm};
    use rppal::gpio::{Gpio, OutputPin};
    use std::error::Error;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tracing::info;

    /// MCP3008-backed thermocouple ADC over bit-banged SPI.
    pub struct HardwareAdc {
        mcp: Mcp3008,
    }

    impl HardwareAdc {
        pub fn try_new(cs_pin: u8, clk_pin: u8, miso_pin: u8, mosi_pin: u8) -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            let cs = gpio
                .get(cs_pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_high(); // idle deselected
            let clk = gpio
                .get(clk_pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_low();
            let miso = gpio
                .get(miso_pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_input();
            let mosi = gpio
                .get(mosi_pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_low();
            Ok(Self {
                mcp: Mcp3008::new(cs, clk, miso, mosi),
            })
        }
    }

    impl Adc for HardwareAdc {
        fn read(&mut self, channel: u8) -> std::result::Result<u16, Box<dyn Error + Send + Sync>> {
            self.mcp
                .read_channel(channel)
                .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(e) })
        }
    }

    /// Hardware PWM via the Pi's PWM peripheral.
    pub struct HardwarePwm {
        pwm: rppal::pwm::Pwm,
        freq_hz: f64,
    }

    impl HardwarePwm {
        pub fn try_new(channel: u8) -> Result<Self> {
            let ch = match channel {
                0 => rppal::pwm::Channel::Pwm0,
                _ => rppal::pwm::Channel::Pwm1,
            };
            let pwm = rppal::pwm::Pwm::new(ch).map_err(|e| HwError::Pwm(e.to_string()))?;
            Ok(Self { pwm, freq_hz: 0.0 })
        }

        fn apply(&mut self, freq_hz: f64, duty_pct: f64) -> Result<()> {
            self.pwm
                .set_frequency(freq_hz, (duty_pct / 100.0).clamp(0.0, 1.0))
                .map_err(|e| HwError::Pwm(e.to_string()))
        }
    }

    impl Pwm for HardwarePwm {
        fn on(&mut self, freq_hz: f64, duty_pct: f64) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
            self.freq_hz = freq_hz;
            self.apply(freq_hz, duty_pct)?;
            self.pwm
                .enable()
                .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(HwError::Pwm(e.to_string())) })?;
            info!(freq_hz, duty_pct, "pwm on");
            Ok(())
        }

        fn off(&mut self) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
            self.pwm
                .disable()
                .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(HwError::Pwm(e.to_string())) })?;
            info!("pwm off");
            Ok(())
        }

        fn set_freq(&mut self, freq_hz: f64) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
            self.freq_hz = freq_hz;
            self.pwm
                .set_frequency(freq_hz, 0.0)
                .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(HwError::Pwm(e.to_string())) })
        }

        fn set_duty(&mut self, duty_pct: f64) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
            let freq = self.freq_hz;
            self.apply(freq, duty_pct)
                .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(e) })
        }
    }

    /// GPIO board: indicator LED output, polled limit-switch input.
    pub struct GpioBoard {
        led: OutputPin,
        led_lit: bool,
        limit: Arc<AtomicBool>,
    }

    impl GpioBoard {
        /// `active_low` limit inputs read Low when the switch is closed.
        pub fn try_new(led_pin: u8, limit_pin: u8, active_low: bool, poll_ms: u64) -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            let led = gpio
                .get(led_pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_low();
            let input = gpio
                .get(limit_pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_input_pullup();

            let limit = Arc::new(AtomicBool::new(false));
            let limit_bg = Arc::clone(&limit);
            thread::spawn(move || loop {
                let level_low = input.read() == rppal::gpio::Level::Low;
                let active = if active_low { level_low } else { !level_low };
                limit_bg.store(active, Ordering::Relaxed);
                thread::sleep(Duration::from_millis(poll_ms.max(1)));
            });

            Ok(Self {
                led,
                led_lit: false,
                limit,
            })
        }
    }

    impl Board for GpioBoard {
        fn led_on(&mut self) {
            self.led.set_high();
            self.led_lit = true;
        }
        fn led_off(&mut self) {
            self.led.set_low();
            self.led_lit = false;
        }
        fn led_toggle(&mut self) {
            if self.led_lit {
                self.led_off();
            } else {
                self.led_on();
            }
        }
        fn limit_switch_thrown(&self) -> bool {
            self.limit.load(Ordering::Relaxed)
        }
        fn hard_reset(&mut self) {
            tracing::warn!("hard reset requested; exiting for the supervisor to restart us");
            std::process::exit(0);
        }
        fn enter_bootloader(&mut self) {
            tracing::warn!("bootloader entry not supported on this platform");
        }
    }
}

// Re-exports for callers (CLI/tests) to pick the right backend easily.
pub use sim::{SimAdc, SimAdcHandle, SimBoard, SimBoardHandle, SimPwm, SimPwmHandle};

#[cfg(feature = "hardware")]
pub use hardware::{GpioBoard, HardwareAdc, HardwarePwm};
