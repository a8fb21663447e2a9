//! Test and helper mocks for gantry_core.

use gantry_traits::{Adc, Board, Fault, Machine, MachineState, Parsers, Pwm, Status};
use std::error::Error;

/// Adc returning a fixed raw value.
pub struct FixedAdc(pub u16);

impl Adc for FixedAdc {
    fn read(&mut self, _channel: u8) -> Result<u16, Box<dyn Error + Send + Sync>> {
        Ok(self.0)
    }
}

/// Adc yielding a scripted sequence, then repeating the final value.
pub struct SequenceAdc {
    values: Vec<u16>,
    idx: usize,
}

impl SequenceAdc {
    pub fn new(values: Vec<u16>) -> Self {
        Self { values, idx: 0 }
    }
}

impl Adc for SequenceAdc {
    fn read(&mut self, _channel: u8) -> Result<u16, Box<dyn Error + Send + Sync>> {
        let v = self
            .values
            .get(self.idx)
            .or_else(|| self.values.last())
            .copied()
            .ok_or_else(|| Box::<dyn Error + Send + Sync>::from("sequence adc is empty"))?;
        self.idx = self.idx.saturating_add(1);
        Ok(v)
    }
}

/// Adc that always errors; drives the failed-sample path.
pub struct DeadAdc;

impl Adc for DeadAdc {
    fn read(&mut self, _channel: u8) -> Result<u16, Box<dyn Error + Send + Sync>> {
        Err("adc offline".into())
    }
}

/// Pwm that accepts everything and remembers nothing.
#[derive(Default)]
pub struct NoopPwm;

impl Pwm for NoopPwm {
    fn on(&mut self, _freq_hz: f64, _duty_pct: f64) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn off(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn set_freq(&mut self, _freq_hz: f64) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn set_duty(&mut self, _duty_pct: f64) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Machine stub: generous planner headroom, all continuations Noop,
/// hard_alarm latches the fault and flips the state to Alarm.
pub struct NoopMachine {
    pub state: MachineState,
    pub buffers_available: usize,
    pub last_fault: Option<Fault>,
}

impl Default for NoopMachine {
    fn default() -> Self {
        Self {
            state: MachineState::Ready,
            buffers_available: 28,
            last_fault: None,
        }
    }
}

impl Machine for NoopMachine {
    fn machine_state(&self) -> MachineState {
        self.state
    }

    fn hard_alarm(&mut self, fault: Fault) -> Status {
        self.state = MachineState::Alarm;
        self.last_fault = Some(fault);
        Status::Fault(fault)
    }

    fn request_feedhold(&mut self) {}
    fn request_queue_flush(&mut self) {}
    fn request_cycle_start(&mut self) {}

    fn planner_buffers_available(&self) -> usize {
        self.buffers_available
    }
}

/// Parsers stub that accepts every line.
#[derive(Default)]
pub struct NoopParsers;

impl Parsers for NoopParsers {
    fn text_parser(&mut self, _line: &str) -> Status {
        Status::Ok
    }
    fn json_parser(&mut self, _line: &str) -> Status {
        Status::Ok
    }
    fn gcode_parser(&mut self, _line: &str) -> Status {
        Status::Ok
    }
    fn text_response(&mut self, _status: Status, _line: &str) {}
    fn end_of_file_notice(&mut self) {}
    fn report_exception(&mut self, _status: Status) {}
}

/// Board stub: no LED, no switches, reset requests are remembered.
#[derive(Default)]
pub struct NoopBoard {
    pub limit_thrown: bool,
    pub led_toggles: usize,
    pub resets: usize,
    pub bootloader_entries: usize,
}

impl Board for NoopBoard {
    fn led_on(&mut self) {}
    fn led_off(&mut self) {}
    fn led_toggle(&mut self) {
        self.led_toggles += 1;
    }
    fn limit_switch_thrown(&self) -> bool {
        self.limit_thrown
    }
    fn hard_reset(&mut self) {
        self.resets += 1;
    }
    fn enter_bootloader(&mut self) {
        self.bootloader_entries += 1;
    }
}
