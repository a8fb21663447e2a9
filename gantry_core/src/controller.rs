//! Motion controller state and the top-level cooperative dispatcher.
//!
//! The main loop invokes `cycle()` forever. Handlers are ordered by
//! increasing dependency: a handler that is dependent on completion of a
//! higher-priority task sits later in the list, and a handler returning
//! `Again` prevents everything below it from running that cycle. Handlers
//! are continuations; they are called even when they have nothing to do and
//! answer `Noop` for that case.

use std::sync::Arc;
use std::time::Instant;

use crate::command::CommMode;
use crate::config::ControllerCfg;
use crate::error::Result;
use crate::integrity::{check, MAGIC};
use gantry_traits::{
    Board, Clock, Fault, Io, Machine, MachineState, MonotonicClock, Parsers, SourceId, Status,
};

/// Firmware identifiers reported by the controller.
pub const FIRMWARE_BUILD: &str = env!("CARGO_PKG_VERSION");
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION_MAJOR");
pub const HARDWARE_PLATFORM: u8 = 1;

// Raise a hard alarm and bail out of the assertions pass on the first
// failed check.
macro_rules! emergency {
    ($self:ident, $check:expr) => {
        if let Err(fault) = $check {
            $self.state.state = MachineState::Alarm;
            $self.machine.hard_alarm(fault);
            return Status::Fault(fault);
        }
    };
}

/// Process-wide controller state block.
#[derive(Debug)]
pub struct ControllerState {
    magic_start: u16,
    pub fw_build: &'static str,
    pub fw_version: &'static str,
    pub hw_platform: u8,
    /// Controller run state (Startup / Ready / Alarm / Shutdown).
    pub state: MachineState,
    pub comm_mode: CommMode,
    pub(crate) primary_src: SourceId,
    pub(crate) secondary_src: SourceId,
    pub(crate) default_src: SourceId,
    pub(crate) in_buf: String,
    pub(crate) linelen: usize,
    pub(crate) saved_buf: String,
    pub(crate) hard_reset_requested: bool,
    pub(crate) bootloader_requested: bool,
    pub(crate) led_timer_ms: u64,
    pub(crate) cfg: ControllerCfg,
    magic_end: u16,
}

impl ControllerState {
    fn new(cfg: ControllerCfg, default_src: SourceId) -> Self {
        Self {
            magic_start: MAGIC,
            fw_build: FIRMWARE_BUILD,
            fw_version: FIRMWARE_VERSION,
            hw_platform: HARDWARE_PLATFORM,
            state: MachineState::Startup,
            comm_mode: CommMode::Text,
            primary_src: default_src,
            secondary_src: default_src,
            default_src,
            in_buf: String::with_capacity(cfg.input_buffer_len),
            linelen: 0,
            saved_buf: String::with_capacity(cfg.saved_line_len),
            hard_reset_requested: false,
            bootloader_requested: false,
            led_timer_ms: 0,
            cfg,
            magic_end: MAGIC,
        }
    }

    /// Saved copy of the last input line, kept for reporting.
    pub fn saved_line(&self) -> &str {
        &self.saved_buf
    }

    pub fn line_len(&self) -> usize {
        self.linelen
    }

    pub fn primary_source(&self) -> SourceId {
        self.primary_src
    }

    pub fn secondary_source(&self) -> SourceId {
        self.secondary_src
    }

    pub fn assert_integrity(&self) -> std::result::Result<(), Fault> {
        check(self.magic_start, self.magic_end, Fault::ControllerAssertion)
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_test(&mut self) {
        self.magic_end = 0xBEEF;
    }
}

/// The motion controller: owns its state block and the collaborator seams,
/// with one top-level owner at process startup.
pub struct Controller<M: Machine, P: Parsers, I: Io, B: Board> {
    pub(crate) state: ControllerState,
    pub(crate) machine: M,
    pub(crate) parsers: P,
    pub(crate) io: I,
    pub(crate) board: B,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
}

impl<M: Machine, P: Parsers, I: Io, B: Board> Controller<M, P, I, B> {
    pub fn try_new(
        cfg: ControllerCfg,
        default_src: SourceId,
        machine: M,
        parsers: P,
        io: I,
        board: B,
    ) -> Result<Self> {
        cfg.validate().map_err(eyre::Report::new)?;
        let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
        let epoch = clock.now();
        Ok(Self {
            state: ControllerState::new(cfg, default_src),
            machine,
            parsers,
            io,
            board,
            clock,
            epoch,
        })
    }

    /// Swap in a different clock (deterministic tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.epoch = clock.now();
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn parsers(&self) -> &P {
        &self.parsers
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn request_hard_reset(&mut self) {
        self.state.hard_reset_requested = true;
    }

    pub fn request_bootloader(&mut self) {
        self.state.bootloader_requested = true;
    }

    /// Reset the primary input to the default source.
    pub fn reset_source(&mut self) {
        self.state.primary_src = self.state.default_src;
    }

    pub fn set_primary_source(&mut self, src: SourceId) {
        self.state.primary_src = src;
    }

    pub fn set_secondary_source(&mut self, src: SourceId) {
        self.state.secondary_src = src;
    }

    /// One pass over the fixed priority list.
    ///
    /// Returns `Again` when a handler short-circuited the cycle, the fault
    /// when the assertions pass raised one, and `Ok` otherwise.
    pub fn cycle(&mut self) -> Status {
        // kernel-level handlers (flags are set in ISRs). Order is important.
        dispatch!(self.hard_reset_handler());
        dispatch!(self.bootloader_handler());
        dispatch!(self.shutdown_idler());
        dispatch!(self.limit_switch_handler());

        dispatch!(self.machine.feedhold_sequencing_callback());
        dispatch!(self.machine.plan_hold_callback());
        let st = self.system_assertions();
        if let Status::Fault(_) = st {
            return st;
        }

        // planner hierarchy for gcode and cycles
        dispatch!(self.machine.motor_power_callback());
        dispatch!(self.machine.status_report_callback());
        dispatch!(self.machine.queue_report_callback());
        dispatch!(self.machine.arc_callback());
        dispatch!(self.machine.homing_callback());
        dispatch!(self.machine.jogging_callback());
        dispatch!(self.machine.probe_callback());

        // command readers and parsers
        dispatch!(self.sync_to_planner());
        dispatch!(self.sync_to_tx_buffer());
        dispatch!(self.io.baud_rate_callback());
        dispatch!(self.command_dispatch());
        dispatch!(self.normal_idler());
        Status::Ok
    }

    fn hard_reset_handler(&mut self) -> Status {
        if !self.state.hard_reset_requested {
            return Status::Noop;
        }
        tracing::warn!("hard reset requested");
        self.board.hard_reset();
        Status::Again
    }

    fn bootloader_handler(&mut self) -> Status {
        if !self.state.bootloader_requested {
            return Status::Noop;
        }
        tracing::warn!("bootloader requested");
        self.board.enter_bootloader();
        Status::Again
    }

    /// Blink rapidly and prevent further activity from occurring. Returns
    /// `Again` so the loop never advances beyond this point; the reset and
    /// bootloader handlers above still run, so a reset request can always
    /// be serviced.
    fn shutdown_idler(&mut self) -> Status {
        if self.machine.machine_state() != MachineState::Shutdown {
            return Status::Ok;
        }
        let now = self.clock.ms_since(self.epoch);
        if now > self.state.led_timer_ms {
            self.state.led_timer_ms = now + self.state.cfg.led_alarm_ms;
            self.board.led_toggle();
        }
        Status::Again
    }

    /// Blink the indicator LED slowly to show everything is OK.
    fn normal_idler(&mut self) -> Status {
        let now = self.clock.ms_since(self.epoch);
        if now > self.state.led_timer_ms {
            self.state.led_timer_ms = now + self.state.cfg.led_normal_ms;
            self.board.led_toggle();
        }
        Status::Ok
    }

    /// Shut down the system if a limit switch fired.
    fn limit_switch_handler(&mut self) -> Status {
        if self.machine.machine_state() == MachineState::Alarm {
            return Status::Noop;
        }
        if !self.board.limit_switch_thrown() {
            return Status::Noop;
        }
        self.state.state = MachineState::Alarm;
        self.machine.hard_alarm(Fault::LimitSwitchHit)
    }

    /// Check memory integrity and collaborator assertions.
    fn system_assertions(&mut self) -> Status {
        emergency!(self, self.state.assert_integrity());
        emergency!(self, self.machine.test_assertions());
        emergency!(self, self.parsers.test_assertions());
        emergency!(self, self.io.test_assertions());
        Status::Ok
    }

    /// Ensure there is planner headroom before the parser ingests a line.
    fn sync_to_planner(&self) -> Status {
        if self.machine.planner_buffers_available() < self.state.cfg.planner_headroom {
            return Status::Again;
        }
        Status::Ok
    }

    /// Pseudo-blocking sync with the TX buffer.
    fn sync_to_tx_buffer(&self) -> Status {
        if self.io.tx_backlog() >= self.state.cfg.tx_low_water {
            return Status::Again;
        }
        Status::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::QueuedInput;
    use crate::mocks::{NoopBoard, NoopMachine, NoopParsers};

    #[test]
    fn corrupted_state_block_raises_a_hard_alarm() {
        let mut ctl = Controller::try_new(
            ControllerCfg::default(),
            SourceId(0),
            NoopMachine::default(),
            NoopParsers::default(),
            QueuedInput::new(Vec::<String>::new()),
            NoopBoard::default(),
        )
        .unwrap();
        assert_eq!(ctl.cycle(), Status::Ok);

        ctl.state.corrupt_for_test();
        assert_eq!(
            ctl.cycle(),
            Status::Fault(Fault::ControllerAssertion),
            "sentinel mismatch must surface as a fault"
        );
        assert_eq!(ctl.state.state, MachineState::Alarm);
    }
}
