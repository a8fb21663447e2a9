pub mod clock;
pub mod status;

pub use clock::{Clock, MonotonicClock};
pub use status::{Fault, MachineState, SourceId, Status};

use std::error::Error;

/// Analog-to-digital converter channel reader.
pub trait Adc {
    fn read(&mut self, channel: u8) -> Result<u16, Box<dyn Error + Send + Sync>>;
}

/// PWM output driving the heater element.
///
/// Duty cycle is a percentage in [0, 100]; 0 holds the output low, 100 holds
/// it high. Implementations clamp the frequency to their resolution window.
pub trait Pwm {
    fn on(&mut self, freq_hz: f64, duty_pct: f64) -> Result<(), Box<dyn Error + Send + Sync>>;
    fn off(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;
    fn set_freq(&mut self, freq_hz: f64) -> Result<(), Box<dyn Error + Send + Sync>>;
    fn set_duty(&mut self, duty_pct: f64) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Board-level odds and ends: indicator LED, limit switch input, and the two
/// escape hatches the dispatcher must always be able to service.
pub trait Board {
    fn led_on(&mut self);
    fn led_off(&mut self);
    fn led_toggle(&mut self);
    /// True while any limit switch input is active.
    fn limit_switch_thrown(&self) -> bool;
    /// Reset the system. May not return on real hardware.
    fn hard_reset(&mut self);
    /// Jump to the bootloader. May not return on real hardware.
    fn enter_bootloader(&mut self);
}

/// The canonical motion machine and its planner, consumed through a narrow
/// surface. Continuations default to Noop so partial implementations stay
/// honest about what they run.
pub trait Machine {
    fn machine_state(&self) -> MachineState;

    /// Latch an alarm for `fault`. Returns the status the caller should
    /// propagate (conventionally `Status::Fault(fault)`).
    fn hard_alarm(&mut self, fault: Fault) -> Status;

    fn request_feedhold(&mut self);
    fn request_queue_flush(&mut self);
    fn request_cycle_start(&mut self);

    fn feedhold_sequencing_callback(&mut self) -> Status {
        Status::Noop
    }
    fn plan_hold_callback(&mut self) -> Status {
        Status::Noop
    }
    fn motor_power_callback(&mut self) -> Status {
        Status::Noop
    }
    fn status_report_callback(&mut self) -> Status {
        Status::Noop
    }
    fn queue_report_callback(&mut self) -> Status {
        Status::Noop
    }
    fn arc_callback(&mut self) -> Status {
        Status::Noop
    }
    fn homing_callback(&mut self) -> Status {
        Status::Noop
    }
    fn jogging_callback(&mut self) -> Status {
        Status::Noop
    }
    fn probe_callback(&mut self) -> Status {
        Status::Noop
    }

    /// Free slots in the planner queue.
    fn planner_buffers_available(&self) -> usize;

    /// Aggregated planner/stepper/encoder integrity assertions.
    fn test_assertions(&self) -> Result<(), Fault> {
        Ok(())
    }
}

/// Command parsers and response emitters.
pub trait Parsers {
    fn text_parser(&mut self, line: &str) -> Status;
    fn json_parser(&mut self, line: &str) -> Status;
    fn gcode_parser(&mut self, line: &str) -> Status;

    /// Emit a text-mode response for `status` to the line that produced it.
    fn text_response(&mut self, status: Status, line: &str);
    /// Text-mode end-of-file notice (stderr on the console implementation).
    fn end_of_file_notice(&mut self);
    /// JSON-mode structured exception report.
    fn report_exception(&mut self, status: Status);

    fn test_assertions(&self) -> Result<(), Fault> {
        Ok(())
    }
}

/// Non-blocking line-oriented I/O, xio style.
pub trait Io {
    /// Read one complete line from `src` into `buf` (up to `max_len` bytes).
    /// Returns `Ok` when a full line is in `buf`, `Again` while the line is
    /// still being assembled, `Eof` when the source is exhausted.
    fn read_line(&mut self, src: SourceId, buf: &mut String, max_len: usize) -> Status;

    /// Bytes queued in the transmit direction.
    fn tx_backlog(&self) -> usize {
        0
    }

    /// Deferred baud-rate update, run only once TX has drained.
    fn baud_rate_callback(&mut self) -> Status {
        Status::Noop
    }

    fn test_assertions(&self) -> Result<(), Fault> {
        Ok(())
    }
}
