//! Default collaborator implementations for the CLI.
//!
//! The real motion machine, planner and parsers are external subsystems;
//! these stand-ins satisfy the seams so the dispatcher can be driven from a
//! terminal: requests are logged, G-code is acknowledged, JSON is echoed in
//! a minimal response envelope.

use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gantry_core::input::LineSource;
use gantry_traits::{Fault, Io, Machine, MachineState, Parsers, SourceId, Status};

/// A machine with no motion subsystem attached: continuations are idle,
/// planner headroom is always available, alarms latch.
pub struct IdleMachine {
    state: MachineState,
}

impl Default for IdleMachine {
    fn default() -> Self {
        Self {
            state: MachineState::Ready,
        }
    }
}

impl Machine for IdleMachine {
    fn machine_state(&self) -> MachineState {
        self.state
    }

    fn hard_alarm(&mut self, fault: Fault) -> Status {
        self.state = MachineState::Alarm;
        tracing::error!(%fault, "hard alarm");
        Status::Fault(fault)
    }

    fn request_feedhold(&mut self) {
        tracing::info!("feedhold requested");
    }

    fn request_queue_flush(&mut self) {
        tracing::info!("queue flush requested");
    }

    fn request_cycle_start(&mut self) {
        tracing::info!("cycle start requested");
    }

    fn planner_buffers_available(&self) -> usize {
        28
    }
}

/// Terminal-facing parsers: text responses in the classic prompt style,
/// JSON in a minimal response envelope.
#[derive(Default)]
pub struct ConsoleParsers;

impl Parsers for ConsoleParsers {
    fn text_parser(&mut self, line: &str) -> Status {
        tracing::debug!(line, "text command");
        Status::Ok
    }

    fn json_parser(&mut self, line: &str) -> Status {
        tracing::debug!(line, "json command");
        println!("{{\"r\":{{}},\"f\":[0,0,0]}}");
        Status::Ok
    }

    fn gcode_parser(&mut self, line: &str) -> Status {
        tracing::debug!(line, "gcode");
        // a bare sanity check; the real parser is an external subsystem
        match line.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => Status::Ok,
            _ => Status::Noop,
        }
    }

    fn text_response(&mut self, status: Status, line: &str) {
        match status {
            Status::Ok | Status::Noop => println!("ok> {line}"),
            other => println!("err ({other:?})> {line}"),
        }
    }

    fn end_of_file_notice(&mut self) {
        eprintln!("End of command file");
    }

    fn report_exception(&mut self, status: Status) {
        println!("{{\"er\":{{\"st\":\"{status:?}\"}}}}");
    }
}

/// stdin-backed line I/O. stdout never backs up on a terminal, so the TX
/// backlog is always zero here.
pub struct StdioHost {
    source: LineSource,
    eof: Arc<AtomicBool>,
}

impl StdioHost {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let eof = Arc::new(AtomicBool::new(false));
        (
            Self {
                source: LineSource::spawn(BufReader::new(std::io::stdin())),
                eof: Arc::clone(&eof),
            },
            eof,
        )
    }
}

impl Io for StdioHost {
    fn read_line(&mut self, src: SourceId, buf: &mut String, max_len: usize) -> Status {
        let status = self.source.read_line(src, buf, max_len);
        if status == Status::Eof {
            self.eof.store(true, Ordering::Relaxed);
        }
        status
    }
}
