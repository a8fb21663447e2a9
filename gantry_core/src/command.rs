//! Command dispatch: read one line from the active input source and route it
//! by its first character.
//!
//! Accepts commands only when the planner has room (the sync handlers sit
//! just above this one in the priority list). Manages cutback to the
//! default source on EOF, and is responsible for responses and flow
//! control. The communication mode is sticky: it is set by the most recent
//! admin or JSON trigger and stays until the opposite trigger is seen.

use crate::controller::Controller;
use crate::util::truncate_str;
use gantry_traits::{Board, Io, Machine, MachineState, Parsers, Status};

/// Response mode, set implicitly by input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommMode {
    #[default]
    Text,
    Json,
}

/// Bytes reserved for the `{"gc":"..."}` wrapping characters.
const JSON_WRAP_RESERVE: usize = 8;

impl<M: Machine, P: Parsers, I: Io, B: Board> Controller<M, P, I, B> {
    /// Read and execute the next command. Returns `Again` while the line is
    /// incomplete, `Eof` after source cutback, `Ok` once a line has been
    /// dispatched.
    pub(crate) fn command_dispatch(&mut self) -> Status {
        self.state.in_buf.clear();
        let max = self.state.cfg.input_buffer_len;
        match self
            .io
            .read_line(self.state.primary_src, &mut self.state.in_buf, max)
        {
            Status::Ok => {}
            Status::Eof => {
                // EOF can come from file devices only
                match self.state.comm_mode {
                    CommMode::Text => self.parsers.end_of_file_notice(),
                    CommMode::Json => self.parsers.report_exception(Status::Eof),
                }
                self.reset_source();
                return Status::Eof;
            }
            other => return other,
        }

        let line = self
            .state
            .in_buf
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.state.linelen = line.len() + 1;
        self.state.saved_buf.clear();
        self.state
            .saved_buf
            .push_str(truncate_str(&line, self.state.cfg.saved_line_len));

        match line.chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('!') => self.machine.request_feedhold(),
            Some('%') => self.machine.request_queue_flush(),
            Some('~') => self.machine.request_cycle_start(),

            // blank line (just a CR)
            None => {
                if self.state.comm_mode != CommMode::Json {
                    self.parsers.text_response(Status::Ok, &self.state.saved_buf);
                }
            }

            // text mode input
            Some('$') | Some('?') | Some('H') => {
                self.state.comm_mode = CommMode::Text;
                let st = self.parsers.text_parser(&line);
                self.parsers.text_response(st, &self.state.saved_buf);
            }

            // JSON input
            Some('{') => {
                self.state.comm_mode = CommMode::Json;
                self.parsers.json_parser(&line);
            }

            // anything else must be Gcode
            _ => {
                if self.state.comm_mode == CommMode::Json {
                    let payload = truncate_str(&line, max.saturating_sub(JSON_WRAP_RESERVE));
                    let wrapped = format!("{{\"gc\":\"{payload}\"}}");
                    self.parsers.json_parser(&wrapped);
                } else {
                    let st = self.parsers.gcode_parser(&line);
                    self.parsers.text_response(st, &self.state.saved_buf);
                }
            }
        }

        if self.state.state == MachineState::Startup {
            self.state.state = MachineState::Ready;
        }
        Status::Ok
    }
}
