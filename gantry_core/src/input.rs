//! Non-blocking line input.
//!
//! `LineSource` turns any blocking `BufRead` into the xio-style contract the
//! command dispatcher needs: a background thread assembles lines into a
//! bounded channel and `try_line()` never blocks. Dropping the sender end
//! signals EOF.

use std::collections::VecDeque;
use std::io::BufRead;

use crossbeam_channel as xch;

use crate::util::truncate_str;
use gantry_traits::{Io, SourceId, Status};

/// Outcome of a non-blocking line poll.
#[derive(Debug)]
pub enum LineRead {
    Line(String),
    Pending,
    Eof,
}

pub struct LineSource {
    rx: xch::Receiver<String>,
}

impl LineSource {
    pub fn spawn<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = xch::bounded(8);
        std::thread::spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "line read failed");
                        break;
                    }
                }
            }
            // tx drops here; the receiver sees Disconnected = EOF
        });
        Self { rx }
    }

    pub fn try_line(&self) -> LineRead {
        match self.rx.try_recv() {
            Ok(l) => LineRead::Line(l),
            Err(xch::TryRecvError::Empty) => LineRead::Pending,
            Err(xch::TryRecvError::Disconnected) => LineRead::Eof,
        }
    }
}

impl Io for LineSource {
    fn read_line(&mut self, _src: SourceId, buf: &mut String, max_len: usize) -> Status {
        match self.try_line() {
            LineRead::Line(l) => {
                buf.clear();
                buf.push_str(truncate_str(&l, max_len));
                Status::Ok
            }
            LineRead::Pending => Status::Again,
            LineRead::Eof => Status::Eof,
        }
    }
}

/// Scripted input for tests and demos: yields its queued lines in order,
/// then reports EOF (or keeps pending when `keep_open`).
pub struct QueuedInput {
    lines: VecDeque<String>,
    keep_open: bool,
    tx_backlog: usize,
}

impl QueuedInput {
    pub fn new<T, S>(lines: T) -> Self
    where
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            keep_open: false,
            tx_backlog: 0,
        }
    }

    /// Report Pending instead of EOF once the queue drains.
    pub fn keep_open(mut self) -> Self {
        self.keep_open = true;
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
    }

    /// Pretend the transmit buffer holds this many bytes.
    pub fn set_tx_backlog(&mut self, bytes: usize) {
        self.tx_backlog = bytes;
    }
}

impl Io for QueuedInput {
    fn read_line(&mut self, _src: SourceId, buf: &mut String, max_len: usize) -> Status {
        match self.lines.pop_front() {
            Some(l) => {
                buf.clear();
                buf.push_str(truncate_str(&l, max_len));
                Status::Ok
            }
            None if self.keep_open => Status::Again,
            None => Status::Eof,
        }
    }

    fn tx_backlog(&self) -> usize {
        self.tx_backlog
    }
}
