//! Priority-order and short-circuit behavior of the HSM dispatcher.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gantry_core::input::QueuedInput;
use gantry_core::mocks::NoopParsers;
use gantry_core::{Controller, ControllerCfg};
use gantry_traits::clock::test_clock::TestClock;
use gantry_traits::{Board, Fault, Io, Machine, MachineState, SourceId, Status};
use rstest::rstest;

/// Machine spy: observable state, steerable planner headroom, recorded
/// alarms and requests.
#[derive(Clone)]
struct SpyMachine {
    state: Arc<std::sync::Mutex<MachineState>>,
    buffers: Arc<AtomicUsize>,
    alarms: Arc<std::sync::Mutex<Vec<Fault>>>,
    feedholds: Arc<AtomicUsize>,
    flushes: Arc<AtomicUsize>,
    cycle_starts: Arc<AtomicUsize>,
    homing_calls: Arc<AtomicUsize>,
    assertion_fault: Arc<std::sync::Mutex<Option<Fault>>>,
}

impl SpyMachine {
    fn new(state: MachineState) -> Self {
        Self {
            state: Arc::new(std::sync::Mutex::new(state)),
            buffers: Arc::new(AtomicUsize::new(28)),
            alarms: Arc::new(std::sync::Mutex::new(Vec::new())),
            feedholds: Arc::new(AtomicUsize::new(0)),
            flushes: Arc::new(AtomicUsize::new(0)),
            cycle_starts: Arc::new(AtomicUsize::new(0)),
            homing_calls: Arc::new(AtomicUsize::new(0)),
            assertion_fault: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    fn alarms(&self) -> Vec<Fault> {
        self.alarms.lock().unwrap().clone()
    }
}

impl Machine for SpyMachine {
    fn machine_state(&self) -> MachineState {
        *self.state.lock().unwrap()
    }

    fn hard_alarm(&mut self, fault: Fault) -> Status {
        *self.state.lock().unwrap() = MachineState::Alarm;
        self.alarms.lock().unwrap().push(fault);
        Status::Fault(fault)
    }

    fn request_feedhold(&mut self) {
        self.feedholds.fetch_add(1, Ordering::Relaxed);
    }
    fn request_queue_flush(&mut self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }
    fn request_cycle_start(&mut self) {
        self.cycle_starts.fetch_add(1, Ordering::Relaxed);
    }

    fn homing_callback(&mut self) -> Status {
        self.homing_calls.fetch_add(1, Ordering::Relaxed);
        Status::Noop
    }

    fn planner_buffers_available(&self) -> usize {
        self.buffers.load(Ordering::Relaxed)
    }

    fn test_assertions(&self) -> Result<(), Fault> {
        match *self.assertion_fault.lock().unwrap() {
            Some(f) => Err(f),
            None => Ok(()),
        }
    }
}

/// Io spy wrapping QueuedInput, counting read attempts.
struct SpyIo {
    inner: QueuedInput,
    reads: Arc<AtomicUsize>,
    tx_backlog: usize,
}

impl SpyIo {
    fn new(lines: Vec<&str>) -> Self {
        Self {
            inner: QueuedInput::new(lines).keep_open(),
            reads: Arc::new(AtomicUsize::new(0)),
            tx_backlog: 0,
        }
    }
}

impl Io for SpyIo {
    fn read_line(&mut self, src: SourceId, buf: &mut String, max_len: usize) -> Status {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.inner.read_line(src, buf, max_len)
    }

    fn tx_backlog(&self) -> usize {
        self.tx_backlog
    }
}

#[derive(Default)]
struct LedBoard {
    limit: Arc<AtomicBool>,
    toggles: usize,
}

impl Board for LedBoard {
    fn led_on(&mut self) {}
    fn led_off(&mut self) {}
    fn led_toggle(&mut self) {
        self.toggles += 1;
    }
    fn limit_switch_thrown(&self) -> bool {
        self.limit.load(Ordering::Relaxed)
    }
    fn hard_reset(&mut self) {}
    fn enter_bootloader(&mut self) {}
}

fn controller(
    machine: SpyMachine,
    io: SpyIo,
    board: LedBoard,
) -> Controller<SpyMachine, NoopParsers, SpyIo, LedBoard> {
    Controller::try_new(
        ControllerCfg::default(),
        SourceId(0),
        machine,
        NoopParsers,
        io,
        board,
    )
    .expect("controller build")
}

#[test]
fn shutdown_idler_starves_everything_below_it() {
    let machine = SpyMachine::new(MachineState::Shutdown);
    let io = SpyIo::new(vec!["G0 X1"]);
    let reads = Arc::clone(&io.reads);
    let clock = TestClock::new();
    let mut ctl =
        controller(machine, io, LedBoard::default()).with_clock(Arc::new(clock.clone()));

    for _ in 0..5 {
        assert_eq!(ctl.cycle(), Status::Again);
        clock.advance(Duration::from_millis(150));
    }
    // the command dispatcher never ran
    assert_eq!(reads.load(Ordering::Relaxed), 0);
    // LED blinked at the alarm rate
    assert!(ctl.board().toggles >= 4, "expected alarm-rate blinking");
}

#[test]
fn reset_requests_are_serviced_even_in_shutdown() {
    let machine = SpyMachine::new(MachineState::Shutdown);
    let io = SpyIo::new(vec![]);
    let mut ctl = controller(machine, io, LedBoard::default());

    ctl.request_hard_reset();
    assert_eq!(ctl.cycle(), Status::Again);
    // the reset handler outranks the shutdown idler
    assert_eq!(ctl.board().toggles, 0, "idler must not have run");
}

#[test]
fn limit_switch_raises_one_hard_alarm_then_noops() {
    let machine = SpyMachine::new(MachineState::Ready);
    let io = SpyIo::new(vec![]);
    let board = LedBoard::default();
    board.limit.store(true, Ordering::Relaxed);
    let mut ctl = controller(machine.clone(), io, board);

    ctl.cycle();
    assert_eq!(machine.alarms(), vec![Fault::LimitSwitchHit]);

    // machine is in Alarm now: the handler answers Noop, no second alarm
    ctl.cycle();
    ctl.cycle();
    assert_eq!(machine.alarms().len(), 1);
}

#[rstest]
#[case(0)]
#[case(3)]
fn planner_backpressure_blocks_the_command_dispatcher(#[case] free_buffers: usize) {
    let machine = SpyMachine::new(MachineState::Ready);
    machine.buffers.store(free_buffers, Ordering::Relaxed);
    let io = SpyIo::new(vec!["G1 X10"]);
    let reads = Arc::clone(&io.reads);
    let mut ctl = controller(machine.clone(), io, LedBoard::default());

    // below the default headroom of 4: EAGAIN before the reader runs
    assert_eq!(ctl.cycle(), Status::Again);
    assert_eq!(reads.load(Ordering::Relaxed), 0);

    // headroom restored: the queued line is consumed
    machine.buffers.store(8, Ordering::Relaxed);
    assert_eq!(ctl.cycle(), Status::Ok);
    assert_eq!(reads.load(Ordering::Relaxed), 1);
}

#[test]
fn tx_backlog_blocks_the_command_dispatcher() {
    let machine = SpyMachine::new(MachineState::Ready);
    let mut io = SpyIo::new(vec!["G1 X10"]);
    io.tx_backlog = 64; // at the low-water mark
    let reads = Arc::clone(&io.reads);
    let mut ctl = controller(machine, io, LedBoard::default());

    assert_eq!(ctl.cycle(), Status::Again);
    assert_eq!(reads.load(Ordering::Relaxed), 0);
}

#[test]
fn failed_machine_assertion_is_an_emergency() {
    let machine = SpyMachine::new(MachineState::Ready);
    *machine.assertion_fault.lock().unwrap() = Some(Fault::MachineAssertion);
    let io = SpyIo::new(vec!["G1 X10"]);
    let reads = Arc::clone(&io.reads);
    let homing = Arc::clone(&machine.homing_calls);
    let mut ctl = controller(machine.clone(), io, LedBoard::default());

    assert_eq!(ctl.cycle(), Status::Fault(Fault::MachineAssertion));
    assert_eq!(machine.alarms(), vec![Fault::MachineAssertion]);
    // nothing below the assertions pass ran
    assert_eq!(homing.load(Ordering::Relaxed), 0);
    assert_eq!(reads.load(Ordering::Relaxed), 0);
}

#[test]
fn idle_cycle_reaches_the_command_dispatcher() {
    let machine = SpyMachine::new(MachineState::Ready);
    let io = SpyIo::new(vec![]);
    let reads = Arc::clone(&io.reads);
    let homing = Arc::clone(&machine.homing_calls);
    let mut ctl = controller(machine, io, LedBoard::default());

    // empty-but-open input: the dispatcher blocks in the reader
    assert_eq!(ctl.cycle(), Status::Again);
    assert_eq!(homing.load(Ordering::Relaxed), 1);
    assert_eq!(reads.load(Ordering::Relaxed), 1);
}
