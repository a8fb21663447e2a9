//! Status vocabulary shared by every cooperatively scheduled handler.

use thiserror::Error;

/// Return value of a single handler invocation.
///
/// `Again` is reserved for the dispatcher's priority short-circuit: the
/// handler is not finished and no lower-priority handler may run this cycle.
/// Faults fall through like any other completed status; latching them is the
/// machine's job, not the dispatcher's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Success; no more work this cycle.
    Ok,
    /// Success; there was nothing to do.
    Noop,
    /// Not finished; call again on the next cycle.
    Again,
    /// Input source exhausted.
    Eof,
    /// Operational or integrity fault.
    Fault(Fault),
}

impl Status {
    /// True for Ok and Noop.
    pub fn is_success(self) -> bool {
        matches!(self, Status::Ok | Status::Noop)
    }
}

/// Operational and integrity faults surfaced through the status path.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("controller memory integrity check failed")]
    ControllerAssertion,
    #[error("machine assertion failed")]
    MachineAssertion,
    #[error("parser assertion failed")]
    ParserAssertion,
    #[error("i/o assertion failed")]
    IoAssertion,
    #[error("thermal block integrity check failed")]
    ThermalAssertion,
    #[error("limit switch hit")]
    LimitSwitchHit,
    #[error("thermocouple reads as disconnected")]
    SensorDisconnected,
    #[error("no power to thermocouple amplifier")]
    SensorNoPower,
    #[error("sensor samples exceeded the variance budget")]
    SensorBadReadings,
    #[error("heater failed to leave ambient before the timeout")]
    AmbientTimedOut,
    #[error("heater failed to reach the setpoint before the timeout")]
    RegulationTimedOut,
    #[error("heater over temperature")]
    Overheat,
}

/// Machine run states as observed by the controller. The controller owns
/// Startup/Ready/Alarm/Shutdown; Cycle belongs to the motion machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MachineState {
    #[default]
    Startup,
    Ready,
    Cycle,
    Alarm,
    Shutdown,
}

/// Identifier of an input device (serial port, file device, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceId(pub u8);
