#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Control core for a small CNC / 3D-printer firmware stack
//! (hardware-agnostic).
//!
//! Two cooperatively scheduled loops live here. All hardware interactions go
//! through the `gantry_traits` seams.
//!
//! ## Architecture
//!
//! - **Motion dispatcher**: a fixed, priority-ordered handler list
//!   (`controller` module). A handler returning `Again` short-circuits the
//!   cycle; everything else falls through.
//! - **Command dispatch**: non-blocking line read, first-character routing,
//!   sticky text/JSON comm modes (`command` module)
//! - **Thermal loop**: 10 ms tick cascade driving sensor sampling and the
//!   100 ms heater supervisor with PID actuation (`thermal`, `sensor`,
//!   `pid`, `heater` modules)
//! - **Integrity**: magic sentinels around every long-lived state block;
//!   a sentinel mismatch raises a hard alarm from the dispatcher
//!
//! There are no user threads inside the core itself: handlers are
//! continuations, each callable in bounded time. The only thread spawned
//! here is the tick producer / line reader pair, which touch nothing but an
//! atomic flag and a bounded channel.

// A handler that is not finished returns to the dispatcher parent, which
// restarts at the top of the list on the next cycle. Anything other than
// Again drops through to the next handler.
macro_rules! dispatch {
    ($e:expr) => {
        if matches!($e, gantry_traits::Status::Again) {
            return gantry_traits::Status::Again;
        }
    };
}

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod heater;
pub mod hw_error;
pub mod input;
mod integrity;
pub mod mocks;
pub mod pid;
pub mod sensor;
pub mod thermal;
pub mod util;

pub use command::CommMode;
pub use config::{ControllerCfg, HeaterCfg, PidCfg, SensorCfg, ThermalCfg};
pub use controller::{Controller, ControllerState};
pub use error::{BuildError, CoreError};
pub use heater::{Heater, HeaterCode, HeaterState};
pub use pid::{Pid, PidState};
pub use sensor::{Calibration, Sensor, SensorCode, SensorState, HOT_SENTINEL_C};
pub use thermal::{spawn_ticker, ThermalController, TickHandle, TICK_PERIOD};

pub use gantry_traits::{Fault, MachineState, SourceId, Status};
