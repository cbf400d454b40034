//! Ground-link port for the flight controller.
//!
//! [`PortDispatcher`] receives packets from the ground station and routes
//! them by type into shared records that the control loop reads through a
//! [`PortHandle`]. [`PortSender`] carries telemetry the other way. The
//! dispatcher normally runs on its own polling thread
//! ([`spawn_port_thread`]).

pub mod config;
pub mod control;
pub mod dispatcher;
pub mod error;
pub mod fresh;
pub mod handle;
pub mod payload;
pub mod sender;
pub mod thread;

#[cfg(unix)]
pub mod connector;
#[cfg(unix)]
pub mod listener;

pub use config::PortConfig;
#[cfg(unix)]
pub use connector::{connect, split_port};
pub use control::ControlMessage;
pub use dispatcher::{Dispatched, NoRelay, PortDispatcher, PortStats};
pub use error::{PortError, Result};
pub use fresh::Fresh;
pub use handle::{PortHandle, PortState};
#[cfg(unix)]
pub use listener::PortListener;
pub use payload::{
    CommandData, CtrlParams, GroundReport, MotorSignals, Payload, PayloadError, Record,
    SensorData, StateAndMode, TraceData,
};
pub use sender::PortSender;
pub use thread::{spawn_port_thread, PortThread, SchedPolicy, ThreadConfig};
