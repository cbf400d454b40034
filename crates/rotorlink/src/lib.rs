//! Quadrotor sensor/command link.
//!
//! rotorlink moves fixed-size sensor, command, and parameter records between
//! a ground station, a flight controller, and its I/O board over byte links
//! with no flow control.
//!
//! # Crate Structure
//!
//! - [`transport`]: Physical byte links (Unix domain sockets, socket pairs)
//! - [`frame`]: Checksummed packet envelope, link framer, packet channels
//! - [`port`]: Packet dispatcher, shared records, telemetry senders
//! - [`estimate`]: Altitude Kalman filter and pre-filters

/// Re-export transport types.
pub mod transport {
    pub use rotorlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rotorlink_frame::*;
}

/// Re-export port types.
pub mod port {
    pub use rotorlink_port::*;
}

/// Re-export estimation types.
pub mod estimate {
    pub use rotorlink_estimate::*;
}
