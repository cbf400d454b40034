//! Physical channel for the rotorlink sensor/command link.
//!
//! The link is a plain full-duplex byte stream with no flow control. On the
//! host this is a Unix domain socket (or a connected socket pair standing in
//! for a serial line); everything above it recovers packets from raw bytes.
//!
//! This is the lowest layer of rotorlink. Everything else builds on top of
//! the [`LinkStream`] type and the [`PhysicalChannel`] trait provided here.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use traits::{LinkStream, PhysicalChannel};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
