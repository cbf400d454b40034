use crate::payload::PayloadError;

/// Errors that can occur in port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] rotorlink_transport::TransportError),

    /// Frame-level error, including `Busy` and `NoData`.
    #[error("frame error: {0}")]
    Frame(#[from] rotorlink_frame::FrameError),

    /// A packet's payload did not match its declared type.
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    /// Report divisor must be at least 1.
    #[error("report divisor must be at least 1")]
    InvalidDivisor,

    /// The polling thread could not be started.
    #[error("failed to spawn polling thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The polling thread panicked.
    #[error("polling thread panicked")]
    ThreadPanicked,
}

impl PortError {
    /// True when a packet was received but could not be used.
    pub fn is_invalid_data(&self) -> bool {
        match self {
            Self::Frame(err) => err.is_invalid_data(),
            Self::Payload(_) => true,
            _ => false,
        }
    }

    /// True when the outbound channel is still busy with a previous packet.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Frame(rotorlink_frame::FrameError::Busy))
    }
}

pub type Result<T> = std::result::Result<T, PortError>;
