use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use rotorlink_transport::LinkStream;
use tracing::{debug, warn};

use crate::codec::{FrameConfig, Packet};
use crate::error::{FrameError, Result};
use crate::framer::{DropReason, Receiver, RxEvent};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 256;

/// Reads checksummed packets from any `Read` stream.
///
/// This is the host-side software framer: bytes go through the same
/// [`Receiver`] state machine the embedded side runs from its interrupt, so
/// line noise and partial frames are skipped and the reader resynchronises
/// on the next pair of mark bytes.
pub struct PacketReader<T> {
    inner: T,
    rx: Receiver,
    pending: BytesMut,
}

impl<T: Read> PacketReader<T> {
    /// Create a new packet reader.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            rx: Receiver::new(),
            pending: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Read the next complete packet.
    ///
    /// On a non-blocking stream (or after a read timeout) this returns
    /// [`FrameError::NoData`] once the stream has nothing more to give.
    /// A frame that fails its checksum is reported as
    /// [`FrameError::Checksum`]; malformed headers are skipped silently.
    /// Returns [`FrameError::ConnectionClosed`] at EOF.
    pub fn read_packet(&mut self) -> Result<Packet> {
        loop {
            if let Some(packet) = self.drain_pending()? {
                return Ok(packet);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(FrameError::NoData)
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.pending.extend_from_slice(&chunk[..read]);
        }
    }

    /// True when bytes are buffered that have not been through the framer.
    pub fn has_buffered(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn drain_pending(&mut self) -> Result<Option<Packet>> {
        while self.pending.has_remaining() {
            match self.rx.push(self.pending.get_u8()) {
                RxEvent::Pending => {}
                RxEvent::Complete => return Ok(self.rx.take_packet()),
                RxEvent::Dropped(DropReason::Checksum { expected, found }) => {
                    warn!(expected, found, "dropping packet with bad checksum");
                    return Err(FrameError::Checksum { expected, found });
                }
                RxEvent::Dropped(reason) => debug!(?reason, "discarding malformed frame"),
            }
        }
        Ok(None)
    }
}

impl<T: Read> std::fmt::Debug for PacketReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketReader")
            .field("buffered", &self.has_buffered())
            .finish_non_exhaustive()
    }
}

impl PacketReader<LinkStream> {
    /// Create a packet reader for a `LinkStream`, applying the link settings
    /// from `config`.
    pub fn with_config_link(inner: LinkStream, config: &FrameConfig) -> Result<Self> {
        if config.nonblocking {
            inner.set_nonblocking(true).map_err(transport_to_frame_error)?;
        } else {
            inner
                .set_read_timeout(config.read_timeout)
                .map_err(transport_to_frame_error)?;
        }
        Ok(Self::new(inner))
    }
}

pub(crate) fn transport_to_frame_error(err: rotorlink_transport::TransportError) -> FrameError {
    match err {
        rotorlink_transport::TransportError::Io(io)
        | rotorlink_transport::TransportError::Accept(io) => FrameError::Io(io),
        rotorlink_transport::TransportError::Bind { source, .. }
        | rotorlink_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        rotorlink_transport::TransportError::Shutdown => FrameError::ConnectionClosed,
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
