use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use rotorlink_transport::LinkStream;
use tracing::trace;

use crate::codec::{encode_packet, FrameConfig, Packet, BUFFER_CAPACITY};
use crate::error::{FrameError, Result};
use crate::packet_type::PacketType;
use crate::reader::transport_to_frame_error;

/// Writes checksummed packets to any `Write` stream.
///
/// At most one packet is in flight. If the stream only accepts part of a
/// packet, the rest stays pending and the next [`send`](Self::send) fails
/// with [`FrameError::Busy`] unless the remainder can be written first.
pub struct PacketWriter<T> {
    inner: T,
    buf: BytesMut,
    offset: usize,
}

impl<T: Write> PacketWriter<T> {
    /// Create a new packet writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(BUFFER_CAPACITY),
            offset: 0,
        }
    }

    /// Write a complete packet.
    pub fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        self.send(packet.packet_type, packet.payload.as_ref())
    }

    /// Encode and send a payload.
    pub fn send(&mut self, packet_type: PacketType, payload: &[u8]) -> Result<()> {
        if !self.flush_pending()? {
            return Err(FrameError::Busy);
        }

        self.buf.clear();
        self.offset = 0;
        encode_packet(packet_type, payload, &mut self.buf)?;
        trace!(%packet_type, len = payload.len(), "sending packet");

        self.flush_pending()?;
        Ok(())
    }

    /// Try to finish the in-flight packet.
    ///
    /// Returns `Ok(true)` once nothing is pending and `Ok(false)` if the
    /// stream would block before the packet is fully written.
    pub fn flush_pending(&mut self) -> Result<bool> {
        while self.offset < self.buf.len() {
            match self.inner.write(&self.buf[self.offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => self.offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        if !self.buf.is_empty() {
            self.buf.clear();
            self.offset = 0;
            // Every byte has been handed over; a flush that would block
            // does not make the packet pending again.
            match self.flush() {
                Ok(()) | Err(FrameError::Busy) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }

    /// True while part of a packet is waiting to be written.
    pub fn is_pending(&self) -> bool {
        self.offset < self.buf.len()
    }

    /// Flush the underlying stream.
    ///
    /// Returns [`FrameError::Busy`] if the stream would block.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Err(FrameError::Busy),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Write> std::fmt::Debug for PacketWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketWriter")
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}

impl PacketWriter<LinkStream> {
    /// Create a packet writer for a `LinkStream`, applying the write timeout
    /// from `config` when the link is left blocking.
    pub fn with_config_link(inner: LinkStream, config: &FrameConfig) -> Result<Self> {
        if !config.nonblocking {
            inner
                .set_write_timeout(config.write_timeout)
                .map_err(transport_to_frame_error)?;
        }
        Ok(Self::new(inner))
    }
}
