//! Packet channels: the endpoint abstraction the port dispatcher works over.
//!
//! A channel can be a host byte stream ([`StreamChannel`]) or an embedded
//! framer fed from its transfer interrupt ([`FramerChannel`]).

use std::io::Write;
use std::time::Duration;

use rotorlink_transport::{LinkStream, PhysicalChannel};
use tracing::{debug, trace};

use crate::codec::{FrameConfig, Packet};
use crate::error::{FrameError, Result};
use crate::framer::SharedFramer;
use crate::packet_type::PacketType;
use crate::reader::{transport_to_frame_error, PacketReader};
use crate::writer::PacketWriter;

/// Receiving half of a packet channel.
pub trait PacketSource {
    /// Take the next received packet.
    ///
    /// Returns [`FrameError::NoData`] when nothing complete is waiting.
    fn receive(&mut self) -> Result<Packet>;

    /// Wait until a packet may be available. `None` waits forever.
    fn poll(&mut self, timeout: Option<Duration>) -> Result<bool>;
}

/// Sending half of a packet channel.
pub trait PacketSink {
    /// Frame and send one payload.
    ///
    /// Returns [`FrameError::Busy`] while a previous packet is still on
    /// its way out.
    fn send(&mut self, packet_type: PacketType, payload: &[u8]) -> Result<()>;
}

/// Both halves of a packet channel.
pub trait PacketChannel: PacketSource + PacketSink {}

impl<T: PacketSource + PacketSink> PacketChannel for T {}

impl<S: PacketSink + ?Sized> PacketSink for &mut S {
    fn send(&mut self, packet_type: PacketType, payload: &[u8]) -> Result<()> {
        (**self).send(packet_type, payload)
    }
}

impl<S: PacketSource + ?Sized> PacketSource for &mut S {
    fn receive(&mut self) -> Result<Packet> {
        (**self).receive()
    }

    fn poll(&mut self, timeout: Option<Duration>) -> Result<bool> {
        (**self).poll(timeout)
    }
}

/// Packet channel over a connected [`LinkStream`].
#[derive(Debug)]
pub struct StreamChannel {
    reader: PacketReader<LinkStream>,
    writer: PacketWriter<LinkStream>,
}

impl StreamChannel {
    /// Open a channel on `stream`, configured by `config`.
    pub fn open(stream: LinkStream, config: FrameConfig) -> Result<Self> {
        let write_half = stream.try_clone().map_err(transport_to_frame_error)?;
        Ok(Self {
            reader: PacketReader::with_config_link(stream, &config)?,
            writer: PacketWriter::with_config_link(write_half, &config)?,
        })
    }

    /// Try to finish a partially written packet.
    pub fn flush_pending(&mut self) -> Result<bool> {
        self.writer.flush_pending()
    }

    /// True while an outbound packet is only partly written.
    pub fn is_sending(&self) -> bool {
        self.writer.is_pending()
    }

    /// Borrow the underlying stream.
    pub fn stream(&self) -> &LinkStream {
        self.reader.get_ref()
    }

    /// Split into independently owned receive and send halves.
    pub fn into_split(self) -> (PacketReader<LinkStream>, PacketWriter<LinkStream>) {
        (self.reader, self.writer)
    }
}

impl PacketSource for StreamChannel {
    fn receive(&mut self) -> Result<Packet> {
        self.reader.receive()
    }

    fn poll(&mut self, timeout: Option<Duration>) -> Result<bool> {
        self.reader.poll(timeout)
    }
}

impl PacketSink for StreamChannel {
    fn send(&mut self, packet_type: PacketType, payload: &[u8]) -> Result<()> {
        self.writer.send(packet_type, payload)
    }
}

impl PacketSource for PacketReader<LinkStream> {
    fn receive(&mut self) -> Result<Packet> {
        self.read_packet()
    }

    fn poll(&mut self, timeout: Option<Duration>) -> Result<bool> {
        if self.has_buffered() {
            return Ok(true);
        }
        self.get_ref()
            .poll_readable(timeout)
            .map_err(transport_to_frame_error)
    }
}

impl<T: Write> PacketSink for PacketWriter<T> {
    fn send(&mut self, packet_type: PacketType, payload: &[u8]) -> Result<()> {
        PacketWriter::send(self, packet_type, payload)
    }
}

/// Packet channel over an interrupt-driven [`SharedFramer`].
#[derive(Debug, Clone, Default)]
pub struct FramerChannel {
    framer: SharedFramer,
}

impl FramerChannel {
    pub fn new(framer: SharedFramer) -> Self {
        Self { framer }
    }

    /// The framer this channel reads from and queues into.
    pub fn framer(&self) -> &SharedFramer {
        &self.framer
    }
}

impl PacketSource for FramerChannel {
    fn receive(&mut self) -> Result<Packet> {
        self.framer
            .with(|framer| framer.take_packet())
            .ok_or(FrameError::NoData)
    }

    fn poll(&mut self, timeout: Option<Duration>) -> Result<bool> {
        Ok(self.framer.wait_for_data(timeout))
    }
}

impl PacketSink for FramerChannel {
    fn send(&mut self, packet_type: PacketType, payload: &[u8]) -> Result<()> {
        self.framer.with(|framer| framer.queue(packet_type, payload))
    }
}

/// Drive `framer` from a full-duplex byte link.
///
/// Each received byte is one transfer: it is handed to the framer and the
/// framer's outgoing byte is written back. Returns how many transfers ran
/// before the link had nothing more to read.
pub fn service_transfers<P: PhysicalChannel + ?Sized>(
    link: &mut P,
    framer: &SharedFramer,
) -> Result<usize> {
    let mut transfers = 0;
    let mut byte = [0u8; 1];
    loop {
        match link.receive(&mut byte) {
            Ok(0) => {
                if transfers == 0 {
                    return Err(FrameError::ConnectionClosed);
                }
                break;
            }
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                break
            }
            Err(err) => return Err(FrameError::Io(err)),
        }

        let reply = framer.on_transfer(byte[0]);
        trace!(rx = byte[0], tx = reply, "transfer");
        link.send(&[reply])?;
        transfers += 1;
    }

    if transfers > 0 {
        debug!(transfers, "serviced link transfers");
    }
    Ok(transfers)
}
