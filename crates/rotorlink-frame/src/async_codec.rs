use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

use crate::codec::{encode_packet, Packet};
use crate::error::FrameError;
use crate::framer::{DropReason, Receiver, RxEvent};

/// `tokio_util` codec for checksummed packets.
///
/// Decoding runs the same receive state machine as [`crate::PacketReader`],
/// except that frames failing their checksum are logged and skipped rather
/// than ending the stream.
#[derive(Debug, Clone, Default)]
pub struct PacketCodec {
    rx: Receiver,
}

impl PacketCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, FrameError> {
        while src.has_remaining() {
            let byte = src.get_u8();
            match self.rx.push(byte) {
                RxEvent::Pending => {}
                RxEvent::Complete => return Ok(self.rx.take_packet()),
                RxEvent::Dropped(reason @ DropReason::Checksum { .. }) => {
                    warn!(?reason, "skipping corrupt packet");
                }
                RxEvent::Dropped(reason) => debug!(?reason, "discarding malformed frame"),
            }
        }
        Ok(None)
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_packet(item.packet_type, item.payload.as_ref(), dst)
    }
}

impl<'a> Encoder<&'a Packet> for PacketCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &'a Packet, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_packet(item.packet_type, item.payload.as_ref(), dst)
    }
}
