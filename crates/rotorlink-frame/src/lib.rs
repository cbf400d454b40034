//! Checksummed packet framing for the quadrotor sensor/command link.
//!
//! Every packet on the wire is:
//! - two `0xFF` mark bytes for resynchronisation
//! - a 1-byte packet type and a 1-byte payload length
//! - the payload (at most [`MAX_PAYLOAD`] bytes)
//! - a 2-byte big-endian checksum: type + length + every payload byte
//!
//! The embedded side frames bytes from its transfer interrupt
//! ([`LinkFramer`]); host tools frame a byte stream ([`PacketReader`] and
//! [`PacketWriter`]). Both sit behind the [`PacketChannel`] traits.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod channel;
pub mod codec;
pub mod error;
pub mod framer;
pub mod packet_type;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::PacketCodec;
pub use channel::{
    service_transfers, FramerChannel, PacketChannel, PacketSink, PacketSource, StreamChannel,
};
pub use codec::{
    checksum, decode_packet, encode_packet, encode_to_slice, FrameConfig, Packet, BUFFER_CAPACITY,
    CHECKSUM_SIZE, HEADER_SIZE, MARK, MAX_PAYLOAD, OVERHEAD,
};
pub use error::{FrameError, Result};
pub use framer::{
    DropReason, FramerStats, LinkFramer, Receiver, RxEvent, RxState, SharedFramer, IDLE_FILLER,
};
pub use packet_type::PacketType;
pub use reader::PacketReader;
pub use writer::PacketWriter;
