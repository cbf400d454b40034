use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::packet_type::PacketType;

/// Sentinel byte; every packet starts with two of them.
pub const MARK: u8 = 0xFF;

/// Packet header: mark (1) + mark (1) + type (1) + length (1) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Trailing big-endian checksum.
pub const CHECKSUM_SIZE: usize = 2;

/// Bytes a packet adds around its payload.
pub const OVERHEAD: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Receive buffer capacity of one link endpoint, in bytes.
pub const BUFFER_CAPACITY: usize = 128;

/// Largest payload a link endpoint can buffer.
pub const MAX_PAYLOAD: usize = BUFFER_CAPACITY - OVERHEAD;

/// A checksum-validated packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// What the payload encodes.
    pub packet_type: PacketType,
    /// The payload bytes.
    pub payload: Bytes,
}

impl Packet {
    /// Create a new packet.
    ///
    /// `packet_type` is stored in [`canonical`](PacketType::canonical) form,
    /// so a packet compares equal to its decoded copy.
    pub fn new(packet_type: PacketType, payload: impl Into<Bytes>) -> Self {
        Self {
            packet_type: packet_type.canonical(),
            payload: payload.into(),
        }
    }

    /// The total wire size of this packet.
    pub fn wire_size(&self) -> usize {
        OVERHEAD + self.payload.len()
    }

    /// The checksum this packet carries on the wire.
    ///
    /// Fails with [`FrameError::PayloadTooLarge`] for a payload that cannot
    /// be framed.
    pub fn checksum(&self) -> Result<u16> {
        let length = length_byte(&self.payload)?;
        Ok(checksum(self.packet_type.as_u8(), length, &self.payload))
    }
}

/// Additive checksum over type, length, and payload, modulo 2^16.
///
/// `length` is the length byte as it appears on the wire. This is a plain
/// sum, not a CRC. It is kept bit-for-bit because the I/O board firmware
/// computes the same thing.
pub fn checksum(packet_type: u8, length: u8, payload: &[u8]) -> u16 {
    let seed = u16::from(packet_type).wrapping_add(u16::from(length));
    payload
        .iter()
        .fold(seed, |sum, &byte| sum.wrapping_add(u16::from(byte)))
}

/// Encode a packet into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬──────┬──────────┬──────────┬─────────────────┬──────────────┐
/// │ 0xFF │ 0xFF │ Type (1) │ Len (1)  │ Payload (Len)   │ Checksum     │
/// │      │      │          │          │                 │ (2B BE)      │
/// └──────┴──────┴──────────┴──────────┴─────────────────┴──────────────┘
/// ```
pub fn encode_packet(packet_type: PacketType, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let length = length_byte(payload)?;
    dst.reserve(OVERHEAD + payload.len());
    dst.put_u8(MARK);
    dst.put_u8(MARK);
    dst.put_u8(packet_type.as_u8());
    dst.put_u8(length);
    dst.put_slice(payload);
    dst.put_u16(checksum(packet_type.as_u8(), length, payload));
    Ok(())
}

/// Encode a packet into a fixed buffer without allocating.
///
/// Returns the number of bytes written.
pub fn encode_to_slice(packet_type: PacketType, payload: &[u8], dst: &mut [u8]) -> Result<usize> {
    let length = length_byte(payload)?;
    let total = OVERHEAD + payload.len();
    if dst.len() < total {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: dst.len().saturating_sub(OVERHEAD),
        });
    }

    let sum = checksum(packet_type.as_u8(), length, payload);
    dst[0] = MARK;
    dst[1] = MARK;
    dst[2] = packet_type.as_u8();
    dst[3] = length;
    dst[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);
    dst[total - 2..total].copy_from_slice(&sum.to_be_bytes());
    Ok(total)
}

/// Decode one packet from the start of `src`.
///
/// Bytes after the checksum are ignored. This is the pure inverse of
/// [`encode_packet`]; streams go through [`crate::framer::Receiver`].
pub fn decode_packet(src: &[u8]) -> Result<Packet> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::Truncated {
            needed: HEADER_SIZE,
            available: src.len(),
        });
    }

    if let Some(&found) = src[..2].iter().find(|&&b| b != MARK) {
        return Err(FrameError::InvalidMark { found });
    }

    let len = usize::from(src[3]);
    let total = OVERHEAD + len;
    if src.len() < total {
        return Err(FrameError::Truncated {
            needed: total,
            available: src.len(),
        });
    }

    validate(&src[2..total])?;

    Ok(Packet {
        packet_type: PacketType::from(src[2]),
        payload: Bytes::copy_from_slice(&src[HEADER_SIZE..HEADER_SIZE + len]),
    })
}

/// Check the region from `type` through the checksum.
pub(crate) fn validate(region: &[u8]) -> Result<()> {
    let split = region.len() - CHECKSUM_SIZE;
    let (body, trailer) = region.split_at(split);
    let found = u16::from_be_bytes([trailer[0], trailer[1]]);
    let expected = checksum(body[0], body[1], &body[2..]);
    if found != expected {
        return Err(FrameError::Checksum { expected, found });
    }
    Ok(())
}

/// The wire length byte for `payload`, if it fits in one frame.
fn length_byte(payload: &[u8]) -> Result<u8> {
    match u8::try_from(payload.len()) {
        Ok(length) if usize::from(length) <= MAX_PAYLOAD => Ok(length),
        _ => Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        }),
    }
}

/// Configuration for packet streams on the host side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Put the link into non-blocking mode so an empty link reads as
    /// [`FrameError::NoData`] instead of blocking. Default: true.
    pub nonblocking: bool,
    /// Read timeout for blocking links.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking links.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            nonblocking: true,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = [0x00, 0x64, 0xFF, 0x9C];

        encode_packet(PacketType::CommandData, &payload, &mut buf).unwrap();
        assert_eq!(buf.len(), OVERHEAD + payload.len());

        let packet = decode_packet(&buf).unwrap();
        assert_eq!(packet.packet_type, PacketType::CommandData);
        assert_eq!(packet.payload.as_ref(), payload);
    }

    #[test]
    fn wire_layout() {
        let mut buf = BytesMut::new();
        encode_packet(PacketType::TestMode, &[0x01], &mut buf).unwrap();

        // 0x0D + 0x01 + 0x01
        assert_eq!(buf.as_ref(), &[0xFF, 0xFF, 0x0D, 0x01, 0x01, 0x00, 0x0F]);
    }

    #[test]
    fn checksum_is_big_endian() {
        let payload = vec![0xFF; MAX_PAYLOAD];
        let expected = (0x06u32 + MAX_PAYLOAD as u32 + 0xFF * MAX_PAYLOAD as u32) % 65536;
        assert_eq!(u32::from(checksum(0x06, MAX_PAYLOAD as u8, &payload)), expected);

        let mut buf = BytesMut::new();
        encode_packet(PacketType::TraceData, &payload, &mut buf).unwrap();
        let tail = &buf[buf.len() - 2..];
        assert_eq!(u16::from_be_bytes([tail[0], tail[1]]) as u32, expected);
    }

    #[test]
    fn empty_payload() {
        let mut buf = BytesMut::new();
        encode_packet(PacketType::ShutDown, &[], &mut buf).unwrap();

        let packet = decode_packet(&buf).unwrap();
        assert_eq!(packet.packet_type, PacketType::ShutDown);
        assert!(packet.payload.is_empty());
        assert_eq!(packet.wire_size(), OVERHEAD);
    }

    #[test]
    fn decode_short_header() {
        let result = decode_packet(&[0xFF, 0xFF, 0x01]);
        assert!(matches!(
            result,
            Err(FrameError::Truncated { needed: HEADER_SIZE, available: 3 })
        ));
    }

    #[test]
    fn decode_length_overruns_buffer() {
        let mut buf = BytesMut::new();
        encode_packet(PacketType::SensorData, b"abcdef", &mut buf).unwrap();
        let result = decode_packet(&buf[..buf.len() - 3]);
        assert!(matches!(result, Err(FrameError::Truncated { .. })));
    }

    #[test]
    fn decode_invalid_mark() {
        let result = decode_packet(&[0xFF, 0x00, 0x01, 0x00, 0x00, 0x01]);
        assert!(matches!(result, Err(FrameError::InvalidMark { found: 0x00 })));
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let mut buf = BytesMut::new();
        encode_packet(PacketType::YawParams, b"kp", &mut buf).unwrap();
        buf.extend_from_slice(&[0xAA, 0xBB]);

        let packet = decode_packet(&buf).unwrap();
        assert_eq!(packet.payload.as_ref(), b"kp");
    }

    #[test]
    fn every_single_bit_flip_is_caught() {
        let payload = [0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut clean = BytesMut::new();
        encode_packet(PacketType::AltitudeParams, &payload, &mut clean).unwrap();

        // payload and checksum region
        for index in HEADER_SIZE..clean.len() {
            for bit in 0..8 {
                let mut corrupted = clean.to_vec();
                corrupted[index] ^= 1 << bit;
                let result = decode_packet(&corrupted);
                assert!(
                    matches!(result, Err(FrameError::Checksum { .. })),
                    "flip of byte {index} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn oversized_payload_rejected() {
        let mut buf = BytesMut::new();
        let result = encode_packet(PacketType::Other(0x40), &[0u8; MAX_PAYLOAD + 1], &mut buf);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { size, max: MAX_PAYLOAD }) if size == MAX_PAYLOAD + 1
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn slice_encoding_matches_buffered_encoding() {
        let mut expected = BytesMut::new();
        encode_packet(PacketType::MotorSignals, b"\x01\x02\x03", &mut expected).unwrap();

        let mut slice = [0u8; BUFFER_CAPACITY];
        let written = encode_to_slice(PacketType::MotorSignals, b"\x01\x02\x03", &mut slice).unwrap();
        assert_eq!(&slice[..written], expected.as_ref());
    }

    #[test]
    fn packet_checksum_accessor() {
        let packet = Packet::new(PacketType::IdleLimit, Bytes::from_static(&[0x01, 0x2C]));
        assert_eq!(
            packet.checksum().expect("small payload should have a checksum"),
            0x0C + 0x02 + 0x01 + 0x2C
        );
        assert_eq!(packet.wire_size(), OVERHEAD + 2);
    }

    #[test]
    fn new_packet_matches_its_decoded_copy() {
        let packet = Packet::new(PacketType::Other(0x07), Bytes::from_static(&[0; 8]));
        assert_eq!(packet.packet_type, PacketType::CommandData);

        let mut buf = BytesMut::new();
        encode_packet(packet.packet_type, &packet.payload, &mut buf).unwrap();
        assert_eq!(decode_packet(&buf).unwrap(), packet);
    }

    #[test]
    fn checksum_uses_the_wire_length_byte() {
        // 256 payload bytes would wrap to a zero length byte.
        let payload = [0u8; 256];
        assert_eq!(checksum(0x01, 0, &payload), 0x01);
        assert_ne!(checksum(0x01, 0, &payload), checksum(0x01, 1, &payload));

        let oversized = Packet::new(PacketType::SensorData, Bytes::from(vec![0u8; 256]));
        assert!(matches!(
            oversized.checksum(),
            Err(FrameError::PayloadTooLarge { size: 256, max: MAX_PAYLOAD })
        ));
    }
}
