use bytes::Bytes;
use rotorlink_frame::{Packet, PacketType};
use serde::Serialize;

use crate::payload::PayloadError;

/// Control requests from the ground station.
///
/// These update a scalar or flag directly instead of a full record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "control", content = "value", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Base motor speed while idling.
    IdleLimit(i16),
    TestMode(bool),
    /// Request to switch flight mode; consumed once.
    SwitchMode,
    ShutDown,
}

impl ControlMessage {
    /// Parse a control packet.
    pub fn from_packet(packet: &Packet) -> Result<Self, PayloadError> {
        let payload = packet.payload.as_ref();
        match packet.packet_type.canonical() {
            PacketType::IdleLimit => match payload {
                [hi, lo] => Ok(Self::IdleLimit(i16::from_be_bytes([*hi, *lo]))),
                _ => Err(size_error("idle limit", 2, payload.len())),
            },
            PacketType::TestMode => match payload {
                [flag] => Ok(Self::TestMode(*flag != 0)),
                _ => Err(size_error("test mode", 1, payload.len())),
            },
            PacketType::SwitchMode => Ok(Self::SwitchMode),
            PacketType::ShutDown => Ok(Self::ShutDown),
            other => Err(PayloadError::UnexpectedType(other, "control")),
        }
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::IdleLimit(_) => PacketType::IdleLimit,
            Self::TestMode(_) => PacketType::TestMode,
            Self::SwitchMode => PacketType::SwitchMode,
            Self::ShutDown => PacketType::ShutDown,
        }
    }

    pub fn to_payload(&self) -> Bytes {
        match self {
            Self::IdleLimit(limit) => Bytes::copy_from_slice(&limit.to_be_bytes()),
            Self::TestMode(on) => Bytes::copy_from_slice(&[u8::from(*on)]),
            Self::SwitchMode | Self::ShutDown => Bytes::new(),
        }
    }

    pub fn to_packet(&self) -> Packet {
        Packet::new(self.packet_type(), self.to_payload())
    }
}

fn size_error(record: &'static str, expected: usize, found: usize) -> PayloadError {
    PayloadError::Size {
        record,
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_limit_is_signed_big_endian() {
        let packet = Packet::new(PacketType::IdleLimit, vec![0xFFu8, 0x38]);
        assert_eq!(
            ControlMessage::from_packet(&packet).unwrap(),
            ControlMessage::IdleLimit(-200)
        );
        assert_eq!(
            ControlMessage::IdleLimit(-200).to_payload().as_ref(),
            &[0xFF, 0x38]
        );
    }

    #[test]
    fn test_mode_flag_is_any_non_zero() {
        for (byte, on) in [(0u8, false), (1, true), (0x80, true)] {
            let packet = Packet::new(PacketType::TestMode, vec![byte]);
            assert_eq!(
                ControlMessage::from_packet(&packet).unwrap(),
                ControlMessage::TestMode(on)
            );
        }
    }

    #[test]
    fn flag_requests_ignore_payload() {
        let packet = Packet::new(PacketType::ShutDown, vec![9u8]);
        assert_eq!(
            ControlMessage::from_packet(&packet).unwrap(),
            ControlMessage::ShutDown
        );
        assert!(ControlMessage::SwitchMode.to_payload().is_empty());
    }

    #[test]
    fn short_payload_rejected() {
        let packet = Packet::new(PacketType::IdleLimit, vec![1u8]);
        assert!(matches!(
            ControlMessage::from_packet(&packet),
            Err(PayloadError::Size { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn non_control_type_rejected() {
        let packet = Packet::new(PacketType::CommandData, vec![0u8; 8]);
        assert!(matches!(
            ControlMessage::from_packet(&packet),
            Err(PayloadError::UnexpectedType(PacketType::CommandData, _))
        ));
    }

    #[test]
    fn to_packet_round_trips() {
        for message in [
            ControlMessage::IdleLimit(350),
            ControlMessage::TestMode(true),
            ControlMessage::SwitchMode,
            ControlMessage::ShutDown,
        ] {
            assert_eq!(ControlMessage::from_packet(&message.to_packet()).unwrap(), message);
        }
    }
}
