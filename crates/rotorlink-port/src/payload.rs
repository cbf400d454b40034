//! Fixed-size big-endian payload records.
//!
//! Every multi-byte field is a signed 16-bit integer sent high byte first.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rotorlink_frame::PacketType;
use serde::{Deserialize, Serialize};

/// Errors decoding a payload into a record.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// The payload length does not match the record size.
    #[error("{record} payload must be {expected} bytes, got {found}")]
    Size {
        record: &'static str,
        expected: usize,
        found: usize,
    },

    /// The packet type does not carry the requested record.
    #[error("packet type {0} has no {1} payload")]
    UnexpectedType(PacketType, &'static str),
}

/// A record with a fixed wire size.
pub trait Payload: Sized {
    /// Record name used in errors.
    const NAME: &'static str;

    /// Encoded size in bytes.
    const SIZE: usize;

    fn put(&self, buf: &mut impl BufMut);

    /// Read the record from exactly `SIZE` bytes.
    fn get(buf: &mut impl Buf) -> Self;

    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.put(&mut buf);
        buf.freeze()
    }

    fn decode(mut payload: &[u8]) -> Result<Self, PayloadError> {
        if payload.len() != Self::SIZE {
            return Err(PayloadError::Size {
                record: Self::NAME,
                expected: Self::SIZE,
                found: payload.len(),
            });
        }
        Ok(Self::get(&mut payload))
    }
}

macro_rules! i16_record {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($field:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            $(pub $field: i16,)+
        }

        impl Payload for $name {
            const NAME: &'static str = $label;
            const SIZE: usize = [$(stringify!($field)),+].len() * 2;

            fn put(&self, buf: &mut impl BufMut) {
                $(buf.put_i16(self.$field);)+
            }

            fn get(buf: &mut impl Buf) -> Self {
                Self {
                    $($field: buf.get_i16(),)+
                }
            }
        }
    };
}

i16_record! {
    /// Attitude and altitude set-points from the ground station. The same
    /// layout carries the motor offsets.
    CommandData, "command data" { roll, pitch, yaw, z }
}

i16_record! {
    /// Gains for one control loop.
    CtrlParams, "control parameters" { kp, ki, kd, kdd }
}

i16_record! {
    MotorSignals, "motor signals" { front, right, rear, left, id }
}

i16_record! {
    /// Attitude, rates, accelerations, position and velocity, battery level.
    SensorData, "sensor data" {
        roll, pitch, yaw,
        droll, dpitch, dyaw,
        ddx, ddy, ddz,
        x, y, z,
        dx, dy, dz,
        battery, id,
    }
}

i16_record! {
    /// Altitude controller trace for offline tuning.
    TraceData, "trace data" {
        z, filtered_z, estimated_z, estimated_dz,
        ddz, filtered_ddz,
        p_term, i_term, d_term, dd_term,
        uz, cmd_z, id,
    }
}

/// Controller state and flight mode, one byte each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndMode {
    pub state: u8,
    pub mode: u8,
}

impl Payload for StateAndMode {
    const NAME: &'static str = "state and mode";
    const SIZE: usize = 2;

    fn put(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.state);
        buf.put_u8(self.mode);
    }

    fn get(buf: &mut impl Buf) -> Self {
        Self {
            state: buf.get_u8(),
            mode: buf.get_u8(),
        }
    }
}

/// Aggregated report relayed to the ground station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundReport {
    pub sensors: SensorData,
    pub signals: MotorSignals,
    pub offsets: CommandData,
    pub state: StateAndMode,
}

impl Payload for GroundReport {
    const NAME: &'static str = "ground report";
    const SIZE: usize = SensorData::SIZE + MotorSignals::SIZE + CommandData::SIZE + StateAndMode::SIZE;

    fn put(&self, buf: &mut impl BufMut) {
        self.sensors.put(buf);
        self.signals.put(buf);
        self.offsets.put(buf);
        self.state.put(buf);
    }

    fn get(buf: &mut impl Buf) -> Self {
        Self {
            sensors: SensorData::get(buf),
            signals: MotorSignals::get(buf),
            offsets: CommandData::get(buf),
            state: StateAndMode::get(buf),
        }
    }
}

/// Any decoded record, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Command(CommandData),
    Params(CtrlParams),
    Motors(MotorSignals),
    Sensors(SensorData),
    State(StateAndMode),
    Report(GroundReport),
    Trace(TraceData),
}

impl Record {
    /// Decode the record carried by `packet_type`.
    ///
    /// Returns `Ok(None)` for types without a fixed record (control and
    /// forwarded packets).
    pub fn decode(packet_type: PacketType, payload: &[u8]) -> Result<Option<Self>, PayloadError> {
        let record = match packet_type {
            PacketType::CommandData | PacketType::MotorOffsets => {
                Self::Command(CommandData::decode(payload)?)
            }
            PacketType::RollPitchParams
            | PacketType::YawParams
            | PacketType::AltitudeParams
            | PacketType::XyParams => Self::Params(CtrlParams::decode(payload)?),
            PacketType::MotorSignals => Self::Motors(MotorSignals::decode(payload)?),
            PacketType::SensorData => Self::Sensors(SensorData::decode(payload)?),
            PacketType::StateMode => Self::State(StateAndMode::decode(payload)?),
            PacketType::GroundReport => Self::Report(GroundReport::decode(payload)?),
            PacketType::TraceData => Self::Trace(TraceData::decode(payload)?),
            _ => return Ok(None),
        };
        Ok(Some(record))
    }

    pub fn encode(&self) -> Bytes {
        match self {
            Self::Command(r) => r.encode(),
            Self::Params(r) => r.encode(),
            Self::Motors(r) => r.encode(),
            Self::Sensors(r) => r.encode(),
            Self::State(r) => r.encode(),
            Self::Report(r) => r.encode(),
            Self::Trace(r) => r.encode(),
        }
    }
}
