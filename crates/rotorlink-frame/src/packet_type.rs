//! Packet type identifiers.
//!
//! The byte values are part of the wire format shared with the I/O board and
//! the ground terminal. Unknown values are not an error: they are carried as
//! [`PacketType::Other`] and relayed downstream unmodified.

use num_enum::{FromPrimitive, IntoPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum PacketType {
    // Board -> ground telemetry
    SensorData = 0x01,
    MotorSignals = 0x02,
    MotorOffsets = 0x03,
    StateMode = 0x04,
    GroundReport = 0x05,
    TraceData = 0x06,

    // Ground -> board commands and parameter groups
    CommandData = 0x07,
    RollPitchParams = 0x08,
    YawParams = 0x09,
    AltitudeParams = 0x0A,
    XyParams = 0x0B,

    // Ground -> board control
    IdleLimit = 0x0C,
    TestMode = 0x0D,
    SwitchMode = 0x0E,
    ShutDown = 0x0F,

    /// A value with no assigned meaning. Built by hand around an assigned
    /// value it is still that type on the wire; [`canonical`](Self::canonical)
    /// maps it back.
    #[num_enum(catch_all)]
    Other(u8),
}

impl PacketType {
    /// Wire value of this type.
    pub fn as_u8(self) -> u8 {
        self.into()
    }

    /// The variant a receiver decodes this type's wire value as.
    pub fn canonical(self) -> Self {
        Self::from(self.as_u8())
    }

    /// Stable label for logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            Self::SensorData => "SENSOR_DATA",
            Self::MotorSignals => "MOTOR_SIGNALS",
            Self::MotorOffsets => "MOTOR_OFFSETS",
            Self::StateMode => "STATE_MODE",
            Self::GroundReport => "GROUND_REPORT",
            Self::TraceData => "TRACE_DATA",
            Self::CommandData => "COMMAND_DATA",
            Self::RollPitchParams => "R_P_PARAMS",
            Self::YawParams => "YAW_PARAMS",
            Self::AltitudeParams => "ALT_PARAMS",
            Self::XyParams => "X_Y_PARAMS",
            Self::IdleLimit => "IDLE_LIMIT",
            Self::TestMode => "TEST_MODE",
            Self::SwitchMode => "SWITCH_MODE",
            Self::ShutDown => "SHUT_DOWN",
            Self::Other(_) => "OTHER",
        }
    }

    /// Look a type up by its [`name`](Self::name), case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::KNOWN
            .iter()
            .copied()
            .find(|ty| ty.name().eq_ignore_ascii_case(name))
    }

    /// Controller parameter groups.
    pub fn is_param_group(self) -> bool {
        matches!(
            self,
            Self::RollPitchParams | Self::YawParams | Self::AltitudeParams | Self::XyParams
        )
    }

    /// Control types carry at most a small fixed field.
    pub fn is_control(self) -> bool {
        matches!(
            self,
            Self::IdleLimit | Self::TestMode | Self::SwitchMode | Self::ShutDown
        )
    }

    /// All named types, in wire order.
    pub const KNOWN: [PacketType; 15] = [
        Self::SensorData,
        Self::MotorSignals,
        Self::MotorOffsets,
        Self::StateMode,
        Self::GroundReport,
        Self::TraceData,
        Self::CommandData,
        Self::RollPitchParams,
        Self::YawParams,
        Self::AltitudeParams,
        Self::XyParams,
        Self::IdleLimit,
        Self::TestMode,
        Self::SwitchMode,
        Self::ShutDown,
    ];
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(value) => write!(f, "OTHER(0x{value:02X})"),
            known => f.write_str(known.name()),
        }
    }
}
