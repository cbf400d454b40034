/// Errors that can occur while framing, sending, or receiving packets.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A packet did not start with two mark bytes.
    #[error("invalid packet mark 0x{found:02X} (expected 0xFF)")]
    InvalidMark { found: u8 },

    /// The buffer ends before the header or the declared payload does.
    #[error("packet truncated ({available} bytes, need {needed})")]
    Truncated { needed: usize, available: usize },

    /// The payload does not fit in a link endpoint's buffer.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The trailing checksum does not match the packet content.
    #[error("checksum mismatch (computed 0x{expected:04X}, received 0x{found:04X})")]
    Checksum { expected: u16, found: u16 },

    /// No complete packet is available yet. Not fatal; try again later.
    #[error("no packet available")]
    NoData,

    /// An outbound packet is still being transmitted.
    #[error("transmission already pending")]
    Busy,

    /// An I/O error occurred while reading or writing the link.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed.
    #[error("link closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True for malformed frames: bad marks, bad lengths, truncation.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::InvalidMark { .. } | Self::Truncated { .. } | Self::PayloadTooLarge { .. }
        )
    }

    /// True when a packet arrived but failed checksum or shape validation.
    pub fn is_invalid_data(&self) -> bool {
        matches!(self, Self::Checksum { .. }) || self.is_framing()
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
