use rotorlink_frame::FrameConfig;

use crate::thread::ThreadConfig;

/// Settings for one ground-link port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub frame: FrameConfig,
    /// Send one of every `report_divisor` ground reports.
    pub report_divisor: u32,
    pub thread: ThreadConfig,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            report_divisor: 1,
            thread: ThreadConfig::default(),
        }
    }
}
