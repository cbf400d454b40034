use std::num::NonZeroU32;

use rotorlink_frame::{Packet, PacketSink, PacketType};
use tracing::trace;

use crate::error::{PortError, Result};
use crate::payload::{
    CommandData, GroundReport, MotorSignals, Payload, SensorData, StateAndMode, TraceData,
};

/// Outbound half of the port: telemetry from the board to the ground.
///
/// Every send fails with a `Busy` frame error while the previous packet is
/// still going out; callers retry on their next cycle.
#[derive(Debug)]
pub struct PortSender<S> {
    sink: S,
    report_divisor: NonZeroU32,
    countdown: u32,
}

impl<S: PacketSink> PortSender<S> {
    /// A sender that emits every ground report.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            report_divisor: NonZeroU32::MIN,
            countdown: 1,
        }
    }

    /// Emit one of every `divisor` ground reports.
    ///
    /// Restarts the countdown: the `divisor`-th following call to
    /// [`send_report`](Self::send_report) is the next one to emit.
    pub fn set_report_divisor(&mut self, divisor: u32) -> Result<()> {
        let divisor = NonZeroU32::new(divisor).ok_or(PortError::InvalidDivisor)?;
        self.report_divisor = divisor;
        self.countdown = divisor.get();
        Ok(())
    }

    pub fn report_divisor(&self) -> u32 {
        self.report_divisor.get()
    }

    pub fn send_sensor_data(&mut self, data: &SensorData) -> Result<()> {
        self.send_record(PacketType::SensorData, data)
    }

    pub fn send_motor_signals(&mut self, signals: &MotorSignals) -> Result<()> {
        self.send_record(PacketType::MotorSignals, signals)
    }

    pub fn send_motor_offsets(&mut self, offsets: &CommandData) -> Result<()> {
        self.send_record(PacketType::MotorOffsets, offsets)
    }

    pub fn send_state_and_mode(&mut self, state: StateAndMode) -> Result<()> {
        self.send_record(PacketType::StateMode, &state)
    }

    pub fn send_trace_data(&mut self, data: &TraceData) -> Result<()> {
        self.send_record(PacketType::TraceData, data)
    }

    /// Rate-limited aggregated report.
    ///
    /// Returns `Ok(true)` if this call emitted a packet and `Ok(false)` if
    /// it was skipped by the divisor.
    pub fn send_report(&mut self, report: &GroundReport) -> Result<bool> {
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return Ok(false);
        }
        self.countdown = self.report_divisor.get();
        self.send_record(PacketType::GroundReport, report)?;
        Ok(true)
    }

    /// Relay a packet unmodified.
    pub fn forward(&mut self, packet: &Packet) -> Result<()> {
        self.sink.send(packet.packet_type, packet.payload.as_ref())?;
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    fn send_record<P: Payload>(&mut self, packet_type: PacketType, record: &P) -> Result<()> {
        let payload = record.encode();
        trace!(%packet_type, len = payload.len(), "sending record");
        self.sink.send(packet_type, &payload)?;
        Ok(())
    }
}

/// The sender side also works as a relay target for a dispatcher.
impl<S: PacketSink> PacketSink for PortSender<S> {
    fn send(&mut self, packet_type: PacketType, payload: &[u8]) -> rotorlink_frame::Result<()> {
        self.sink.send(packet_type, payload)
    }
}
