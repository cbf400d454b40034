use std::sync::Arc;
use std::time::Duration;

use rotorlink_frame::{FrameError, Packet, PacketSink, PacketSource, PacketType};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::control::ControlMessage;
use crate::error::{PortError, Result};
use crate::fresh::Fresh;
use crate::handle::{PortHandle, PortShared, PortState};
use crate::payload::{CommandData, CtrlParams, Payload};

/// What [`PortDispatcher::dispatch`] did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A command or parameter record was stored and flagged new.
    Stored(PacketType),
    /// A control request updated the port state.
    Control(ControlMessage),
    /// Relayed unmodified downstream.
    Forwarded(PacketType),
    /// No relay is attached; the packet was dropped.
    Unrouted(PacketType),
}

/// Placeholder relay for a dispatcher without one.
#[derive(Debug, Clone, Copy)]
pub enum NoRelay {}

impl PacketSink for NoRelay {
    fn send(&mut self, _packet_type: PacketType, _payload: &[u8]) -> rotorlink_frame::Result<()> {
        match *self {}
    }
}

/// Counters kept by the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PortStats {
    pub stored: u64,
    pub control: u64,
    pub forwarded: u64,
    pub unrouted: u64,
    pub invalid: u64,
}

type Observer = Box<dyn FnMut(&Packet, &Dispatched) + Send>;

/// Receives packets from the ground link and routes them by type.
///
/// Parameter groups and command data are decoded into their records,
/// control packets update flags, and everything else is handed to the relay.
pub struct PortDispatcher<C, R = NoRelay> {
    channel: C,
    relay: Option<R>,
    shared: Arc<PortShared>,
    stats: PortStats,
    observer: Option<Observer>,
}

impl<C: PacketSource> PortDispatcher<C, NoRelay> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            relay: None,
            shared: PortShared::new(),
            stats: PortStats::default(),
            observer: None,
        }
    }
}

impl<C: PacketSource, R: PacketSink> PortDispatcher<C, R> {
    /// Attach the downstream relay for unrecognised packet types.
    pub fn with_relay<R2: PacketSink>(self, relay: R2) -> PortDispatcher<C, R2> {
        PortDispatcher {
            channel: self.channel,
            relay: Some(relay),
            shared: self.shared,
            stats: self.stats,
            observer: self.observer,
        }
    }

    /// Call `observer` after every successful dispatch.
    pub fn with_observer(
        mut self,
        observer: impl FnMut(&Packet, &Dispatched) + Send + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Handle for the control loop.
    pub fn handle(&self) -> PortHandle {
        PortHandle::new(Arc::clone(&self.shared))
    }

    pub fn stats(&self) -> PortStats {
        self.stats
    }

    /// Wait for the channel to become readable.
    pub fn poll(&mut self, timeout: Option<Duration>) -> Result<bool> {
        Ok(self.channel.poll(timeout)?)
    }

    /// One receive/dispatch cycle.
    ///
    /// Returns `Ok(None)` when no packet was waiting. Invalid data (a
    /// checksum failure or a payload of the wrong shape) is logged and
    /// returned as an error; nothing is stored for it.
    pub fn tick(&mut self) -> Result<Option<Dispatched>> {
        let packet = match self.channel.receive() {
            Ok(packet) => packet,
            Err(FrameError::NoData) => return Ok(None),
            Err(err) => {
                if err.is_invalid_data() {
                    self.stats.invalid += 1;
                    warn!(error = %err, "invalid data from ground link");
                }
                return Err(err.into());
            }
        };

        match self.dispatch(&packet) {
            Ok(dispatched) => Ok(Some(dispatched)),
            Err(err) => {
                if err.is_invalid_data() {
                    self.stats.invalid += 1;
                    warn!(packet_type = %packet.packet_type, error = %err, "dropping packet");
                }
                Err(err)
            }
        }
    }

    /// Route one packet.
    ///
    /// Payloads are decoded before the lock is taken, so a malformed packet
    /// leaves every record and flag as it was.
    pub fn dispatch(&mut self, packet: &Packet) -> Result<Dispatched> {
        let packet_type = packet.packet_type.canonical();
        let payload = packet.payload.as_ref();

        let dispatched = match packet_type {
            PacketType::CommandData => {
                let data = CommandData::decode(payload)?;
                self.shared.lock().command_data.store(data);
                Dispatched::Stored(packet_type)
            }
            PacketType::RollPitchParams => {
                self.store_params(packet_type, payload, |s| &mut s.roll_pitch_params)?
            }
            PacketType::YawParams => {
                self.store_params(packet_type, payload, |s| &mut s.yaw_params)?
            }
            PacketType::AltitudeParams => {
                self.store_params(packet_type, payload, |s| &mut s.altitude_params)?
            }
            PacketType::XyParams => {
                self.store_params(packet_type, payload, |s| &mut s.xy_params)?
            }
            t if t.is_control() => {
                let message = ControlMessage::from_packet(packet)?;
                self.shared.lock().apply_control(message);
                Dispatched::Control(message)
            }
            _ => match self.relay.as_mut() {
                Some(relay) => {
                    relay.send(packet_type, payload)?;
                    Dispatched::Forwarded(packet_type)
                }
                None => {
                    warn!(%packet_type, "no relay attached, dropping packet");
                    Dispatched::Unrouted(packet_type)
                }
            },
        };

        match dispatched {
            Dispatched::Stored(_) => self.stats.stored += 1,
            Dispatched::Control(_) => self.stats.control += 1,
            Dispatched::Forwarded(_) => self.stats.forwarded += 1,
            Dispatched::Unrouted(_) => self.stats.unrouted += 1,
        }
        debug!(%packet_type, ?dispatched, "dispatched packet");

        if let Some(observer) = self.observer.as_mut() {
            observer(packet, &dispatched);
        }
        Ok(dispatched)
    }

    /// Poll and dispatch until a stop is requested, a shutdown packet
    /// arrives, or the link closes.
    ///
    /// Invalid data and a busy relay are logged and do not end the loop.
    pub fn run(&mut self, poll_timeout: Option<Duration>) -> Result<()> {
        let handle = self.handle();
        while handle.is_running() && !handle.is_shut_down() {
            if !self.poll(poll_timeout)? {
                continue;
            }
            match self.tick() {
                Ok(_) => {}
                Err(err) if err.is_invalid_data() => {}
                Err(err) if err.is_busy() => warn!("relay busy, packet dropped"),
                Err(PortError::Frame(FrameError::ConnectionClosed)) => {
                    info!("ground link closed");
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        debug!(stats = ?self.stats, "port loop finished");
        Ok(())
    }

    fn store_params(
        &mut self,
        packet_type: PacketType,
        payload: &[u8],
        field: fn(&mut PortState) -> &mut Fresh<CtrlParams>,
    ) -> Result<Dispatched> {
        let params = CtrlParams::decode(payload)?;
        field(&mut self.shared.lock()).store(params);
        Ok(Dispatched::Stored(packet_type))
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }
}
