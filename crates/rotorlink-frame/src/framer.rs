//! Byte-driven packet framing for links with no flow control.
//!
//! [`Receiver`] is the receive state machine. It is fed one byte at a time
//! and recovers packet boundaries from the mark/type/length header, so it
//! works the same whether bytes come from a transfer-complete interrupt
//! ([`LinkFramer`]) or from a host byte stream ([`crate::PacketReader`]).

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;

use crate::codec::{self, Packet, BUFFER_CAPACITY, HEADER_SIZE, MARK, OVERHEAD};
use crate::error::{FrameError, Result};
use crate::packet_type::PacketType;

/// Byte clocked out while no packet is queued.
pub const IDLE_FILLER: u8 = 0x00;

/// Receive state. Validation happens on the byte that completes the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    AwaitMark1,
    AwaitMark2,
    ReadingType,
    ReadingLength,
    ReadingPayload,
}

/// Why a partially received frame was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The byte after the first mark was not a mark.
    BadMark,
    /// The declared length does not fit in the receive buffer.
    LengthOverflow { len: u8 },
    /// The frame arrived whole but its checksum did not match.
    Checksum { expected: u16, found: u16 },
}

/// Outcome of feeding one byte to a [`Receiver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxEvent {
    /// Nothing to report yet.
    Pending,
    /// A checksum-valid frame is in the buffer.
    Complete,
    /// The frame in progress was discarded; the receiver is resynchronising.
    Dropped(DropReason),
}

/// Receive half of the link framing state machine.
///
/// Holds at most one frame. A completed frame stays readable until the next
/// frame starts overwriting the buffer.
#[derive(Debug, Clone)]
pub struct Receiver {
    buf: [u8; BUFFER_CAPACITY],
    state: RxState,
    index: usize,
    expected: usize,
    complete: bool,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver {
    pub const fn new() -> Self {
        Self {
            buf: [0; BUFFER_CAPACITY],
            state: RxState::AwaitMark1,
            index: 0,
            expected: 0,
            complete: false,
        }
    }

    /// Advance the state machine by one received byte.
    pub fn push(&mut self, byte: u8) -> RxEvent {
        match self.state {
            RxState::AwaitMark1 => {
                if byte == MARK {
                    self.state = RxState::AwaitMark2;
                }
                RxEvent::Pending
            }
            RxState::AwaitMark2 => {
                if byte == MARK {
                    self.state = RxState::ReadingType;
                    RxEvent::Pending
                } else {
                    self.abort(DropReason::BadMark)
                }
            }
            RxState::ReadingType => {
                // The previous frame is about to be overwritten.
                self.complete = false;
                self.buf[0] = MARK;
                self.buf[1] = MARK;
                self.buf[2] = byte;
                self.state = RxState::ReadingLength;
                RxEvent::Pending
            }
            RxState::ReadingLength => {
                let expected = OVERHEAD + usize::from(byte);
                if expected > BUFFER_CAPACITY {
                    return self.abort(DropReason::LengthOverflow { len: byte });
                }
                self.buf[3] = byte;
                self.index = HEADER_SIZE;
                self.expected = expected;
                self.state = RxState::ReadingPayload;
                RxEvent::Pending
            }
            RxState::ReadingPayload => {
                self.buf[self.index] = byte;
                self.index += 1;
                if self.index < self.expected {
                    return RxEvent::Pending;
                }
                self.state = RxState::AwaitMark1;
                match codec::validate(&self.buf[2..self.expected]) {
                    Ok(()) => {
                        self.complete = true;
                        RxEvent::Complete
                    }
                    Err(FrameError::Checksum { expected, found }) => {
                        RxEvent::Dropped(DropReason::Checksum { expected, found })
                    }
                    Err(_) => RxEvent::Dropped(DropReason::BadMark),
                }
            }
        }
    }

    /// True while a validated frame is waiting to be taken.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Copy the validated frame out and clear the completion flag.
    pub fn take_packet(&mut self) -> Option<Packet> {
        if !self.complete {
            return None;
        }
        self.complete = false;
        let len = usize::from(self.buf[3]);
        Some(Packet {
            packet_type: PacketType::from(self.buf[2]),
            payload: Bytes::copy_from_slice(&self.buf[HEADER_SIZE..HEADER_SIZE + len]),
        })
    }

    /// Current state, for diagnostics.
    pub fn state(&self) -> RxState {
        self.state
    }

    /// Drop any partial or completed frame.
    pub fn reset(&mut self) {
        self.state = RxState::AwaitMark1;
        self.index = 0;
        self.expected = 0;
        self.complete = false;
    }

    fn abort(&mut self, reason: DropReason) -> RxEvent {
        self.state = RxState::AwaitMark1;
        self.index = 0;
        self.expected = 0;
        RxEvent::Dropped(reason)
    }
}

/// Counters kept by a [`LinkFramer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    pub received: u32,
    pub sent: u32,
    pub bad_mark: u32,
    pub length_overflow: u32,
    pub checksum: u32,
}

/// Embedded-side link endpoint driven by the byte-transfer interrupt.
///
/// The link is a synchronous byte exchange: every transfer moves one byte in
/// and one byte out, so inbound and outbound progress share one clock.
/// [`on_transfer`](Self::on_transfer) is the interrupt handler; it runs in
/// constant time and never blocks or allocates.
#[derive(Debug, Clone)]
pub struct LinkFramer {
    rx: Receiver,
    tx_buf: [u8; BUFFER_CAPACITY],
    tx_len: usize,
    tx_index: usize,
    stats: FramerStats,
}

impl Default for LinkFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkFramer {
    pub const fn new() -> Self {
        Self {
            rx: Receiver::new(),
            tx_buf: [0; BUFFER_CAPACITY],
            tx_len: 0,
            tx_index: 0,
            stats: FramerStats {
                received: 0,
                sent: 0,
                bad_mark: 0,
                length_overflow: 0,
                checksum: 0,
            },
        }
    }

    /// Handle one completed byte transfer.
    ///
    /// Takes the byte just received and returns the byte to load for the
    /// next transfer.
    pub fn on_transfer(&mut self, rx_byte: u8) -> u8 {
        match self.rx.push(rx_byte) {
            RxEvent::Pending => {}
            RxEvent::Complete => self.stats.received = self.stats.received.wrapping_add(1),
            RxEvent::Dropped(DropReason::BadMark) => {
                self.stats.bad_mark = self.stats.bad_mark.wrapping_add(1)
            }
            RxEvent::Dropped(DropReason::LengthOverflow { .. }) => {
                self.stats.length_overflow = self.stats.length_overflow.wrapping_add(1)
            }
            RxEvent::Dropped(DropReason::Checksum { .. }) => {
                self.stats.checksum = self.stats.checksum.wrapping_add(1)
            }
        }

        if self.tx_len == 0 {
            return IDLE_FILLER;
        }
        let byte = self.tx_buf[self.tx_index];
        self.tx_index += 1;
        if self.tx_index == self.tx_len {
            self.tx_len = 0;
            self.tx_index = 0;
            self.stats.sent = self.stats.sent.wrapping_add(1);
        }
        byte
    }

    /// Load a packet for transmission over the next transfers.
    ///
    /// Fails with [`FrameError::Busy`] while a previous packet is still
    /// being clocked out.
    pub fn queue(&mut self, packet_type: PacketType, payload: &[u8]) -> Result<()> {
        if self.tx_len != 0 {
            return Err(FrameError::Busy);
        }
        self.tx_len = codec::encode_to_slice(packet_type, payload, &mut self.tx_buf)?;
        self.tx_index = 0;
        Ok(())
    }

    /// True when a validated packet is waiting.
    pub fn is_new_data(&self) -> bool {
        self.rx.is_complete()
    }

    /// True while an outbound packet is in flight.
    pub fn is_transmitting(&self) -> bool {
        self.tx_len != 0
    }

    /// Copy the received packet out and clear the data-ready flag.
    pub fn take_packet(&mut self) -> Option<Packet> {
        self.rx.take_packet()
    }

    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Discard partial input and any queued output.
    pub fn reset(&mut self) {
        self.rx.reset();
        self.tx_len = 0;
        self.tx_index = 0;
    }
}

/// A [`LinkFramer`] shared between its interrupt handler and one consumer.
///
/// Holding the lock stands in for masking the transfer interrupt, so the
/// consumer's copy of the receive buffer can never tear.
#[derive(Debug, Clone, Default)]
pub struct SharedFramer {
    inner: Arc<(Mutex<LinkFramer>, Condvar)>,
}

impl SharedFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt entry point.
    pub fn on_transfer(&self, rx_byte: u8) -> u8 {
        let (_, ready) = &*self.inner;
        let mut framer = self.lock();
        let tx_byte = framer.on_transfer(rx_byte);
        if framer.is_new_data() {
            ready.notify_all();
        }
        tx_byte
    }

    /// Run `f` with the interrupt source masked.
    pub fn with<R>(&self, f: impl FnOnce(&mut LinkFramer) -> R) -> R {
        f(&mut self.lock())
    }

    /// Wait for a received packet. `None` waits forever.
    pub fn wait_for_data(&self, timeout: Option<Duration>) -> bool {
        let (_, ready) = &*self.inner;
        let framer = self.lock();
        match timeout {
            None => ready
                .wait_while(framer, |f| !f.is_new_data())
                .map(|f| f.is_new_data())
                .unwrap_or_else(|poisoned| poisoned.into_inner().is_new_data()),
            Some(timeout) => ready
                .wait_timeout_while(framer, timeout, |f| !f.is_new_data())
                .map(|(f, _)| f.is_new_data())
                .unwrap_or_else(|poisoned| poisoned.into_inner().0.is_new_data()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LinkFramer> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::encode_packet;

    fn wire(packet_type: PacketType, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_packet(packet_type, payload, &mut buf).unwrap();
        buf.to_vec()
    }

    /// Feed bytes, collecting packets the way a consumer polling after every
    /// transfer would.
    fn feed(framer: &mut LinkFramer, bytes: &[u8]) -> Vec<Packet> {
        let mut packets = Vec::new();
        for &byte in bytes {
            framer.on_transfer(byte);
            if let Some(packet) = framer.take_packet() {
                packets.push(packet);
            }
        }
        packets
    }

    #[test]
    fn single_frame() {
        let mut framer = LinkFramer::new();
        let packets = feed(&mut framer, &wire(PacketType::CommandData, &[1, 2, 3, 4]));

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].packet_type, PacketType::CommandData);
        assert_eq!(packets[0].payload.as_ref(), &[1, 2, 3, 4]);
        assert_eq!(framer.stats().received, 1);
    }

    #[test]
    fn back_to_back_frames() {
        let mut stream = wire(PacketType::YawParams, &[10, 20, 30]);
        stream.extend(wire(PacketType::XyParams, &[40, 50]));

        let mut framer = LinkFramer::new();
        let packets = feed(&mut framer, &stream);

        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].packet_type, PacketType::YawParams);
        assert_eq!(packets[0].payload.as_ref(), &[10, 20, 30]);
        assert_eq!(packets[1].packet_type, PacketType::XyParams);
        assert_eq!(packets[1].payload.as_ref(), &[40, 50]);
    }

    #[test]
    fn resynchronises_after_bad_second_mark() {
        let mut stream = wire(PacketType::AltitudeParams, &[1, 2, 3, 4]);
        stream[1] = 0x55;
        stream.extend([0x00, 0x13, 0x37]);
        stream.extend(wire(PacketType::AltitudeParams, &[5, 6, 7, 8]));

        let mut framer = LinkFramer::new();
        let packets = feed(&mut framer, &stream);

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload.as_ref(), &[5, 6, 7, 8]);
        assert_eq!(framer.stats().bad_mark, 1);
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut stream = vec![MARK, MARK, 0x07, 200];
        stream.extend(wire(PacketType::CommandData, &[9, 9]));

        let mut framer = LinkFramer::new();
        let packets = feed(&mut framer, &stream);

        assert_eq!(framer.stats().length_overflow, 1);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload.as_ref(), &[9, 9]);
    }

    #[test]
    fn checksum_failure_does_not_set_data_ready() {
        let mut stream = wire(PacketType::CommandData, &[1, 2, 3, 4]);
        let last = stream.len() - 1;
        stream[last] ^= 0x01;

        let mut framer = LinkFramer::new();
        for byte in stream {
            framer.on_transfer(byte);
        }

        assert!(!framer.is_new_data());
        assert!(framer.take_packet().is_none());
        assert_eq!(framer.stats().checksum, 1);
    }

    #[test]
    fn unread_frame_is_lost_once_next_frame_starts() {
        let first = wire(PacketType::CommandData, &[1]);
        let second = wire(PacketType::CommandData, &[2]);

        let mut framer = LinkFramer::new();
        for &byte in &first {
            framer.on_transfer(byte);
        }
        assert!(framer.is_new_data());

        // marks alone leave the frame intact
        framer.on_transfer(second[0]);
        framer.on_transfer(second[1]);
        assert!(framer.is_new_data());

        framer.on_transfer(second[2]);
        assert!(!framer.is_new_data());

        for &byte in &second[3..] {
            framer.on_transfer(byte);
        }
        assert_eq!(framer.take_packet().unwrap().payload.as_ref(), &[2]);
    }

    #[test]
    fn take_clears_data_ready() {
        let mut framer = LinkFramer::new();
        for byte in wire(PacketType::TestMode, &[1]) {
            framer.on_transfer(byte);
        }
        assert!(framer.is_new_data());
        assert!(framer.take_packet().is_some());
        assert!(!framer.is_new_data());
        assert!(framer.take_packet().is_none());
    }

    #[test]
    fn transmit_drains_one_byte_per_transfer_then_idles() {
        let mut framer = LinkFramer::new();
        framer.queue(PacketType::StateMode, &[2, 1]).unwrap();
        assert!(framer.is_transmitting());

        let expected = wire(PacketType::StateMode, &[2, 1]);
        let sent: Vec<u8> = (0..expected.len()).map(|_| framer.on_transfer(0)).collect();

        assert_eq!(sent, expected);
        assert!(!framer.is_transmitting());
        assert_eq!(framer.on_transfer(0), IDLE_FILLER);
        assert_eq!(framer.stats().sent, 1);
    }

    #[test]
    fn queue_while_transmitting_is_busy() {
        let mut framer = LinkFramer::new();
        framer.queue(PacketType::TraceData, &[0; 26]).unwrap();
        framer.on_transfer(0);

        let err = framer.queue(PacketType::TraceData, &[0; 26]).unwrap_err();
        assert!(matches!(err, FrameError::Busy));
    }

    #[test]
    fn receive_and_transmit_progress_together() {
        let inbound = wire(PacketType::CommandData, &[7, 7]);
        let mut framer = LinkFramer::new();
        framer.queue(PacketType::MotorSignals, &[3, 3, 3]).unwrap();

        let outbound: Vec<u8> = inbound.iter().map(|&b| framer.on_transfer(b)).collect();

        assert!(framer.is_new_data());
        assert_eq!(&outbound[..], &wire(PacketType::MotorSignals, &[3, 3, 3])[..inbound.len()]);
    }

    #[test]
    fn reset_discards_partial_state() {
        let mut framer = LinkFramer::new();
        let stream = wire(PacketType::CommandData, &[1, 2]);
        for &byte in &stream[..4] {
            framer.on_transfer(byte);
        }
        framer.queue(PacketType::StateMode, &[0, 0]).unwrap();

        framer.reset();
        assert!(!framer.is_transmitting());

        let packets = feed(&mut framer, &stream);
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn receiver_reports_states() {
        let mut rx = Receiver::new();
        assert_eq!(rx.state(), RxState::AwaitMark1);
        assert_eq!(rx.push(MARK), RxEvent::Pending);
        assert_eq!(rx.state(), RxState::AwaitMark2);
        assert_eq!(rx.push(0x01), RxEvent::Dropped(DropReason::BadMark));
        assert_eq!(rx.state(), RxState::AwaitMark1);
        rx.push(MARK);
        rx.push(MARK);
        assert_eq!(rx.state(), RxState::ReadingType);
        rx.push(0x07);
        assert_eq!(rx.state(), RxState::ReadingLength);
        assert_eq!(
            rx.push(0xFF),
            RxEvent::Dropped(DropReason::LengthOverflow { len: 0xFF })
        );
    }

    #[test]
    fn shared_framer_wakes_waiting_consumer() {
        let shared = SharedFramer::new();
        let isr = shared.clone();

        let producer = std::thread::spawn(move || {
            for byte in wire(PacketType::ShutDown, &[]) {
                isr.on_transfer(byte);
            }
        });

        assert!(shared.wait_for_data(Some(Duration::from_secs(5))));
        producer.join().unwrap();

        let packet = shared.with(|framer| framer.take_packet()).unwrap();
        assert_eq!(packet.packet_type, PacketType::ShutDown);
        assert!(!shared.wait_for_data(Some(Duration::from_millis(5))));
    }
}
