use heapless::spsc::Queue;
use heapless::Vec;
use thiserror::Error;
use tracing::debug;

use crate::protocol::WireFrame;

/// Time for a simulated open sequence to settle after the first drain.
pub const ADDRESS_CLAIM_MS: u64 = 250;

pub const MAX_PEERS: usize = 32;
pub const TX_LOG_CAPACITY: usize = 64;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("bus is not open for transmit")]
    NotOpen,
    #[error("transmit rejected by the bus controller")]
    TxRejected,
}

/// What one inbound drain observed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusEvents {
    /// One-shot: the transport completed its open sequence during this
    /// drain and now holds a valid bus identity.
    pub opened: bool,
    pub frames_dispatched: u8,
}

/// Seat for the bus-controller collaborator.
pub trait BusTransport {
    /// Begin the open sequence. Completion is asynchronous and surfaces
    /// later as the one-shot `opened` event from `drain_inbound`.
    fn open(&mut self) -> Result<(), BusError>;

    /// Hand one frame to the controller, fire-and-forget.
    fn send(&mut self, frame: &WireFrame) -> Result<(), BusError>;

    /// Dispatch pending inbound traffic and report lifecycle events.
    fn drain_inbound(&mut self, current_time: u64) -> BusEvents;

    /// Devices currently visible in the controller's registry; `None`
    /// while the registry cannot answer.
    fn peer_count(&self) -> Option<usize>;
}

/// Latches the transport's open event so schedule arming happens exactly
/// once, even if the transport retries its open sequence and reports again.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate {
    opened: bool,
}

impl OpenGate {
    pub fn new() -> Self {
        Self { opened: false }
    }

    /// True only on the first call.
    pub fn mark_open(&mut self) -> bool {
        let first = !self.opened;
        self.opened = true;
        first
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }
}

/// Point-in-time gauge of other devices on the bus.
///
/// Refreshed once per driver tick, after the inbound drain, so devices that
/// announced themselves this tick are already counted. An unavailable
/// registry keeps the last known good value; registry faults never
/// propagate further than this struct.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerCounter {
    last_known: u8,
}

impl PeerCounter {
    pub fn new() -> Self {
        Self { last_known: 0 }
    }

    pub fn refresh(&mut self, registry_count: Option<usize>) -> u8 {
        if let Some(count) = registry_count {
            self.last_known = count.min(usize::from(u8::MAX)) as u8;
        }
        self.last_known
    }

    pub fn last_known(&self) -> u8 {
        self.last_known
    }
}

/// In-process stand-in for the bus controller.
///
/// Models the pieces the node interacts with: an open sequence that takes
/// `ADDRESS_CLAIM_MS` to settle, a transmit path that refuses frames until
/// then, a bounded sent-frame log, and a device registry fed by injected
/// address announcements.
#[derive(Debug)]
pub struct SimBus {
    open_requested: bool,
    open_reported: bool,
    claim_deadline: Option<u64>,
    claim_delay_ms: u64,
    sent: Vec<WireFrame, TX_LOG_CAPACITY>,
    announcements: Queue<u8, MAX_PEERS>,
    peers: Vec<u8, MAX_PEERS>,
    registry_available: bool,
    frames_sent: u32,
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            open_requested: false,
            open_reported: false,
            claim_deadline: None,
            claim_delay_ms: ADDRESS_CLAIM_MS,
            sent: Vec::new(),
            announcements: Queue::new(),
            peers: Vec::new(),
            registry_available: true,
            frames_sent: 0,
        }
    }

    pub fn with_claim_delay(claim_delay_ms: u64) -> Self {
        Self {
            claim_delay_ms,
            ..Self::new()
        }
    }

    /// Queue a peer address announcement; it registers on the next drain.
    pub fn inject_peer_announcement(&mut self, address: u8) -> Result<(), &'static str> {
        self.announcements
            .enqueue(address)
            .map_err(|_| "Announcement queue full")
    }

    /// Toggle the device registry, simulating a controller that cannot
    /// answer while re-enumerating the bus.
    pub fn set_registry_available(&mut self, available: bool) {
        self.registry_available = available;
    }

    /// Frames sent since the last take, oldest first.
    pub fn take_sent(&mut self) -> Vec<WireFrame, TX_LOG_CAPACITY> {
        core::mem::take(&mut self.sent)
    }

    pub fn sent_len(&self) -> usize {
        self.sent.len()
    }

    pub fn frames_sent(&self) -> u32 {
        self.frames_sent
    }

    pub fn is_open(&self) -> bool {
        self.open_reported
    }
}

impl BusTransport for SimBus {
    fn open(&mut self) -> Result<(), BusError> {
        self.open_requested = true;
        Ok(())
    }

    fn send(&mut self, frame: &WireFrame) -> Result<(), BusError> {
        if !self.open_reported {
            return Err(BusError::NotOpen);
        }

        // Oldest-first eviction keeps the log bounded on a long run.
        if self.sent.is_full() {
            self.sent.remove(0);
        }
        let _ = self.sent.push(frame.clone());
        self.frames_sent = self.frames_sent.wrapping_add(1);

        Ok(())
    }

    fn drain_inbound(&mut self, current_time: u64) -> BusEvents {
        let mut events = BusEvents::default();

        if self.open_requested && !self.open_reported {
            match self.claim_deadline {
                None => {
                    self.claim_deadline = Some(current_time + self.claim_delay_ms);
                }
                Some(deadline) if current_time >= deadline => {
                    self.open_reported = true;
                    events.opened = true;
                    debug!("Simulated address claim settled at {} ms", current_time);
                }
                Some(_) => {}
            }
        }

        while let Some(address) = self.announcements.dequeue() {
            events.frames_dispatched = events.frames_dispatched.saturating_add(1);
            if !self.peers.contains(&address) {
                let _ = self.peers.push(address);
            }
        }

        events
    }

    fn peer_count(&self) -> Option<usize> {
        if self.registry_available {
            Some(self.peers.len())
        } else {
            None
        }
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}
