use crate::protocol::MessageKind;
use heapless::Vec;
use static_assertions::const_assert;

pub const MAX_TX_MESSAGES: usize = 8;

// Both battery streams must always fit.
const_assert!(MAX_TX_MESSAGES >= 2);

/// Offset-then-period transmit timer.
///
/// Created disarmed and silent; armed once the bus reports an operational
/// identity. The offset staggers the first firing of each message stream so
/// co-resident streams do not burst onto the wire in the same instant.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicTimer {
    period_ms: u64,
    offset_ms: u64,
    next_due_time: u64,
    armed: bool,
}

impl PeriodicTimer {
    pub fn new(period_ms: u64, offset_ms: u64) -> Self {
        Self {
            period_ms,
            offset_ms,
            next_due_time: 0,
            armed: false,
        }
    }

    /// Arm the timer: the first firing lands `offset_ms` after `current_time`.
    /// Arming again before the first firing re-bases the offset from the new
    /// instant (resynchronize with the bus, not with the old deadline).
    pub fn arm(&mut self, current_time: u64) {
        self.next_due_time = current_time + self.offset_ms;
        self.armed = true;
    }

    pub fn is_due(&self, current_time: u64) -> bool {
        self.armed && current_time >= self.next_due_time
    }

    /// Re-base the deadline from the actual firing time, not the previous
    /// deadline. A late poll shifts the whole future schedule; there is never
    /// a catch-up burst.
    pub fn advance(&mut self, current_time: u64) {
        // NASA Rule 5: Safety assertion for timer state
        debug_assert!(self.armed, "advance on a disarmed timer");

        self.next_due_time = current_time + self.period_ms;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn offset_ms(&self) -> u64 {
        self.offset_ms
    }

    /// Absolute deadline of the next firing. Meaningless until armed.
    pub fn next_due_time(&self) -> u64 {
        self.next_due_time
    }
}

#[derive(Debug, Clone, Copy)]
struct TimerSlot {
    kind: MessageKind,
    timer: PeriodicTimer,
}

/// One timer per outgoing message kind. Owns timing only; message content
/// stays with the emitter.
#[derive(Debug, Default)]
pub struct TransmitSchedule {
    slots: Vec<TimerSlot, MAX_TX_MESSAGES>,
}

impl TransmitSchedule {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Register a message stream. Each kind gets exactly one slot.
    pub fn register(
        &mut self,
        kind: MessageKind,
        period_ms: u64,
        offset_ms: u64,
    ) -> Result<(), &'static str> {
        if self.slots.iter().any(|slot| slot.kind == kind) {
            return Err("Message kind already registered");
        }

        let slot = TimerSlot {
            kind,
            timer: PeriodicTimer::new(period_ms, offset_ms),
        };
        self.slots.push(slot).map_err(|_| "Transmit schedule full")
    }

    /// Arm every registered timer from the same instant. Driven by the bus
    /// open gate, so in practice this runs once per bus lifetime.
    pub fn arm_all(&mut self, current_time: u64) {
        for slot in self.slots.iter_mut() {
            slot.timer.arm(current_time);
        }
    }

    /// Unknown kinds are never due.
    pub fn is_due(&self, kind: MessageKind, current_time: u64) -> bool {
        self.timer(kind)
            .map_or(false, |timer| timer.is_due(current_time))
    }

    pub fn advance(&mut self, kind: MessageKind, current_time: u64) {
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.kind == kind) {
            slot.timer.advance(current_time);
        }
    }

    pub fn timer(&self, kind: MessageKind) -> Option<&PeriodicTimer> {
        self.slots
            .iter()
            .find(|slot| slot.kind == kind)
            .map(|slot| &slot.timer)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Kind registered at `index`, for driver-loop iteration without holding
    /// a borrow across the emit call.
    pub fn kind_at(&self, index: usize) -> Option<MessageKind> {
        self.slots.get(index).map(|slot| slot.kind)
    }

    pub fn is_armed(&self) -> bool {
        !self.slots.is_empty() && self.slots.iter().all(|slot| slot.timer.is_armed())
    }
}
