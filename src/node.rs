use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bus::{BusError, BusTransport, OpenGate, PeerCounter};
use crate::button::{DebounceLatch, PressEvents, LONG_PRESS_MS, SHORT_PRESS_MS};
use crate::emitter::{BatteryProfile, MessageEmitter};
use crate::protocol::{FrameEncoder, MessageKind};
use crate::readings::SensorReadings;
use crate::schedule::TransmitSchedule;

/// Driver cadence for `process_tick`. Button sampling runs faster, on
/// every loop iteration.
pub const DRIVER_TICK_MS: u64 = 100;

pub const BATTERY_STATUS_PERIOD_MS: u64 = 500;
pub const BATTERY_STATUS_OFFSET_MS: u64 = 2000;
pub const BATTERY_CONFIG_PERIOD_MS: u64 = 1000;
pub const BATTERY_CONFIG_OFFSET_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Distinguishes multiple logical batteries on one bus.
    pub instance: u8,
    pub status_period_ms: u64,
    pub status_offset_ms: u64,
    pub config_period_ms: u64,
    pub config_offset_ms: u64,
    pub short_press_ms: u64,
    pub long_press_ms: u64,
    pub profile: BatteryProfile,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            instance: 0,
            status_period_ms: BATTERY_STATUS_PERIOD_MS,
            status_offset_ms: BATTERY_STATUS_OFFSET_MS,
            config_period_ms: BATTERY_CONFIG_PERIOD_MS,
            config_offset_ms: BATTERY_CONFIG_OFFSET_MS,
            short_press_ms: SHORT_PRESS_MS,
            long_press_ms: LONG_PRESS_MS,
            profile: BatteryProfile::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeStats {
    pub ticks: u32,
    pub status_frames: u32,
    pub config_frames: u32,
    pub send_failures: u32,
    pub peers_visible: u8,
    pub short_presses: u32,
    pub long_presses: u32,
    pub armed: bool,
    pub armed_at: Option<u64>,
    pub last_error: Option<alloc::string::String>,
}

/// One battery monitor on the bus: owns the sensor snapshot, the transmit
/// schedule, the press latch and the collaborator seats.
///
/// Single-threaded by contract. The driver calls `process_tick` on a fixed
/// cadence and `sample_button` on every loop iteration; nothing here blocks
/// or spawns.
#[derive(Debug)]
pub struct BatteryNode<B: BusTransport, E: FrameEncoder> {
    config: NodeConfig,
    readings: SensorReadings,
    schedule: TransmitSchedule,
    gate: OpenGate,
    peers: PeerCounter,
    button: DebounceLatch,
    emitter: MessageEmitter,
    codec: E,
    bus: B,
    stats: NodeStats,
}

impl<B: BusTransport, E: FrameEncoder> BatteryNode<B, E> {
    pub fn new(config: NodeConfig, bus: B, codec: E) -> Self {
        let mut schedule = TransmitSchedule::new();
        // Two distinct kinds into eight slots; registration cannot fail.
        let _ = schedule.register(
            MessageKind::BatteryStatus,
            config.status_period_ms,
            config.status_offset_ms,
        );
        let _ = schedule.register(
            MessageKind::BatteryConfig,
            config.config_period_ms,
            config.config_offset_ms,
        );

        let emitter = MessageEmitter::new(config.instance, config.profile.clone());
        let button = DebounceLatch::new(config.short_press_ms, config.long_press_ms);

        Self {
            config,
            readings: SensorReadings::new(),
            schedule,
            gate: OpenGate::new(),
            peers: PeerCounter::new(),
            button,
            emitter,
            codec,
            bus,
            stats: NodeStats::default(),
        }
    }

    /// Ask the transport to begin its open sequence. Completion arrives
    /// later as the one-shot open event inside `process_tick`; until then
    /// every timer stays disarmed and nothing is published.
    pub fn open_bus(&mut self) -> Result<(), BusError> {
        self.bus.open()
    }

    /// One driver tick. Failures inside the tick are recorded and logged,
    /// never propagated: a dropped frame just waits for its next period.
    pub fn process_tick(&mut self, current_time: u64) {
        // 1. Publication pass over every registered stream
        for index in 0..self.schedule.len() {
            let kind = match self.schedule.kind_at(index) {
                Some(kind) => kind,
                None => break,
            };

            match self.emitter.run(
                kind,
                current_time,
                &mut self.schedule,
                &self.readings,
                &mut self.codec,
                &mut self.bus,
            ) {
                Ok(true) => {
                    match kind {
                        MessageKind::BatteryStatus => self.stats.status_frames += 1,
                        MessageKind::BatteryConfig => self.stats.config_frames += 1,
                    }
                    debug!("Published {} at {} ms", kind.as_str(), current_time);
                }
                Ok(false) => {}
                Err(error) => {
                    self.stats.send_failures += 1;
                    self.stats.last_error = Some(format!("{}", error));
                    warn!("Dropped {} frame: {}", kind.as_str(), error);
                }
            }
        }

        // 2. Inbound drain; may surface the one-shot open event
        let events = self.bus.drain_inbound(current_time);
        if events.opened && self.gate.mark_open() {
            self.schedule.arm_all(current_time);
            self.stats.armed = true;
            self.stats.armed_at = Some(current_time);
            info!("Bus open at {} ms, transmit schedule armed", current_time);
        }

        // 3. Peer gauge after the drain so same-tick announcements count
        self.stats.peers_visible = self.peers.refresh(self.bus.peer_count());

        self.stats.ticks = self.stats.ticks.wrapping_add(1);
    }

    /// Feed the press latch from the latest raw input level.
    pub fn sample_button(&mut self, current_time: u64) {
        let reading = self.readings.button_raw();
        self.button.sample(reading, current_time);
    }

    /// Read-and-clear the press latches.
    pub fn drain_presses(&mut self) -> PressEvents {
        let events = self.button.drain();
        if events.short_press {
            self.stats.short_presses += 1;
        }
        if events.long_press {
            self.stats.long_presses += 1;
        }
        events
    }

    /// Prime the press latch from the input line's idle level at startup.
    pub fn seed_button(&mut self, reading: bool) {
        self.readings.set_button_raw(reading);
        self.button.seed(reading);
    }

    pub fn readings(&self) -> &SensorReadings {
        &self.readings
    }

    /// Sensor pipelines write through this, one setter per field.
    pub fn readings_mut(&mut self) -> &mut SensorReadings {
        &mut self.readings
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn schedule(&self) -> &TransmitSchedule {
        &self.schedule
    }

    pub fn button(&self) -> &DebounceLatch {
        &self.button
    }

    pub fn is_bus_open(&self) -> bool {
        self.gate.is_open()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
