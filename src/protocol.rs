use arrayvec::ArrayString;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;

pub const MAX_FRAME_PAYLOAD: usize = 512;

/// Parameter group numbers carried by the two battery streams.
pub const PGN_BATTERY_STATUS: u32 = 127_508;
pub const PGN_BATTERY_CONFIG: u32 = 127_513;

/// Sequence identifier meaning "not related to any other measurement".
pub const SID_UNAVAILABLE: u8 = 0xFF;

pub const COULOMBS_PER_AMP_HOUR: f64 = 3600.0;

// Worst-case config body needs real headroom inside a frame.
const_assert!(MAX_FRAME_PAYLOAD >= 256);

pub type FrameBuffer = ArrayString<MAX_FRAME_PAYLOAD>;

/// Outgoing message streams published by this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    BatteryStatus,
    BatteryConfig,
}

impl MessageKind {
    pub fn pgn(self) -> u32 {
        match self {
            MessageKind::BatteryStatus => PGN_BATTERY_STATUS,
            MessageKind::BatteryConfig => PGN_BATTERY_CONFIG,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::BatteryStatus => "battery-status",
            MessageKind::BatteryConfig => "battery-config",
        }
    }

    pub fn from_pgn(pgn: u32) -> Option<Self> {
        match pgn {
            PGN_BATTERY_STATUS => Some(MessageKind::BatteryStatus),
            PGN_BATTERY_CONFIG => Some(MessageKind::BatteryConfig),
            _ => None,
        }
    }
}

/// Physical construction of the battery bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryType {
    Flooded,
    Gel,
    Agm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EqualizationSupport {
    No,
    Yes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NominalVoltage {
    V6,
    V12,
    V24,
    V32,
    V36,
    V42,
    V48,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryChemistry {
    LeadAcid,
    LiIon,
    NiCad,
    NiMh,
}

/// Fast periodic stream: live electrical state of one battery instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatusFields {
    pub instance: u8,
    pub battery_volts: f64,
    pub battery_amps: f64,
    /// `None` encodes as protocol "not available", never a fake number.
    pub battery_temperature_k: Option<f64>,
    pub sid: u8,
}

/// Slow metadata stream: how the monitored bank is built and rated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryConfigFields {
    pub instance: u8,
    pub battery_type: BatteryType,
    pub supports_equalization: EqualizationSupport,
    pub nominal_voltage: NominalVoltage,
    pub chemistry: BatteryChemistry,
    pub capacity_coulombs: f64,
    pub temperature_coefficient_percent: i8,
    pub peukert_exponent: f64,
    pub charge_efficiency_percent: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageBody {
    BatteryStatus(BatteryStatusFields),
    BatteryConfig(BatteryConfigFields),
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::BatteryStatus(_) => MessageKind::BatteryStatus,
            MessageBody::BatteryConfig(_) => MessageKind::BatteryConfig,
        }
    }
}

/// Convert an amp-hour rating to the charge unit carried on the wire.
pub fn ah_to_coulombs(amp_hours: f64) -> f64 {
    amp_hours * COULOMBS_PER_AMP_HOUR
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("encoded body of {size} bytes exceeds the {}-byte frame payload", MAX_FRAME_PAYLOAD)]
    FrameTooLarge { size: usize },
    #[error("body serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("frame for PGN {pgn} does not carry a decodable body")]
    MalformedFrame { pgn: u32 },
}

/// One message as handed to the bus controller: a parameter group number
/// plus an opaque payload. The node core never looks inside.
#[derive(Debug, Clone, PartialEq)]
pub struct WireFrame {
    pgn: u32,
    data: Vec<u8, MAX_FRAME_PAYLOAD>,
}

impl WireFrame {
    pub fn new(pgn: u32, payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut data = Vec::new();
        data.extend_from_slice(payload)
            .map_err(|()| ProtocolError::FrameTooLarge {
                size: payload.len(),
            })?;
        Ok(Self { pgn, data })
    }

    pub fn pgn(&self) -> u32 {
        self.pgn
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Seat for the wire-protocol collaborator. Frame construction and parsing
/// for the standardized bus protocol live behind this trait, outside the
/// node core.
pub trait FrameEncoder {
    fn encode(&mut self, body: &MessageBody) -> Result<WireFrame, ProtocolError>;
}

/// Reference encoder: JSON bodies staged through a preallocated buffer.
///
/// Stands in the collaborator seat for simulation, monitoring and tests;
/// real marine-protocol byte packing would implement `FrameEncoder` the
/// same way.
#[derive(Debug)]
pub struct JsonFrameCodec {
    frame_buffer: FrameBuffer,
}

impl JsonFrameCodec {
    pub fn new() -> Self {
        Self {
            frame_buffer: ArrayString::new(),
        }
    }

    /// Decode a frame produced by this codec. Monitors and tests use this;
    /// the node core never parses frames.
    pub fn decode(frame: &WireFrame) -> Result<MessageBody, ProtocolError> {
        serde_json::from_slice(frame.data()).map_err(|_| ProtocolError::MalformedFrame {
            pgn: frame.pgn(),
        })
    }
}

impl FrameEncoder for JsonFrameCodec {
    fn encode(&mut self, body: &MessageBody) -> Result<WireFrame, ProtocolError> {
        self.frame_buffer.clear();

        let json_str = serde_json::to_string(body)?;
        if json_str.len() > MAX_FRAME_PAYLOAD {
            return Err(ProtocolError::FrameTooLarge {
                size: json_str.len(),
            });
        }
        self.frame_buffer.push_str(&json_str);

        WireFrame::new(body.kind().pgn(), self.frame_buffer.as_bytes())
    }
}

impl Default for JsonFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}
