use serde::{Deserialize, Serialize};

use crate::node::NodeStats;
use crate::protocol::MessageBody;
use crate::readings::SensorReadings;

/// Operator commands accepted on the simulator's TCP console, one JSON
/// object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SimCommand {
    Ping,
    Status,
    SetBatteryVolts { volts: f64 },
    SetShuntVolts { volts: f64 },
    SetShuntResistance { ohms: f64 },
    SetBatteryTemperature { kelvin: f64 },
    SetOilPressure { pascal: f64 },
    PressButton { hold_ms: u64 },
    AnnouncePeer { address: u8 },
    SetRegistryAvailable { available: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SimReply {
    Pong,
    Ack,
    Status(NodeStatusReport),
    Error { message: alloc::string::String },
}

/// Point-in-time snapshot returned for `SimCommand::Status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatusReport {
    pub bus_open: bool,
    pub stats: NodeStats,
    pub readings: SensorReadings,
}

/// One published frame as streamed to monitors, body already decoded by
/// the codec that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub at_ms: u64,
    pub pgn: u32,
    pub body: MessageBody,
}
