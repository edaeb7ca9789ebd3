use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::{BusError, BusTransport};
use crate::protocol::{
    ah_to_coulombs, BatteryChemistry, BatteryConfigFields, BatteryStatusFields, BatteryType,
    EqualizationSupport, FrameEncoder, MessageBody, MessageKind, NominalVoltage, ProtocolError,
    SID_UNAVAILABLE,
};
use crate::readings::SensorReadings;
use crate::schedule::TransmitSchedule;

/// Static description of the monitored bank, published on the config stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryProfile {
    pub battery_type: BatteryType,
    pub chemistry: BatteryChemistry,
    pub supports_equalization: EqualizationSupport,
    pub nominal_voltage: NominalVoltage,
    pub capacity_ah: f64,
    pub temperature_coefficient_percent: i8,
    pub peukert_exponent: f64,
    pub charge_efficiency_percent: i8,
}

impl Default for BatteryProfile {
    fn default() -> Self {
        // 200 Ah flooded lead-acid house bank.
        Self {
            battery_type: BatteryType::Flooded,
            chemistry: BatteryChemistry::LeadAcid,
            supports_equalization: EqualizationSupport::No,
            nominal_voltage: NominalVoltage::V12,
            capacity_ah: 200.0,
            temperature_coefficient_percent: 10,
            peukert_exponent: 1.2,
            charge_efficiency_percent: 80,
        }
    }
}

#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),
    #[error("bus send failed: {0}")]
    Send(#[from] BusError),
}

/// Floor for quantities the wire vocabulary cannot carry as negative.
/// Non-finite input also lands on the floor.
pub fn floor_non_negative(value: f64) -> f64 {
    if value > 0.0 && value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Battery current derived from the shunt drop. Never cached: calibration
/// changes take effect on the very next frame. An unset shunt (zero
/// resistance) reads as no current rather than a non-finite value.
pub fn shunt_current_amps(shunt_volts: f64, shunt_resistance_ohms: f64) -> f64 {
    let amps = shunt_volts / shunt_resistance_ohms;
    if amps.is_finite() {
        amps
    } else {
        0.0
    }
}

/// Builds and publishes one message stream per call from the driver tick.
#[derive(Debug, Clone)]
pub struct MessageEmitter {
    instance: u8,
    profile: BatteryProfile,
}

impl MessageEmitter {
    pub fn new(instance: u8, profile: BatteryProfile) -> Self {
        Self { instance, profile }
    }

    /// One stream, one tick: due check, advance, gather, normalize, encode,
    /// fire-and-forget send. Returns whether a frame left the node.
    pub fn run<B: BusTransport, E: FrameEncoder>(
        &self,
        kind: MessageKind,
        current_time: u64,
        schedule: &mut TransmitSchedule,
        readings: &SensorReadings,
        codec: &mut E,
        bus: &mut B,
    ) -> Result<bool, EmitterError> {
        if !schedule.is_due(kind, current_time) {
            return Ok(false);
        }

        // Advance before the send: the next deadline counts from this firing
        // whether or not the frame makes it onto the wire.
        schedule.advance(kind, current_time);

        let body = self.build_body(kind, readings);
        let frame = codec.encode(&body)?;
        bus.send(&frame)?;

        Ok(true)
    }

    /// Gather the current field values and apply wire normalization.
    pub fn build_body(&self, kind: MessageKind, readings: &SensorReadings) -> MessageBody {
        match kind {
            MessageKind::BatteryStatus => MessageBody::BatteryStatus(BatteryStatusFields {
                instance: self.instance,
                battery_volts: floor_non_negative(readings.battery_volts()),
                // Discharge current is legitimately negative; no floor here.
                battery_amps: shunt_current_amps(
                    readings.shunt_volts(),
                    readings.shunt_resistance_ohms(),
                ),
                battery_temperature_k: readings.battery_temperature_k().map(floor_non_negative),
                sid: SID_UNAVAILABLE,
            }),
            MessageKind::BatteryConfig => MessageBody::BatteryConfig(BatteryConfigFields {
                instance: self.instance,
                battery_type: self.profile.battery_type,
                supports_equalization: self.profile.supports_equalization,
                nominal_voltage: self.profile.nominal_voltage,
                chemistry: self.profile.chemistry,
                capacity_coulombs: ah_to_coulombs(floor_non_negative(self.profile.capacity_ah)),
                temperature_coefficient_percent: self.profile.temperature_coefficient_percent,
                peukert_exponent: self.profile.peukert_exponent,
                charge_efficiency_percent: self.profile.charge_efficiency_percent,
            }),
        }
    }

    pub fn instance(&self) -> u8 {
        self.instance
    }

    pub fn profile(&self) -> &BatteryProfile {
        &self.profile
    }
}
