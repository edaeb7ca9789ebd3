use serde::{Deserialize, Serialize};

/// 100 A / 100 mV shunt.
pub const DEFAULT_SHUNT_RESISTANCE_OHMS: f64 = 0.001;

/// Most recent value from every sensor pipeline, one writer per field.
///
/// Producers update their own field on their own cadence; nothing here
/// coordinates across fields. The publication path reads whatever is
/// current at send time, so a silent sensor keeps publishing its last
/// value rather than going stale visibly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReadings {
    battery_volts: f64,
    shunt_volts: f64,
    shunt_resistance_ohms: f64,
    battery_temperature_k: Option<f64>,
    oil_pressure_pa: f64,
    button_raw: bool,
}

impl SensorReadings {
    pub fn new() -> Self {
        Self {
            battery_volts: 0.0,
            shunt_volts: 0.0,
            shunt_resistance_ohms: DEFAULT_SHUNT_RESISTANCE_OHMS,
            battery_temperature_k: None,
            oil_pressure_pa: 0.0,
            button_raw: false,
        }
    }

    pub fn set_battery_volts(&mut self, volts: f64) {
        self.battery_volts = volts;
    }

    pub fn battery_volts(&self) -> f64 {
        self.battery_volts
    }

    pub fn set_shunt_volts(&mut self, volts: f64) {
        self.shunt_volts = volts;
    }

    pub fn shunt_volts(&self) -> f64 {
        self.shunt_volts
    }

    pub fn set_shunt_resistance(&mut self, ohms: f64) {
        self.shunt_resistance_ohms = ohms;
    }

    pub fn shunt_resistance_ohms(&self) -> f64 {
        self.shunt_resistance_ohms
    }

    pub fn set_battery_temperature(&mut self, kelvin: f64) {
        self.battery_temperature_k = Some(kelvin);
    }

    /// Mark the temperature sensor absent; the wire carries "not available".
    pub fn clear_battery_temperature(&mut self) {
        self.battery_temperature_k = None;
    }

    pub fn battery_temperature_k(&self) -> Option<f64> {
        self.battery_temperature_k
    }

    /// Transducer noise dips below zero at key-off; the wire format has no
    /// negative pressure, so the floor is applied at ingest.
    pub fn set_oil_pressure(&mut self, pascal: f64) {
        self.oil_pressure_pa = pascal.max(0.0);
    }

    pub fn oil_pressure_pa(&self) -> f64 {
        self.oil_pressure_pa
    }

    pub fn set_button_raw(&mut self, level: bool) {
        self.button_raw = level;
    }

    pub fn button_raw(&self) -> bool {
        self.button_raw
    }
}

impl Default for SensorReadings {
    fn default() -> Self {
        Self::new()
    }
}
