use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One decoded sample of the live sensor set.
///
/// Immutable once produced; each tick supersedes the previous snapshot
/// rather than updating it. Readings are in fixed physical units (°C, %,
/// V, rpm, km/h, g/s, °); unit conversion from raw PID encoding happens
/// in the sampler, never in consumers. A reading is `None` when its PID
/// read failed that tick, since partial data is preferred over no data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Engine speed in rpm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpm: Option<f64>,
    /// Vehicle speed in km/h.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_kph: Option<f64>,
    /// Coolant temperature in °C.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coolant_temp_c: Option<f64>,
    /// Intake air temperature in °C.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intake_temp_c: Option<f64>,
    /// Throttle position in %.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_pct: Option<f64>,
    /// Calculated engine load in %.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_load_pct: Option<f64>,
    /// Short-term fuel trim (bank 1) in %.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_fuel_trim_pct: Option<f64>,
    /// Long-term fuel trim (bank 1) in %.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_fuel_trim_pct: Option<f64>,
    /// O2 sensor voltage, bank 1 sensor 1, in V.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub o2_voltage_b1: Option<f64>,
    /// O2 sensor voltage, bank 2 sensor 1, in V.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub o2_voltage_b2: Option<f64>,
    /// Mass air flow rate in g/s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maf_gps: Option<f64>,
    /// Ignition timing advance in ° before TDC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing_advance_deg: Option<f64>,
    /// Control module (battery) voltage in V.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f64>,
    /// When the sample was taken.
    pub sampled_at: DateTime<Utc>,
}

impl TelemetrySnapshot {
    /// An all-empty snapshot stamped now.
    pub fn empty() -> Self {
        Self {
            rpm: None,
            speed_kph: None,
            coolant_temp_c: None,
            intake_temp_c: None,
            throttle_pct: None,
            engine_load_pct: None,
            short_fuel_trim_pct: None,
            long_fuel_trim_pct: None,
            o2_voltage_b1: None,
            o2_voltage_b2: None,
            maf_gps: None,
            timing_advance_deg: None,
            battery_voltage: None,
            sampled_at: Utc::now(),
        }
    }

    /// Number of readings present in this snapshot.
    pub fn reading_count(&self) -> usize {
        [
            self.rpm,
            self.speed_kph,
            self.coolant_temp_c,
            self.intake_temp_c,
            self.throttle_pct,
            self.engine_load_pct,
            self.short_fuel_trim_pct,
            self.long_fuel_trim_pct,
            self.o2_voltage_b1,
            self.o2_voltage_b2,
            self.maf_gps,
            self.timing_advance_deg,
            self.battery_voltage,
        ]
        .iter()
        .filter(|r| r.is_some())
        .count()
    }
}
