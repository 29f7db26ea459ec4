//! OBD-II Mode 0x01 PID registry and value decoders.
//!
//! Every PID the sampler polls is an enum variant carrying its wire code,
//! snapshot key, display unit, and decode formula. Formulas follow SAE
//! J1979 (e.g., RPM = ((A*256)+B)/4, temperatures = A-40).

use std::fmt;

use crate::error::{AdapterError, AdapterResult};

/// A PID the engine knows how to request and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pid {
    EngineLoad,
    CoolantTemp,
    ShortFuelTrim,
    LongFuelTrim,
    EngineRpm,
    VehicleSpeed,
    TimingAdvance,
    IntakeAirTemp,
    MafRate,
    ThrottlePosition,
    O2VoltageB1,
    O2VoltageB2,
    ControlModuleVoltage,
}

impl Pid {
    /// The full poll set, in request order.
    pub const ALL: [Pid; 13] = [
        Pid::EngineRpm,
        Pid::VehicleSpeed,
        Pid::CoolantTemp,
        Pid::IntakeAirTemp,
        Pid::ThrottlePosition,
        Pid::EngineLoad,
        Pid::ShortFuelTrim,
        Pid::LongFuelTrim,
        Pid::O2VoltageB1,
        Pid::O2VoltageB2,
        Pid::MafRate,
        Pid::TimingAdvance,
        Pid::ControlModuleVoltage,
    ];

    /// Mode 0x01 PID byte.
    pub fn code(self) -> u8 {
        match self {
            Pid::EngineLoad => 0x04,
            Pid::CoolantTemp => 0x05,
            Pid::ShortFuelTrim => 0x06,
            Pid::LongFuelTrim => 0x07,
            Pid::EngineRpm => 0x0C,
            Pid::VehicleSpeed => 0x0D,
            Pid::TimingAdvance => 0x0E,
            Pid::IntakeAirTemp => 0x0F,
            Pid::MafRate => 0x10,
            Pid::ThrottlePosition => 0x11,
            Pid::O2VoltageB1 => 0x14,
            Pid::O2VoltageB2 => 0x18,
            Pid::ControlModuleVoltage => 0x42,
        }
    }

    /// Reverse lookup from a wire PID byte.
    pub fn from_code(code: u8) -> Option<Pid> {
        Pid::ALL.into_iter().find(|p| p.code() == code)
    }

    /// Snapshot/freeze-frame key for this reading.
    pub fn key(self) -> &'static str {
        match self {
            Pid::EngineLoad => "engine_load_pct",
            Pid::CoolantTemp => "coolant_temp_c",
            Pid::ShortFuelTrim => "short_fuel_trim_pct",
            Pid::LongFuelTrim => "long_fuel_trim_pct",
            Pid::EngineRpm => "rpm",
            Pid::VehicleSpeed => "speed_kph",
            Pid::TimingAdvance => "timing_advance_deg",
            Pid::IntakeAirTemp => "intake_temp_c",
            Pid::MafRate => "maf_gps",
            Pid::ThrottlePosition => "throttle_pct",
            Pid::O2VoltageB1 => "o2_voltage_b1",
            Pid::O2VoltageB2 => "o2_voltage_b2",
            Pid::ControlModuleVoltage => "battery_voltage",
        }
    }

    /// Display unit for the decoded value.
    pub fn unit(self) -> &'static str {
        match self {
            Pid::EngineLoad | Pid::ThrottlePosition | Pid::ShortFuelTrim | Pid::LongFuelTrim => "%",
            Pid::CoolantTemp | Pid::IntakeAirTemp => "°C",
            Pid::EngineRpm => "rpm",
            Pid::VehicleSpeed => "km/h",
            Pid::TimingAdvance => "°",
            Pid::MafRate => "g/s",
            Pid::O2VoltageB1 | Pid::O2VoltageB2 | Pid::ControlModuleVoltage => "V",
        }
    }

    /// Data bytes this PID's response carries.
    pub fn data_len(self) -> usize {
        match self {
            Pid::EngineRpm | Pid::MafRate | Pid::ControlModuleVoltage => 2,
            _ => 1,
        }
    }

    /// Decode raw response data bytes (after SID and PID echo) into an
    /// engineering-unit value.
    pub fn decode(self, data: &[u8]) -> AdapterResult<f64> {
        if data.len() < self.data_len() {
            return Err(AdapterError::Decode(format!(
                "PID 0x{:02X}: need {} bytes, got {}",
                self.code(),
                self.data_len(),
                data.len()
            )));
        }
        let a = data[0] as f64;
        let value = match self {
            Pid::EngineLoad | Pid::ThrottlePosition => a * 100.0 / 255.0,
            Pid::CoolantTemp | Pid::IntakeAirTemp => a - 40.0,
            Pid::ShortFuelTrim | Pid::LongFuelTrim => (a - 128.0) * 100.0 / 128.0,
            Pid::EngineRpm => (a * 256.0 + data[1] as f64) / 4.0,
            Pid::VehicleSpeed => a,
            Pid::TimingAdvance => a / 2.0 - 64.0,
            Pid::MafRate => (a * 256.0 + data[1] as f64) / 100.0,
            Pid::O2VoltageB1 | Pid::O2VoltageB2 => a / 200.0,
            Pid::ControlModuleVoltage => (a * 256.0 + data[1] as f64) / 1000.0,
        };
        Ok(value)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.key(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rpm() {
        // 0x1B58 / 4 = 1750
        let v = Pid::EngineRpm.decode(&[0x1B, 0x58]).unwrap();
        assert!((v - 1750.0).abs() < 0.01);
    }

    #[test]
    fn decode_speed() {
        let v = Pid::VehicleSpeed.decode(&[0x3C]).unwrap();
        assert!((v - 60.0).abs() < 0.01);
    }

    #[test]
    fn decode_coolant_temp() {
        let v = Pid::CoolantTemp.decode(&[130]).unwrap();
        assert!((v - 90.0).abs() < 0.01);
    }

    #[test]
    fn decode_fuel_trim_centered() {
        let v = Pid::ShortFuelTrim.decode(&[128]).unwrap();
        assert!(v.abs() < 0.01);
        let v = Pid::LongFuelTrim.decode(&[0]).unwrap();
        assert!((v - -100.0).abs() < 0.01);
    }

    #[test]
    fn decode_throttle_full() {
        let v = Pid::ThrottlePosition.decode(&[255]).unwrap();
        assert!((v - 100.0).abs() < 0.01);
    }

    #[test]
    fn decode_timing_advance() {
        let v = Pid::TimingAdvance.decode(&[148]).unwrap();
        assert!((v - 10.0).abs() < 0.01);
    }

    #[test]
    fn decode_maf() {
        let v = Pid::MafRate.decode(&[0x05, 0xDC]).unwrap();
        assert!((v - 15.0).abs() < 0.01);
    }

    #[test]
    fn decode_o2_voltage() {
        let v = Pid::O2VoltageB1.decode(&[90]).unwrap();
        assert!((v - 0.45).abs() < 0.001);
    }

    #[test]
    fn decode_battery_voltage() {
        let v = Pid::ControlModuleVoltage.decode(&[0x35, 0x34]).unwrap();
        assert!((v - 13.62).abs() < 0.001);
    }

    #[test]
    fn decode_short_data() {
        let err = Pid::EngineRpm.decode(&[0x1B]).unwrap_err();
        assert!(matches!(err, AdapterError::Decode(_)));
    }

    #[test]
    fn code_roundtrip() {
        for pid in Pid::ALL {
            assert_eq!(Pid::from_code(pid.code()), Some(pid));
        }
        assert_eq!(Pid::from_code(0xFF), None);
    }

    #[test]
    fn keys_are_distinct() {
        for (i, a) in Pid::ALL.iter().enumerate() {
            for b in &Pid::ALL[i + 1..] {
                assert_ne!(a.key(), b.key());
            }
        }
    }
}
