//! Static code reference database, match-based lookup for common codes.
//!
//! Maps a code to its description, default severity, and the vehicle
//! system it counts against in health scoring. Codes not listed here
//! still ingest; the engine falls back to a category-level default.
//! Upgradeable to `phf` later without API change.

use cs_protocol::dtc::CodeSeverity;
use cs_protocol::health::VehicleSystem;

/// Reference entry for a known code.
#[derive(Debug, Clone)]
pub struct CodeInfo {
    pub description: &'static str,
    pub severity: CodeSeverity,
    pub system: VehicleSystem,
}

/// Look up a code in the static database.
/// Input is case-insensitive (normalized to uppercase internally).
pub fn lookup(code: &str) -> Option<CodeInfo> {
    use CodeSeverity::*;
    use VehicleSystem::*;

    let entry = |description, severity, system| {
        Some(CodeInfo {
            description,
            severity,
            system,
        })
    };

    let code = code.to_uppercase();
    match code.as_str() {
        // ===== Powertrain: Air Metering and Sensors =====
        "P0100" => entry("Mass or Volume Air Flow Circuit Malfunction", Medium, Engine),
        "P0101" => entry(
            "Mass or Volume Air Flow Circuit Range/Performance",
            Medium,
            Engine,
        ),
        "P0102" => entry("Mass or Volume Air Flow Circuit Low Input", Medium, Engine),
        "P0110" => entry("Intake Air Temperature Circuit Malfunction", Low, Engine),
        "P0120" => entry("Throttle Position Sensor Circuit Malfunction", Medium, Engine),
        "P0121" => entry(
            "Throttle Position Sensor Circuit Range/Performance",
            Medium,
            Engine,
        ),

        // ===== Powertrain: Ignition and Mechanical =====
        "P0011" => entry(
            "Camshaft Position Timing Over-Advanced (Bank 1)",
            Medium,
            Engine,
        ),
        "P0016" => entry(
            "Crankshaft/Camshaft Position Correlation (Bank 1)",
            High,
            Engine,
        ),
        "P0300" => entry("Random/Multiple Cylinder Misfire Detected", Critical, Engine),
        "P0301" => entry("Cylinder 1 Misfire Detected", High, Engine),
        "P0302" => entry("Cylinder 2 Misfire Detected", High, Engine),
        "P0303" => entry("Cylinder 3 Misfire Detected", High, Engine),
        "P0304" => entry("Cylinder 4 Misfire Detected", High, Engine),
        "P0335" => entry("Crankshaft Position Sensor Circuit Malfunction", High, Engine),
        "P0340" => entry("Camshaft Position Sensor Circuit Malfunction", High, Engine),
        "P0506" => entry("Idle Control System RPM Lower Than Expected", Low, Engine),
        "P0521" => entry("Engine Oil Pressure Sensor Range/Performance", High, Engine),
        "P0522" => entry("Engine Oil Pressure Sensor Low Voltage", Critical, Engine),

        // ===== Cooling =====
        "P0115" => entry("Engine Coolant Temperature Circuit Malfunction", Medium, Cooling),
        "P0117" => entry("Engine Coolant Temperature Circuit Low Input", Medium, Cooling),
        "P0118" => entry("Engine Coolant Temperature Circuit High Input", Medium, Cooling),
        "P0125" => entry(
            "Insufficient Coolant Temperature for Closed Loop",
            Low,
            Cooling,
        ),
        "P0128" => entry(
            "Coolant Thermostat Below Regulating Temperature",
            Medium,
            Cooling,
        ),
        "P0217" => entry("Engine Overtemperature Condition", Critical, Cooling),
        "P0480" => entry("Cooling Fan 1 Control Circuit Malfunction", High, Cooling),

        // ===== Fuel =====
        "P0087" => entry("Fuel Rail/System Pressure Too Low", High, Fuel),
        "P0090" => entry("Fuel Pressure Regulator Control Circuit", High, Fuel),
        "P0171" => entry("System Too Lean (Bank 1)", Medium, Fuel),
        "P0172" => entry("System Too Rich (Bank 1)", Medium, Fuel),
        "P0174" => entry("System Too Lean (Bank 2)", Medium, Fuel),
        "P0175" => entry("System Too Rich (Bank 2)", Medium, Fuel),
        "P0201" => entry("Injector Circuit Malfunction - Cylinder 1", High, Fuel),
        "P0230" => entry("Fuel Pump Primary Circuit Malfunction", High, Fuel),
        "P0442" => entry("EVAP System Leak Detected (Small Leak)", Low, Fuel),
        "P0455" => entry("EVAP System Leak Detected (Large Leak)", Low, Fuel),
        "P0456" => entry("EVAP System Leak Detected (Very Small Leak)", Low, Fuel),

        // ===== Exhaust and Emissions =====
        "P0130" => entry(
            "O2 Sensor Circuit Malfunction (Bank 1, Sensor 1)",
            Medium,
            Exhaust,
        ),
        "P0133" => entry(
            "O2 Sensor Circuit Slow Response (Bank 1, Sensor 1)",
            Medium,
            Exhaust,
        ),
        "P0135" => entry(
            "O2 Sensor Heater Circuit Malfunction (Bank 1, Sensor 1)",
            Medium,
            Exhaust,
        ),
        "P0141" => entry(
            "O2 Sensor Heater Circuit Malfunction (Bank 1, Sensor 2)",
            Medium,
            Exhaust,
        ),
        "P0401" => entry("Exhaust Gas Recirculation Flow Insufficient", Medium, Exhaust),
        "P0402" => entry("Exhaust Gas Recirculation Flow Excessive", Medium, Exhaust),
        "P0420" => entry(
            "Catalyst System Efficiency Below Threshold (Bank 1)",
            Medium,
            Exhaust,
        ),
        "P0430" => entry(
            "Catalyst System Efficiency Below Threshold (Bank 2)",
            Medium,
            Exhaust,
        ),
        "P2002" => entry(
            "Diesel Particulate Filter Efficiency Below Threshold",
            High,
            Exhaust,
        ),

        // ===== Transmission =====
        "P0218" => entry("Transmission Over Temperature Condition", Critical, Transmission),
        "P0700" => entry("Transmission Control System Malfunction", High, Transmission),
        "P0705" => entry(
            "Transmission Range Sensor Circuit Malfunction",
            High,
            Transmission,
        ),
        "P0715" => entry(
            "Input/Turbine Speed Sensor Circuit Malfunction",
            High,
            Transmission,
        ),
        "P0720" => entry("Output Speed Sensor Circuit Malfunction", High, Transmission),
        "P0730" => entry("Incorrect Gear Ratio", High, Transmission),
        "P0740" => entry("Torque Converter Clutch Circuit Malfunction", Medium, Transmission),
        "P0741" => entry("Torque Converter Clutch Stuck Off", Medium, Transmission),

        // ===== Electrical and Charging =====
        "P0562" => entry("System Voltage Low", High, Electrical),
        "P0563" => entry("System Voltage High", High, Electrical),
        "P0620" => entry("Generator Control Circuit Malfunction", High, Electrical),
        "P0650" => entry("Malfunction Indicator Lamp Control Circuit", Low, Electrical),

        // ===== Chassis: ABS and Brakes =====
        "C0035" => entry("Left Front Wheel Speed Sensor Circuit", High, Brakes),
        "C0040" => entry("Right Front Wheel Speed Sensor Circuit", High, Brakes),
        "C0050" => entry("Right Rear Wheel Speed Sensor Circuit", High, Brakes),
        "C0121" => entry("ABS Valve Relay Circuit Malfunction", Critical, Brakes),
        "C0265" => entry("ABS/EBCM Control Module Relay Circuit", Critical, Brakes),

        // ===== Chassis: Steering and Suspension =====
        "C0710" => entry("Steering Position Sensor Malfunction", High, Suspension),
        "C1513" => entry("Suspension Ride Height Sensor Circuit", Medium, Suspension),
        "C1780" => entry("Air Suspension Compressor Circuit Malfunction", Medium, Suspension),

        // ===== Body =====
        "B0001" => entry("Driver Airbag Deployment Control Circuit", Critical, Electrical),
        "B1000" => entry("Body Control Module Internal Fault", Medium, Electrical),

        // ===== Network =====
        "U0100" => entry("Lost Communication With ECM/PCM", Critical, Electrical),
        "U0101" => entry("Lost Communication With TCM", High, Electrical),
        "U0121" => entry("Lost Communication With ABS Control Module", High, Electrical),
        "U0140" => entry("Lost Communication With Body Control Module", Medium, Electrical),
        "U0155" => entry("Lost Communication With Instrument Cluster", Medium, Electrical),

        _ => None,
    }
}
