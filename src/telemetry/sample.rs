//! Point-in-time telemetry snapshot
//!
//! Every field is a value at the sample instant. Only `flight_time_seconds`
//! and `photo_count` are monotonic while the link is up; the source
//! guarantees that.

use std::collections::BTreeSet;

/// Battery pack state
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryTelemetry {
    /// Remaining charge, 0-100
    pub percentage: u8,
    pub voltage: f32,
    pub current: f32,
    pub temperature_celsius: f32,
}

/// GNSS fix data
#[derive(Debug, Clone, PartialEq)]
pub struct GpsTelemetry {
    pub lat: f64,
    pub lon: f64,
    pub altitude: f32,
    pub satellite_count: u32,
    /// 0-5 bars as reported by the vehicle
    pub signal_strength: u8,
}

/// Kinematic state
#[derive(Debug, Clone, PartialEq)]
pub struct FlightTelemetry {
    pub speed_horizontal: f32,
    pub speed_vertical: f32,
    /// Altitude above ground level in meters
    pub altitude_agl: f32,
    pub distance_from_home: f32,
    pub heading_degrees: f32,
    pub flight_time_seconds: u32,
}

/// Gimbal attitude in degrees
#[derive(Debug, Clone, PartialEq)]
pub struct GimbalTelemetry {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
}

/// Vehicle status flags and active fault codes
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTelemetry {
    pub flying: bool,
    pub armed: bool,
    pub gps_fixed: bool,
    pub vision_enabled: bool,
    pub mode: String,
    pub error_codes: BTreeSet<String>,
}

/// Camera and storage state
#[derive(Debug, Clone, PartialEq)]
pub struct CameraTelemetry {
    pub recording: bool,
    pub sd_capacity_gb: f32,
    pub sd_remaining_gb: f32,
    pub photo_count: u32,
}

/// One immutable telemetry snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub battery: BatteryTelemetry,
    pub gps: GpsTelemetry,
    pub flight: FlightTelemetry,
    pub gimbal: GimbalTelemetry,
    pub status: StatusTelemetry,
    pub camera: CameraTelemetry,
}

impl TelemetrySample {
    /// A healthy on-ground sample, useful as a simulation seed and in tests
    pub fn grounded() -> Self {
        Self {
            battery: BatteryTelemetry {
                percentage: 100,
                voltage: 15.8,
                current: 0.4,
                temperature_celsius: 24.0,
            },
            gps: GpsTelemetry {
                lat: 47.3977,
                lon: 8.5456,
                altitude: 432.0,
                satellite_count: 14,
                signal_strength: 5,
            },
            flight: FlightTelemetry {
                speed_horizontal: 0.0,
                speed_vertical: 0.0,
                altitude_agl: 0.0,
                distance_from_home: 0.0,
                heading_degrees: 0.0,
                flight_time_seconds: 0,
            },
            gimbal: GimbalTelemetry {
                pitch: 0.0,
                roll: 0.0,
                yaw: 0.0,
            },
            status: StatusTelemetry {
                flying: false,
                armed: false,
                gps_fixed: true,
                vision_enabled: true,
                mode: "standby".into(),
                error_codes: BTreeSet::new(),
            },
            camera: CameraTelemetry {
                recording: false,
                sd_capacity_gb: 64.0,
                sd_remaining_gb: 58.5,
                photo_count: 0,
            },
        }
    }
}
