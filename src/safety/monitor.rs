//! Safety Monitor
//!
//! Evaluates every telemetry sample against the operational limits and
//! derives the current warning set. The monitor holds no clock and does no
//! I/O; the connection manager runs it on every sample and health tick.

use crate::session::{limits, ConnectionState};
use crate::telemetry::TelemetrySample;
use std::collections::BTreeSet;

/// Warning severity, ordered from advisory to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Critical,
    Error,
}

/// What condition a warning reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningCode {
    LowBattery,
    CriticalBattery,
    GpsLost,
    WeakGps,
    ConnectionLost,
    VehicleErrorCode,
    HighTemperature,
    LowStorage,
}

/// An active safety condition derived from the latest sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyWarning {
    pub severity: Severity,
    pub code: WarningCode,
    pub message: String,
    /// Vehicle fault codes, only populated for `VehicleErrorCode`
    pub error_codes: BTreeSet<String>,
}

impl SafetyWarning {
    fn new(severity: Severity, code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            error_codes: BTreeSet::new(),
        }
    }
}

/// Automatic response requested by the monitor.
///
/// Always a request for confirmation: the caller decides whether to invoke
/// return-home, so an operator is never overridden silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyAction {
    RequestReturnHome { reason: String },
}

/// Derives warnings and auto-actions from telemetry and link state
pub struct SafetyMonitor {
    /// Edge trigger for the critical-battery return-home prompt. Fires once
    /// per downward crossing of the threshold; re-arms only after the
    /// battery reads above it again.
    rth_armed: bool,
}

impl SafetyMonitor {
    pub fn new() -> Self {
        Self { rth_armed: true }
    }

    /// Evaluate one sample. Returns the complete current warning set and at
    /// most one requested action.
    pub fn assess(
        &mut self,
        sample: &TelemetrySample,
        connection_state: ConnectionState,
    ) -> (Vec<SafetyWarning>, Option<SafetyAction>) {
        let mut warnings = Vec::new();
        let mut action = None;

        let battery = sample.battery.percentage;
        if battery <= limits::BATTERY_CRITICAL_PERCENT && sample.status.flying {
            warnings.push(SafetyWarning::new(
                Severity::Critical,
                WarningCode::CriticalBattery,
                format!("Battery critical at {}%", battery),
            ));
            if self.rth_armed {
                self.rth_armed = false;
                action = Some(SafetyAction::RequestReturnHome {
                    reason: format!("Battery at {}%", battery),
                });
            }
        } else if battery <= limits::BATTERY_LOW_PERCENT
            && battery > limits::BATTERY_CRITICAL_PERCENT
        {
            warnings.push(SafetyWarning::new(
                Severity::Warning,
                WarningCode::LowBattery,
                format!("Battery low at {}%", battery),
            ));
        }

        // Re-arm the return-home prompt once the battery reads healthy again
        if battery > limits::BATTERY_CRITICAL_PERCENT {
            self.rth_armed = true;
        }

        if !sample.status.gps_fixed {
            warnings.push(SafetyWarning::new(
                Severity::Warning,
                WarningCode::GpsLost,
                "GPS fix lost",
            ));
        } else if sample.gps.satellite_count < limits::GPS_MIN_SATELLITES {
            warnings.push(SafetyWarning::new(
                Severity::Warning,
                WarningCode::WeakGps,
                format!("Weak GPS: {} satellites", sample.gps.satellite_count),
            ));
        }

        if connection_state == ConnectionState::ConnectionLost {
            warnings.push(SafetyWarning::new(
                Severity::Error,
                WarningCode::ConnectionLost,
                "Telemetry link lost",
            ));
        }

        if !sample.status.error_codes.is_empty() {
            let mut warning = SafetyWarning::new(
                Severity::Error,
                WarningCode::VehicleErrorCode,
                format!("Vehicle reports {} fault(s)", sample.status.error_codes.len()),
            );
            warning.error_codes = sample.status.error_codes.clone();
            warnings.push(warning);
        }

        if sample.battery.temperature_celsius > limits::BATTERY_TEMP_MAX_C {
            warnings.push(SafetyWarning::new(
                Severity::Warning,
                WarningCode::HighTemperature,
                format!(
                    "Battery temperature {:.1}C",
                    sample.battery.temperature_celsius
                ),
            ));
        }

        if sample.camera.sd_remaining_gb < limits::SD_MIN_REMAINING_GB {
            warnings.push(SafetyWarning::new(
                Severity::Warning,
                WarningCode::LowStorage,
                format!("{:.1} GB storage remaining", sample.camera.sd_remaining_gb),
            ));
        }

        (warnings, action)
    }

    /// Warnings for a link-health pass with no sample yet (stale or never
    /// received): only the link condition can be evaluated.
    pub fn assess_link_only(&self, connection_state: ConnectionState) -> Vec<SafetyWarning> {
        if connection_state == ConnectionState::ConnectionLost {
            vec![SafetyWarning::new(
                Severity::Error,
                WarningCode::ConnectionLost,
                "Telemetry link lost",
            )]
        } else {
            Vec::new()
        }
    }
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self::new()
    }
}
