//! Safety evaluation
//!
//! Threshold rules over the latest telemetry sample and link state. Warnings
//! are advisory and recomputed wholesale; the only action the monitor can
//! request is a return-home, and only as a request for confirmation.

mod monitor;

pub use monitor::{SafetyAction, SafetyMonitor, SafetyWarning, Severity, WarningCode};
