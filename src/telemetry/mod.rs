//! Telemetry sample types and the pluggable sample source

mod sample;
mod simulator;

pub use sample::{
    BatteryTelemetry, CameraTelemetry, FlightTelemetry, GimbalTelemetry, GpsTelemetry,
    StatusTelemetry, TelemetrySample,
};
pub use simulator::SimulatedTelemetry;

use async_trait::async_trait;

/// Source of telemetry samples.
///
/// The coordinator polls the source once per telemetry tick. `None` means
/// nothing arrived this tick; sustained `None` is what drives the link-health
/// machinery. A production implementation subscribes to the push channel
/// returned by connect; the simulator generates randomized deltas.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Fetch the next sample, if one is available this tick
    async fn next_sample(&self) -> Option<TelemetrySample>;
}
