//! Coordinator configuration

use std::time::Duration;

/// Timing configuration for a coordinator instance
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Telemetry ingest cadence
    pub telemetry_interval: Duration,
    /// Link-health staleness check cadence
    pub link_check_interval: Duration,
    /// Mission status refresh cadence (used when the service pushes no updates)
    pub mission_poll_interval: Duration,
    /// Telemetry silence that marks the link as lost
    pub telemetry_stale_after: Duration,
    /// How long a session may sit in ConnectionLost before it is torn down
    pub link_lost_grace: Duration,
    /// Bound on any single remote call
    pub command_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            telemetry_interval: Duration::from_millis(100),
            link_check_interval: Duration::from_secs(1),
            mission_poll_interval: Duration::from_secs(5),
            telemetry_stale_after: Duration::from_millis(
                crate::session::limits::TELEMETRY_STALE_MS,
            ),
            link_lost_grace: Duration::from_secs(30),
            command_timeout: Duration::from_secs(3),
        }
    }
}
