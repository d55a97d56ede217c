//! Drone session state
//!
//! One `DroneSession` is the root aggregate for a live vehicle link. Every
//! coordinator component reads and writes it through the same lock; the
//! explicit `ConnectionState` / `MissionState` enums rule out combinations
//! like "mission active while disconnected".

use crate::safety::SafetyWarning;
use crate::telemetry::TelemetrySample;
use tokio::time::Instant;

/// Operational limits and timing thresholds for the coordinator
pub mod limits {
    /// Battery percentage at or below which a flying vehicle is critical
    pub const BATTERY_CRITICAL_PERCENT: u8 = 20;

    /// Battery percentage at or below which a low-battery warning is raised
    pub const BATTERY_LOW_PERCENT: u8 = 30;

    /// Minimum satellite count for a solid GPS fix
    pub const GPS_MIN_SATELLITES: u32 = 8;

    /// Battery temperature ceiling in Celsius
    pub const BATTERY_TEMP_MAX_C: f32 = 50.0;

    /// Minimum remaining SD capacity in gigabytes
    pub const SD_MIN_REMAINING_GB: f32 = 2.0;

    /// Telemetry silence that marks the link as lost
    pub const TELEMETRY_STALE_MS: u64 = 3000;
}

/// Connection lifecycle of the vehicle link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Telemetry has gone stale; the vehicle runs its own fail-safe while
    /// we can only report
    ConnectionLost,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::ConnectionLost => write!(f, "connection-lost"),
        }
    }
}

/// How the ground station reaches the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMethod {
    UsbLink,
    WifiLink,
    CloudLink,
}

impl std::fmt::Display for ConnectMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectMethod::UsbLink => write!(f, "usb"),
            ConnectMethod::WifiLink => write!(f, "wifi"),
            ConnectMethod::CloudLink => write!(f, "cloud"),
        }
    }
}

/// Vehicle identity reported by the command service on connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroneIdentity {
    pub model: String,
    pub firmware: String,
    pub serial_number: String,
}

/// Identifier of a planned mission
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MissionId(pub String);

impl std::fmt::Display for MissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Read-only mission reference data selected by the user
#[derive(Debug, Clone, PartialEq)]
pub struct Mission {
    pub id: MissionId,
    pub name: String,
    pub waypoint_count: u32,
    pub estimated_time_minutes: u32,
}

/// Mission lifecycle; the id travels with the state so a paused mission can
/// never lose track of what it paused
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MissionState {
    #[default]
    Idle,
    Selected(MissionId),
    Active(MissionId),
    Paused(MissionId),
}

impl MissionState {
    /// The mission id, if any mission is selected or running
    pub fn mission_id(&self) -> Option<&MissionId> {
        match self {
            MissionState::Idle => None,
            MissionState::Selected(id) | MissionState::Active(id) | MissionState::Paused(id) => {
                Some(id)
            }
        }
    }
}

impl std::fmt::Display for MissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissionState::Idle => write!(f, "idle"),
            MissionState::Selected(id) => write!(f, "selected({})", id),
            MissionState::Active(id) => write!(f, "active({})", id),
            MissionState::Paused(id) => write!(f, "paused({})", id),
        }
    }
}

/// Short-lived manual control intent; at most one in flight at a time
#[derive(Debug, Clone, PartialEq)]
pub enum ManualCommand {
    Takeoff,
    Land,
    Move { x: f32, y: f32, z: f32 },
    Rotate { yaw: f32 },
    EmergencyStop,
}

impl ManualCommand {
    /// Short name used in logs and the simulated service call record
    pub fn name(&self) -> &'static str {
        match self {
            ManualCommand::Takeoff => "takeoff",
            ManualCommand::Land => "land",
            ManualCommand::Move { .. } => "move",
            ManualCommand::Rotate { .. } => "rotate",
            ManualCommand::EmergencyStop => "emergency_stop",
        }
    }
}

/// Root aggregate for one live vehicle link
#[derive(Debug, Clone)]
pub struct DroneSession {
    pub connection_state: ConnectionState,
    /// Present only once connected
    pub identity: Option<DroneIdentity>,
    pub last_telemetry: Option<TelemetrySample>,
    /// Recency marker for link-health; updated together with `last_telemetry`
    pub last_telemetry_at: Instant,
    pub mission_state: MissionState,
    /// Active warnings, recomputed wholesale on every sample and health tick
    pub warnings: Vec<SafetyWarning>,
    /// Transient flag set while a return-home is underway; independent of
    /// the mission machine
    pub returning_home: bool,
    pub connected_at: Option<Instant>,
}

impl Default for DroneSession {
    fn default() -> Self {
        Self {
            connection_state: ConnectionState::Disconnected,
            identity: None,
            last_telemetry: None,
            last_telemetry_at: Instant::now(),
            mission_state: MissionState::Idle,
            warnings: Vec::new(),
            returning_home: false,
            connected_at: None,
        }
    }
}

impl DroneSession {
    /// Reset to disconnected defaults, keeping nothing from the old link
    pub fn reset(&mut self) {
        *self = DroneSession::default();
    }

    /// Whether the link is usable for issuing commands
    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_is_disconnected() {
        let session = DroneSession::default();
        assert_eq!(session.connection_state, ConnectionState::Disconnected);
        assert_eq!(session.mission_state, MissionState::Idle);
        assert!(session.identity.is_none());
        assert!(session.warnings.is_empty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = DroneSession::default();
        session.connection_state = ConnectionState::Connected;
        session.mission_state = MissionState::Active(MissionId("m-1".into()));
        session.returning_home = true;

        session.reset();
        assert_eq!(session.connection_state, ConnectionState::Disconnected);
        assert_eq!(session.mission_state, MissionState::Idle);
        assert!(!session.returning_home);
    }

    #[test]
    fn test_mission_id_accessor() {
        let id = MissionId("m-7".into());
        assert_eq!(MissionState::Paused(id.clone()).mission_id(), Some(&id));
        assert_eq!(MissionState::Idle.mission_id(), None);
    }
}
