//! groundlink: ground-station coordinator for a remote-controlled aerial
//! vehicle.
//!
//! Manages one live vehicle session end to end: the connect/disconnect
//! lifecycle, a continuous telemetry stream with link-health inference,
//! threshold-based safety evaluation with a confirm-before-acting
//! return-home prompt, and the mission/manual-command state machine. All
//! components share one `DroneSession` and talk to the vehicle only through
//! the `DroneCommandService` boundary.

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod mission;
pub mod safety;
pub mod session;
pub mod telemetry;

pub use config::CoordinatorConfig;
pub use connection::{ConnectError, ConnectionManager, DisconnectError, SessionEvent};
pub use dispatch::{ConnectAck, DroneCommandService, RemoteError, SimulatedCommandService};
pub use mission::{CommandError, MissionController};
pub use safety::{SafetyAction, SafetyMonitor, SafetyWarning, Severity, WarningCode};
pub use session::{
    ConnectMethod, ConnectionState, DroneIdentity, DroneSession, ManualCommand, Mission,
    MissionId, MissionState,
};
pub use telemetry::{SimulatedTelemetry, TelemetrySample, TelemetrySource};
