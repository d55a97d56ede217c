//! Command dispatch boundary
//!
//! Maps coordinator intents onto request/response exchanges with the Drone
//! Command Service. Stateless by design: no retries here, since blindly
//! re-sending motion commands to a flying vehicle is unsafe. Retries, if
//! wanted, are caller policy.

mod simulated;

pub use simulated::SimulatedCommandService;

use crate::session::{ConnectMethod, ManualCommand, MissionId};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single remote exchange
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote call timed out")]
    Timeout,
    #[error("command rejected: {0}")]
    Rejected(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Response to a successful connect exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectAck {
    pub model: String,
    pub firmware: String,
    pub serial_number: String,
    /// Out-of-band push source for telemetry, handed to the ingest layer
    pub telemetry_channel: String,
}

/// Remote mission status, polled when the service pushes no updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMissionStatus {
    Running,
    Paused,
    Completed,
    Aborted,
}

/// The Drone Command Service at its interface boundary.
///
/// One method per intent; every call is a single exchange that may fail with
/// a `RemoteError`. Transport is an integration detail behind this trait.
#[async_trait]
pub trait DroneCommandService: Send + Sync {
    async fn connect(&self, method: ConnectMethod) -> Result<ConnectAck, RemoteError>;
    async fn disconnect(&self) -> Result<(), RemoteError>;
    async fn start_mission(&self, mission_id: &MissionId) -> Result<(), RemoteError>;
    async fn pause_mission(&self) -> Result<(), RemoteError>;
    async fn resume_mission(&self) -> Result<(), RemoteError>;
    async fn stop_mission(&self) -> Result<(), RemoteError>;
    async fn return_home(&self) -> Result<(), RemoteError>;
    async fn manual_control(&self, command: &ManualCommand) -> Result<(), RemoteError>;
    /// Current mission status, for the refresh poll
    async fn query_mission(&self) -> Result<RemoteMissionStatus, RemoteError>;
}

/// Bound a remote call; an elapsed timer becomes `RemoteError::Timeout` and
/// the caller mutates no state for it.
pub async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, RemoteError>>,
) -> Result<T, RemoteError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_maps_elapsed_to_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        };
        let result = bounded(Duration::from_secs(3), slow).await;
        assert_eq!(result, Err(RemoteError::Timeout));
    }

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let quick = async { Err::<(), _>(RemoteError::Rejected("busy".into())) };
        let result = bounded(Duration::from_secs(3), quick).await;
        assert_eq!(result, Err(RemoteError::Rejected("busy".into())));
    }
}
