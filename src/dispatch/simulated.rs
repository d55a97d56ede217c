//! Simulated Drone Command Service
//!
//! In-process stand-in for the remote service, in the same spirit as running
//! the radio link over a local TCP socket during development. Records every
//! call and lets tests inject per-call failures and latency.

use super::{ConnectAck, DroneCommandService, RemoteError, RemoteMissionStatus};
use crate::session::{ConnectMethod, ManualCommand, MissionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

struct ServiceState {
    /// Failures to inject, keyed by operation name; consumed on use
    fail_next: HashMap<&'static str, RemoteError>,
    /// Extra latency applied to every call
    latency: Duration,
    calls: Vec<String>,
    mission_status: RemoteMissionStatus,
}

/// Scriptable in-process command service
pub struct SimulatedCommandService {
    state: Mutex<ServiceState>,
}

impl SimulatedCommandService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServiceState {
                fail_next: HashMap::new(),
                latency: Duration::ZERO,
                calls: Vec::new(),
                mission_status: RemoteMissionStatus::Running,
            }),
        }
    }

    /// Make the next call to `op` fail with `error`
    pub fn fail_next(&self, op: &'static str, error: RemoteError) {
        self.state.lock().unwrap().fail_next.insert(op, error);
    }

    /// Apply fixed latency to every call
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = latency;
    }

    pub fn set_mission_status(&self, status: RemoteMissionStatus) {
        self.state.lock().unwrap().mission_status = status;
    }

    /// Operation names recorded so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    async fn exchange(&self, op: &'static str) -> Result<(), RemoteError> {
        let (latency, injected) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(op.to_string());
            (state.latency, state.fail_next.remove(op))
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match injected {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for SimulatedCommandService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DroneCommandService for SimulatedCommandService {
    async fn connect(&self, method: ConnectMethod) -> Result<ConnectAck, RemoteError> {
        self.exchange("connect").await?;
        Ok(ConnectAck {
            model: "SIM-X4".into(),
            firmware: "1.4.2".into(),
            serial_number: format!("SIM-{}", method),
            telemetry_channel: "sim://telemetry".into(),
        })
    }

    async fn disconnect(&self) -> Result<(), RemoteError> {
        self.exchange("disconnect").await
    }

    async fn start_mission(&self, mission_id: &MissionId) -> Result<(), RemoteError> {
        let _ = mission_id;
        self.exchange("start_mission").await
    }

    async fn pause_mission(&self) -> Result<(), RemoteError> {
        self.exchange("pause_mission").await
    }

    async fn resume_mission(&self) -> Result<(), RemoteError> {
        self.exchange("resume_mission").await
    }

    async fn stop_mission(&self) -> Result<(), RemoteError> {
        self.exchange("stop_mission").await
    }

    async fn return_home(&self) -> Result<(), RemoteError> {
        self.exchange("return_home").await
    }

    async fn manual_control(&self, command: &ManualCommand) -> Result<(), RemoteError> {
        self.exchange(match command {
            ManualCommand::Takeoff => "manual:takeoff",
            ManualCommand::Land => "manual:land",
            ManualCommand::Move { .. } => "manual:move",
            ManualCommand::Rotate { .. } => "manual:rotate",
            ManualCommand::EmergencyStop => "manual:emergency_stop",
        })
        .await
    }

    async fn query_mission(&self) -> Result<RemoteMissionStatus, RemoteError> {
        self.exchange("query_mission").await?;
        Ok(self.state.lock().unwrap().mission_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_returns_identity_and_channel() {
        let service = SimulatedCommandService::new();
        let ack = service.connect(ConnectMethod::WifiLink).await.unwrap();
        assert_eq!(ack.model, "SIM-X4");
        assert!(!ack.telemetry_channel.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed() {
        let service = SimulatedCommandService::new();
        service.fail_next("pause_mission", RemoteError::Network("radio".into()));

        assert!(service.pause_mission().await.is_err());
        assert!(service.pause_mission().await.is_ok());
    }

    #[tokio::test]
    async fn test_calls_are_recorded_in_order() {
        let service = SimulatedCommandService::new();
        let _ = service.return_home().await;
        let _ = service.manual_control(&ManualCommand::Land).await;
        assert_eq!(service.calls(), vec!["return_home", "manual:land"]);
    }
}
