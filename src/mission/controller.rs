//! Mission Controller
//!
//! Owns mission selection, start/pause/resume/stop, return-home and manual
//! command dispatch. Transitions fail closed: local state changes only after
//! the remote ack, except for `stop` and `emergency_stop`, which always apply
//! their local effect so the operator can never be left stuck behind a dead
//! remote call.

use crate::config::CoordinatorConfig;
use crate::dispatch::{bounded, DroneCommandService, RemoteError};
use crate::session::{ConnectionState, DroneSession, ManualCommand, Mission, MissionState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Failure of a mission or manual command operation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("not connected to a vehicle")]
    NotConnected,
    #[error("invalid state for this command: {0}")]
    InvalidState(String),
    #[error("another manual command is in flight")]
    Busy,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Drives the mission state machine and serializes manual commands
pub struct MissionController {
    session: Arc<RwLock<DroneSession>>,
    service: Arc<dyn DroneCommandService>,
    command_timeout: Duration,
    /// At most one manual command in flight; a second submission is rejected
    /// rather than queued, so network jitter can never reorder commands
    manual_in_flight: AtomicBool,
}

impl MissionController {
    pub fn new(
        session: Arc<RwLock<DroneSession>>,
        service: Arc<dyn DroneCommandService>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            session,
            service,
            command_timeout: config.command_timeout,
            manual_in_flight: AtomicBool::new(false),
        }
    }

    /// Select a mission for the session. Purely local; idempotent for the
    /// same mission.
    pub async fn select(&self, mission: &Mission) -> Result<(), CommandError> {
        let mut session = self.session.write().await;
        match &session.mission_state {
            MissionState::Idle | MissionState::Selected(_) => {
                session.mission_state = MissionState::Selected(mission.id.clone());
                info!("Mission selected: {} ({})", mission.name, mission.id);
                Ok(())
            }
            state => Err(CommandError::InvalidState(format!(
                "cannot select a mission while {}",
                state
            ))),
        }
    }

    /// Start the selected mission. Local state moves to Active only on
    /// remote success.
    pub async fn start(&self) -> Result<(), CommandError> {
        let mission_id = {
            let session = self.session.read().await;
            if !session.is_connected() {
                return Err(CommandError::NotConnected);
            }
            match &session.mission_state {
                MissionState::Selected(id) => id.clone(),
                state => {
                    return Err(CommandError::InvalidState(format!(
                        "cannot start from {}",
                        state
                    )))
                }
            }
        };

        bounded(self.command_timeout, self.service.start_mission(&mission_id)).await?;

        let mut session = self.session.write().await;
        if session.mission_state == MissionState::Selected(mission_id.clone()) {
            session.mission_state = MissionState::Active(mission_id.clone());
            info!("Mission {} active", mission_id);
        }
        Ok(())
    }

    /// Pause the active mission on remote success
    pub async fn pause(&self) -> Result<(), CommandError> {
        let mission_id = {
            let session = self.session.read().await;
            match &session.mission_state {
                MissionState::Active(id) => id.clone(),
                state => {
                    return Err(CommandError::InvalidState(format!(
                        "cannot pause from {}",
                        state
                    )))
                }
            }
        };

        bounded(self.command_timeout, self.service.pause_mission()).await?;

        let mut session = self.session.write().await;
        if session.mission_state == MissionState::Active(mission_id.clone()) {
            session.mission_state = MissionState::Paused(mission_id);
        }
        Ok(())
    }

    /// Resume the paused mission on remote success
    pub async fn resume(&self) -> Result<(), CommandError> {
        let mission_id = {
            let session = self.session.read().await;
            match &session.mission_state {
                MissionState::Paused(id) => id.clone(),
                state => {
                    return Err(CommandError::InvalidState(format!(
                        "cannot resume from {}",
                        state
                    )))
                }
            }
        };

        bounded(self.command_timeout, self.service.resume_mission()).await?;

        let mut session = self.session.write().await;
        if session.mission_state == MissionState::Paused(mission_id.clone()) {
            session.mission_state = MissionState::Active(mission_id);
        }
        Ok(())
    }

    /// Stop the mission. The local transition to Idle is unconditional; a
    /// remote failure is surfaced but never blocks the local reset.
    pub async fn stop(&self) -> Result<(), CommandError> {
        {
            let mut session = self.session.write().await;
            match &session.mission_state {
                MissionState::Active(id) | MissionState::Paused(id) => {
                    info!("Mission {} stopped", id);
                    session.mission_state = MissionState::Idle;
                }
                state => {
                    return Err(CommandError::InvalidState(format!(
                        "cannot stop from {}",
                        state
                    )))
                }
            }
        }

        if let Err(e) = bounded(self.command_timeout, self.service.stop_mission()).await {
            warn!("Remote stop failed after local reset: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    /// Command a return to home. Independent of the mission machine: the
    /// mission state is untouched, only the transient returning flag is set.
    pub async fn return_home(&self) -> Result<(), CommandError> {
        {
            let session = self.session.read().await;
            if !session.is_connected() {
                return Err(CommandError::NotConnected);
            }
            if let MissionState::Selected(_) = session.mission_state {
                return Err(CommandError::InvalidState(
                    "cannot return home with an unstarted mission selected".into(),
                ));
            }
        }

        bounded(self.command_timeout, self.service.return_home()).await?;

        let mut session = self.session.write().await;
        session.returning_home = true;
        info!("Return-home underway");
        Ok(())
    }

    /// Halt all movement immediately. Valid in every state except
    /// Disconnected, and the local effect is applied regardless of the
    /// remote outcome: speeds read zero, mode reads hover, and an active
    /// mission shows Paused. A remote failure is still surfaced.
    pub async fn emergency_stop(&self) -> Result<(), CommandError> {
        {
            let mut session = self.session.write().await;
            if session.connection_state == ConnectionState::Disconnected {
                return Err(CommandError::NotConnected);
            }

            if let Some(sample) = session.last_telemetry.as_mut() {
                sample.flight.speed_horizontal = 0.0;
                sample.flight.speed_vertical = 0.0;
                sample.status.mode = "hover".into();
            }
            if let MissionState::Active(id) = session.mission_state.clone() {
                session.mission_state = MissionState::Paused(id);
            }
            warn!("EMERGENCY STOP: halting all movement");
        }

        bounded(
            self.command_timeout,
            self.service.manual_control(&ManualCommand::EmergencyStop),
        )
        .await
        .map_err(CommandError::from)
    }

    /// Dispatch a manual command. At most one may be in flight; a second
    /// submission is rejected with `Busy`. Emergency stop bypasses the gate,
    /// it outranks everything else in flight.
    pub async fn manual(&self, command: ManualCommand) -> Result<(), CommandError> {
        if command == ManualCommand::EmergencyStop {
            return self.emergency_stop().await;
        }

        {
            let session = self.session.read().await;
            if !session.is_connected() {
                return Err(CommandError::NotConnected);
            }
        }

        if self
            .manual_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CommandError::Busy);
        }

        let result = bounded(self.command_timeout, self.service.manual_control(&command)).await;
        self.manual_in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                info!("Manual command {} acknowledged", command.name());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
