//! Connection Manager
//!
//! Owns the connect/disconnect lifecycle, the shared `DroneSession`, and the
//! three periodic tasks that run while connected: telemetry ingest (100 ms),
//! link-health (1 s) and mission-status poll (5 s). The shutdown watch
//! channel held here is the single source of truth for "is this session
//! still alive"; teardown flips it and aborts the task handles, so no timer
//! fires after the session is gone.

use crate::config::CoordinatorConfig;
use crate::dispatch::{bounded, DroneCommandService, RemoteError, RemoteMissionStatus};
use crate::safety::{SafetyAction, SafetyMonitor, SafetyWarning, WarningCode};
use crate::session::{
    ConnectMethod, ConnectionState, DroneIdentity, DroneSession, MissionState,
};
use crate::telemetry::TelemetrySource;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::{debug, error, info, warn};

/// Failure to establish a session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("a session is already established")]
    AlreadyConnected,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Failure of the remote leg of a disconnect. The local session is already
/// reset when this is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DisconnectError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Events emitted by the coordinator while a session is live
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Session established and telemetry started
    Connected { identity: DroneIdentity },
    /// Session torn down, locally always complete
    Disconnected { reason: String },
    /// A telemetry sample was applied to the session
    TelemetryUpdated,
    /// The active warning set changed
    WarningsChanged { warnings: Vec<SafetyWarning> },
    /// The safety monitor requests an action; the caller must confirm
    ActionRequired(SafetyAction),
    /// Telemetry went stale and the link is considered lost
    LinkLost,
    /// Telemetry resumed after a loss
    LinkRestored,
    /// The link stayed lost beyond the grace period; session was reset
    SessionExpired,
    /// The mission-status poll observed a terminal mission state
    MissionFinished { completed: bool },
}

/// Cancellation handles for the periodic tasks of one session
struct SessionTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl SessionTasks {
    fn teardown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            handle.abort();
        }
    }
}

/// Owns the session lifecycle and the periodic tasks that keep it live
pub struct ConnectionManager {
    config: CoordinatorConfig,
    session: Arc<RwLock<DroneSession>>,
    service: Arc<dyn DroneCommandService>,
    source: Arc<dyn TelemetrySource>,
    monitor: Arc<tokio::sync::Mutex<SafetyMonitor>>,
    event_tx: mpsc::Sender<SessionEvent>,
    event_rx: mpsc::Receiver<SessionEvent>,
    tasks: Mutex<Option<SessionTasks>>,
}

impl ConnectionManager {
    pub fn new(
        config: CoordinatorConfig,
        service: Arc<dyn DroneCommandService>,
        source: Arc<dyn TelemetrySource>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(100);
        Self {
            config,
            session: Arc::new(RwLock::new(DroneSession::default())),
            service,
            source,
            monitor: Arc::new(tokio::sync::Mutex::new(SafetyMonitor::new())),
            event_tx,
            event_rx,
            tasks: Mutex::new(None),
        }
    }

    /// Shared handle to the session, for the mission controller and for
    /// read-only observers
    pub fn session_handle(&self) -> Arc<RwLock<DroneSession>> {
        self.session.clone()
    }

    /// Snapshot of the current session state
    pub async fn session(&self) -> DroneSession {
        self.session.read().await.clone()
    }

    /// Receive the next session event
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.event_rx.recv().await
    }

    /// Establish a session over the given link. On success telemetry ingest
    /// and link-health start; on failure the state returns to Disconnected
    /// and nothing is retried.
    pub async fn connect(&self, method: ConnectMethod) -> Result<DroneSession, ConnectError> {
        {
            let mut session = self.session.write().await;
            if session.connection_state != ConnectionState::Disconnected {
                return Err(ConnectError::AlreadyConnected);
            }
            session.connection_state = ConnectionState::Connecting;
        }
        info!("Connecting via {}", method);

        let ack = match bounded(self.config.command_timeout, self.service.connect(method)).await
        {
            Ok(ack) => ack,
            Err(e) => {
                self.session.write().await.reset();
                error!("Connect via {} failed: {}", method, e);
                return Err(e.into());
            }
        };

        let identity = DroneIdentity {
            model: ack.model,
            firmware: ack.firmware,
            serial_number: ack.serial_number,
        };
        info!(
            "Connected to {} (fw {}, sn {}), telemetry on {}",
            identity.model, identity.firmware, identity.serial_number, ack.telemetry_channel
        );

        let snapshot = {
            let mut session = self.session.write().await;
            let now = Instant::now();
            session.connection_state = ConnectionState::Connected;
            session.identity = Some(identity.clone());
            session.last_telemetry_at = now;
            session.connected_at = Some(now);
            session.clone()
        };

        self.spawn_session_tasks();
        let _ = self.event_tx.send(SessionEvent::Connected { identity }).await;
        Ok(snapshot)
    }

    /// Tear down the session. The local reset always completes, timers are
    /// cancelled first, and only then is the remote told; a remote failure
    /// is surfaced but changes nothing locally.
    pub async fn disconnect(&self) -> Result<(), DisconnectError> {
        {
            let session = self.session.read().await;
            if session.connection_state == ConnectionState::Disconnected {
                return Ok(());
            }
        }

        if let Some(tasks) = self.tasks.lock().unwrap().take() {
            tasks.teardown();
        }

        let remote = bounded(self.config.command_timeout, self.service.disconnect()).await;

        {
            let mut session = self.session.write().await;
            if let Some(connected_at) = session.connected_at {
                info!("Session closed after {:?}", connected_at.elapsed());
            }
            session.reset();
        }
        let _ = self
            .event_tx
            .send(SessionEvent::Disconnected {
                reason: "requested".into(),
            })
            .await;

        match remote {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Remote disconnect failed after local reset: {}", e);
                Err(e.into())
            }
        }
    }

    fn spawn_session_tasks(&self) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let ingest = tokio::spawn(telemetry_loop(
            self.config.clone(),
            self.session.clone(),
            self.source.clone(),
            self.monitor.clone(),
            self.event_tx.clone(),
            shutdown_rx.clone(),
        ));
        let health = tokio::spawn(link_health_loop(
            self.config.clone(),
            self.session.clone(),
            self.monitor.clone(),
            self.event_tx.clone(),
            shutdown_tx.clone(),
            shutdown_rx.clone(),
        ));
        let poll = tokio::spawn(mission_poll_loop(
            self.config.clone(),
            self.session.clone(),
            self.service.clone(),
            self.event_tx.clone(),
            shutdown_rx,
        ));

        let tasks = SessionTasks {
            shutdown: shutdown_tx,
            handles: vec![ingest, health, poll],
        };
        if let Some(stale) = self.tasks.lock().unwrap().replace(tasks) {
            // A previous session's tasks were still registered; never let
            // two sets of timers write the same session
            stale.teardown();
        }
    }
}

fn warning_codes(warnings: &[SafetyWarning]) -> Vec<WarningCode> {
    warnings.iter().map(|w| w.code).collect()
}

/// Telemetry ingest: one source poll per tick, sample and recency applied
/// under a single lock guard, safety evaluated on every applied sample.
async fn telemetry_loop(
    config: CoordinatorConfig,
    session: Arc<RwLock<DroneSession>>,
    source: Arc<dyn TelemetrySource>,
    monitor: Arc<tokio::sync::Mutex<SafetyMonitor>>,
    event_tx: mpsc::Sender<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(config.telemetry_interval);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let Some(sample) = source.next_sample().await else {
            continue;
        };

        let mut monitor = monitor.lock().await;
        let mut guard = session.write().await;

        let restored = match guard.connection_state {
            ConnectionState::Connected => false,
            ConnectionState::ConnectionLost => {
                guard.connection_state = ConnectionState::Connected;
                true
            }
            // No delivery outside a live session
            ConnectionState::Disconnected | ConnectionState::Connecting => continue,
        };

        let (warnings, action) = monitor.assess(&sample, guard.connection_state);
        let warnings_changed = warning_codes(&guard.warnings) != warning_codes(&warnings);

        guard.last_telemetry = Some(sample);
        guard.last_telemetry_at = Instant::now();
        guard.warnings = warnings.clone();
        drop(guard);
        drop(monitor);

        if restored {
            info!("Telemetry resumed, link restored");
            let _ = event_tx.send(SessionEvent::LinkRestored).await;
        }
        // 10 Hz; dropped when the consumer lags
        let _ = event_tx.try_send(SessionEvent::TelemetryUpdated);
        if warnings_changed {
            let _ = event_tx.send(SessionEvent::WarningsChanged { warnings }).await;
        }
        if let Some(action) = action {
            warn!("Safety action requested: {:?}", action);
            let _ = event_tx.send(SessionEvent::ActionRequired(action)).await;
        }
    }

    debug!("Telemetry ingest stopped");
}

/// Link-health: telemetry recency is the sole liveness signal. Stale while
/// Connected marks the link lost; lost beyond the grace period resets the
/// session entirely.
async fn link_health_loop(
    config: CoordinatorConfig,
    session: Arc<RwLock<DroneSession>>,
    monitor: Arc<tokio::sync::Mutex<SafetyMonitor>>,
    event_tx: mpsc::Sender<SessionEvent>,
    shutdown_tx: watch::Sender<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(config.link_check_interval);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let mut monitor = monitor.lock().await;
        let mut guard = session.write().await;
        let silent_for = guard.last_telemetry_at.elapsed();

        match guard.connection_state {
            ConnectionState::Connected if silent_for > config.telemetry_stale_after => {
                warn!("No telemetry for {:?}, marking link lost", silent_for);
                guard.connection_state = ConnectionState::ConnectionLost;

                let warnings = match &guard.last_telemetry {
                    Some(sample) => monitor.assess(sample, ConnectionState::ConnectionLost).0,
                    None => monitor.assess_link_only(ConnectionState::ConnectionLost),
                };
                guard.warnings = warnings.clone();
                drop(guard);
                drop(monitor);

                let _ = event_tx.send(SessionEvent::LinkLost).await;
                let _ = event_tx.send(SessionEvent::WarningsChanged { warnings }).await;
            }
            ConnectionState::ConnectionLost if silent_for > config.link_lost_grace => {
                error!(
                    "Link lost for {:?}, tearing session down",
                    silent_for
                );
                guard.reset();
                drop(guard);
                drop(monitor);

                // Stops the sibling timers as well; the manager's handle
                // table is cleared lazily on the next connect/disconnect
                let _ = shutdown_tx.send(true);
                let _ = event_tx.send(SessionEvent::SessionExpired).await;
            }
            _ => {}
        }
    }

    debug!("Link-health check stopped");
}

/// Mission-status refresh for services that push no updates. Fail closed: a
/// poll error leaves the mission state exactly as it was.
async fn mission_poll_loop(
    config: CoordinatorConfig,
    session: Arc<RwLock<DroneSession>>,
    service: Arc<dyn DroneCommandService>,
    event_tx: mpsc::Sender<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(config.mission_poll_interval);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let mission_id = {
            let guard = session.read().await;
            if !guard.is_connected() {
                continue;
            }
            match &guard.mission_state {
                MissionState::Active(id) | MissionState::Paused(id) => id.clone(),
                _ => continue,
            }
        };

        let status = match bounded(config.command_timeout, service.query_mission()).await {
            Ok(status) => status,
            Err(e) => {
                debug!("Mission status poll failed: {}", e);
                continue;
            }
        };

        let mut guard = session.write().await;
        match (status, guard.mission_state.clone()) {
            (RemoteMissionStatus::Running, MissionState::Paused(id)) if id == mission_id => {
                guard.mission_state = MissionState::Active(id);
            }
            (RemoteMissionStatus::Paused, MissionState::Active(id)) if id == mission_id => {
                guard.mission_state = MissionState::Paused(id);
            }
            (RemoteMissionStatus::Completed | RemoteMissionStatus::Aborted, state)
                if state.mission_id() == Some(&mission_id) =>
            {
                let completed = status == RemoteMissionStatus::Completed;
                info!(
                    "Mission {} {}",
                    mission_id,
                    if completed { "completed" } else { "aborted" }
                );
                guard.mission_state = MissionState::Idle;
                guard.returning_home = false;
                drop(guard);
                let _ = event_tx.send(SessionEvent::MissionFinished { completed }).await;
            }
            _ => {}
        }
    }

    debug!("Mission status poll stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::SimulatedCommandService;
    use crate::telemetry::{SimulatedTelemetry, TelemetrySample};
    use std::time::Duration;

    fn manager() -> (
        ConnectionManager,
        Arc<SimulatedCommandService>,
        Arc<SimulatedTelemetry>,
    ) {
        let service = Arc::new(SimulatedCommandService::new());
        let source = Arc::new(SimulatedTelemetry::new());
        let manager = ConnectionManager::new(
            CoordinatorConfig::default(),
            service.clone(),
            source.clone(),
        );
        (manager, service, source)
    }

    fn drain(manager: &mut ConnectionManager) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = manager.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_populates_identity() {
        let (manager, _, _) = manager();

        let session = manager.connect(ConnectMethod::WifiLink).await.unwrap();
        assert_eq!(session.connection_state, ConnectionState::Connected);
        let identity = session.identity.unwrap();
        assert_eq!(identity.model, "SIM-X4");

        manager.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_returns_to_disconnected() {
        let (manager, service, _) = manager();
        service.fail_next("connect", RemoteError::Network("no route".into()));

        let result = manager.connect(ConnectMethod::CloudLink).await;
        assert!(matches!(result, Err(ConnectError::Remote(_))));
        assert_eq!(
            manager.session().await.connection_state,
            ConnectionState::Disconnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_connect_is_rejected() {
        let (manager, _, _) = manager();
        manager.connect(ConnectMethod::UsbLink).await.unwrap();

        let result = manager.connect(ConnectMethod::UsbLink).await;
        assert!(matches!(result, Err(ConnectError::AlreadyConnected)));

        manager.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_telemetry_flows_into_session() {
        let (manager, _, _) = manager();
        manager.connect(ConnectMethod::WifiLink).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        let session = manager.session().await;
        assert!(session.last_telemetry.is_some());
        manager.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_telemetry_marks_link_lost() {
        let (mut manager, _, source) = manager();
        manager.connect(ConnectMethod::WifiLink).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        source.set_muted(true);
        tokio::time::sleep(Duration::from_secs(4)).await;

        let session = manager.session().await;
        assert_eq!(session.connection_state, ConnectionState::ConnectionLost);
        assert!(warning_codes(&session.warnings).contains(&WarningCode::ConnectionLost));

        let events = drain(&mut manager);
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::LinkLost)));

        manager.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_sample_restores_lost_link() {
        let (mut manager, _, source) = manager();
        manager.connect(ConnectMethod::WifiLink).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        source.set_muted(true);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(
            manager.session().await.connection_state,
            ConnectionState::ConnectionLost
        );

        source.set_muted(false);
        tokio::time::sleep(Duration::from_millis(300)).await;

        let session = manager.session().await;
        assert_eq!(session.connection_state, ConnectionState::Connected);
        assert!(!warning_codes(&session.warnings).contains(&WarningCode::ConnectionLost));

        let events = drain(&mut manager);
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::LinkRestored)));

        manager.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_expiry_resets_session() {
        let (mut manager, _, source) = manager();
        manager.connect(ConnectMethod::WifiLink).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        source.set_muted(true);
        tokio::time::sleep(Duration::from_secs(40)).await;

        let session = manager.session().await;
        assert_eq!(session.connection_state, ConnectionState::Disconnected);
        assert!(session.identity.is_none());

        let events = drain(&mut manager);
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::SessionExpired)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_resets_even_if_remote_fails() {
        let (manager, service, _) = manager();
        manager.connect(ConnectMethod::WifiLink).await.unwrap();

        service.fail_next("disconnect", RemoteError::Timeout);
        let result = manager.disconnect().await;
        assert!(matches!(result, Err(DisconnectError::Remote(_))));
        assert_eq!(
            manager.session().await.connection_state,
            ConnectionState::Disconnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_telemetry_after_disconnect() {
        let (manager, _, _) = manager();
        manager.connect(ConnectMethod::WifiLink).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        manager.disconnect().await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        let session = manager.session().await;
        assert!(session.last_telemetry.is_none());
        assert_eq!(session.connection_state, ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_battery_requests_return_home_once() {
        let (mut manager, _, source) = manager();
        manager.connect(ConnectMethod::WifiLink).await.unwrap();

        let mut sample = TelemetrySample::grounded();
        sample.battery.percentage = 15;
        sample.status.flying = true;
        source.set_sample(sample);
        source.set_drain_rate(0);

        tokio::time::sleep(Duration::from_secs(2)).await;

        let session = manager.session().await;
        assert!(warning_codes(&session.warnings).contains(&WarningCode::CriticalBattery));

        let requests = drain(&mut manager)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::ActionRequired(_)))
            .count();
        assert_eq!(requests, 1);

        manager.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_mission_poll_observes_completion() {
        let (mut manager, service, _) = manager();
        manager.connect(ConnectMethod::WifiLink).await.unwrap();
        {
            let handle = manager.session_handle();
            handle.write().await.mission_state =
                MissionState::Active(crate::session::MissionId("m-9".into()));
        }
        service.set_mission_status(RemoteMissionStatus::Completed);

        tokio::time::sleep(Duration::from_secs(6)).await;

        let session = manager.session().await;
        assert_eq!(session.mission_state, MissionState::Idle);
        assert!(drain(&mut manager)
            .iter()
            .any(|e| matches!(e, SessionEvent::MissionFinished { completed: true })));

        manager.disconnect().await.unwrap();
    }
}
