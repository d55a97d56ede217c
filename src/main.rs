use anyhow::Result;
use groundlink::{
    ConnectMethod, ConnectionManager, CoordinatorConfig, Mission, MissionController, MissionId,
    SafetyAction, SessionEvent, SimulatedCommandService, SimulatedTelemetry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = CoordinatorConfig::default();
    let service = Arc::new(SimulatedCommandService::new());
    let source = Arc::new(SimulatedTelemetry::new());
    source.set_drain_rate(20);

    let mut conn = ConnectionManager::new(config.clone(), service.clone(), source.clone());
    let controller = MissionController::new(conn.session_handle(), service.clone(), &config);

    info!("Ground station starting (simulated link)");
    conn.connect(ConnectMethod::WifiLink).await?;

    let mission = Mission {
        id: MissionId("demo-001".into()),
        name: "Demo perimeter survey".into(),
        waypoint_count: 16,
        estimated_time_minutes: 12,
    };
    controller.select(&mission).await?;
    controller.start().await?;
    source.set_flying(true);
    info!("Mission {} started, vehicle airborne", mission.id);

    // Periodic status line from the shared session
    let session = conn.session_handle();
    let status_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            ticker.tick().await;
            let guard = session.read().await;
            if let Some(sample) = &guard.last_telemetry {
                info!(
                    "state={} mission={} battery={}% alt={:.1}m home_dist={:.0}m",
                    guard.connection_state,
                    guard.mission_state,
                    sample.battery.percentage,
                    sample.flight.altitude_agl,
                    sample.flight.distance_from_home,
                );
            }
        }
    });

    // Event loop: report session events, confirm the first return-home
    // prompt, shut down on ctrl-c
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            event = conn.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::WarningsChanged { warnings } => {
                        if warnings.is_empty() {
                            info!("All warnings cleared");
                        }
                        for warning in &warnings {
                            warn!("[{:?}] {}", warning.severity, warning.message);
                        }
                    }
                    SessionEvent::ActionRequired(SafetyAction::RequestReturnHome { reason }) => {
                        warn!("Return-home requested ({}), confirming", reason);
                        if let Err(e) = controller.return_home().await {
                            error!("Return-home failed: {}", e);
                        }
                    }
                    SessionEvent::LinkLost => warn!("Link lost, vehicle on local fail-safe"),
                    SessionEvent::LinkRestored => info!("Link restored"),
                    SessionEvent::SessionExpired => {
                        error!("Link did not recover, session expired");
                        break;
                    }
                    SessionEvent::MissionFinished { completed } => {
                        info!("Mission finished (completed: {})", completed);
                    }
                    SessionEvent::Disconnected { reason } => {
                        info!("Disconnected: {}", reason);
                        break;
                    }
                    SessionEvent::Connected { .. } | SessionEvent::TelemetryUpdated => {}
                }
            }
        }
    }

    status_task.abort();
    if let Err(e) = conn.disconnect().await {
        warn!("Disconnect: {}", e);
    }
    Ok(())
}
