use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use zbus::Connection;

mod bluetooth;
mod conf;
mod connection;
mod ipc;
mod log;
mod names;
mod notification;
mod pulse;
mod serde_ext;

use bluetooth::manager::BluezManager;
use bluetooth::registry::DeviceRegistry;
use bluetooth::watcher::PresenceWatcher;
use conf::Conf;
use connection::{Orchestrator, OrchestratorSettings, StatusEvent};
use notification::Notification;
use pulse::PulseControl;

#[tokio::main]
async fn main() -> Result<()> {
    log::init_tracing();
    debug!("Tracing initialized");

    let conf = Conf::load();
    debug!("Configuration: {:?}", conf);

    let system = Connection::system()
        .await
        .context("Could not connect to the system bus")?;

    let sound = Arc::new(PulseControl::new());
    let manager = Arc::new(BluezManager::new(system.clone(), conf));
    let registry = DeviceRegistry::new(system.clone(), conf);

    let (status_tx, status_rx) = broadcast::channel(32);

    let (orchestrator, handle) = Orchestrator::new(
        manager,
        sound.clone(),
        OrchestratorSettings::from_conf(conf),
        status_tx.clone(),
    );
    orchestrator.listen();

    PresenceWatcher::new(
        system,
        conf,
        sound.clone(),
        handle.clone(),
        status_tx.clone(),
    )
    .listen();

    let server = ipc::IpcServer::bind(registry, handle, sound, conf)
        .await
        .context("Could not bind the control socket")?;
    server.listen();

    spawn_status_task(status_rx, conf.notifications_enabled);

    tokio::signal::ctrl_c()
        .await
        .context("Could not listen for the shutdown signal")?;
    info!("Shutting down.");
    Ok(())
}

/// Renders orchestrator status events as logs and desktop notifications, the
/// stand-in for the panel's connection dialog.
fn spawn_status_task(mut status: broadcast::Receiver<StatusEvent>, notifications_enabled: bool) {
    tokio::spawn(async move {
        let mut last_id = 0u32;
        loop {
            match status.recv().await {
                Ok(event) => {
                    last_id = render_status(event, notifications_enabled, last_id).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Status consumer lagged; {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn render_status(event: StatusEvent, notifications_enabled: bool, last_id: u32) -> u32 {
    let notification = match event {
        StatusEvent::ConnectionStarted { label } => {
            info!("Connecting to Bluetooth audio device '{}'...", label);
            Notification::builder()
                .summary("Connecting Audio Device")
                .body(format!("Connecting to Bluetooth audio device '{label}'..."))
                .icon("preferences-system-bluetooth")
        }
        StatusEvent::ConnectionFailed { reason } => Notification::builder()
            .summary("Connecting Audio Device")
            .body(format!(
                "Failed to connect to device - {reason}. Try to connect again."
            ))
            .icon("preferences-system-bluetooth"),
        StatusEvent::ConnectionSucceeded => {
            info!("Bluetooth audio device connected");
            Notification::builder()
                .summary("Connecting Audio Device")
                .body("Bluetooth audio device connected.")
                .icon("preferences-system-bluetooth")
        }
        StatusEvent::DisplayRefresh => {
            debug!("Device state changed; clients should refresh");
            return last_id;
        }
    };

    if !notifications_enabled {
        return last_id;
    }

    match notification.replaces_id(last_id).show().await {
        Ok(id) => id,
        Err(e) => {
            error!("Failed to show notification: {}", e);
            last_id
        }
    }
}
