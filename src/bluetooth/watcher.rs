//! Watches the wireless manager's presence on the system bus.
//!
//! Two concerns: the manager service appearing/disappearing (reconnect the
//! previously-default devices, or void all in-flight state), and individual
//! devices coming and going (refresh the display when one of them is a
//! current default).

use std::sync::Arc;

use anyhow::Result;
use futures_util::stream::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use zbus::{
    Connection,
    fdo::{DBusProxy, NameOwnerChanged, ObjectManagerProxy},
    names::BusName,
};

use crate::conf::Conf;
use crate::connection::{OrchestratorHandle, StatusEvent};
use crate::names;
use crate::pulse::server::SoundServer;

pub struct PresenceWatcher<S> {
    conn: Connection,
    conf: &'static Conf,
    sound: Arc<S>,
    orchestrator: OrchestratorHandle,
    status: broadcast::Sender<StatusEvent>,
}

impl<S: SoundServer> PresenceWatcher<S> {
    pub fn new(
        conn: Connection,
        conf: &'static Conf,
        sound: Arc<S>,
        orchestrator: OrchestratorHandle,
        status: broadcast::Sender<StatusEvent>,
    ) -> Self {
        Self {
            conn,
            conf,
            sound,
            orchestrator,
            status,
        }
    }

    /// Spawns the watcher to run in a background task.
    pub fn listen(self) -> JoinHandle<()> {
        info!("Spawning presence watcher task.");
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                error!("Presence watcher failed: {}", e);
            }
        })
    }

    async fn run(&self) -> Result<()> {
        let dbus = DBusProxy::new(&self.conn).await?;
        let mut owner_changes = dbus.receive_name_owner_changed().await?;

        let object_manager = ObjectManagerProxy::builder(&self.conn)
            .destination(self.conf.dbus.service.as_str())?
            .path("/")?
            .build()
            .await?;
        let mut added = object_manager.receive_interfaces_added().await?;
        let mut removed = object_manager.receive_interfaces_removed().await?;

        // ownership changes only fire on transitions; pick up a manager that
        // is already on the bus
        let service = BusName::try_from(self.conf.dbus.service.as_str())?;
        if dbus.name_has_owner(service).await.unwrap_or(false) {
            self.on_service_appeared().await;
        }

        info!("Watching {} on the system bus...", self.conf.dbus.service);
        loop {
            tokio::select! {
                Some(signal) = owner_changes.next() => self.on_owner_changed(signal).await,
                Some(signal) = added.next() => {
                    match signal.args() {
                        Ok(args) => self.on_object_event(args.object_path().as_str()).await,
                        Err(e) => warn!("Could not parse InterfacesAdded signal: {}", e),
                    }
                }
                Some(signal) = removed.next() => {
                    match signal.args() {
                        Ok(args) => self.on_object_event(args.object_path().as_str()).await,
                        Err(e) => warn!("Could not parse InterfacesRemoved signal: {}", e),
                    }
                }
                else => break,
            }
        }

        Ok(())
    }

    async fn on_owner_changed(&self, signal: NameOwnerChanged) {
        let args = match signal.args() {
            Ok(args) => args,
            Err(e) => {
                warn!("Could not parse NameOwnerChanged signal: {}", e);
                return;
            }
        };

        if args.name().as_str() != self.conf.dbus.service {
            return;
        }

        if args.new_owner().is_some() {
            debug!("Name {} owned on the bus", self.conf.dbus.service);
            self.on_service_appeared().await;
        } else {
            debug!("Name {} unowned on the bus", self.conf.dbus.service);
            self.orchestrator.manager_lost();
        }
    }

    /// The manager (re)appeared: if a Bluetooth device is the current default
    /// output or input, hand the orchestrator a reconnect chain for it (and
    /// for the other one, when they are different physical devices).
    async fn on_service_appeared(&self) {
        let sink = self.read_default(self.sound.default_sink().await);
        let source = self.read_default(self.sound.default_source().await);

        let sink_device = sink.as_deref().and_then(|n| self.translate(n));
        let source_device = source.as_deref().and_then(|n| self.translate(n));

        let secondary = match (&sink, &source) {
            (Some(sink), Some(source))
                if sink_device.is_some() && !names::same_endpoint_device(sink, source) =>
            {
                source_device.clone()
            }
            _ => None,
        };

        if let Some(primary) = sink_device.or(source_device) {
            info!("Reconnecting previously-default Bluetooth audio devices");
            self.orchestrator.reconnect(primary, secondary);
        }
    }

    /// A device appeared or vanished: if it is the current default output or
    /// input, the presentation layer must re-read its state.
    async fn on_object_event(&self, path: &str) {
        let sink = self.sound.default_sink().await.ok();
        let source = self.sound.default_source().await.ok();

        let is_default = sink.as_deref().is_some_and(|n| names::same_device(n, path))
            || source.as_deref().is_some_and(|n| names::same_device(n, path));

        if is_default {
            debug!("Default Bluetooth audio device changed presence: {}", path);
            let _ = self.status.send(StatusEvent::DisplayRefresh);
        }
    }

    fn read_default(&self, endpoint: Result<String>) -> Option<String> {
        match endpoint {
            Ok(name) => Some(name),
            Err(e) => {
                warn!("Could not read a sound-server default: {}", e);
                None
            }
        }
    }

    fn translate(&self, endpoint_name: &str) -> Option<String> {
        names::address_from_endpoint_name(endpoint_name)
            .map(|addr| names::device_path(addr, &self.conf.dbus.adapter_path))
    }
}
