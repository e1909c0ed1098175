//! The async driver around the connection state machine.
//!
//! Owns the single in-flight intent, executes the machine's actions against
//! the manager and sound-server bindings, and feeds completions back in.
//! Every dispatched call is tagged with the generation current at dispatch
//! time; a completion from an older generation is discarded on arrival, so a
//! superseded attempt can never apply its result to newer state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bluetooth::manager::{DeviceManager, ManagerError};
use crate::conf::Conf;
use crate::names;
use crate::pulse::server::SoundServer;

use super::StatusEvent;
use super::state::{Action, ConnectionEvent, ConnectionState, Role, Target, transition};

/// Commands accepted by the orchestrator.
#[derive(Debug, Clone)]
pub enum Command {
    /// User-initiated device selection for a role.
    Connect {
        path: String,
        role: Role,
        label: String,
    },
    /// Presence-driven reconnection of up to two previously-default devices.
    Reconnect {
        primary: String,
        secondary: Option<String>,
    },
    /// The manager service vanished.
    ManagerLost,
}

/// The slice of configuration the orchestrator needs, passed explicitly so
/// tests can construct it directly.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub adapter_path: String,
    pub headset_profile: String,
    pub profile_poll: Vec<Duration>,
}

impl OrchestratorSettings {
    pub fn from_conf(conf: &Conf) -> Self {
        Self {
            adapter_path: conf.dbus.adapter_path.clone(),
            headset_profile: conf.pulse.headset_profile.clone(),
            profile_poll: conf.pulse.profile_poll.clone(),
        }
    }
}

/// Cloneable entry point for menu actions and the presence watcher.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl OrchestratorHandle {
    /// Request that the device at `path` becomes the default for `role`.
    pub fn request_connect(&self, path: impl Into<String>, role: Role, label: impl Into<String>) {
        let _ = self.tx.send(Command::Connect {
            path: path.into(),
            role,
            label: label.into(),
        });
    }

    /// Reconnect the previously-default device(s) after the manager
    /// reappeared.
    pub fn reconnect(&self, primary: impl Into<String>, secondary: Option<String>) {
        let _ = self.tx.send(Command::Reconnect {
            primary: primary.into(),
            secondary,
        });
    }

    /// Drop all in-flight intent state; the manager is gone.
    pub fn manager_lost(&self) {
        let _ = self.tx.send(Command::ManagerLost);
    }
}

pub struct Orchestrator<M, S> {
    manager: Arc<M>,
    sound: Arc<S>,
    settings: OrchestratorSettings,
    state: ConnectionState,
    generation: u64,
    /// User request parked while a reconnect chain finishes its in-flight
    /// attempt.
    deferred: Option<(String, Role, String)>,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<(u64, ConnectionEvent)>,
    completions: mpsc::UnboundedReceiver<(u64, ConnectionEvent)>,
    status: broadcast::Sender<StatusEvent>,
}

impl<M: DeviceManager, S: SoundServer> Orchestrator<M, S> {
    pub fn new(
        manager: Arc<M>,
        sound: Arc<S>,
        settings: OrchestratorSettings,
        status: broadcast::Sender<StatusEvent>,
    ) -> (Self, OrchestratorHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();

        let orchestrator = Self {
            manager,
            sound,
            settings,
            state: ConnectionState::Idle,
            generation: 0,
            deferred: None,
            commands,
            completions_tx,
            completions,
            status,
        };

        (orchestrator, OrchestratorHandle { tx: commands_tx })
    }

    /// Spawns the orchestrator to run in a background task.
    pub fn listen(self) -> JoinHandle<()> {
        info!("Spawning connection orchestrator task.");
        tokio::spawn(async move { self.run().await })
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some((generation, event)) = self.completions.recv() => {
                    if generation == self.generation {
                        self.apply_event(event).await;
                    } else {
                        debug!(
                            "Discarding completion from stale generation {}: {:?}",
                            generation, event
                        );
                    }
                }
            }

            // A chain that just finished may have parked a user request.
            if matches!(self.state, ConnectionState::Idle) {
                if let Some((path, role, label)) = self.deferred.take() {
                    self.begin_request(path, role, label).await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { path, role, label } => match self.state {
                ConnectionState::Idle => self.begin_request(path, role, label).await,
                ConnectionState::Reconnecting { .. } => {
                    info!("User request for {} supersedes the queued reconnect", path);
                    self.deferred = Some((path, role, label));
                    self.apply_event(ConnectionEvent::Superseded).await;
                }
                _ => {
                    warn!(
                        "A connection attempt is already in flight; ignoring request for {}",
                        path
                    );
                }
            },
            Command::Reconnect { primary, secondary } => {
                if matches!(self.state, ConnectionState::Idle) {
                    info!("Reconnecting previously-default devices");
                    self.generation += 1;
                    self.apply_event(ConnectionEvent::Reconnect { primary, secondary })
                        .await;
                } else {
                    warn!("Reconnect requested while an attempt is in flight; ignoring");
                }
            }
            Command::ManagerLost => {
                debug!("Manager vanished; voiding in-flight state");
                self.generation += 1;
                self.deferred = None;
                self.apply_event(ConnectionEvent::ManagerLost).await;
            }
        }
    }

    /// Resolves the sound server's current defaults to device paths and feeds
    /// the request into the machine.
    async fn begin_request(&mut self, path: String, role: Role, label: String) {
        let sink = self.sound.default_sink().await.ok();
        let source = self.sound.default_source().await.ok();

        let sink_device = sink.as_deref().and_then(|n| self.device_for_endpoint(n));
        let source_device = source.as_deref().and_then(|n| self.device_for_endpoint(n));

        let (current, other) = match role {
            Role::Output => (sink_device, source_device),
            Role::Input => (source_device, sink_device),
        };

        info!(
            "Connection request for {} as {:?} (current {:?}, other {:?})",
            path, role, current, other
        );

        self.generation += 1;
        self.apply_event(ConnectionEvent::Request {
            target: Target { path, role, label },
            current,
            other,
        })
        .await;
    }

    fn device_for_endpoint(&self, name: &str) -> Option<String> {
        names::address_from_endpoint_name(name)
            .map(|addr| names::device_path(addr, &self.settings.adapter_path))
    }

    async fn apply_event(&mut self, event: ConnectionEvent) {
        let state = std::mem::replace(&mut self.state, ConnectionState::Idle);
        let (next, actions) = transition(state, event);
        self.state = next;

        for action in actions {
            self.execute(action).await;
        }
    }

    async fn execute(&mut self, action: Action) {
        match action {
            Action::Disconnect { path } => self.dispatch_disconnect(path),
            Action::TrustAndConnect { path } => self.dispatch_connect(path),
            Action::PollProfile { path } => self.dispatch_profile_poll(path),
            Action::AdoptExisting { path, role } => self.adopt_existing(&path, role).await,
            Action::ApplyOutput { path, profile } => self.apply_output(&path, &profile).await,
            Action::ApplyInput { path } => self.apply_input(&path).await,
            Action::NotifyStarted { label } => {
                let _ = self.status.send(StatusEvent::ConnectionStarted { label });
            }
            Action::NotifyFailed { reason } => {
                warn!("Connection attempt failed: {}", reason);
                let _ = self.status.send(StatusEvent::ConnectionFailed { reason });
            }
            Action::NotifySucceeded => {
                let _ = self.status.send(StatusEvent::ConnectionSucceeded);
            }
            Action::RefreshDisplay => {
                let _ = self.status.send(StatusEvent::DisplayRefresh);
            }
        }
    }

    fn dispatch_disconnect(&self, path: String) {
        let manager = self.manager.clone();
        let tx = self.completions_tx.clone();
        let generation = self.generation;

        tokio::spawn(async move {
            debug!("Disconnecting {}...", path);
            let error = match manager.disconnect_device(&path).await {
                Ok(()) => {
                    debug!("Disconnected OK");
                    None
                }
                // the device vanishing is the desired state
                Err(ManagerError::Unavailable(msg)) => {
                    debug!("Device {} already unavailable: {}", path, msg);
                    None
                }
                Err(ManagerError::CallFailed(msg)) => {
                    warn!("Disconnecting {} failed: {}", path, msg);
                    Some(msg)
                }
            };
            let _ = tx.send((generation, ConnectionEvent::DisconnectResolved { error }));
        });
    }

    fn dispatch_connect(&self, path: String) {
        let manager = self.manager.clone();
        let tx = self.completions_tx.clone();
        let generation = self.generation;

        tokio::spawn(async move {
            debug!("Connecting {}...", path);
            // trust and connect are dispatched together; only the connect
            // outcome drives the machine
            let (trusted, connected) = tokio::join!(
                manager.set_trusted(&path),
                manager.connect_device(&path),
            );

            match trusted {
                Ok(()) => debug!("Trusted OK"),
                Err(e) => warn!("Trusting {} failed: {}", path, e),
            }

            let error = match connected {
                Ok(()) => {
                    debug!("Connected OK");
                    None
                }
                Err(e) => Some(e.to_string()),
            };
            let _ = tx.send((generation, ConnectionEvent::ConnectResolved { error }));
        });
    }

    fn dispatch_profile_poll(&self, path: String) {
        let sound = self.sound.clone();
        let tx = self.completions_tx.clone();
        let generation = self.generation;
        let schedule = self.settings.profile_poll.clone();
        let card = names::address_from_path(&path).map(names::card_name);

        tokio::spawn(async move {
            let Some(card) = card else {
                error!("Cannot derive a card name from {}; abandoning profile poll", path);
                let _ = tx.send((generation, ConnectionEvent::ProfileResolved { profile: None }));
                return;
            };

            // some devices take a long time to become valid cards after
            // connecting; poll with backoff until the schedule runs out
            for delay in schedule {
                if let Ok(Some(profile)) = sound.profile(&card).await {
                    let _ = tx.send((
                        generation,
                        ConnectionEvent::ProfileResolved {
                            profile: Some(profile),
                        },
                    ));
                    return;
                }
                tokio::time::sleep(delay).await;
            }

            let profile = sound.profile(&card).await.ok().flatten();
            if profile.is_none() {
                warn!("Card {} never reported a profile", card);
            }
            let _ = tx.send((generation, ConnectionEvent::ProfileResolved { profile }));
        });
    }

    /// The device is already physically connected for the other role: bind it
    /// to this role without touching the link.
    async fn adopt_existing(&self, path: &str, role: Role) {
        let Some(addr) = names::address_from_path(path) else {
            warn!("Cannot derive an address from {}; not adopting", path);
            return;
        };
        let card = names::card_name(addr);

        match role {
            Role::Output => match self.sound.profile(&card).await {
                Ok(Some(profile)) => {
                    let sink = names::sink_name(addr, &profile);
                    info!("Device {} already connected; default sink -> {}", path, sink);
                    if let Err(e) = self.sound.set_default_sink(&sink).await {
                        warn!("Could not set default sink {}: {}", sink, e);
                    }
                }
                Ok(None) => warn!(
                    "Card {} reports no active profile; leaving the default sink unchanged",
                    card
                ),
                Err(e) => warn!("Could not read the profile of {}: {}", card, e),
            },
            Role::Input => {
                let source = names::source_name(addr);
                info!("Device {} already connected; default source -> {}", path, source);
                if let Err(e) = self
                    .sound
                    .set_profile(&card, &self.settings.headset_profile)
                    .await
                {
                    warn!("Could not set profile on {}: {}", card, e);
                }
                if let Err(e) = self.sound.set_default_source(&source).await {
                    warn!("Could not set default source {}: {}", source, e);
                }
            }
        }
    }

    async fn apply_output(&self, path: &str, profile: &str) {
        let Some(addr) = names::address_from_path(path) else {
            warn!("Cannot derive an address from {}; default sink unchanged", path);
            return;
        };
        let sink = names::sink_name(addr, profile);
        info!("Setting default sink to {}", sink);
        if let Err(e) = self.sound.set_default_sink(&sink).await {
            warn!("Could not set default sink {}: {}", sink, e);
        }
    }

    async fn apply_input(&self, path: &str) {
        let Some(addr) = names::address_from_path(path) else {
            warn!("Cannot derive an address from {}; default source unchanged", path);
            return;
        };
        let card = names::card_name(addr);
        let source = names::source_name(addr);

        if let Err(e) = self
            .sound
            .set_profile(&card, &self.settings.headset_profile)
            .await
        {
            warn!("Could not set profile on {}: {}", card, e);
        }
        info!("Setting default source to {}", source);
        if let Err(e) = self.sound.set_default_source(&source).await {
            warn!("Could not set default source {}: {}", source, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::Notify;
    use tokio::time::{sleep, timeout};

    const X: &str = "/org/bluez/hci0/dev_00_11_22_33_44_55";
    const Y: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF";
    const X_SINK: &str = "bluez_sink.00_11_22_33_44_55.a2dp_sink";
    const Y_SINK: &str = "bluez_sink.AA_BB_CC_DD_EE_FF.a2dp_sink";
    const Y_SOURCE: &str = "bluez_source.AA_BB_CC_DD_EE_FF.headset_head_unit";
    const Y_CARD: &str = "bluez_card.AA_BB_CC_DD_EE_FF";

    #[derive(Default)]
    struct MockManager {
        calls: Mutex<Vec<String>>,
        connect_errors: Mutex<HashMap<String, ManagerError>>,
        connect_gate: Option<Arc<Notify>>,
    }

    impl MockManager {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceManager for MockManager {
        async fn connect_device(&self, path: &str) -> Result<(), ManagerError> {
            if let Some(gate) = &self.connect_gate {
                gate.notified().await;
            }
            self.calls.lock().unwrap().push(format!("connect {path}"));
            match self.connect_errors.lock().unwrap().get(path) {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }

        async fn disconnect_device(&self, path: &str) -> Result<(), ManagerError> {
            self.calls.lock().unwrap().push(format!("disconnect {path}"));
            Ok(())
        }

        async fn set_trusted(&self, path: &str) -> Result<(), ManagerError> {
            self.calls.lock().unwrap().push(format!("trust {path}"));
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockSound {
        default_sink: Mutex<String>,
        default_source: Mutex<String>,
        profiles: Mutex<HashMap<String, String>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockSound {
        fn with_defaults(sink: &str, source: &str) -> Self {
            let sound = Self::default();
            *sound.default_sink.lock().unwrap() = sink.to_owned();
            *sound.default_source.lock().unwrap() = source.to_owned();
            sound
        }

        fn set_card_profile(&self, card: &str, profile: &str) {
            self.profiles
                .lock()
                .unwrap()
                .insert(card.to_owned(), profile.to_owned());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SoundServer for MockSound {
        async fn default_sink(&self) -> Result<String> {
            Ok(self.default_sink.lock().unwrap().clone())
        }

        async fn default_source(&self) -> Result<String> {
            Ok(self.default_source.lock().unwrap().clone())
        }

        async fn set_default_sink(&self, name: &str) -> Result<()> {
            *self.default_sink.lock().unwrap() = name.to_owned();
            self.calls.lock().unwrap().push(format!("set-sink {name}"));
            Ok(())
        }

        async fn set_default_source(&self, name: &str) -> Result<()> {
            *self.default_source.lock().unwrap() = name.to_owned();
            self.calls.lock().unwrap().push(format!("set-source {name}"));
            Ok(())
        }

        async fn profile(&self, card: &str) -> Result<Option<String>> {
            Ok(self.profiles.lock().unwrap().get(card).cloned())
        }

        async fn set_profile(&self, card: &str, profile: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("set-profile {card} {profile}"));
            Ok(())
        }
    }

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            adapter_path: "/org/bluez/hci0".to_owned(),
            headset_profile: "headset_head_unit".to_owned(),
            profile_poll: vec![Duration::from_millis(1); 3],
        }
    }

    fn spawn(
        manager: Arc<MockManager>,
        sound: Arc<MockSound>,
    ) -> (OrchestratorHandle, broadcast::Receiver<StatusEvent>) {
        let (status_tx, status_rx) = broadcast::channel(32);
        let (orchestrator, handle) = Orchestrator::new(manager, sound, settings(), status_tx);
        orchestrator.listen();
        (handle, status_rx)
    }

    async fn wait_for<F>(rx: &mut broadcast::Receiver<StatusEvent>, want: F) -> StatusEvent
    where
        F: Fn(&StatusEvent) -> bool,
    {
        timeout(Duration::from_secs(2), async {
            loop {
                let event = rx.recv().await.expect("status channel closed");
                if want(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("status event not observed in time")
    }

    #[tokio::test]
    async fn switching_output_disconnects_old_then_sets_new_default_sink() {
        let manager = Arc::new(MockManager::default());
        let sound = Arc::new(MockSound::with_defaults(X_SINK, "alsa_input.usb-mic"));
        sound.set_card_profile(Y_CARD, "a2dp_sink");

        let (handle, mut status) = spawn(manager.clone(), sound.clone());
        handle.request_connect(Y, Role::Output, "Speaker");

        wait_for(&mut status, |e| matches!(e, StatusEvent::ConnectionSucceeded)).await;

        let calls = manager.calls();
        let disconnect = calls.iter().position(|c| c == &format!("disconnect {X}"));
        let connect = calls.iter().position(|c| c == &format!("connect {Y}"));
        assert!(disconnect.is_some(), "old device was not disconnected");
        assert!(connect.is_some(), "new device was not connected");
        assert!(disconnect < connect, "disconnect must precede connect");
        assert!(calls.contains(&format!("trust {Y}")));

        assert_eq!(*sound.default_sink.lock().unwrap(), Y_SINK);
        assert_eq!(*sound.default_source.lock().unwrap(), "alsa_input.usb-mic");
    }

    #[tokio::test]
    async fn failed_connect_surfaces_the_reason_and_mutates_nothing() {
        let manager = Arc::new(MockManager::default());
        manager.connect_errors.lock().unwrap().insert(
            Y.to_owned(),
            ManagerError::CallFailed("connection refused".to_owned()),
        );
        let sound = Arc::new(MockSound::with_defaults(X_SINK, "alsa_input.usb-mic"));

        let (handle, mut status) = spawn(manager.clone(), sound.clone());
        handle.request_connect(Y, Role::Output, "Speaker");

        let event = wait_for(&mut status, |e| {
            matches!(e, StatusEvent::ConnectionFailed { .. })
        })
        .await;
        let StatusEvent::ConnectionFailed { reason } = event else {
            unreachable!()
        };
        assert!(reason.contains("connection refused"), "reason was {reason:?}");

        assert_eq!(*sound.default_sink.lock().unwrap(), X_SINK);
        assert!(sound.calls().is_empty(), "no defaults may change on failure");
    }

    #[tokio::test]
    async fn reselecting_the_default_device_forces_a_full_cycle() {
        let manager = Arc::new(MockManager::default());
        let sound = Arc::new(MockSound::with_defaults(Y_SINK, "alsa_input.usb-mic"));
        sound.set_card_profile(Y_CARD, "a2dp_sink");

        let (handle, mut status) = spawn(manager.clone(), sound.clone());
        handle.request_connect(Y, Role::Output, "Speaker");

        wait_for(&mut status, |e| matches!(e, StatusEvent::ConnectionSucceeded)).await;

        let calls = manager.calls();
        let disconnect = calls.iter().position(|c| c == &format!("disconnect {Y}"));
        let connect = calls.iter().position(|c| c == &format!("connect {Y}"));
        assert!(disconnect.is_some(), "forced reconnect must disconnect first");
        assert!(connect.is_some(), "forced reconnect must reconnect");
        assert!(disconnect < connect);
    }

    #[tokio::test]
    async fn adopting_the_input_device_as_output_skips_the_link() {
        let manager = Arc::new(MockManager::default());
        let sound = Arc::new(MockSound::with_defaults(X_SINK, Y_SOURCE));
        sound.set_card_profile(Y_CARD, "a2dp_sink");

        let (handle, mut status) = spawn(manager.clone(), sound.clone());
        handle.request_connect(Y, Role::Output, "Headset");

        wait_for(&mut status, |e| matches!(e, StatusEvent::DisplayRefresh)).await;
        // the displaced device's disconnect is fire-and-forget
        sleep(Duration::from_millis(20)).await;

        let calls = manager.calls();
        assert!(
            !calls.contains(&format!("connect {Y}")),
            "adopted device must not be reconnected"
        );
        assert!(calls.contains(&format!("disconnect {X}")));
        assert_eq!(*sound.default_sink.lock().unwrap(), Y_SINK);
    }

    #[tokio::test]
    async fn input_connect_forces_headset_profile_and_source() {
        let manager = Arc::new(MockManager::default());
        let sound = Arc::new(MockSound::with_defaults("alsa_output.hdmi", "alsa_input.usb-mic"));
        sound.set_card_profile(Y_CARD, "headset_head_unit");

        let (handle, mut status) = spawn(manager.clone(), sound.clone());
        handle.request_connect(Y, Role::Input, "Headset");

        wait_for(&mut status, |e| matches!(e, StatusEvent::ConnectionSucceeded)).await;

        assert!(manager.calls().contains(&format!("connect {Y}")));
        assert!(
            sound
                .calls()
                .contains(&format!("set-profile {Y_CARD} headset_head_unit"))
        );
        assert_eq!(*sound.default_source.lock().unwrap(), Y_SOURCE);
        assert_eq!(*sound.default_sink.lock().unwrap(), "alsa_output.hdmi");
    }

    #[tokio::test]
    async fn profile_poll_exhaustion_fails_the_intent() {
        let manager = Arc::new(MockManager::default());
        // no profile ever appears for Y's card
        let sound = Arc::new(MockSound::with_defaults("alsa_output.hdmi", "alsa_input.usb-mic"));

        let (handle, mut status) = spawn(manager.clone(), sound.clone());
        handle.request_connect(Y, Role::Output, "Speaker");

        let event = wait_for(&mut status, |e| {
            matches!(e, StatusEvent::ConnectionFailed { .. })
        })
        .await;
        let StatusEvent::ConnectionFailed { reason } = event else {
            unreachable!()
        };
        assert!(reason.contains("profile"), "reason was {reason:?}");
        assert!(sound.calls().is_empty());
    }

    #[tokio::test]
    async fn manager_loss_discards_the_reconnect_chain() {
        let gate = Arc::new(Notify::new());
        let manager = Arc::new(MockManager {
            connect_gate: Some(gate.clone()),
            ..Default::default()
        });
        let sound = Arc::new(MockSound::with_defaults(X_SINK, "alsa_input.usb-mic"));

        let (handle, _status) = spawn(manager.clone(), sound.clone());
        handle.reconnect(X, Some(Y.to_owned()));

        // let the first connect park on the gate, then lose the manager
        sleep(Duration::from_millis(10)).await;
        handle.manager_lost();
        sleep(Duration::from_millis(10)).await;
        gate.notify_one();
        sleep(Duration::from_millis(30)).await;

        let calls = manager.calls();
        assert!(
            !calls.iter().any(|c| c.contains(Y)),
            "chain must not advance after the manager vanished: {calls:?}"
        );
        assert_eq!(*sound.default_sink.lock().unwrap(), X_SINK);
    }

    #[tokio::test]
    async fn reconnect_chain_connects_both_devices_in_order() {
        let manager = Arc::new(MockManager::default());
        let sound = Arc::new(MockSound::with_defaults(X_SINK, "alsa_input.usb-mic"));

        let (handle, mut status) = spawn(manager.clone(), sound.clone());
        handle.reconnect(X, Some(Y.to_owned()));

        wait_for(&mut status, |e| matches!(e, StatusEvent::DisplayRefresh)).await;

        let calls = manager.calls();
        let first = calls.iter().position(|c| c == &format!("connect {X}"));
        let second = calls.iter().position(|c| c == &format!("connect {Y}"));
        assert!(first.is_some() && second.is_some(), "calls: {calls:?}");
        assert!(first < second);
        // reconnection never touches the defaults
        assert!(sound.calls().is_empty());
    }
}
