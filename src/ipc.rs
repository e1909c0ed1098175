//! IPC surface for menu and CLI clients.
//!
//! Length-prefixed JSON messages over a Unix socket. Clients use this to
//! populate device menus, mark the current defaults, and request a device
//! switch; connection progress flows back asynchronously through desktop
//! notifications rather than the request/response channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bluetooth::registry::DeviceRegistry;
use crate::bluetooth::role_service_prefixes;
use crate::conf::Conf;
use crate::connection::{OrchestratorHandle, Role};
use crate::names;
use crate::pulse::server::SoundServer;

/// Requests sent from clients to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Audio-capable, paired and trusted devices for a role.
    ListDevices { role: Role },
    /// Make the device at `path` the default for `role`.
    Connect { path: String, role: Role },
    /// The current defaults, for marking menu entries.
    Status,
}

/// Responses sent from the daemon to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Devices {
        devices: Vec<DeviceInfo>,
    },
    Status {
        default_sink: Option<String>,
        default_source: Option<String>,
        sink_device: Option<DefaultDevice>,
        source_device: Option<DefaultDevice>,
    },
    Ok {
        message: String,
    },
    Error {
        message: String,
    },
}

/// Device entry for menu population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub path: String,
    pub address: String,
    pub alias: String,
    pub connected: bool,
}

/// A default sink/source resolved back to a manager device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultDevice {
    pub path: String,
    pub connected: bool,
}

/// Get the IPC socket path.
/// Prefers $XDG_RUNTIME_DIR/bluepulse.sock, falls back to /tmp/bluepulse.sock.
pub fn socket_path() -> PathBuf {
    match std::env::var("XDG_RUNTIME_DIR") {
        Ok(runtime_dir) => PathBuf::from(runtime_dir).join("bluepulse.sock"),
        Err(_) => PathBuf::from("/tmp/bluepulse.sock"),
    }
}

/// Clean up a stale socket file left behind by a previous instance.
async fn cleanup_stale_socket(socket_path: &PathBuf) -> Result<()> {
    if !socket_path.exists() {
        return Ok(());
    }

    // if nothing answers, the socket is stale
    match tokio::time::timeout(
        Duration::from_millis(100),
        UnixStream::connect(socket_path),
    )
    .await
    {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) | Err(_) => {
            debug!("Removing stale socket: {:?}", socket_path);
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove stale socket: {socket_path:?}"))
        }
    }
}

const MAX_MESSAGE_SIZE: usize = 64 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Read a length-prefixed JSON message from a stream.
async fn read_message<T: for<'de> Deserialize<'de>>(stream: &mut UnixStream) -> Result<T> {
    let mut len_buf = [0u8; 4];
    tokio::time::timeout(READ_TIMEOUT, stream.read_exact(&mut len_buf))
        .await
        .context("Timeout reading message length")?
        .context("Failed to read message length")?;

    let msg_len = u32::from_be_bytes(len_buf) as usize;
    if msg_len > MAX_MESSAGE_SIZE {
        anyhow::bail!("Message too large: {} bytes (max: {})", msg_len, MAX_MESSAGE_SIZE);
    }

    let mut msg_buf = vec![0u8; msg_len];
    tokio::time::timeout(READ_TIMEOUT, stream.read_exact(&mut msg_buf))
        .await
        .context("Timeout reading message payload")?
        .context("Failed to read message payload")?;

    serde_json::from_slice(&msg_buf).context("Failed to deserialize message")
}

/// Write a length-prefixed JSON message to a stream.
async fn write_message<T: Serialize>(stream: &mut UnixStream, message: &T) -> Result<()> {
    let json = serde_json::to_vec(message).context("Failed to serialize message")?;
    if json.len() > MAX_MESSAGE_SIZE {
        anyhow::bail!("Message too large: {} bytes (max: {})", json.len(), MAX_MESSAGE_SIZE);
    }

    let len = (json.len() as u32).to_be_bytes();
    stream
        .write_all(&len)
        .await
        .context("Failed to write message length")?;
    stream
        .write_all(&json)
        .await
        .context("Failed to write message payload")?;
    stream.flush().await.context("Failed to flush stream")?;

    Ok(())
}

/// Shared context for client handlers.
struct IpcState<S> {
    registry: DeviceRegistry,
    handle: OrchestratorHandle,
    sound: Arc<S>,
    conf: &'static Conf,
}

pub struct IpcServer<S> {
    listener: UnixListener,
    socket_path: PathBuf,
    state: Arc<IpcState<S>>,
}

impl<S: SoundServer> IpcServer<S> {
    /// Create and bind the IPC server.
    pub async fn bind(
        registry: DeviceRegistry,
        handle: OrchestratorHandle,
        sound: Arc<S>,
        conf: &'static Conf,
    ) -> Result<Self> {
        let socket_path = self::socket_path();
        cleanup_stale_socket(&socket_path).await?;

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind IPC socket: {socket_path:?}"))?;
        debug!("IPC server listening on {:?}", socket_path);

        Ok(Self {
            listener,
            socket_path,
            state: Arc::new(IpcState {
                registry,
                handle,
                sound,
                conf,
            }),
        })
    }

    /// Spawns the accept loop in a background task.
    pub fn listen(self) -> JoinHandle<()> {
        info!("IPC server listening on {:?}", self.socket_path);
        tokio::spawn(async move {
            loop {
                match self.listener.accept().await {
                    Ok((stream, _addr)) => {
                        let state = self.state.clone();
                        tokio::spawn(handle_client(state, stream));
                    }
                    Err(e) => error!("Failed to accept IPC connection: {}", e),
                }
            }
        })
    }
}

impl<S> Drop for IpcServer<S> {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            warn!("Failed to remove IPC socket on shutdown: {}", e);
        }
    }
}

async fn handle_client<S: SoundServer>(state: Arc<IpcState<S>>, mut stream: UnixStream) {
    loop {
        let request = match read_message::<Request>(&mut stream).await {
            Ok(request) => request,
            Err(e) => {
                debug!("Client session ended: {:#}", e);
                return;
            }
        };

        debug!("IPC request: {:?}", request);
        let response = handle_request(&state, request).await;

        if let Err(e) = write_message(&mut stream, &response).await {
            warn!("Could not answer IPC client: {:#}", e);
            return;
        }
    }
}

async fn handle_request<S: SoundServer>(state: &IpcState<S>, request: Request) -> Response {
    match request {
        Request::ListDevices { role } => match state.registry.list_audio_devices(role).await {
            Ok(devices) => Response::Devices {
                devices: devices
                    .into_iter()
                    .map(|device| DeviceInfo {
                        path: device.object_path,
                        address: device.address.to_string(),
                        alias: device.alias,
                        connected: device.connected,
                    })
                    .collect(),
            },
            Err(e) => Response::Error {
                message: format!("could not list devices: {e}"),
            },
        },

        Request::Connect { path, role } => {
            let mut capable = false;
            for prefix in role_service_prefixes(role) {
                if state.registry.has_service(&path, prefix).await {
                    capable = true;
                    break;
                }
            }
            if !capable {
                return Response::Error {
                    message: format!("device {path} does not support this audio role"),
                };
            }

            let label = state
                .registry
                .list_audio_devices(role)
                .await
                .ok()
                .and_then(|devices| devices.into_iter().find(|d| d.object_path == path))
                .map(|d| d.alias)
                .unwrap_or_else(|| path.clone());

            state.handle.request_connect(&path, role, label);
            Response::Ok {
                message: format!("connecting {path}"),
            }
        }

        Request::Status => {
            let default_sink = state.sound.default_sink().await.ok();
            let default_source = state.sound.default_source().await.ok();
            let sink_device = default_device(state, default_sink.as_deref()).await;
            let source_device = default_device(state, default_source.as_deref()).await;

            Response::Status {
                default_sink,
                default_source,
                sink_device,
                source_device,
            }
        }
    }
}

async fn default_device<S: SoundServer>(
    state: &IpcState<S>,
    endpoint: Option<&str>,
) -> Option<DefaultDevice> {
    let addr = names::address_from_endpoint_name(endpoint?)?;
    let path = names::device_path(addr, &state.conf.dbus.adapter_path);
    let connected = state.registry.is_connected(&path).await;
    Some(DefaultDevice { path, connected })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_json_shape_is_stable() {
        let json = serde_json::to_string(&Request::Connect {
            path: "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF".to_owned(),
            role: Role::Output,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"Connect","path":"/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF","role":"output"}"#
        );

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, Request::Connect { role: Role::Output, .. }));
    }

    #[test]
    fn list_request_round_trips() {
        let json = r#"{"type":"ListDevices","role":"input"}"#;
        let parsed: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed, Request::ListDevices { role: Role::Input }));
    }
}
