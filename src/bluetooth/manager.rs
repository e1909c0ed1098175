use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use zbus::{
    Connection,
    fdo::PropertiesProxy,
    names::InterfaceName,
    proxy::Proxy,
    zvariant::Value,
};

use crate::conf::Conf;

/// Failure of a manager call, split by whether the manager could reason about
/// the device at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// The object vanished, the interface is missing, or the manager service
    /// itself is gone. For disconnects this means "already in the desired
    /// state"; for reconnect chains it means "not yet present".
    #[error("device unavailable: {0}")]
    Unavailable(String),
    /// The manager executed the call and reported failure. The message is the
    /// manager's own and is surfaced verbatim for failed connects.
    #[error("{0}")]
    CallFailed(String),
}

/// The narrow slice of the wireless manager the orchestrator drives.
#[async_trait]
pub trait DeviceManager: Send + Sync + 'static {
    /// Connect all auto-connectable profiles of the device at `path`.
    async fn connect_device(&self, path: &str) -> Result<(), ManagerError>;

    /// Disconnect the device at `path`.
    async fn disconnect_device(&self, path: &str) -> Result<(), ManagerError>;

    /// Mark the device at `path` as trusted so it may reconnect without a
    /// consent prompt.
    async fn set_trusted(&self, path: &str) -> Result<(), ManagerError>;
}

/// `DeviceManager` over the BlueZ system-bus device interface.
#[derive(Debug, Clone)]
pub struct BluezManager {
    conn: Connection,
    conf: &'static Conf,
}

impl BluezManager {
    pub fn new(conn: Connection, conf: &'static Conf) -> Self {
        Self { conn, conf }
    }

    async fn call(&self, path: &str, method: &str) -> Result<(), ManagerError> {
        let proxy = Proxy::new(
            &self.conn,
            self.conf.dbus.service.as_str(),
            path.to_owned(),
            self.conf.dbus.device_iface.as_str(),
        )
        .await
        .map_err(classify)?;

        debug!("Calling {} on {}", method, path);
        proxy.call::<_, _, ()>(method, &()).await.map_err(classify)?;
        Ok(())
    }
}

#[async_trait]
impl DeviceManager for BluezManager {
    async fn connect_device(&self, path: &str) -> Result<(), ManagerError> {
        self.call(path, "Connect").await
    }

    async fn disconnect_device(&self, path: &str) -> Result<(), ManagerError> {
        self.call(path, "Disconnect").await
    }

    async fn set_trusted(&self, path: &str) -> Result<(), ManagerError> {
        let proxy = PropertiesProxy::builder(&self.conn)
            .destination(self.conf.dbus.service.as_str())
            .map_err(classify)?
            .path(path.to_owned())
            .map_err(classify)?
            .build()
            .await
            .map_err(classify)?;

        let iface = InterfaceName::from_static_str(self.conf.dbus.device_iface.as_str())
            .map_err(|e| ManagerError::CallFailed(e.to_string()))?;
        proxy
            .set(iface, "Trusted", Value::Bool(true))
            .await
            .map_err(classify_fdo)?;

        Ok(())
    }
}

/// D-Bus error names that mean the target cannot currently be addressed.
const UNAVAILABLE_ERRORS: [&str; 5] = [
    "org.freedesktop.DBus.Error.UnknownObject",
    "org.freedesktop.DBus.Error.UnknownMethod",
    "org.freedesktop.DBus.Error.UnknownInterface",
    "org.freedesktop.DBus.Error.ServiceUnknown",
    "org.freedesktop.DBus.Error.NameHasNoOwner",
];

fn classify(err: zbus::Error) -> ManagerError {
    match err {
        zbus::Error::MethodError(ref name, ref detail, _) => {
            let message = detail.clone().unwrap_or_else(|| name.to_string());
            if UNAVAILABLE_ERRORS.contains(&name.as_str()) {
                ManagerError::Unavailable(message)
            } else {
                ManagerError::CallFailed(message)
            }
        }
        other => ManagerError::CallFailed(other.to_string()),
    }
}

fn classify_fdo(err: zbus::fdo::Error) -> ManagerError {
    use zbus::fdo::Error as Fdo;
    match err {
        Fdo::UnknownObject(msg)
        | Fdo::UnknownMethod(msg)
        | Fdo::UnknownInterface(msg)
        | Fdo::ServiceUnknown(msg)
        | Fdo::NameHasNoOwner(msg) => ManagerError::Unavailable(msg),
        other => ManagerError::CallFailed(other.to_string()),
    }
}
