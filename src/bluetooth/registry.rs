use anyhow::Result;
use std::collections::HashMap;
use tracing::debug;
use zbus::{
    Connection,
    fdo::{ObjectManagerProxy, PropertiesProxy},
    names::InterfaceName,
    zvariant::{OwnedValue, Value},
};

use crate::bluetooth::role_service_prefixes;
use crate::conf::Conf;
use crate::connection::Role;
use crate::names;

use super::device::AudioDevice;

/// Read-only snapshot view over the manager's known devices.
///
/// Enumeration and point queries go to the manager every time; nothing is
/// cached here. Point queries fail closed: an object or property that cannot
/// be read reports `false` rather than an error.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    conn: Connection,
    conf: &'static Conf,
}

/// Plain property bag extracted from the manager's device interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DeviceProps {
    alias: Option<String>,
    paired: bool,
    trusted: bool,
    connected: bool,
    uuids: Vec<String>,
}

impl DeviceRegistry {
    pub fn new(conn: Connection, conf: &'static Conf) -> Self {
        Self { conn, conf }
    }

    /// Enumerates the paired and trusted devices that advertise an audio
    /// service suitable for `role`.
    ///
    /// The result is a fresh snapshot; call again for current state.
    pub async fn list_audio_devices(&self, role: Role) -> Result<Vec<AudioDevice>> {
        let proxy = ObjectManagerProxy::builder(&self.conn)
            .destination(self.conf.dbus.service.as_str())?
            .path("/")?
            .build()
            .await?;

        let objects = proxy.get_managed_objects().await?;
        let dev_prefix = format!("{}/dev_", self.conf.dbus.adapter_path);

        let mut devices = vec![];
        for (path, ifaces) in objects {
            let Some(raw) = ifaces.get(self.conf.dbus.device_iface.as_str()) else {
                continue;
            };

            let path = path.to_string();
            if !path.starts_with(&dev_prefix) {
                continue;
            }

            if let Some(device) = audio_device_from(&path, &extract_props(raw), role) {
                devices.push(device);
            }
        }

        Ok(devices)
    }

    /// Whether the device at `path` currently reports a live connection.
    /// Reports `false` if the object or property is unavailable.
    pub async fn is_connected(&self, path: &str) -> bool {
        match self.device_property(path, "Connected").await {
            Ok(value) => value.downcast_ref::<bool>().unwrap_or(false),
            Err(e) => {
                debug!("Could not read Connected for {}: {}", path, e);
                false
            }
        }
    }

    /// Whether the device at `path` advertises a service UUID with the given
    /// class prefix. Reports `false` if the object or property is unavailable.
    pub async fn has_service(&self, path: &str, service_prefix: &str) -> bool {
        match self.device_property(path, "UUIDs").await {
            Ok(value) => string_array(&value)
                .iter()
                .any(|uuid| service_class_matches(uuid, service_prefix)),
            Err(e) => {
                debug!("Could not read UUIDs for {}: {}", path, e);
                false
            }
        }
    }

    async fn device_property(&self, path: &str, name: &str) -> Result<OwnedValue> {
        let proxy = PropertiesProxy::builder(&self.conn)
            .destination(self.conf.dbus.service.as_str())?
            .path(path.to_owned())?
            .build()
            .await?;

        let value = proxy
            .get(
                InterfaceName::from_static_str(self.conf.dbus.device_iface.as_str())?,
                name,
            )
            .await?;

        Ok(value)
    }
}

/// Whether a full 128-bit service UUID belongs to the given service class.
/// Only the first eight hex digits are significant, compared without regard
/// to case.
fn service_class_matches(uuid: &str, prefix: &str) -> bool {
    match (uuid.get(..8), prefix.get(..8)) {
        (Some(class), Some(wanted)) => class.eq_ignore_ascii_case(wanted),
        _ => false,
    }
}

fn extract_props(raw: &HashMap<String, OwnedValue>) -> DeviceProps {
    let get_bool = |name: &str| {
        raw.get(name)
            .and_then(|v| v.downcast_ref::<bool>().ok())
            .unwrap_or(false)
    };

    DeviceProps {
        alias: raw
            .get("Alias")
            .and_then(|v| v.downcast_ref::<&str>().ok())
            .map(ToOwned::to_owned),
        paired: get_bool("Paired"),
        trusted: get_bool("Trusted"),
        connected: get_bool("Connected"),
        uuids: raw.get("UUIDs").map(string_array).unwrap_or_default(),
    }
}

fn string_array(value: &OwnedValue) -> Vec<String> {
    match &**value {
        Value::Array(array) => array
            .iter()
            .filter_map(|entry| entry.downcast_ref::<&str>().ok().map(ToOwned::to_owned))
            .collect(),
        _ => vec![],
    }
}

/// The snapshot filter: a device is listed for a role iff it is paired and
/// trusted, has an alias, and advertises a service of the matching class.
fn audio_device_from(path: &str, props: &DeviceProps, role: Role) -> Option<AudioDevice> {
    let address = names::address_from_path(path)?;
    let alias = props.alias.clone()?;

    if !props.paired || !props.trusted {
        return None;
    }

    let wanted = role_service_prefixes(role);
    if !props.uuids.iter().any(|uuid| {
        wanted
            .iter()
            .any(|prefix| service_class_matches(uuid, prefix))
    }) {
        return None;
    }

    Some(AudioDevice {
        object_path: path.to_owned(),
        address,
        alias,
        connected: props.connected,
    })
}
