pub mod device;
pub mod manager;
pub mod registry;
pub mod watcher;

use crate::connection::Role;

// Service class UUID prefixes advertised by audio-capable devices. Only the
// first eight hex digits identify the service class; the rest of the UUID is
// the fixed Bluetooth base.
pub const BT_SERV_AUDIO_SINK: &str = "0000110B";
pub const BT_SERV_HSP: &str = "00001108";
pub const BT_SERV_HFP: &str = "0000111E";

/// The service classes a device may advertise to be usable in the given role.
pub fn role_service_prefixes(role: Role) -> &'static [&'static str] {
    match role {
        Role::Output => &[BT_SERV_AUDIO_SINK],
        Role::Input => &[BT_SERV_HSP, BT_SERV_HFP],
    }
}
