use crate::names::BtAddress;

/// Snapshot of a Bluetooth audio device as reported by the manager.
///
/// Fields other than `object_path` and `address` are only valid at the time
/// of the query; callers re-enumerate instead of caching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// The D-Bus object path of the device.
    pub object_path: String,
    /// The hardware address embedded in the object path.
    pub address: BtAddress,
    /// The display alias of the device.
    pub alias: String,
    /// Whether the device was connected at snapshot time.
    pub connected: bool,
}
