//! Bluetooth name remapping.
//!
//! Helper functions to remap PulseAudio sink, source and card names to and
//! from BlueZ device object paths. The sound server derives its object names
//! from the device hardware address, so the mapping is deterministic in both
//! directions for well-formed input. Any format deviation yields `None` —
//! a misidentified device would route audio through the wrong hardware, so
//! nothing here guesses.

use std::fmt;

const SINK_PREFIX: &str = "bluez_sink.";
const SOURCE_PREFIX: &str = "bluez_source.";
const CARD_PREFIX: &str = "bluez_card.";

/// Fixed profile suffix of Bluetooth source names (input is only realized in
/// head-unit mode).
pub const HEADSET_SOURCE_PROFILE: &str = "headset_head_unit";

/// A Bluetooth hardware address (6 octets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BtAddress([u8; 6]);

impl BtAddress {
    /// Parses a textual address with `:` or `_` separators.
    ///
    /// Requires exactly six octets of exactly two hex digits each;
    /// anything else is no address.
    pub fn parse(s: &str) -> Option<Self> {
        let sep = if s.contains(':') { ':' } else { '_' };
        let mut octets = [0u8; 6];
        let mut count = 0;

        for part in s.split(sep) {
            if count == 6 || part.len() != 2 {
                return None;
            }
            octets[count] = u8::from_str_radix(part, 16).ok()?;
            count += 1;
        }

        (count == 6).then_some(Self(octets))
    }

    /// The address in the underscore form embedded in sound-server names and
    /// manager object paths, e.g. `4C_BC_98_0A_11_F2`.
    pub fn underscored(&self) -> String {
        let b = &self.0;
        format!(
            "{:02X}_{:02X}_{:02X}_{:02X}_{:02X}_{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Display for BtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Sink name for a device address under the given card profile,
/// e.g. `bluez_sink.4C_BC_98_0A_11_F2.a2dp_sink`.
pub fn sink_name(addr: BtAddress, profile: &str) -> String {
    format!("{SINK_PREFIX}{}.{profile}", addr.underscored())
}

/// Source name for a device address. Sources only exist in head-unit mode,
/// so the profile suffix is fixed.
pub fn source_name(addr: BtAddress) -> String {
    format!("{SOURCE_PREFIX}{}.{HEADSET_SOURCE_PROFILE}", addr.underscored())
}

/// Card name for a device address, e.g. `bluez_card.4C_BC_98_0A_11_F2`.
pub fn card_name(addr: BtAddress) -> String {
    format!("{CARD_PREFIX}{}", addr.underscored())
}

/// Manager object path for a device address under the given adapter,
/// e.g. `/org/bluez/hci0/dev_4C_BC_98_0A_11_F2`.
pub fn device_path(addr: BtAddress, adapter_path: &str) -> String {
    format!("{adapter_path}/dev_{}", addr.underscored())
}

/// Extracts the device address embedded in a manager object path.
///
/// The path must end in a `dev_`-prefixed segment encoding the address.
pub fn address_from_path(path: &str) -> Option<BtAddress> {
    if !path.starts_with('/') {
        return None;
    }
    let segment = path.rsplit('/').next()?;
    BtAddress::parse(segment.strip_prefix("dev_")?)
}

/// Extracts the device address embedded in a sound-server sink, source or
/// card name.
///
/// The name must carry the `bluez` naming prefix; the address is the six
/// underscore-separated octets after the first `.`, optionally followed by a
/// `.`-separated profile suffix.
pub fn address_from_endpoint_name(name: &str) -> Option<BtAddress> {
    if !name.contains("bluez") {
        return None;
    }
    let (_, rest) = name.split_once('.')?;
    let octets = match rest.split_once('.') {
        Some((octets, _profile)) => octets,
        None => rest,
    };
    BtAddress::parse(octets)
}

/// Whether a sound-server object name and a manager object path refer to the
/// same physical device.
///
/// True iff the path's trailing address segment is contained in the name,
/// compared ASCII-case-insensitively to tolerate divergent casing between the
/// two subsystems.
pub fn same_device(endpoint_name: &str, object_path: &str) -> bool {
    let Some(addr) = address_from_path(object_path) else {
        return false;
    };
    endpoint_name
        .to_ascii_uppercase()
        .contains(&addr.underscored())
}

/// Whether a default sink and a default source are both Bluetooth endpoints
/// of the same physical device.
///
/// Any operand that is not a Bluetooth endpoint name makes the answer false.
/// This predicate gates whether a displaced device may be physically
/// disconnected: a device still bound to the other role must stay connected.
pub fn same_endpoint_device(sink: &str, source: &str) -> bool {
    match (
        address_from_endpoint_name(sink),
        address_from_endpoint_name(source),
    ) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "4C:BC:98:0A:11:F2";

    fn addr() -> BtAddress {
        BtAddress::parse(ADDR).unwrap()
    }

    #[test]
    fn parses_colon_and_underscore_forms() {
        assert_eq!(BtAddress::parse("4C_BC_98_0A_11_F2"), Some(addr()));
        assert_eq!(BtAddress::parse("4c:bc:98:0a:11:f2"), Some(addr()));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "",
            "4C:BC:98:0A:11",          // five octets
            "4C:BC:98:0A:11:F2:33",    // seven octets
            "4C:BC:98:0A:11:G2",       // non-hex
            "4C:BC:98:0A:11:F",        // short octet
            "4CBC:98:0A:11:F2:11",     // wide octet
        ] {
            assert_eq!(BtAddress::parse(bad), None, "accepted {bad:?}");
        }
    }

    #[test]
    fn generates_canonical_names() {
        assert_eq!(
            sink_name(addr(), "a2dp_sink"),
            "bluez_sink.4C_BC_98_0A_11_F2.a2dp_sink"
        );
        assert_eq!(
            source_name(addr()),
            "bluez_source.4C_BC_98_0A_11_F2.headset_head_unit"
        );
        assert_eq!(card_name(addr()), "bluez_card.4C_BC_98_0A_11_F2");
        assert_eq!(
            device_path(addr(), "/org/bluez/hci0"),
            "/org/bluez/hci0/dev_4C_BC_98_0A_11_F2"
        );
    }

    #[test]
    fn sink_name_round_trips_to_address() {
        for profile in ["a2dp_sink", "headset_head_unit"] {
            let name = sink_name(addr(), profile);
            assert_eq!(address_from_endpoint_name(&name), Some(addr()));
        }
        assert_eq!(address_from_endpoint_name(&source_name(addr())), Some(addr()));
        assert_eq!(address_from_endpoint_name(&card_name(addr())), Some(addr()));
    }

    #[test]
    fn path_round_trips_to_address() {
        let path = device_path(addr(), "/org/bluez/hci0");
        assert_eq!(address_from_path(&path), Some(addr()));
    }

    #[test]
    fn non_bluez_names_do_not_translate() {
        for name in [
            "alsa_output.platform-bcm2835_audio.analog-stereo",
            "",
            "sink.4C_BC_98_0A_11_F2.a2dp_sink",
        ] {
            assert_eq!(address_from_endpoint_name(name), None, "translated {name:?}");
        }
    }

    #[test]
    fn bluez_prefixed_garbage_does_not_translate() {
        assert_eq!(address_from_endpoint_name("bluez_sink"), None);
        assert_eq!(address_from_endpoint_name("bluez_sink.4C_BC.a2dp"), None);
        assert_eq!(address_from_endpoint_name("bluez_sink.not_an_address"), None);
    }

    #[test]
    fn same_device_matches_generated_names_against_path() {
        let path = device_path(addr(), "/org/bluez/hci0");
        assert!(same_device(&sink_name(addr(), "a2dp_sink"), &path));
        assert!(same_device(&source_name(addr()), &path));
        // casing of the endpoint name must not matter
        assert!(same_device(&sink_name(addr(), "a2dp_sink").to_lowercase(), &path));
    }

    #[test]
    fn same_device_rejects_mismatches() {
        let other = BtAddress::parse("00:11:22:33:44:55").unwrap();
        let path = device_path(other, "/org/bluez/hci0");
        assert!(!same_device(&sink_name(addr(), "a2dp_sink"), &path));
        assert!(!same_device("bluez_sink.whatever", "/org/bluez/hci0"));
        assert!(!same_device("anything", "not-a-path"));
    }

    #[test]
    fn sink_source_pairing_requires_both_bluez_and_same_address() {
        let sink = sink_name(addr(), "a2dp_sink");
        let source = source_name(addr());
        assert!(same_endpoint_device(&sink, &source));

        let other = BtAddress::parse("00:11:22:33:44:55").unwrap();
        assert!(!same_endpoint_device(&sink, &source_name(other)));
        assert!(!same_endpoint_device("alsa_output.foo", &source));
        assert!(!same_endpoint_device(&sink, "alsa_input.bar"));
    }
}
