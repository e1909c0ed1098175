// -- std imports
use std::sync::OnceLock;
use std::{fs, time::Duration};

// -- crate imports (conditional)
#[cfg(not(debug_assertions))]
#[allow(unused_imports)]
use anyhow::Context;

// -- crate imports
use anyhow::Result;
use tracing::{info, warn};

// -- module imports
use crate::serde_ext::humantime_serde_duration;

/// Global singleton instance of [`Conf`].
static CONF: OnceLock<Conf> = OnceLock::new();

/// Returns the path to the configuration file.
///
/// In debug builds this is `./contrib/config.yml` in the current working directory. In release
/// builds this uses the XDG base directory and resolves to a path like
/// `~/.config/bluepulse/config.yml`.
///
/// # Errors
/// - [`anyhow::Error`] if the config file path cannot be determined (release builds only).
pub fn conf_filepath() -> Result<String> {
    #[cfg(debug_assertions)]
    {
        Ok("./contrib/config.yml".into())
    }

    #[cfg(not(debug_assertions))]
    {
        xdg::BaseDirectories::with_prefix("bluepulse")
            .get_config_file("config.yml")
            .map(|path| path.to_string_lossy().to_string())
            .context("Could not determine config file path")
    }
}

/// Application configuration.
///
/// This type is deserialized from a YAML config file and also provides built-in defaults.
#[derive(Debug, PartialEq, Eq, Clone, serde::Deserialize)]
pub struct Conf {
    /// Whether desktop notifications for connection progress are enabled.
    ///
    /// Default: `true`.
    pub notifications_enabled: bool,

    /// D-Bus related configuration.
    pub dbus: DBusConf,

    /// Sound-server related configuration.
    pub pulse: PulseConf,
}

/// D-Bus related configuration.
///
/// This struct is part of the main [`Conf`] struct.
#[derive(Debug, PartialEq, Eq, Clone, serde::Deserialize)]
pub struct DBusConf {
    /// D-Bus service name (usually "org.bluez").
    ///
    /// Default: "org.bluez".
    pub service: String,

    /// D-Bus object path for the Bluetooth adapter whose devices are managed.
    ///
    /// Default: "/org/bluez/hci0".
    pub adapter_path: String,

    /// D-Bus interface name for Bluetooth devices.
    ///
    /// Default: "org.bluez.Device1".
    pub device_iface: String,
}

/// Sound-server related configuration.
#[derive(Debug, PartialEq, Eq, Clone, serde::Deserialize)]
pub struct PulseConf {
    /// Card profile forced when a Bluetooth device becomes the default input.
    ///
    /// Default: "headset_head_unit".
    pub headset_profile: String,

    /// Backoff schedule for polling a freshly connected card until it reports
    /// a profile. The poll gives up when the schedule is exhausted.
    ///
    /// Default: `[100ms, 250ms, 500ms, 1s, 2s, 3s, 5s]`.
    #[serde(deserialize_with = "humantime_serde_duration::deserialize_vec")]
    pub profile_poll: Vec<Duration>,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            dbus: DBusConf {
                service: "org.bluez".to_string(),
                adapter_path: "/org/bluez/hci0".to_string(),
                device_iface: "org.bluez.Device1".to_string(),
            },
            pulse: PulseConf {
                headset_profile: "headset_head_unit".to_string(),
                profile_poll: vec![
                    Duration::from_millis(100),
                    Duration::from_millis(250),
                    Duration::from_millis(500),
                    Duration::from_secs(1),
                    Duration::from_secs(2),
                    Duration::from_secs(3),
                    Duration::from_secs(5),
                ],
            },
        }
    }
}

impl Conf {
    /// Loads the configuration from [`conf_filepath`] into the global instance.
    ///
    /// If the path cannot be determined or the file cannot be read or parsed, falls back to
    /// [`Conf::instance`], which uses the default configuration.
    pub fn load() -> &'static Self {
        match conf_filepath() {
            Ok(p) => Self::from_file(&p),
            Err(e) => {
                warn!(
                    "Could not determine config file path: {}. Falling back to defaults.",
                    e
                );
                Self::instance()
            }
        }
    }

    /// Initializes the global configuration from the YAML file at `path`.
    ///
    /// If the configuration is already initialized, the existing instance is returned and the file
    /// is ignored. On any read or parse error, falls back to [`Conf::default`].
    pub fn from_file(path: &str) -> &'static Self {
        if let Some(conf) = CONF.get() {
            warn!(
                "Conf::from_file({}) called, but configuration is already initialized. Using \
                    existing configuration and ignoring the file.",
                path
            );
            return conf;
        }

        CONF.get_or_init(|| {
            fs::read_to_string(path)
                .map_err(|e| {
                    warn!(
                        "Could not read config file '{}': {}. Falling back to defaults.",
                        path, e
                    );
                })
                .and_then(|contents| {
                    serde_yaml::from_str::<Conf>(&contents).map_err(|e| {
                        warn!(
                            "Could not parse config file '{}': {}. Falling back to defaults.",
                            path, e
                        );
                    })
                })
                .map(|conf| {
                    info!("Successfully loaded configuration from '{}'.", path);
                    conf
                })
                .unwrap_or_else(|_| Conf::default())
        })
    }

    /// Returns the global configuration instance.
    ///
    /// If the configuration has not been loaded yet, this initializes it with [`Conf::default`]
    /// and logs a warning.
    pub fn instance() -> &'static Self {
        CONF.get_or_init(|| {
            warn!(
                "Conf::instance() called before Conf::from_file(); initializing configuration with \
                default values."
            );
            Conf::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bluez_and_pulse_conventions() {
        let conf = Conf::default();
        assert_eq!(conf.dbus.service, "org.bluez");
        assert_eq!(conf.dbus.adapter_path, "/org/bluez/hci0");
        assert_eq!(conf.pulse.headset_profile, "headset_head_unit");
        assert!(!conf.pulse.profile_poll.is_empty());
    }

    #[test]
    fn parses_full_yaml_document() {
        let yaml = r#"
notifications_enabled: false
dbus:
  service: org.bluez
  adapter_path: /org/bluez/hci1
  device_iface: org.bluez.Device1
pulse:
  headset_profile: headset_head_unit
  profile_poll: ["50ms", "1s"]
"#;
        let conf: Conf = serde_yaml::from_str(yaml).unwrap();
        assert!(!conf.notifications_enabled);
        assert_eq!(conf.dbus.adapter_path, "/org/bluez/hci1");
        assert_eq!(
            conf.pulse.profile_poll,
            vec![Duration::from_millis(50), Duration::from_secs(1)]
        );
    }

    #[test]
    fn rejects_malformed_poll_schedule() {
        let yaml = r#"
notifications_enabled: true
dbus:
  service: org.bluez
  adapter_path: /org/bluez/hci0
  device_iface: org.bluez.Device1
pulse:
  headset_profile: headset_head_unit
  profile_poll: ["not-a-duration"]
"#;
        assert!(serde_yaml::from_str::<Conf>(yaml).is_err());
    }
}
