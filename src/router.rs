//! Device event routing
//!
//! Turns `BlueZ` property-change notifications into sink switches:
//! a watched device connecting moves audio to its sink, disconnecting moves
//! audio back to the fallback sink. Everything else is ignored.
//!
//! The router keeps no state of its own. Each notification is judged on its
//! own against the immutable [`Config`].

use color_eyre::eyre::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audio::AudioControl;
use crate::config::Config;
use crate::switcher::{SwitchOutcome, Switcher};

/// Property carrying the connection state on `org.bluez.Device1`
pub const CONNECTED_PROPERTY: &str = "Connected";

/// Value of a changed property, reduced to what routing needs
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Str(String),
    Int(i64),
    Other,
}

/// A `PropertiesChanged` signal from a device object
#[derive(Debug, Clone)]
pub struct DeviceNotification {
    /// Object path of the device (e.g. `/org/bluez/hci0/dev_C8_7B_23_5C_7C_27`)
    pub path: String,
    pub changed: HashMap<String, PropertyValue>,
}

impl DeviceNotification {
    /// New connection state, if this notification carries one
    #[must_use]
    pub fn connected(&self) -> Option<bool> {
        match self.changed.get(CONNECTED_PROPERTY) {
            Some(PropertyValue::Bool(connected)) => Some(*connected),
            _ => None,
        }
    }
}

/// Lookup of device metadata on the bus
pub trait DeviceDirectory {
    /// Hardware address of the device at `path`
    ///
    /// # Errors
    /// Returns an error if the device object cannot be queried.
    fn address(&self, path: &str) -> Result<String>;
}

/// Why a notification did not lead to a switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Some other property changed (signal strength, battery, ...)
    NoConnectedProperty,
    AddressLookupFailed(String),
    UnknownDevice(String),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConnectedProperty => write!(f, "no connection change"),
            Self::AddressLookupFailed(e) => write!(f, "could not read device address: {e}"),
            Self::UnknownDevice(address) => write!(f, "device {address} is not watched"),
        }
    }
}

/// What the router did with one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Ignored(IgnoreReason),
    Dispatched {
        address: String,
        connected: bool,
        target: String,
        outcome: SwitchOutcome,
    },
}

/// Routes device notifications to sink switches
pub struct Router<A, D> {
    config: Arc<Config>,
    switcher: Switcher<A>,
    devices: D,
}

impl<A: AudioControl, D: DeviceDirectory> Router<A, D> {
    #[must_use]
    pub fn new(config: Arc<Config>, audio: A, devices: D) -> Self {
        let switcher = Switcher::new(
            audio,
            config.settings.wait_timeout,
            config.settings.poll_interval,
        );
        Self {
            config,
            switcher,
            devices,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Switch to the fallback sink to start from a known state
    pub fn baseline(&self) -> SwitchOutcome {
        info!("Resetting to fallback sink: {}", self.config.sinks.fallback);
        self.switcher.switch_to(&self.config.sinks.fallback)
    }

    /// Handle one device notification
    pub fn handle(&self, notification: &DeviceNotification) -> RouteOutcome {
        let Some(connected) = notification.connected() else {
            debug!(
                "Ignoring property change on {} ({} properties)",
                notification.path,
                notification.changed.len()
            );
            return RouteOutcome::Ignored(IgnoreReason::NoConnectedProperty);
        };

        info!(
            "Device at {} changed connected status to {}",
            notification.path, connected
        );

        let address = match self.devices.address(&notification.path) {
            Ok(address) => address,
            Err(e) => {
                warn!("Error getting device address for {}: {:#}", notification.path, e);
                return RouteOutcome::Ignored(IgnoreReason::AddressLookupFailed(format!("{e:#}")));
            }
        };

        let Some(device) = self.config.find_device(&address) else {
            debug!("Device {} is not watched", address);
            return RouteOutcome::Ignored(IgnoreReason::UnknownDevice(address));
        };

        let target = if connected {
            info!("{} connected", device.display_name());
            self.config.device_sink(&address)
        } else {
            info!("{} disconnected", device.display_name());
            self.config.sinks.fallback.clone()
        };

        let outcome = self.switcher.switch_to(&target);
        RouteOutcome::Dispatched {
            address,
            connected,
            target,
            outcome,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::fake::FakeAudio;
    use color_eyre::eyre;
    use pretty_assertions::assert_eq;

    /// Device lookup table keyed by object path
    #[derive(Default)]
    pub(crate) struct FakeDevices(pub HashMap<String, String>);

    impl DeviceDirectory for FakeDevices {
        fn address(&self, path: &str) -> Result<String> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| eyre::eyre!("org.freedesktop.DBus.Error.UnknownObject: {path}"))
        }
    }

    pub(crate) const PATH_AA: &str = "/org/bluez/hci0/dev_AA_AA";
    const PATH_CC: &str = "/org/bluez/hci0/dev_CC_CC";
    const PATH_GONE: &str = "/org/bluez/hci0/dev_GONE";

    pub(crate) const SINKS: &str = "\
0\tdefault-sink\tPipeWire\ts32le 2ch 48000Hz\tSUSPENDED
1\tbluez_output.AA:AA\tPipeWire\ts16le 2ch 48000Hz\tRUNNING
2\tbluez_output.CC:CC\tPipeWire\ts16le 2ch 48000Hz\tRUNNING
";

    pub(crate) fn test_config() -> Arc<Config> {
        let toml = r#"
[settings]
wait_timeout_ms = 50
poll_interval_ms = 10

[sinks]
fallback = "default-sink"
prefix = "bluez_output."
address_style = "colon"

[[devices]]
address = "AA:AA"

[[devices]]
address = "BB:BB"
"#;
        Arc::new(Config::from_toml_str(toml).unwrap())
    }

    pub(crate) fn test_devices() -> FakeDevices {
        FakeDevices(HashMap::from([
            (PATH_AA.to_string(), "AA:AA".to_string()),
            (PATH_CC.to_string(), "CC:CC".to_string()),
        ]))
    }

    pub(crate) fn notification(path: &str, props: &[(&str, PropertyValue)]) -> DeviceNotification {
        DeviceNotification {
            path: path.to_string(),
            changed: props
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        }
    }

    fn router(audio: &FakeAudio) -> Router<&FakeAudio, FakeDevices> {
        Router::new(test_config(), audio, test_devices())
    }

    #[test]
    fn test_connect_switches_to_device_sink() {
        let audio = FakeAudio::with_sinks(SINKS);
        let outcome = router(&audio).handle(&notification(
            PATH_AA,
            &[(CONNECTED_PROPERTY, PropertyValue::Bool(true))],
        ));

        assert_eq!(
            outcome,
            RouteOutcome::Dispatched {
                address: "AA:AA".to_string(),
                connected: true,
                target: "bluez_output.AA:AA".to_string(),
                outcome: SwitchOutcome::Switched { moved: 0 },
            }
        );
        assert_eq!(audio.default_sets(), vec!["bluez_output.AA:AA"]);
    }

    #[test]
    fn test_disconnect_switches_to_fallback() {
        let audio = FakeAudio::with_sinks(SINKS);
        let outcome = router(&audio).handle(&notification(
            PATH_AA,
            &[(CONNECTED_PROPERTY, PropertyValue::Bool(false))],
        ));

        assert!(matches!(
            outcome,
            RouteOutcome::Dispatched { ref target, connected: false, .. } if target == "default-sink"
        ));
        assert_eq!(audio.default_sets(), vec!["default-sink"]);
    }

    #[test]
    fn test_unwatched_device_never_switches() {
        let audio = FakeAudio::with_sinks(SINKS);
        let outcome = router(&audio).handle(&notification(
            PATH_CC,
            &[(CONNECTED_PROPERTY, PropertyValue::Bool(true))],
        ));

        assert_eq!(
            outcome,
            RouteOutcome::Ignored(IgnoreReason::UnknownDevice("CC:CC".to_string()))
        );
        assert_eq!(audio.mutation_count(), 0);
        assert_eq!(audio.list_sinks_calls(), 0);
    }

    #[test]
    fn test_other_properties_never_switch() {
        let audio = FakeAudio::with_sinks(SINKS);
        let router = router(&audio);

        for props in [
            vec![],
            vec![("RSSI", PropertyValue::Int(-60))],
            vec![
                ("Alias", PropertyValue::Str("Headphones".to_string())),
                ("ServicesResolved", PropertyValue::Bool(true)),
            ],
            vec![(CONNECTED_PROPERTY, PropertyValue::Other)],
        ] {
            let outcome = router.handle(&notification(PATH_AA, &props));
            assert_eq!(outcome, RouteOutcome::Ignored(IgnoreReason::NoConnectedProperty));
        }
        assert_eq!(audio.mutation_count(), 0);
    }

    #[test]
    fn test_address_lookup_failure_is_ignored() {
        let audio = FakeAudio::with_sinks(SINKS);
        let outcome = router(&audio).handle(&notification(
            PATH_GONE,
            &[(CONNECTED_PROPERTY, PropertyValue::Bool(true))],
        ));

        assert!(matches!(
            outcome,
            RouteOutcome::Ignored(IgnoreReason::AddressLookupFailed(ref e)) if e.contains("UnknownObject")
        ));
        assert_eq!(audio.mutation_count(), 0);
    }

    #[test]
    fn test_connect_with_missing_sink_times_out() {
        let audio = FakeAudio::with_sinks("0\tdefault-sink\tPipeWire\ts32le 2ch 48000Hz\tIDLE\n");
        let outcome = router(&audio).handle(&notification(
            PATH_AA,
            &[(CONNECTED_PROPERTY, PropertyValue::Bool(true))],
        ));

        assert!(matches!(
            outcome,
            RouteOutcome::Dispatched { outcome: SwitchOutcome::TimedOut, .. }
        ));
        assert_eq!(audio.mutation_count(), 0);
    }

    #[test]
    fn test_baseline_switches_to_fallback() {
        let audio = FakeAudio::with_sinks(SINKS);
        audio.set_sink_inputs(Ok("5\t1\t2\tprotocol-native.c\ts16le 2ch 44100Hz\n".to_string()));

        let outcome = router(&audio).baseline();

        assert_eq!(outcome, SwitchOutcome::Switched { moved: 1 });
        assert_eq!(audio.default_sets(), vec!["default-sink"]);
        assert_eq!(
            audio.moves(),
            vec![("5".to_string(), "default-sink".to_string())]
        );
    }
}
