//! `BlueZ` integration over the D-Bus system bus
//!
//! - A listener thread subscribes to `PropertiesChanged` signals and forwards
//!   the ones for `org.bluez.Device1` objects into a channel.
//! - [`BluezDevices`] reads device properties (the hardware address) on demand.

use color_eyre::eyre::{self, Context, Result};
use dbus::arg::{self, PropMap, RefArg};
use dbus::blocking::stdintf::org_freedesktop_dbus::Properties;
use dbus::blocking::{Connection, SyncConnection};
use dbus::message::{MatchRule, Message};
use dbus::strings::Path;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::router::{DeviceDirectory, DeviceNotification, PropertyValue};

/// Well-known bus name of the Bluetooth daemon
pub const BLUEZ_SERVICE: &str = "org.bluez";

/// Interface of Bluetooth device objects
pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";

/// Object path namespace of adapters and devices
const BLUEZ_ROOT: &str = "/org/bluez";

const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// How long one `process` call blocks before checking for shutdown
const PROCESS_TIMEOUT: Duration = Duration::from_secs(1);

/// Timeout for property reads on device objects
const METHOD_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawn a dedicated thread listening for `BlueZ` device property changes
///
/// Connects to the system bus and installs the match rule before returning,
/// so connection errors surface to the caller. Notifications are sent through
/// an unbounded channel in delivery order.
///
/// # Channel Behavior
///
/// The returned receiver yields `None` when the bus connection fails. Dropping
/// the receiver stops the thread within one second.
///
/// # Errors
///
/// Returns an error if the system bus is unreachable or the match rule is rejected.
pub fn spawn_listener_thread() -> Result<mpsc::UnboundedReceiver<DeviceNotification>> {
    let conn = Connection::new_system()
        .context("Failed to connect to the D-Bus system bus. Is dbus running?")?;

    let (tx, rx) = mpsc::unbounded_channel();

    let handler_tx = tx.clone();
    conn.add_match(device_match_rule(), move |_: (), _, msg| {
        if let Some(notification) = parse_signal(msg) {
            trace!("Device signal: {:?}", notification);
            // A closed channel is noticed by the process loop below
            let _ = handler_tx.send(notification);
        }
        true
    })
    .context("Failed to subscribe to BlueZ property changes")?;

    info!("Subscribed to {} property changes", DEVICE_INTERFACE);

    std::thread::spawn(move || {
        while !tx.is_closed() {
            if let Err(e) = conn.process(PROCESS_TIMEOUT) {
                error!("D-Bus connection error: {}", e);
                break;
            }
        }
        debug!("BlueZ listener thread exiting");
    });

    Ok(rx)
}

/// `PropertiesChanged` signals sent by `BlueZ` for objects under `/org/bluez`
///
/// The bus cannot filter on the signal's interface argument through this rule,
/// so non-device objects (adapters, media transports) are dropped in [`parse_signal`].
fn device_match_rule() -> MatchRule<'static> {
    let mut rule = MatchRule::new_signal(PROPERTIES_INTERFACE, "PropertiesChanged");
    rule.sender = Some(BLUEZ_SERVICE.into());
    rule.path = Some(BLUEZ_ROOT.into());
    rule.path_is_namespace = true;
    rule
}

/// Convert a `PropertiesChanged` signal into a notification
///
/// Returns `None` for signals from objects other than Bluetooth devices.
fn parse_signal(msg: &Message) -> Option<DeviceNotification> {
    let path = msg.path()?;
    let (interface, changed): (String, PropMap) = msg.read2().ok()?;

    if interface != DEVICE_INTERFACE {
        return None;
    }

    Some(DeviceNotification {
        path: path.to_string(),
        changed: convert_props(&changed),
    })
}

fn convert_props(props: &PropMap) -> HashMap<String, PropertyValue> {
    props
        .iter()
        .map(|(name, value)| (name.clone(), convert_value(&*value.0)))
        .collect()
}

fn convert_value(value: &(dyn RefArg + 'static)) -> PropertyValue {
    if let Some(b) = arg::cast::<bool>(value) {
        PropertyValue::Bool(*b)
    } else if let Some(s) = value.as_str() {
        PropertyValue::Str(s.to_string())
    } else if let Some(i) = value.as_i64() {
        PropertyValue::Int(i)
    } else {
        PropertyValue::Other
    }
}

/// Device property reads against `BlueZ`
pub struct BluezDevices {
    conn: SyncConnection,
}

impl BluezDevices {
    /// Open a dedicated system bus connection for property reads
    ///
    /// # Errors
    /// Returns an error if the system bus is unreachable.
    pub fn connect() -> Result<Self> {
        let conn = SyncConnection::new_system()
            .context("Failed to connect to the D-Bus system bus. Is dbus running?")?;
        Ok(Self { conn })
    }
}

impl DeviceDirectory for BluezDevices {
    fn address(&self, path: &str) -> Result<String> {
        let path = Path::new(path.to_string()).map_err(|e| eyre::eyre!("Invalid object path: {e}"))?;
        let proxy = self.conn.with_proxy(BLUEZ_SERVICE, path, METHOD_TIMEOUT);
        let address: String = proxy
            .get(DEVICE_INTERFACE, "Address")
            .context("Properties.Get(Address) failed")?;
        Ok(address)
    }
}
