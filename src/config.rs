//! Configuration management
//!
//! Handles loading, parsing, and validating the TOML configuration file.
//! Supports settings, the sink naming rule, and the watched Bluetooth devices.

use color_eyre::eyre::{self, Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::prober::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};

// ============================================================================
// Public Configuration Types
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub sinks: SinkSettings,
    pub devices: Vec<DeviceConfig>,
}

/// Global settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Switch to the fallback sink once before waiting for events
    pub reset_on_startup: bool,
    pub notify_switch: bool,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub log_level: String,
}

/// How device sinks are named and where audio goes when they disappear
#[derive(Debug, Clone)]
pub struct SinkSettings {
    /// Sink used when a watched device disconnects
    pub fallback: String,
    pub prefix: String,
    pub address_style: AddressStyle,
    pub suffix: String,
}

/// Rendering of a device address inside its sink name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressStyle {
    /// `C8_7B_23_5C_7C_27`, as `PipeWire` and `PulseAudio` name Bluetooth sinks
    Underscore,
    /// `C8:7B:23:5C:7C:27`, the address unchanged
    Colon,
}

impl std::fmt::Display for AddressStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Underscore => write!(f, "underscore"),
            Self::Colon => write!(f, "colon"),
        }
    }
}

/// A watched Bluetooth device
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Hardware address as reported by `BlueZ`, compared exactly
    pub address: String,
    pub desc: Option<String>,
}

impl DeviceConfig {
    /// Description for logs and notifications, falling back to the address
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.desc.as_deref().unwrap_or(&self.address)
    }
}

// ============================================================================
// Config File Deserialization (TOML)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    settings: SettingsFile,
    sinks: SinksFile,
    #[serde(default)]
    devices: Vec<DeviceConfigFile>,
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    #[serde(default = "default_true")]
    reset_on_startup: bool,
    #[serde(default)]
    notify_switch: bool,
    #[serde(default = "default_wait_timeout_ms")]
    wait_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
    #[serde(default = "default_log_level")]
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct SinksFile {
    fallback: String,
    #[serde(default = "default_prefix")]
    prefix: String,
    #[serde(default = "default_address_style")]
    address_style: AddressStyle,
    #[serde(default)]
    suffix: String,
}

#[derive(Debug, Deserialize)]
struct DeviceConfigFile {
    address: String,
    #[serde(default)]
    desc: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_wait_timeout_ms() -> u64 {
    DEFAULT_WAIT_TIMEOUT.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_prefix() -> String {
    "bluez_output.".to_string()
}

fn default_address_style() -> AddressStyle {
    AddressStyle::Underscore
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            reset_on_startup: true,
            notify_switch: false,
            wait_timeout_ms: default_wait_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            log_level: default_log_level(),
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# BTSW (Bluetooth Sink Switcher) Configuration
#
# Moves audio to a Bluetooth device's sink when it connects and back to
# the fallback sink when it disconnects. Uses pactl for audio control.

[settings]
reset_on_startup = true    # Switch to the fallback sink when the daemon starts
notify_switch = false      # Desktop notification after each device-triggered switch
wait_timeout_ms = 10000    # How long to wait for a device sink to appear
poll_interval_ms = 500     # Delay between sink checks while waiting
log_level = "info"         # error, warn, info, debug, trace

# Sink naming
# A connected device's sink is: prefix + address + suffix
#   address_style = "underscore" -> C8_7B_23_5C_7C_27 (PipeWire/PulseAudio naming)
#   address_style = "colon"      -> C8:7B:23:5C:7C:27
# Sinks match by substring, so the profile index (".1", ".a2dp_sink") can be left out.
# Find available sinks with: btsw list-sinks

[sinks]
fallback = "alsa_output.usb-C-Media_Electronics_Inc._USB_Audio_Device-00.analog-stereo"
prefix = "bluez_output."
address_style = "underscore"
suffix = ""

# Watched devices
# Find addresses with: bluetoothctl devices

[[devices]]
address = "C8:7B:23:5C:7C:27"
desc = "Headphones"
"#;

// ============================================================================
// Config Implementation
// ============================================================================

impl Config {
    /// Load configuration from the default XDG config path
    ///
    /// Creates the file with example contents if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created, read, parsed, or fails validation.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            info!("Creating default config at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        Self::load_from_path(&config_path)
    }

    /// Load configuration from an explicit path
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {path:?}"))?;

        Self::from_toml_str(&contents).with_context(|| format!("Invalid config: {path:?}"))
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML or fails validation.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config_file: ConfigFile =
            toml::from_str(contents).context("Failed to parse config")?;
        Self::from_config_file(config_file)
    }

    fn from_config_file(config_file: ConfigFile) -> Result<Self> {
        if config_file.devices.is_empty() {
            eyre::bail!("No devices defined. Add at least one [[devices]] section to config.");
        }

        let settings = Settings {
            reset_on_startup: config_file.settings.reset_on_startup,
            notify_switch: config_file.settings.notify_switch,
            wait_timeout: Duration::from_millis(config_file.settings.wait_timeout_ms),
            poll_interval: Duration::from_millis(config_file.settings.poll_interval_ms),
            log_level: config_file.settings.log_level,
        };

        let sinks = SinkSettings {
            fallback: config_file.sinks.fallback,
            prefix: config_file.sinks.prefix,
            address_style: config_file.sinks.address_style,
            suffix: config_file.sinks.suffix,
        };

        let devices = config_file
            .devices
            .into_iter()
            .map(|d| DeviceConfig {
                address: d.address,
                desc: d.desc,
            })
            .collect();

        let config = Config {
            settings,
            sinks,
            devices,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match self.settings.log_level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            level => eyre::bail!(
                "Invalid log_level '{level}'. Must be: error, warn, info, debug, or trace"
            ),
        }

        if self.settings.poll_interval.is_zero() {
            eyre::bail!("poll_interval_ms must be greater than 0");
        }
        if self.settings.poll_interval > self.settings.wait_timeout {
            eyre::bail!(
                "poll_interval_ms ({}) must not exceed wait_timeout_ms ({})",
                self.settings.poll_interval.as_millis(),
                self.settings.wait_timeout.as_millis()
            );
        }

        if self.sinks.fallback.trim().is_empty() {
            eyre::bail!("Fallback sink is empty. Set [sinks] fallback to a sink name.");
        }

        let mac_shape = Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$")
            .context("Failed to compile address pattern")?;

        let mut seen = HashSet::with_capacity(self.devices.len());
        for device in &self.devices {
            if !seen.insert(device.address.as_str()) {
                eyre::bail!("Duplicate device address: '{}'", device.address);
            }
            if !mac_shape.is_match(&device.address) {
                warn!(
                    "Device address '{}' does not look like a Bluetooth address (XX:XX:XX:XX:XX:XX)",
                    device.address
                );
            }
        }

        Ok(())
    }

    /// Get the XDG config path for BTSW
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined or created.
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre::eyre!("Could not determine config directory"))?
            .join("btsw");
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config dir: {config_dir:?}"))?;
        Ok(config_dir.join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<()> {
        fs::write(path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write config: {path:?}"))?;

        eprintln!("Created default config at: {path:?}");
        eprintln!();
        eprintln!("Next steps:");
        eprintln!("  1. Run 'btsw list-sinks' to see available audio outputs");
        eprintln!("  2. Edit the config file: set your fallback sink and device addresses");
        eprintln!("  3. Run 'btsw validate' to check your config");
        eprintln!("  4. Run 'btsw daemon' to start");
        eprintln!();

        Ok(())
    }

    /// Print a human-readable summary of the configuration
    pub fn print_summary(&self) {
        println!("✓ Configuration valid\n");

        println!("Settings:");
        println!("  reset_on_startup: {}", self.settings.reset_on_startup);
        println!("  notify_switch: {}", self.settings.notify_switch);
        println!("  wait_timeout_ms: {}", self.settings.wait_timeout.as_millis());
        println!("  poll_interval_ms: {}", self.settings.poll_interval.as_millis());
        println!("  log_level: {}", self.settings.log_level);

        println!("\nSinks:");
        println!("  fallback: {}", self.sinks.fallback);
        println!("  prefix: {}", self.sinks.prefix);
        println!("  address_style: {}", self.sinks.address_style);
        println!("  suffix: {}", self.sinks.suffix);

        println!("\nDevices ({}):", self.devices.len());
        for (i, device) in self.devices.iter().enumerate() {
            println!("  {}. {}", i + 1, device.display_name());
            println!("     address: {}", device.address);
            println!("     sink: {}", self.device_sink(&device.address));
        }
    }

    /// Sink name for a connected device
    #[must_use]
    pub fn device_sink(&self, address: &str) -> String {
        let address = match self.sinks.address_style {
            AddressStyle::Underscore => address.replace(':', "_"),
            AddressStyle::Colon => address.to_string(),
        };
        format!("{}{}{}", self.sinks.prefix, address, self.sinks.suffix)
    }

    /// Find a watched device by exact address
    #[must_use]
    pub fn find_device(&self, address: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.address == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn minimal(extra_settings: &str) -> String {
        format!(
            r#"
[settings]
{extra_settings}

[sinks]
fallback = "default-sink"

[[devices]]
address = "AA:BB:CC:DD:EE:FF"
"#
        )
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::from_toml_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.settings.wait_timeout, Duration::from_secs(10));
        assert_eq!(config.settings.poll_interval, Duration::from_millis(500));
        assert_eq!(
            config.device_sink("C8:7B:23:5C:7C:27"),
            "bluez_output.C8_7B_23_5C_7C_27"
        );
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_toml_str(&minimal("")).unwrap();
        assert!(config.settings.reset_on_startup);
        assert!(!config.settings.notify_switch);
        assert_eq!(config.settings.log_level, "info");
        assert_eq!(config.sinks.prefix, "bluez_output.");
        assert_eq!(config.sinks.address_style, AddressStyle::Underscore);
        assert_eq!(config.sinks.suffix, "");
    }

    #[test_case(AddressStyle::Underscore, "", "bluez_output.AA_AA" ; "underscore")]
    #[test_case(AddressStyle::Colon, "", "bluez_output.AA:AA" ; "colon")]
    #[test_case(AddressStyle::Underscore, ".1", "bluez_output.AA_AA.1" ; "with suffix")]
    fn test_device_sink_format(style: AddressStyle, suffix: &str, expected: &str) {
        let mut config = Config::from_toml_str(&minimal("")).unwrap();
        config.sinks.address_style = style;
        config.sinks.suffix = suffix.to_string();
        assert_eq!(config.device_sink("AA:AA"), expected);
    }

    #[test]
    fn test_find_device_is_exact() {
        let config = Config::from_toml_str(&minimal("")).unwrap();
        assert!(config.find_device("AA:BB:CC:DD:EE:FF").is_some());
        assert!(config.find_device("aa:bb:cc:dd:ee:ff").is_none());
        assert!(config.find_device("AA_BB_CC_DD_EE_FF").is_none());
    }

    #[test_case("log_level = \"loud\"", "log_level" ; "bad log level")]
    #[test_case("poll_interval_ms = 0", "greater than 0" ; "zero interval")]
    #[test_case("wait_timeout_ms = 100\npoll_interval_ms = 500", "must not exceed" ; "interval over timeout")]
    fn test_invalid_settings_rejected(settings: &str, needle: &str) {
        let err = Config::from_toml_str(&minimal(settings)).unwrap_err();
        assert!(format!("{err:#}").contains(needle), "unexpected error: {err:#}");
    }

    #[test]
    fn test_no_devices_rejected() {
        let err = Config::from_toml_str("[sinks]\nfallback = \"x\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("No devices"));
    }

    #[test]
    fn test_duplicate_devices_rejected() {
        let toml = r#"
[sinks]
fallback = "x"

[[devices]]
address = "AA:BB:CC:DD:EE:FF"

[[devices]]
address = "AA:BB:CC:DD:EE:FF"
"#;
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(format!("{err:#}").contains("Duplicate device address"));
    }

    #[test]
    fn test_empty_fallback_rejected() {
        let toml = "[sinks]\nfallback = \"  \"\n\n[[devices]]\naddress = \"AA:BB:CC:DD:EE:FF\"\n";
        assert!(Config::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_address() {
        let device = DeviceConfig {
            address: "AA:BB:CC:DD:EE:FF".to_string(),
            desc: None,
        };
        assert_eq!(device.display_name(), "AA:BB:CC:DD:EE:FF");
    }
}
