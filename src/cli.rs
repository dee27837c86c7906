//! Command-line interface definitions
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// BTSW - Bluetooth Sink Switcher
///
/// Moves audio to a Bluetooth device when it connects and back when it disconnects.
#[derive(Parser)]
#[command(name = "btsw")]
#[command(version)]
#[command(about = "Bluetooth Sink Switcher - Move audio to Bluetooth devices when they connect")]
#[command(after_help = "\
BEHAVIOR:
  - On startup, switches to the fallback sink (unless reset_on_startup = false)
  - When a watched device connects, waits for its sink and switches to it
  - When a watched device disconnects, switches back to the fallback sink
  - Every switch sets the default sink and moves all playing streams

COMMANDS:
  btsw                     Run the daemon (same as: btsw daemon)
  btsw validate            Validate config file and show settings
  btsw list-sinks          List sinks known to the audio server
  btsw switch SINK         Switch to a sink once, waiting for it to appear

CONFIG:
  $XDG_CONFIG_HOME/btsw/config.toml (created on first run)

AUDIO INTEGRATION:
  Uses pactl, which works with PulseAudio and pipewire-pulse.
  Listens to org.bluez.Device1 property changes on the system bus.")]
pub struct Args {
    /// Use this config file instead of the XDG default
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon (listens for device events and switches audio)
    Daemon,

    /// Validate config file and print a summary
    Validate,

    /// List sinks known to the audio server
    ListSinks {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Switch to a sink, waiting for it to appear
    Switch {
        /// Sink name (substring match, like the daemon)
        sink: String,
    },
}
