//! `BTSW` - Bluetooth Sink Switcher
//!
//! Listens for Bluetooth device connection changes on the system bus and moves
//! audio output accordingly. Uses `pactl` for audio control.
//!
//! # Features
//! - Switch to a device's sink when it connects, once the sink appears
//! - Switch back to a fallback sink when it disconnects
//! - Move every playing stream along with the default sink
//! - Optional desktop notifications and systemd readiness

pub mod audio;
pub mod bluez;
pub mod cli;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod notification;
pub mod prober;
pub mod router;
pub mod switcher;

// Re-export commonly used types for convenience
pub use cli::Args;
pub use config::Config;
pub use router::Router;
pub use switcher::{SwitchOutcome, Switcher};
