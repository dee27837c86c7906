//! Audio server control
//!
//! Provides sink discovery and stream routing through `pactl`, which talks to
//! both `PulseAudio` and `pipewire-pulse`:
//! - `pactl list sinks short`: available output sinks
//! - `pactl set-default-sink`: the default output
//! - `pactl list sink-inputs short`: active streams
//! - `pactl move-sink-input`: re-route one stream
//!
//! The [`AudioControl`] trait is the seam between the switching logic and the
//! real audio server, so prober and switcher can run against a fake.

use color_eyre::eyre::{self, Context, Result};
use std::process::Command;
use tracing::{debug, trace};

/// Operations the switcher needs from the audio server
pub trait AudioControl {
    /// Raw short-form sink listing, one sink per line
    ///
    /// # Errors
    /// Returns an error if the listing could not be obtained.
    fn list_sinks(&self) -> Result<String>;

    /// Make `sink` the default output
    ///
    /// # Errors
    /// Returns an error if the audio server rejected the change.
    fn set_default_sink(&self, sink: &str) -> Result<()>;

    /// Raw short-form listing of active streams, one stream per line
    ///
    /// # Errors
    /// Returns an error if the listing could not be obtained.
    fn list_sink_inputs(&self) -> Result<String>;

    /// Move one active stream to `sink`
    ///
    /// # Errors
    /// Returns an error if the stream could not be moved.
    fn move_sink_input(&self, id: &str, sink: &str) -> Result<()>;
}

impl<T: AudioControl + ?Sized> AudioControl for &T {
    fn list_sinks(&self) -> Result<String> {
        (**self).list_sinks()
    }

    fn set_default_sink(&self, sink: &str) -> Result<()> {
        (**self).set_default_sink(sink)
    }

    fn list_sink_inputs(&self) -> Result<String> {
        (**self).list_sink_inputs()
    }

    fn move_sink_input(&self, id: &str, sink: &str) -> Result<()> {
        (**self).move_sink_input(id, sink)
    }
}

/// Extract stream ids from a `pactl list sink-inputs short` listing
///
/// The id is the first whitespace-separated token of every non-empty line.
#[must_use]
pub fn parse_sink_input_ids(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(String::from)
        .collect()
}

/// Extract sink names (second column) from a `pactl list sinks short` listing
#[must_use]
pub fn parse_sink_names(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(String::from)
        .collect()
}

/// `pactl`-backed audio control
#[derive(Debug, Clone, Copy, Default)]
pub struct Pactl;

impl Pactl {
    /// Validate that `pactl` is available in `PATH`
    ///
    /// # Errors
    /// Returns an error with installation instructions if the tool is missing.
    pub fn validate_tools() -> Result<()> {
        let available = Command::new("pactl")
            .arg("--version")
            .output()
            .is_ok_and(|out| out.status.success());

        if !available {
            eyre::bail!(
                "Missing required tool: pactl\n\
                 \n\
                 Please install the PulseAudio utilities for your distribution:\n\
                 - Arch/Manjaro: pacman -S libpulse\n\
                 - Fedora: dnf install pulseaudio-utils\n\
                 - Debian/Ubuntu: apt install pulseaudio-utils"
            );
        }

        Ok(())
    }

    /// Run `pactl` with `args`, returning stdout on success
    fn run(args: &[&str]) -> Result<String> {
        let output = Command::new("pactl")
            .args(args)
            .output()
            .with_context(|| format!("Failed to run 'pactl {}'. Is pactl installed?", args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            eyre::bail!("pactl {} failed: {}", args.join(" "), stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!("pactl {} returned {} lines", args.join(" "), stdout.lines().count());
        Ok(stdout)
    }
}

impl AudioControl for Pactl {
    fn list_sinks(&self) -> Result<String> {
        Self::run(&["list", "sinks", "short"])
    }

    fn set_default_sink(&self, sink: &str) -> Result<()> {
        Self::run(&["set-default-sink", sink])?;
        debug!("Set default sink: {}", sink);
        Ok(())
    }

    fn list_sink_inputs(&self) -> Result<String> {
        Self::run(&["list", "sink-inputs", "short"])
    }

    fn move_sink_input(&self, id: &str, sink: &str) -> Result<()> {
        Self::run(&["move-sink-input", id, sink])?;
        debug!("Moved sink input {} to {}", id, sink);
        Ok(())
    }
}
