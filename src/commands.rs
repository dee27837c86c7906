//! CLI commands
//!
//! One-shot commands that run without the daemon: list-sinks and switch.

use color_eyre::eyre::{self, Context, Result};
use serde::Serialize;

use crate::audio::{AudioControl, Pactl, parse_sink_names};
use crate::config::Config;
use crate::switcher::{SwitchOutcome, Switcher};

/// A sink as shown by `list-sinks`
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SinkEntry {
    pub name: String,
    /// What the config uses this sink for, if anything
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListSinksJson {
    sinks: Vec<SinkEntry>,
    fallback: Option<String>,
    missing_fallback: bool,
}

/// Match listed sinks against the configured fallback and device sinks
#[must_use]
pub fn sink_entries(listing: &str, config: Option<&Config>) -> Vec<SinkEntry> {
    parse_sink_names(listing)
        .into_iter()
        .map(|name| {
            let role = config.and_then(|c| sink_role(c, &name));
            SinkEntry { name, role }
        })
        .collect()
}

fn sink_role(config: &Config, sink_name: &str) -> Option<String> {
    if sink_name.contains(&config.sinks.fallback) {
        return Some("fallback".to_string());
    }
    config
        .devices
        .iter()
        .find(|d| sink_name.contains(&config.device_sink(&d.address)))
        .map(|d| format!("device: {}", d.display_name()))
}

/// List sinks known to the audio server
///
/// # Errors
/// Returns an error if `pactl` fails or JSON serialization fails.
pub fn list_sinks(config: Option<&Config>, json_output: bool) -> Result<()> {
    let listing = Pactl.list_sinks()?;
    let entries = sink_entries(&listing, config);
    let missing_fallback = config.is_some()
        && !entries
            .iter()
            .any(|e| e.role.as_deref() == Some("fallback"));

    if json_output {
        let output = ListSinksJson {
            sinks: entries,
            fallback: config.map(|c| c.sinks.fallback.clone()),
            missing_fallback,
        };
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize sinks")?;
        println!("{json}");
        return Ok(());
    }

    if entries.is_empty() {
        println!("No sinks found.");
    } else {
        println!("Sinks ({}):", entries.len());
        for (i, entry) in entries.iter().enumerate() {
            match &entry.role {
                Some(role) => println!("  {}. {} [{}]", i + 1, entry.name, role),
                None => println!("  {}. {}", i + 1, entry.name),
            }
        }
    }

    if missing_fallback && let Some(config) = config {
        println!(
            "\nWarning: fallback sink '{}' is not currently available",
            config.sinks.fallback
        );
    }

    Ok(())
}

/// Switch to `sink` once, with the configured wait
///
/// # Errors
/// Returns an error if the sink does not appear before the timeout.
pub fn switch(config: &Config, sink: &str) -> Result<()> {
    let switcher = Switcher::new(Pactl, config.settings.wait_timeout, config.settings.poll_interval);

    match switcher.switch_to(sink) {
        SwitchOutcome::TimedOut => eyre::bail!(
            "Sink '{sink}' did not appear within {:?}. Check available sinks with: btsw list-sinks",
            config.settings.wait_timeout
        ),
        outcome => {
            println!("✓ {sink}: {outcome}");
            Ok(())
        }
    }
}
