//! Desktop notifications
//!
//! Handles sending notifications via notify-rust after device-triggered
//! switches, using `FreeDesktop` standard icon names.

use color_eyre::eyre::{Context, Result};
use notify_rust::Notification;

use crate::switcher::SwitchOutcome;

/// Send a desktop notification
///
/// # Errors
/// Returns an error if the notification cannot be sent (e.g., no notification daemon running).
pub fn send_notification(summary: &str, body: &str, icon: Option<&str>) -> Result<()> {
    let icon = icon.unwrap_or("audio-card");

    Notification::new()
        .summary(summary)
        .body(body)
        .appname("BTSW")
        .icon(icon)
        .timeout(3000)
        .show()
        .context("Failed to show notification")?;

    Ok(())
}

/// Icon for a sink, auto-detected from its name
#[must_use]
pub fn get_sink_icon(sink_name: &str) -> &'static str {
    let name_lower = sink_name.to_lowercase();

    if name_lower.contains("bluez") || name_lower.contains("headset") {
        "audio-headphones"
    } else if name_lower.contains("hdmi") {
        "video-display"
    } else {
        "audio-speakers"
    }
}

/// Summary and body for a device-triggered switch
#[must_use]
pub fn switch_message(device: &str, connected: bool, sink: &str, outcome: &SwitchOutcome) -> (String, String) {
    let summary = if connected {
        format!("{device} connected")
    } else {
        format!("{device} disconnected")
    };

    let body = match outcome {
        SwitchOutcome::Switched { .. } => format!("Audio output: {sink}"),
        SwitchOutcome::TimedOut => format!("Sink {sink} did not appear"),
        SwitchOutcome::PartiallyMoved { failed, .. } => format!(
            "Audio output: {sink} ({} streams could not be moved)",
            failed.len()
        ),
    };

    (summary, body)
}
