//! Sink presence checks
//!
//! `sink_exists` answers from a single listing, `wait_for_sink` polls it until
//! the sink shows up or the deadline passes. Probe failures never escape: a
//! listing that cannot be read counts as "no sinks".

use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::audio::AudioControl;

/// Default time to wait for a sink to appear
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay between two sink listings while waiting
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Check whether `sink` is listed by the audio server
///
/// Matches by substring, so a configured name that is a prefix of the real
/// sink name (e.g. without the trailing `.1` profile index) is found.
pub fn sink_exists(audio: &impl AudioControl, sink: &str) -> bool {
    match audio.list_sinks() {
        Ok(listing) => listing.lines().any(|line| line.contains(sink)),
        Err(e) => {
            debug!("Sink listing failed, treating as empty: {:#}", e);
            false
        }
    }
}

/// Poll until `sink` exists or `timeout` elapses
///
/// Returns `true` as soon as a probe finds the sink. The first probe happens
/// immediately, so an existing sink returns without sleeping. A sink that never
/// appears returns `false` once `timeout` has elapsed, never later than one
/// `interval` past it.
pub fn wait_for_sink(
    audio: &impl AudioControl,
    sink: &str,
    timeout: Duration,
    interval: Duration,
) -> bool {
    let start = Instant::now();
    let mut attempt = 1u32;

    loop {
        if sink_exists(audio, sink) {
            debug!("Sink '{}' available after {:?}", sink, start.elapsed());
            return true;
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            debug!("Sink '{}' not found after {} attempts", sink, attempt);
            return false;
        }

        trace!("Waiting for sink '{}' (attempt {})", sink, attempt);
        std::thread::sleep(interval.min(timeout - elapsed));
        attempt += 1;
    }
}
