//! Sink switching
//!
//! Waits for a sink to appear, makes it the default output, and moves every
//! active stream onto it. Nothing here fails hard: problems come back as a
//! [`SwitchOutcome`] for the caller to log.

use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::audio::{AudioControl, parse_sink_input_ids};
use crate::prober::wait_for_sink;

/// Result of a switch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Default set and every active stream moved
    Switched { moved: usize },
    /// The sink never appeared; nothing was changed
    TimedOut,
    /// Default set, but some streams stayed where they were
    PartiallyMoved { moved: usize, failed: Vec<String> },
}

impl SwitchOutcome {
    /// Whether the default sink was changed
    #[must_use]
    pub fn is_applied(&self) -> bool {
        !matches!(self, Self::TimedOut)
    }
}

impl fmt::Display for SwitchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switched { moved } => write!(f, "switched ({moved} streams moved)"),
            Self::TimedOut => write!(f, "timed out waiting for sink"),
            Self::PartiallyMoved { moved, failed } => write!(
                f,
                "switched, but {} of {} streams could not be moved ({})",
                failed.len(),
                moved + failed.len(),
                failed.join(", ")
            ),
        }
    }
}

/// Applies sink switches through an [`AudioControl`]
pub struct Switcher<A> {
    audio: A,
    timeout: Duration,
    interval: Duration,
}

impl<A: AudioControl> Switcher<A> {
    #[must_use]
    pub fn new(audio: A, timeout: Duration, interval: Duration) -> Self {
        Self {
            audio,
            timeout,
            interval,
        }
    }

    /// Access the underlying audio control
    #[must_use]
    pub fn audio(&self) -> &A {
        &self.audio
    }

    /// Wait for `sink`, then make it the default and move all streams to it
    ///
    /// A failed default-set is logged and does not stop the stream moves.
    /// Every stream is attempted even if earlier moves fail.
    pub fn switch_to(&self, sink: &str) -> SwitchOutcome {
        info!("Switching default sink to {}...", sink);

        if !wait_for_sink(&self.audio, sink, self.timeout, self.interval) {
            warn!(
                "Timeout waiting for sink '{}' to appear after {:?}. Aborting switch.",
                sink, self.timeout
            );
            return SwitchOutcome::TimedOut;
        }

        if let Err(e) = self.audio.set_default_sink(sink) {
            warn!("Could not set default sink to '{}': {:#}", sink, e);
        }

        let inputs = match self.audio.list_sink_inputs() {
            Ok(listing) => parse_sink_input_ids(&listing),
            Err(e) => {
                info!("Could not list sink inputs; perhaps none are active.");
                debug!("Sink input listing failed: {:#}", e);
                Vec::new()
            }
        };

        let mut moved = 0;
        let mut failed = Vec::new();
        for id in inputs {
            match self.audio.move_sink_input(&id, sink) {
                Ok(()) => moved += 1,
                Err(e) => {
                    warn!("Could not move sink input {} to '{}': {:#}", id, sink, e);
                    failed.push(id);
                }
            }
        }

        let outcome = if failed.is_empty() {
            SwitchOutcome::Switched { moved }
        } else {
            SwitchOutcome::PartiallyMoved { moved, failed }
        };
        info!("Switch complete: {}", outcome);
        outcome
    }
}
