//! Daemon mode
//!
//! Runs the main event loop: listens to `BlueZ` device events and switches
//! audio sinks when watched devices connect or disconnect.

use color_eyre::eyre::{self, Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::audio::{AudioControl, Pactl};
use crate::bluez::{self, BluezDevices};
use crate::config::Config;
use crate::notification::{get_sink_icon, send_notification, switch_message};
use crate::router::{DeviceDirectory, DeviceNotification, IgnoreReason, RouteOutcome, Router};

/// Log level used until the config has been loaded
const STARTUP_LOG_LEVEL: &str = "info";

/// Handle for switching the daemon's log filter once the config is known
///
/// Holds nothing when `RUST_LOG` is set, since the environment wins.
pub struct LogFilter {
    handle: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogFilter {
    /// Replace the startup filter with `btsw=LEVEL`
    ///
    /// # Errors
    /// Returns an error if the subscriber has been dropped.
    pub fn apply(&self, level: &str) -> Result<()> {
        if let Some(handle) = &self.handle {
            handle
                .reload(crate_filter(level))
                .context("Failed to apply configured log level")?;
        }
        Ok(())
    }
}

// "btsw=LEVEL" keeps other crates (dbus, notify-rust) quiet unless RUST_LOG says otherwise
fn crate_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("btsw={level}"))
}

/// Install the daemon's subscriber before the config is read
///
/// Config loading logs warnings of its own, so the subscriber starts at
/// `info` and is narrowed with [`LogFilter::apply`] afterwards.
pub fn init_logging() -> LogFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return LogFilter { handle: None };
    }

    let (filter, handle) = reload::Layer::new(crate_filter(STARTUP_LOG_LEVEL));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    LogFilter {
        handle: Some(handle),
    }
}

/// Run the daemon with the given configuration
///
/// Expects [`init_logging`] to have been called.
///
/// # Errors
/// Returns an error if `pactl` is missing, the system bus is unreachable, or
/// the bus listener stops.
pub async fn run(config: Arc<Config>) -> Result<()> {
    info!("Starting BTSW daemon");
    info!(
        "Watching {} devices, fallback sink: {}",
        config.devices.len(),
        config.sinks.fallback
    );

    Pactl::validate_tools()?;

    let devices = BluezDevices::connect()?;
    let events = bluez::spawn_listener_thread()?;
    info!("BlueZ listener thread started");

    let router = Arc::new(Router::new(config, Pactl, devices));
    serve(router, events, shutdown_signal()).await
}

/// Drive the router from a notification channel until `shutdown` resolves
///
/// Performs the startup baseline switch first (if enabled), then handles one
/// notification at a time, each to completion, in arrival order.
///
/// # Errors
/// Returns an error if the notification channel closes or a handler panics.
pub async fn serve<A, D>(
    router: Arc<Router<A, D>>,
    mut events: mpsc::UnboundedReceiver<DeviceNotification>,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    A: AudioControl + Send + Sync + 'static,
    D: DeviceDirectory + Send + Sync + 'static,
{
    if router.config().settings.reset_on_startup {
        let baseline_router = Arc::clone(&router);
        let outcome = tokio::task::spawn_blocking(move || baseline_router.baseline())
            .await
            .context("Startup switch panicked")?;
        if !outcome.is_applied() {
            warn!("Could not establish fallback sink at startup: {}", outcome);
        }
    }

    if let Err(e) = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]) {
        warn!("Could not notify systemd: {}", e);
    }

    info!("Bluetooth sink switcher running. Waiting for device events...");

    tokio::pin!(shutdown);

    // Main event loop
    loop {
        tokio::select! {
            biased;

            event = events.recv() => {
                let Some(notification) = event else {
                    error!("BlueZ listener stopped (event channel closed)");
                    eyre::bail!("Lost connection to the system bus");
                };

                let handler = Arc::clone(&router);
                tokio::task::spawn_blocking(move || handle_notification(&handler, &notification))
                    .await
                    .context("Event handler panicked")?;
            }

            () = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Stopping]);
    Ok(())
}

/// Route one notification and report the result
fn handle_notification<A, D>(router: &Router<A, D>, notification: &DeviceNotification) -> RouteOutcome
where
    A: AudioControl,
    D: DeviceDirectory,
{
    let outcome = router.handle(notification);

    match &outcome {
        RouteOutcome::Ignored(IgnoreReason::NoConnectedProperty | IgnoreReason::UnknownDevice(_)) => {}
        RouteOutcome::Ignored(reason @ IgnoreReason::AddressLookupFailed(_)) => {
            warn!("Ignoring event from {}: {}", notification.path, reason);
        }
        RouteOutcome::Dispatched {
            address,
            connected,
            target,
            outcome: switch,
        } => {
            let config = router.config();
            if config.settings.notify_switch {
                let device = config
                    .find_device(address)
                    .map_or(address.as_str(), |d| d.display_name());
                let (summary, body) = switch_message(device, *connected, target, switch);
                if let Err(e) = send_notification(&summary, &body, Some(get_sink_icon(target))) {
                    warn!("Could not send switch notification: {:#}", e);
                }
            }
        }
    }

    outcome
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Could not listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
