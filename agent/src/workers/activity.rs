//! Tunnel inactivity monitor

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::tunnel::TunnelClient;
use crate::workers::group::ShutdownSignal;

/// Last time the tunnel was known to be in use.
///
/// Only the sync poll loop writes it; the monitor reads it.
pub struct ActivityTracker {
    started: Instant,
    last_touched_ms: AtomicU64,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            last_touched_ms: AtomicU64::new(0),
        }
    }

    pub fn touch(&self) {
        let now = self.started.elapsed().as_millis() as u64;
        self.last_touched_ms.store(now, Ordering::SeqCst);
    }

    /// Time elapsed since the last touch
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_touched_ms.load(Ordering::SeqCst));
        self.started.elapsed().saturating_sub(last)
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Activity monitor options
#[derive(Debug, Clone)]
pub struct Options {
    pub check_interval: Duration,
    pub inactivity_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(300),
        }
    }
}

/// Close the tunnel once it has been idle longer than the timeout
pub async fn run(
    options: &Options,
    tunnel: &dyn TunnelClient,
    activity: &ActivityTracker,
    mut shutdown_signal: ShutdownSignal,
) {
    info!("Tunnel activity monitor starting...");

    let mut ticker = tokio::time::interval_at(
        Instant::now() + options.check_interval,
        options.check_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Tunnel activity monitor shutting down...");
                return;
            }
            _ = ticker.tick() => {}
        }

        if !tunnel.is_tunnel_open() {
            continue;
        }

        let idle = activity.idle_for();
        debug!("Tunnel idle for {:?}", idle);
        if idle > options.inactivity_timeout {
            info!(
                "Tunnel inactive for {:?} (timeout {:?}), closing",
                idle, options.inactivity_timeout
            );
            if let Err(e) = tunnel.close_tunnel().await {
                error!("Unable to close inactive tunnel: {}", e);
            }
        }
    }
}
