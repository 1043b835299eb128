//! Stack reconciliation worker

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use crate::stacks::reconciler::{Reconciled, Reconciler};
use crate::workers::group::ShutdownSignal;

/// Reconciliation worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Sleep between checks when nothing is pending
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Run the reconciliation worker.
///
/// The shutdown signal is only observed between stacks: a deployment that has
/// started runs to completion.
pub async fn run<S, F>(
    options: &Options,
    reconciler: &Reconciler,
    sleep_fn: S,
    mut shutdown_signal: ShutdownSignal,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Stack reconciliation worker starting...");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_signal => {
                info!("Stack reconciliation worker shutting down...");
                return;
            }
            _ = async {} => {}
        }

        match reconciler.reconcile_next().await {
            Reconciled::Processed => continue,
            Reconciled::Idle => debug!("No pending stacks"),
            Reconciled::Retry => debug!("Stack removal queued for retry"),
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Stack reconciliation worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }
    }
}
