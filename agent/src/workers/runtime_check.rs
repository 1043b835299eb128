//! Leadership gate
//!
//! Only the node responsible for the cluster polls the control plane and
//! reconciles stacks. This is a soft, eventually consistent check: two nodes
//! may briefly both believe they are responsible during a leader change.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::ContainerEngine;
use crate::poll::PollService;
use crate::stacks::StackManager;
use crate::workers::group::ShutdownSignal;

/// Leadership gate options
#[derive(Debug, Clone)]
pub struct Options {
    pub check_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
        }
    }
}

/// Start or stop the poll service and stack manager according to the node role.
///
/// Returns whether this node is responsible, or `None` when the role could
/// not be determined and nothing was changed.
pub async fn check_runtime(
    engine: &dyn ContainerEngine,
    poll_service: &PollService,
    stack_manager: &StackManager,
) -> Option<bool> {
    let role = match engine.node_role().await {
        Ok(role) => role,
        Err(e) => {
            warn!("Unable to determine node role: {}", e);
            return None;
        }
    };
    debug!("Node role: {:?}", role);

    if role.is_responsible {
        if let Err(e) = stack_manager.set_engine_status(role.engine).await {
            warn!("Unable to switch engine: {}", e);
        }
        stack_manager.start().await;
        poll_service.start().await;
    } else {
        if poll_service.is_running().await {
            info!("Node is not the cluster leader, pausing edge duties");
        }
        poll_service.stop().await;
        stack_manager.stop().await;
    }
    Some(role.is_responsible)
}

/// Run the leadership gate
pub async fn run<S, F>(
    options: &Options,
    engine: &dyn ContainerEngine,
    poll_service: &PollService,
    stack_manager: &StackManager,
    sleep_fn: S,
    mut shutdown_signal: ShutdownSignal,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Leadership gate starting...");

    loop {
        check_runtime(engine, poll_service, stack_manager).await;

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Leadership gate shutting down...");
                return;
            }
            _ = sleep_fn(options.check_interval) => {}
        }
    }
}
