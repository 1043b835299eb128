//! Control-plane poll service
//!
//! Runs either the sync loop (status polling that drives the tunnel, job
//! schedules and stack versions) or the async loop (coalesced ping, snapshot
//! and command exchanges), plus the tunnel inactivity monitor.

pub mod async_poll;
pub mod coalescer;
pub mod dispatch;
pub mod snapshot;
pub mod sync;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::engine::ContainerEngine;
use crate::http::edge::ControlPlaneClient;
use crate::scheduler::Scheduler;
use crate::stacks::StackManager;
use crate::tunnel::TunnelClient;
use crate::workers::activity::{self, ActivityTracker};
use crate::workers::group::WorkerGroup;
use crate::workers::log_collector::LogQueue;

/// Poll service options
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Edge identifier, key material for the tunnel credentials
    pub edge_id: String,

    /// Use the async command protocol
    pub edge_async: bool,

    /// Sync poll interval; initial value of every async interval
    pub poll_interval: Duration,

    /// Local address the tunnel forwards to
    pub agent_addr: String,

    pub tunnel_server_addr: String,
    pub tunnel_server_fingerprint: String,

    pub activity: activity::Options,
}

/// Collaborators shared by the poll loops
pub struct PollContext {
    pub client: Arc<dyn ControlPlaneClient>,
    pub tunnel: Arc<dyn TunnelClient>,
    pub stacks: Arc<StackManager>,
    pub scheduler: Arc<dyn Scheduler>,
    pub engine: Arc<dyn ContainerEngine>,
    pub logs: LogQueue,
    pub activity: Arc<ActivityTracker>,
}

pub struct PollService {
    options: PollOptions,
    ctx: Arc<PollContext>,
    workers: Mutex<Option<WorkerGroup>>,
}

impl PollService {
    pub fn new(options: PollOptions, ctx: PollContext) -> Self {
        Self {
            options,
            ctx: Arc::new(ctx),
            workers: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &Arc<PollContext> {
        &self.ctx
    }

    /// Start polling; a no-op when already running
    pub async fn start(&self) {
        let mut workers = self.workers.lock().await;
        if workers.as_ref().is_some_and(|w| w.is_running()) {
            return;
        }

        let mut group = WorkerGroup::new("poll");

        let options = self.options.clone();
        let ctx = self.ctx.clone();
        let shutdown_signal = group.shutdown_signal();
        if options.edge_async {
            info!("Starting poll service (async)");
            group.spawn(async move {
                async_poll::run(&options, &ctx, shutdown_signal).await;
            });
        } else {
            info!("Starting poll service (sync)");
            group.spawn(async move {
                sync::run(&options, &ctx, shutdown_signal).await;
            });
        }

        let options = self.options.activity.clone();
        let ctx = self.ctx.clone();
        let shutdown_signal = group.shutdown_signal();
        group.spawn(async move {
            activity::run(&options, ctx.tunnel.as_ref(), &ctx.activity, shutdown_signal).await;
        });

        *workers = Some(group);
    }

    /// Stop polling and close the tunnel; idempotent
    pub async fn stop(&self) {
        let group = self.workers.lock().await.take();
        let Some(group) = group else {
            return;
        };

        info!("Stopping poll service");
        group.stop().await;

        if self.ctx.tunnel.is_tunnel_open() {
            if let Err(e) = self.ctx.tunnel.close_tunnel().await {
                error!("Unable to close tunnel: {}", e);
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.workers
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| w.is_running())
    }
}
