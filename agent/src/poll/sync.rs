//! Sync protocol loop

use std::collections::HashMap;
use std::time::Duration;

use edge_api::{EdgeStatusResponse, TunnelStatus};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::edge::credentials::decrypt_credentials;
use crate::errors::AgentError;
use crate::models::command::LogRequest;
use crate::poll::{PollContext, PollOptions};
use crate::tunnel::TunnelConfig;
use crate::utils::{advertised_interval, bounded_interval};
use crate::workers::group::ShutdownSignal;

fn ticker(period: Duration) -> tokio::time::Interval {
    let period = bounded_interval(period);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Run the sync poll loop
pub async fn run(options: &PollOptions, ctx: &PollContext, mut shutdown_signal: ShutdownSignal) {
    info!("Sync poll loop starting...");

    let mut interval = options.poll_interval;
    ctx.client.set_timeout(interval);
    let mut poll_ticker = ticker(interval);

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Sync poll loop shutting down...");
                return;
            }
            _ = poll_ticker.tick() => {}
        }

        match poll_once(options, ctx).await {
            Ok(Some(checkin)) if checkin != interval => {
                info!("Checkin interval changed from {:?} to {:?}", interval, checkin);
                interval = checkin;
                ctx.client.set_timeout(interval);
                poll_ticker = ticker(interval);
            }
            Ok(_) => {}
            Err(e) => error!("Unable to poll control plane: {}", e),
        }
    }
}

/// One sync round; returns the checkin interval the server advertised
pub async fn poll_once(
    options: &PollOptions,
    ctx: &PollContext,
) -> Result<Option<Duration>, AgentError> {
    let status = ctx.client.get_environment_status().await?;
    debug!(
        "Environment status: tunnel {:?}, {} stacks, {} schedules",
        status.status,
        status.stacks.len(),
        status.schedules.len()
    );

    if let Err(e) = handle_tunnel(options, ctx, &status).await {
        error!("Tunnel operation failed: {}", e);
    }

    handle_schedules(ctx, &status).await;

    let desired: HashMap<i64, i64> = status.stacks.iter().map(|s| (s.id, s.version)).collect();
    if let Err(e) = ctx.stacks.update_stacks_status(desired).await {
        error!("Unable to update stacks: {}", e);
    }

    let checkin = advertised_interval(status.checkin);
    if checkin.is_none() && status.checkin != 0.0 {
        warn!("Ignoring invalid checkin interval {}", status.checkin);
    }
    Ok(checkin)
}

async fn handle_tunnel(
    options: &PollOptions,
    ctx: &PollContext,
    status: &EdgeStatusResponse,
) -> Result<(), AgentError> {
    let open = ctx.tunnel.is_tunnel_open();

    match status.status {
        TunnelStatus::Required if !open => {
            let credentials = decrypt_credentials(&status.credentials, &options.edge_id)?;
            let config = TunnelConfig {
                local_addr: options.agent_addr.clone(),
                server_addr: options.tunnel_server_addr.clone(),
                server_fingerprint: options.tunnel_server_fingerprint.clone(),
                credentials,
                remote_port: status.port,
            };
            ctx.tunnel.create_tunnel(config).await?;
            ctx.activity.touch();
        }
        TunnelStatus::Required | TunnelStatus::Active if open => ctx.activity.touch(),
        TunnelStatus::Idle if open => {
            info!("Tunnel no longer required, closing");
            ctx.tunnel.close_tunnel().await?;
        }
        _ => {}
    }
    Ok(())
}

async fn handle_schedules(ctx: &PollContext, status: &EdgeStatusResponse) {
    if let Err(e) = ctx.scheduler.schedule(status.schedules.clone()).await {
        warn!("Unable to apply edge job schedules: {}", e);
    }

    let jobs = ctx.scheduler.jobs_status().await;
    for schedule in status.schedules.iter().filter(|s| s.collect_logs) {
        let collected = jobs.get(&schedule.id).is_some_and(|j| j.log_collected);
        if !collected {
            ctx.logs.enqueue(LogRequest::Job { id: schedule.id });
        }
    }
}
