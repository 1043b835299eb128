//! Environment snapshot for the async protocol

use edge_api::EnvironmentSnapshot;
use tracing::warn;

use crate::poll::PollContext;
use crate::telemetry::{collect_host_facts, HostFacts};

pub async fn build_snapshot(ctx: &PollContext) -> EnvironmentSnapshot {
    let docker = match ctx.engine.info().await {
        Ok(info) => info,
        Err(e) => {
            warn!("Unable to read engine info: {}", e);
            None
        }
    };

    let host = match tokio::task::spawn_blocking(collect_host_facts).await {
        Ok(facts) => host_value(&facts),
        Err(e) => {
            warn!("Unable to collect host facts: {}", e);
            None
        }
    };

    EnvironmentSnapshot {
        docker,
        kubernetes: None,
        host,
        stack_status: ctx.stacks.stack_statuses().await,
        jobs_status: ctx.scheduler.jobs_status().await,
    }
}

fn host_value(facts: &HostFacts) -> Option<serde_json::Value> {
    serde_json::to_value(facts)
        .map_err(|e| warn!("Unable to encode host facts: {}", e))
        .ok()
}
