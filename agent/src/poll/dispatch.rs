//! Async command dispatch

use edge_api::{EdgeStackStatus, RawCommand};
use tracing::{debug, error, info, warn};

use crate::errors::AgentError;
use crate::models::command::{Command, CommandKind};
use crate::poll::PollContext;

/// Apply commands strictly in the order received.
///
/// The cursor advances past every command, including ones that fail to
/// decode or execute; the server does not resend them.
pub async fn dispatch_commands(ctx: &PollContext, commands: Vec<RawCommand>) {
    for raw in commands {
        match Command::decode(&raw) {
            Ok(command) => {
                debug!("Executing command {} ({})", command.id, raw.command_type);
                if let Err(e) = execute(ctx, &command).await {
                    error!("Command {} failed: {}", command.id, e);
                }
            }
            Err(e) => warn!("Skipping command {}: {}", raw.id, e),
        }

        if let Err(e) = ctx.client.set_last_command_timestamp(raw.timestamp).await {
            error!("Unable to persist command cursor: {}", e);
        }
    }
}

async fn execute(ctx: &PollContext, command: &Command) -> Result<(), AgentError> {
    match &command.kind {
        CommandKind::DeployStack(payload) => {
            if let Err(e) = ctx.stacks.deploy_stack(payload).await {
                let message = e.to_string();
                if let Err(report) = ctx
                    .client
                    .set_edge_stack_status(payload.id, EdgeStackStatus::Error, &message)
                    .await
                {
                    warn!("Unable to report status of stack {}: {}", payload.id, report);
                }
                return Err(e);
            }
        }
        CommandKind::RemoveStack(id) => ctx.stacks.delete_stack(*id).await?,
        CommandKind::UpsertJob(schedule) => ctx.scheduler.add_schedule(schedule.clone()).await?,
        CommandKind::RemoveJob(id) => ctx.scheduler.remove_schedule(*id).await?,
        CommandKind::CollectLogs(request) => ctx.logs.enqueue(request.clone()),
        CommandKind::Container { name, op, force } => {
            info!("Container {}: {:?}", name, op);
            ctx.engine.container(name, *op, *force).await?
        }
        CommandKind::DeleteImage { name } => {
            info!("Deleting image {}", name);
            ctx.engine.delete_image(name).await?
        }
        CommandKind::DeleteVolume { name } => {
            info!("Deleting volume {}", name);
            ctx.engine.delete_volume(name).await?
        }
    }
    Ok(())
}
