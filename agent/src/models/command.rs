//! Async protocol commands
//!
//! Raw commands are decoded exactly once, here, into a closed set of
//! variants. Dispatch matches on [`CommandKind`] and never looks at the
//! wire strings again.

use chrono::{DateTime, Utc};
use edge_api::{
    ContainerPayload, EdgeJobSchedule, EdgeLogPayload, EdgeStackPayload, ImagePayload, RawCommand,
    VolumePayload,
};
use serde::de::DeserializeOwned;

use crate::errors::AgentError;
use crate::models::stack::StackId;

/// Command operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Replace,
    Remove,
}

impl std::str::FromStr for Operation {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Operation::Add),
            "replace" => Ok(Operation::Replace),
            "remove" => Ok(Operation::Remove),
            other => Err(AgentError::CommandError(format!("unknown operation: {}", other))),
        }
    }
}

/// Container engine operation carried by `container` commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerOp {
    Start,
    Restart,
    Stop,
    Delete,
    Kill,
}

impl std::str::FromStr for ContainerOp {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ContainerOp::Start),
            "restart" => Ok(ContainerOp::Restart),
            "stop" => Ok(ContainerOp::Stop),
            "delete" => Ok(ContainerOp::Delete),
            "kill" => Ok(ContainerOp::Kill),
            other => Err(AgentError::CommandError(format!(
                "unknown container operation: {}",
                other
            ))),
        }
    }
}

/// Log collection target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogRequest {
    Stack { id: StackId, name: String },
    Job { id: i64 },
}

/// Decoded command payload
#[derive(Debug, Clone)]
pub enum CommandKind {
    DeployStack(EdgeStackPayload),
    RemoveStack(StackId),
    UpsertJob(EdgeJobSchedule),
    RemoveJob(i64),
    CollectLogs(LogRequest),
    Container { name: String, op: ContainerOp, force: bool },
    DeleteImage { name: String },
    DeleteVolume { name: String },
}

/// A decoded command
#[derive(Debug, Clone)]
pub struct Command {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub kind: CommandKind,
}

fn payload<T: DeserializeOwned>(raw: &RawCommand) -> Result<T, AgentError> {
    serde_json::from_value(raw.value.clone()).map_err(|e| {
        AgentError::CommandError(format!(
            "invalid {} payload for command {}: {}",
            raw.command_type, raw.id, e
        ))
    })
}

fn require_delete(operation: &str, what: &str) -> Result<(), AgentError> {
    if operation == "delete" {
        Ok(())
    } else {
        Err(AgentError::CommandError(format!(
            "unsupported {} operation: {}",
            what, operation
        )))
    }
}

impl Command {
    pub fn decode(raw: &RawCommand) -> Result<Self, AgentError> {
        let operation: Operation = raw.operation.parse()?;

        let kind = match raw.command_type.as_str() {
            "edgeStack" => {
                let stack: EdgeStackPayload = payload(raw)?;
                match operation {
                    Operation::Add | Operation::Replace => CommandKind::DeployStack(stack),
                    Operation::Remove => CommandKind::RemoveStack(stack.id),
                }
            }
            "edgeJob" => {
                let schedule: EdgeJobSchedule = payload(raw)?;
                match operation {
                    Operation::Add | Operation::Replace => CommandKind::UpsertJob(schedule),
                    Operation::Remove => CommandKind::RemoveJob(schedule.id),
                }
            }
            "edgeLog" => {
                if operation == Operation::Remove {
                    return Err(AgentError::CommandError(
                        "edgeLog commands cannot be removed".to_string(),
                    ));
                }
                let request: EdgeLogPayload = payload(raw)?;
                let target = match (request.edge_stack_id, request.edge_job_id) {
                    (Some(id), _) => LogRequest::Stack {
                        id,
                        name: request.edge_stack_name.unwrap_or_default(),
                    },
                    (None, Some(id)) => LogRequest::Job { id },
                    (None, None) => {
                        return Err(AgentError::CommandError(format!(
                            "edgeLog command {} names neither a stack nor a job",
                            raw.id
                        )))
                    }
                };
                CommandKind::CollectLogs(target)
            }
            "container" => {
                let container: ContainerPayload = payload(raw)?;
                CommandKind::Container {
                    op: container.container_operation.parse()?,
                    name: container.container_name,
                    force: container.force,
                }
            }
            "image" => {
                let image: ImagePayload = payload(raw)?;
                require_delete(&image.image_operation, "image")?;
                CommandKind::DeleteImage {
                    name: image.image_name,
                }
            }
            "volume" => {
                let volume: VolumePayload = payload(raw)?;
                require_delete(&volume.volume_operation, "volume")?;
                CommandKind::DeleteVolume {
                    name: volume.volume_name,
                }
            }
            other => {
                return Err(AgentError::CommandError(format!("unknown command type: {}", other)))
            }
        };

        Ok(Self {
            id: raw.id,
            timestamp: raw.timestamp,
            kind,
        })
    }
}
