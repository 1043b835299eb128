//! Finite state machine for stack reconciliation

use crate::models::stack::{StackAction, StackStatus};

/// Stack lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEvent {
    /// Server asked for a deploy, update or delete; valid from any state
    Schedule(StackAction),

    /// Worker picked the stack for deployment
    StartDeploy,

    /// Deployer applied the manifest
    Deployed,

    /// Workload reported running
    Running,

    /// Deploy or status wait failed
    Failed(String),

    /// Worker picked the stack for removal
    StartRemove,

    /// Deployer failed to remove the stack; it is retried next cycle
    RemoveFailed(String),
}

impl StackStatus {
    /// Compute the status following `event`
    pub fn next(&self, event: &StackEvent) -> Result<StackStatus, String> {
        let next = match (self, event) {
            (_, StackEvent::Schedule(_)) => StackStatus::Pending,

            // Deploy path
            (StackStatus::Pending, StackEvent::StartDeploy) => StackStatus::Deploying,
            (StackStatus::Deploying, StackEvent::Deployed) => StackStatus::AwaitingStatus,
            (StackStatus::AwaitingStatus, StackEvent::Running) => StackStatus::Done,
            (StackStatus::Deploying | StackStatus::AwaitingStatus, StackEvent::Failed(_)) => {
                StackStatus::Error
            }

            // Removal path
            (StackStatus::Pending | StackStatus::Retry, StackEvent::StartRemove) => {
                StackStatus::Removing
            }
            (StackStatus::Removing, StackEvent::RemoveFailed(_)) => StackStatus::Retry,

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        Ok(next)
    }

    /// Whether the worker should pick up a stack in this status
    pub fn is_actionable(&self) -> bool {
        matches!(self, StackStatus::Pending | StackStatus::Retry)
    }
}
