//! Stack model

use std::path::PathBuf;

use edge_api::RegistryCredential;
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::StackEvent;

pub type StackId = i64;

/// Orchestration engine a stack is deployed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    Standalone,
    Swarm,
    Kubernetes,
    Nomad,
}

impl EngineType {
    /// Manifest file name for a stack deployed on this engine
    pub fn manifest_file_name(&self, stack_name: &str) -> String {
        match self {
            EngineType::Standalone | EngineType::Swarm => "docker-compose.yml".to_string(),
            EngineType::Kubernetes => format!("{}.yml", stack_name),
            EngineType::Nomad => format!("{}.hcl", stack_name),
        }
    }

    pub fn is_docker(&self) -> bool {
        matches!(self, EngineType::Standalone | EngineType::Swarm)
    }
}

impl std::fmt::Display for EngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineType::Standalone => "standalone",
            EngineType::Swarm => "swarm",
            EngineType::Kubernetes => "kubernetes",
            EngineType::Nomad => "nomad",
        };
        f.write_str(name)
    }
}

/// Reconciliation status of a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StackStatus {
    Pending,
    Deploying,
    AwaitingStatus,
    Done,
    Error,
    Retry,
    Removing,
}

impl StackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackStatus::Pending => "pending",
            StackStatus::Deploying => "deploying",
            StackStatus::AwaitingStatus => "awaitingStatus",
            StackStatus::Done => "done",
            StackStatus::Error => "error",
            StackStatus::Retry => "retry",
            StackStatus::Removing => "removing",
        }
    }
}

/// What the worker must do with a pending stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackAction {
    Deploy,
    Update,
    Delete,
    Idle,
}

/// A stack known to this agent
#[derive(Debug, Clone)]
pub struct Stack {
    pub id: StackId,
    pub name: String,
    pub version: i64,
    /// Directory holding the manifest
    pub file_location: PathBuf,
    pub file_name: String,
    pub registry_credentials: Vec<RegistryCredential>,
    pub prune: bool,
    pub namespace: Option<String>,
    pub status: StackStatus,
    pub action: StackAction,
    pub error: Option<String>,
}

/// Engine-side project name of the stack called `name`
pub fn composed_name(name: &str) -> String {
    format!("edge_{}", name)
}

impl Stack {
    /// A stack that has been announced but not yet fetched
    pub fn new(id: StackId, version: i64, file_location: PathBuf) -> Self {
        Self {
            id,
            name: String::new(),
            version,
            file_location,
            file_name: String::new(),
            registry_credentials: Vec::new(),
            prune: false,
            namespace: None,
            status: StackStatus::Pending,
            action: StackAction::Deploy,
            error: None,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.file_location.join(&self.file_name)
    }

    /// Project name handed to the deployer
    pub fn composed_name(&self) -> String {
        composed_name(&self.name)
    }

    /// Apply a lifecycle event, updating status and error
    pub fn process(&mut self, event: StackEvent) -> Result<(), String> {
        let next = self.status.next(&event)?;
        match event {
            StackEvent::Failed(message) | StackEvent::RemoveFailed(message) => {
                self.error = Some(message)
            }
            StackEvent::Schedule(action) => {
                self.action = action;
                self.error = None;
            }
            StackEvent::Running => self.action = StackAction::Idle,
            _ => {}
        }
        self.status = next;
        Ok(())
    }
}
