//! Local container engine access

pub mod docker;
pub mod orchestrator;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AgentError;
use crate::models::command::ContainerOp;
use crate::models::stack::EngineType;
use crate::storage::settings::EngineSelection;

/// Role of this node as seen by its engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRole {
    pub engine: EngineType,
    /// Whether this node should run the poll service and stack manager
    pub is_responsible: bool,
}

/// Engine operations the agent core issues directly
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn container(&self, name: &str, op: ContainerOp, force: bool) -> Result<(), AgentError>;

    async fn delete_image(&self, name: &str) -> Result<(), AgentError>;

    async fn delete_volume(&self, name: &str) -> Result<(), AgentError>;

    /// Engine info document for the async snapshot, if the engine has one
    async fn info(&self) -> Result<Option<Value>, AgentError>;

    /// Recent logs of every container belonging to a deployed stack
    async fn stack_logs(&self, project: &str) -> Result<String, AgentError>;

    async fn node_role(&self) -> Result<NodeRole, AgentError>;
}

/// Build the engine client for the configured selection
pub fn new_engine(selection: EngineSelection) -> Arc<dyn ContainerEngine> {
    match selection {
        EngineSelection::Auto | EngineSelection::Docker => Arc::new(docker::DockerEngine::new()),
        EngineSelection::Kubernetes => {
            Arc::new(orchestrator::OrchestratorEngine::new(EngineType::Kubernetes))
        }
        EngineSelection::Nomad => Arc::new(orchestrator::OrchestratorEngine::new(EngineType::Nomad)),
    }
}
