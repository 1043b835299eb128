//! Engines the agent does not drive container-by-container

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::{ContainerEngine, NodeRole};
use crate::errors::AgentError;
use crate::models::command::ContainerOp;
use crate::models::stack::EngineType;

/// Kubernetes or Nomad: the agent instance is always responsible, and
/// direct container operations are not available
#[derive(Debug)]
pub struct OrchestratorEngine {
    engine: EngineType,
}

impl OrchestratorEngine {
    pub fn new(engine: EngineType) -> Self {
        Self { engine }
    }

    fn unsupported(&self, what: &str) -> AgentError {
        AgentError::EngineError(format!("{} is not supported on {}", what, self.engine))
    }
}

#[async_trait]
impl ContainerEngine for OrchestratorEngine {
    async fn container(&self, _name: &str, _op: ContainerOp, _force: bool) -> Result<(), AgentError> {
        Err(self.unsupported("container operation"))
    }

    async fn delete_image(&self, _name: &str) -> Result<(), AgentError> {
        Err(self.unsupported("image deletion"))
    }

    async fn delete_volume(&self, _name: &str) -> Result<(), AgentError> {
        Err(self.unsupported("volume deletion"))
    }

    async fn info(&self) -> Result<Option<Value>, AgentError> {
        Ok(None)
    }

    async fn stack_logs(&self, _project: &str) -> Result<String, AgentError> {
        Err(self.unsupported("stack log collection"))
    }

    async fn node_role(&self) -> Result<NodeRole, AgentError> {
        Ok(NodeRole {
            engine: self.engine,
            is_responsible: true,
        })
    }
}
