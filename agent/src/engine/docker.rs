//! Docker engine over the docker CLI

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::deploy::docker::{run_cli, to_args, CliFailure};
use crate::engine::{ContainerEngine, NodeRole};
use crate::errors::AgentError;
use crate::models::command::ContainerOp;
use crate::models::stack::EngineType;

const LOG_TAIL: &str = "500";

fn engine_error(e: CliFailure) -> AgentError {
    AgentError::EngineError(e.to_string())
}

#[derive(Debug, Default)]
pub struct DockerEngine;

impl DockerEngine {
    pub fn new() -> Self {
        Self
    }

    async fn docker(&self, args: &[&str]) -> Result<String, AgentError> {
        run_cli("docker", &to_args(args), None).await.map_err(engine_error)
    }

    pub(crate) fn container_args(name: &str, op: ContainerOp, force: bool) -> Vec<String> {
        let mut args = match op {
            ContainerOp::Start => to_args(&["start"]),
            ContainerOp::Restart => to_args(&["restart"]),
            ContainerOp::Stop => to_args(&["stop"]),
            ContainerOp::Kill => to_args(&["kill"]),
            ContainerOp::Delete => to_args(&["rm"]),
        };
        if force && op == ContainerOp::Delete {
            args.push("--force".to_string());
        }
        args.push(name.to_string());
        args
    }
}

/// Whether the daemon reports an active swarm membership
pub(crate) fn swarm_active(info: &Value) -> bool {
    info.pointer("/Swarm/LocalNodeState")
        .and_then(Value::as_str)
        .map(|state| state == "active")
        .unwrap_or(false)
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn container(&self, name: &str, op: ContainerOp, force: bool) -> Result<(), AgentError> {
        run_cli("docker", &Self::container_args(name, op, force), None)
            .await
            .map_err(engine_error)?;
        Ok(())
    }

    async fn delete_image(&self, name: &str) -> Result<(), AgentError> {
        self.docker(&["rmi", name]).await?;
        Ok(())
    }

    async fn delete_volume(&self, name: &str) -> Result<(), AgentError> {
        self.docker(&["volume", "rm", name]).await?;
        Ok(())
    }

    async fn info(&self) -> Result<Option<Value>, AgentError> {
        let output = self.docker(&["info", "--format", "{{json .}}"]).await?;
        Ok(Some(serde_json::from_str(output.trim())?))
    }

    async fn stack_logs(&self, project: &str) -> Result<String, AgentError> {
        let compose_label = format!("label=com.docker.compose.project={}", project);
        let swarm_label = format!("label=com.docker.stack.namespace={}", project);

        let mut names = Vec::new();
        for filter in [&compose_label, &swarm_label] {
            let output = self
                .docker(&["ps", "-a", "--filter", filter.as_str(), "--format", "{{.Names}}"])
                .await?;
            names.extend(output.lines().map(str::trim).filter(|n| !n.is_empty()).map(String::from));
        }
        if names.is_empty() {
            return Err(AgentError::NotFound(format!("no containers for stack {}", project)));
        }

        let mut logs = String::new();
        for name in names {
            match self.docker(&["logs", "--tail", LOG_TAIL, name.as_str()]).await {
                Ok(output) => {
                    logs.push_str(&format!("==> {} <==\n", name));
                    logs.push_str(&output);
                }
                Err(e) => warn!("Unable to read logs of container {}: {}", name, e),
            }
        }
        Ok(logs)
    }

    async fn node_role(&self) -> Result<NodeRole, AgentError> {
        let info = self
            .info()
            .await?
            .ok_or_else(|| AgentError::EngineError("docker info is empty".to_string()))?;

        if !swarm_active(&info) {
            return Ok(NodeRole {
                engine: EngineType::Standalone,
                is_responsible: true,
            });
        }

        // Worker nodes cannot inspect themselves; only managers report leadership
        let is_leader = match self
            .docker(&["node", "inspect", "self", "--format", "{{.ManagerStatus.Leader}}"])
            .await
        {
            Ok(output) => output.trim() == "true",
            Err(e) => {
                debug!("Node is not a swarm manager: {}", e);
                false
            }
        };

        Ok(NodeRole {
            engine: EngineType::Swarm,
            is_responsible: is_leader,
        })
    }
}
