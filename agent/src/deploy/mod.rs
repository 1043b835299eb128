//! Stack deployers, one per orchestration engine

pub mod compose;
pub mod docker;
pub mod fsm;
pub mod kubernetes;
pub mod nomad;
pub mod swarm;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use edge_api::RegistryCredential;

use crate::errors::AgentError;
use crate::models::stack::{EngineType, Stack};

/// Per-stack deployment options
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Remove services no longer present in the manifest
    pub prune: bool,
    /// Kubernetes namespace
    pub namespace: Option<String>,
    pub registry_credentials: Vec<RegistryCredential>,
}

impl DeployOptions {
    pub fn for_stack(stack: &Stack) -> Self {
        Self {
            prune: stack.prune,
            namespace: stack.namespace.clone(),
            registry_credentials: stack.registry_credentials.clone(),
        }
    }
}

/// Applies and removes stack manifests on the local engine
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(
        &self,
        name: &str,
        files: &[PathBuf],
        options: &DeployOptions,
    ) -> Result<(), AgentError>;

    async fn remove(
        &self,
        name: &str,
        files: &[PathBuf],
        options: &DeployOptions,
    ) -> Result<(), AgentError>;

    /// Wait until the deployed workload reports running
    async fn wait_for_status(&self, _name: &str) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Build the deployer for `engine`
pub fn new_deployer(engine: EngineType) -> Arc<dyn Deployer> {
    match engine {
        EngineType::Standalone => Arc::new(compose::ComposeDeployer::new()),
        EngineType::Swarm => Arc::new(swarm::SwarmDeployer::new()),
        EngineType::Kubernetes => Arc::new(kubernetes::KubernetesDeployer::new()),
        EngineType::Nomad => Arc::new(nomad::NomadDeployer::new()),
    }
}

pub(crate) fn file_args(flag: &str, files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .flat_map(|f| [flag.to_string(), f.to_string_lossy().into_owned()])
        .collect()
}
