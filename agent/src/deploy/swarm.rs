//! Docker Swarm stack deployer

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::deploy::docker::{registry_login, run_cli, to_args};
use crate::deploy::{file_args, DeployOptions, Deployer};
use crate::errors::AgentError;

#[derive(Debug, Default)]
pub struct SwarmDeployer;

impl SwarmDeployer {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn deploy_args(name: &str, files: &[PathBuf], prune: bool) -> Vec<String> {
        let mut args = to_args(&["stack", "deploy", "--with-registry-auth"]);
        if prune {
            args.push("--prune".to_string());
        }
        args.extend(file_args("--compose-file", files));
        args.push(name.to_string());
        args
    }
}

#[async_trait]
impl Deployer for SwarmDeployer {
    async fn deploy(
        &self,
        name: &str,
        files: &[PathBuf],
        options: &DeployOptions,
    ) -> Result<(), AgentError> {
        info!("Deploying swarm stack {}", name);
        registry_login(&options.registry_credentials).await;
        run_cli("docker", &Self::deploy_args(name, files, options.prune), None)
            .await
            .map_err(|e| AgentError::DeployError(e.to_string()))?;
        Ok(())
    }

    async fn remove(
        &self,
        name: &str,
        _files: &[PathBuf],
        _options: &DeployOptions,
    ) -> Result<(), AgentError> {
        info!("Removing swarm stack {}", name);
        run_cli("docker", &to_args(&["stack", "rm", name]), None)
            .await
            .map_err(|e| AgentError::DeployError(e.to_string()))?;
        Ok(())
    }
}
