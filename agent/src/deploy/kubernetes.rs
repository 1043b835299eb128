//! Kubernetes manifest deployer

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::deploy::docker::run_cli;
use crate::deploy::{file_args, DeployOptions, Deployer};
use crate::errors::AgentError;

#[derive(Debug, Default)]
pub struct KubernetesDeployer;

impl KubernetesDeployer {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn kubectl_args(verb: &str, files: &[PathBuf], namespace: Option<&str>) -> Vec<String> {
        let mut args = vec![verb.to_string()];
        if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
            args.extend(["--namespace".to_string(), ns.to_string()]);
        }
        args.extend(file_args("-f", files));
        if verb == "delete" {
            args.push("--ignore-not-found".to_string());
        }
        args
    }
}

#[async_trait]
impl Deployer for KubernetesDeployer {
    async fn deploy(
        &self,
        name: &str,
        files: &[PathBuf],
        options: &DeployOptions,
    ) -> Result<(), AgentError> {
        info!("Applying kubernetes manifests for {}", name);
        let args = Self::kubectl_args("apply", files, options.namespace.as_deref());
        run_cli("kubectl", &args, None)
            .await
            .map_err(|e| AgentError::DeployError(e.to_string()))?;
        Ok(())
    }

    async fn remove(
        &self,
        name: &str,
        files: &[PathBuf],
        options: &DeployOptions,
    ) -> Result<(), AgentError> {
        info!("Deleting kubernetes manifests for {}", name);
        let args = Self::kubectl_args("delete", files, options.namespace.as_deref());
        run_cli("kubectl", &args, None)
            .await
            .map_err(|e| AgentError::DeployError(e.to_string()))?;
        Ok(())
    }
}
