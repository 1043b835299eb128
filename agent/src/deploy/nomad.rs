//! Nomad job deployer

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::deploy::docker::{run_cli, to_args};
use crate::deploy::{DeployOptions, Deployer};
use crate::errors::AgentError;

#[derive(Debug, Default)]
pub struct NomadDeployer;

impl NomadDeployer {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn stop_args(job_id: &str) -> Vec<String> {
        to_args(&["job", "stop", "-purge", job_id])
    }
}

/// IDs of the `job "<id>" { ... }` blocks declared in an HCL job file
fn job_ids(hcl: &str) -> Vec<String> {
    hcl.lines()
        .filter_map(|line| {
            let rest = line.trim_start().strip_prefix("job")?;
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            let rest = rest.trim_start().strip_prefix('"')?;
            let (id, _) = rest.split_once('"')?;
            (!id.is_empty()).then(|| id.to_string())
        })
        .collect()
}

/// Jobs declared by the stack files; the stack name when none can be read
async fn declared_jobs(name: &str, files: &[PathBuf]) -> Vec<String> {
    let mut ids = Vec::new();
    for file in files {
        match tokio::fs::read_to_string(file).await {
            Ok(content) => ids.extend(job_ids(&content)),
            Err(e) => warn!("Unable to read nomad job file {}: {}", file.display(), e),
        }
    }
    if ids.is_empty() {
        ids.push(name.to_string());
    }
    ids
}

#[async_trait]
impl Deployer for NomadDeployer {
    async fn deploy(
        &self,
        name: &str,
        files: &[PathBuf],
        _options: &DeployOptions,
    ) -> Result<(), AgentError> {
        info!("Running nomad jobs for {}", name);
        for file in files {
            let args = vec!["job".to_string(), "run".to_string(), file.to_string_lossy().into_owned()];
            run_cli("nomad", &args, None)
                .await
                .map_err(|e| AgentError::DeployError(e.to_string()))?;
        }
        Ok(())
    }

    async fn remove(
        &self,
        name: &str,
        files: &[PathBuf],
        _options: &DeployOptions,
    ) -> Result<(), AgentError> {
        for job_id in declared_jobs(name, files).await {
            info!("Stopping nomad job {} of {}", job_id, name);
            run_cli("nomad", &Self::stop_args(&job_id), None)
                .await
                .map_err(|e| AgentError::DeployError(e.to_string()))?;
        }
        Ok(())
    }
}
