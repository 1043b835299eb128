//! Docker Compose deployer

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::deploy::docker::{registry_login, run_cli, CliFailure};
use crate::deploy::{file_args, DeployOptions, Deployer};
use crate::errors::AgentError;

const STATUS_ATTEMPTS: u32 = 10;
const STATUS_DELAY: Duration = Duration::from_secs(3);

/// Deploys stacks as Compose projects on a standalone Docker host
#[derive(Debug, Default)]
pub struct ComposeDeployer;

impl ComposeDeployer {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn up_args(name: &str, files: &[PathBuf], prune: bool) -> Vec<String> {
        let mut args = vec!["-p".to_string(), name.to_string()];
        args.extend(file_args("-f", files));
        args.extend(["up".to_string(), "-d".to_string()]);
        if prune {
            args.push("--remove-orphans".to_string());
        }
        args
    }

    pub(crate) fn down_args(name: &str, files: &[PathBuf]) -> Vec<String> {
        let mut args = vec!["-p".to_string(), name.to_string()];
        args.extend(file_args("-f", files));
        args.extend(["down".to_string(), "--remove-orphans".to_string()]);
        args
    }

    /// Run a compose subcommand with the `docker compose` plugin, falling back
    /// to the standalone `docker-compose` binary
    async fn compose(&self, args: Vec<String>) -> Result<String, AgentError> {
        let mut plugin_args = vec!["compose".to_string()];
        plugin_args.extend(args.iter().cloned());

        match run_cli("docker", &plugin_args, None).await {
            Ok(out) => Ok(out),
            Err(CliFailure::Spawn(e)) => {
                debug!("docker compose unavailable ({}), trying docker-compose", e);
                run_cli("docker-compose", &args, None)
                    .await
                    .map_err(|e| AgentError::DeployError(e.to_string()))
            }
            Err(e) => Err(AgentError::DeployError(e.to_string())),
        }
    }
}

/// Where a project stands after `up -d`, from `ps` lines of `{state}:{exit code}`
#[derive(Debug, PartialEq, Eq)]
enum ProjectState<'a> {
    /// No container has settled yet
    Starting,
    /// Every container is running or exited cleanly
    Settled,
    Failed(Vec<&'a str>),
}

fn project_state(ps_output: &str) -> ProjectState<'_> {
    let lines: Vec<&str> = ps_output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let failed: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| match line.split_once(':') {
            Some((state, code)) => {
                matches!(state, "dead" | "restarting") || (state == "exited" && code != "0")
            }
            None => matches!(*line, "dead" | "restarting"),
        })
        .collect();
    if !failed.is_empty() {
        return ProjectState::Failed(failed);
    }

    let starting = lines.iter().any(|line| {
        let state = line.split_once(':').map_or(*line, |(state, _)| state);
        matches!(state, "created" | "removing")
    });
    if lines.is_empty() || starting {
        ProjectState::Starting
    } else {
        ProjectState::Settled
    }
}

#[async_trait]
impl Deployer for ComposeDeployer {
    async fn deploy(
        &self,
        name: &str,
        files: &[PathBuf],
        options: &DeployOptions,
    ) -> Result<(), AgentError> {
        info!("Deploying compose project {}", name);
        registry_login(&options.registry_credentials).await;
        self.compose(Self::up_args(name, files, options.prune)).await?;
        info!("Successfully deployed compose project {}", name);
        Ok(())
    }

    async fn remove(
        &self,
        name: &str,
        files: &[PathBuf],
        _options: &DeployOptions,
    ) -> Result<(), AgentError> {
        info!("Removing compose project {}", name);
        self.compose(Self::down_args(name, files)).await?;
        Ok(())
    }

    async fn wait_for_status(&self, name: &str) -> Result<(), AgentError> {
        let args = vec![
            "-p".to_string(),
            name.to_string(),
            "ps".to_string(),
            "-a".to_string(),
            "--format".to_string(),
            "{{.State}}:{{.ExitCode}}".to_string(),
        ];

        for attempt in 1..=STATUS_ATTEMPTS {
            let output = self.compose(args.clone()).await?;
            match project_state(&output) {
                ProjectState::Settled => return Ok(()),
                ProjectState::Failed(containers) => {
                    return Err(AgentError::DeployError(format!(
                        "compose project {} has failed containers: {}",
                        name,
                        containers.join(", ")
                    )));
                }
                ProjectState::Starting => debug!(
                    "Compose project {} still starting (attempt {}/{})",
                    name, attempt, STATUS_ATTEMPTS
                ),
            }
            tokio::time::sleep(STATUS_DELAY).await;
        }

        Err(AgentError::DeployError(format!(
            "compose project {} did not finish starting",
            name
        )))
    }
}
