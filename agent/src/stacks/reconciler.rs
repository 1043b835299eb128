//! One reconciliation step: take the next pending stack and apply it

use std::path::PathBuf;
use std::sync::Arc;

use edge_api::EdgeStackStatus;
use tracing::{debug, error, info, warn};

use crate::deploy::fsm::StackEvent;
use crate::deploy::{DeployOptions, Deployer};
use crate::filesys::dir::Dir;
use crate::models::stack::{StackAction, StackId};
use crate::stacks::manager::Shared;

/// Outcome of one reconciliation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Nothing was pending
    Idle,
    /// A stack was deployed, failed, or removed
    Processed,
    /// A removal failed and the stack was queued again
    Retry,
}

/// Snapshot of a stack taken when the worker picks it up
struct Job {
    id: StackId,
    version: i64,
    action: StackAction,
    name: String,
    dir: PathBuf,
    files: Vec<PathBuf>,
    options: DeployOptions,
}

/// Drives stacks through the deployer, one at a time
pub struct Reconciler {
    shared: Arc<Shared>,
    deployer: Arc<dyn Deployer>,
}

impl Reconciler {
    pub(crate) fn new(shared: Arc<Shared>, deployer: Arc<dyn Deployer>) -> Self {
        Self { shared, deployer }
    }

    pub async fn reconcile_next(&self) -> Reconciled {
        let Some(job) = self.take_next().await else {
            return Reconciled::Idle;
        };

        match job.action {
            StackAction::Delete => self.remove(job).await,
            StackAction::Deploy | StackAction::Update => {
                self.deploy(job).await;
                Reconciled::Processed
            }
            StackAction::Idle => Reconciled::Processed,
        }
    }

    async fn take_next(&self) -> Option<Job> {
        let mut registry = self.shared.registry.lock().await;
        while let Some(id) = registry.next_actionable() {
            let Some(stack) = registry.stacks.get_mut(&id) else {
                continue;
            };
            let event = match stack.action {
                StackAction::Delete => StackEvent::StartRemove,
                _ => StackEvent::StartDeploy,
            };
            if let Err(e) = stack.process(event) {
                warn!("Skipping stack {}: {}", id, e);
                continue;
            }
            return Some(Job {
                id,
                version: stack.version,
                action: stack.action,
                name: stack.composed_name(),
                dir: stack.file_location.clone(),
                files: vec![stack.manifest_path()],
                options: DeployOptions::for_stack(stack),
            });
        }
        None
    }

    /// Apply `event` unless the stack was rescheduled while the job ran
    async fn advance(&self, job: &Job, event: StackEvent) -> bool {
        let mut registry = self.shared.registry.lock().await;
        let Some(stack) = registry.stacks.get_mut(&job.id) else {
            return false;
        };
        if stack.version != job.version {
            debug!(
                "Stack {} moved to version {} while version {} was applied, dropping result",
                job.id, stack.version, job.version
            );
            return false;
        }
        match stack.process(event) {
            Ok(()) => true,
            Err(e) => {
                debug!("Stack {} was rescheduled, dropping result: {}", job.id, e);
                false
            }
        }
    }

    async fn deploy(&self, job: Job) {
        info!("Deploying stack {} ({}) version {}", job.id, job.name, job.version);

        if let Err(e) = self.deployer.deploy(&job.name, &job.files, &job.options).await {
            self.fail(&job, e.to_string()).await;
            return;
        }
        if !self.advance(&job, StackEvent::Deployed).await {
            return;
        }

        if let Err(e) = self.deployer.wait_for_status(&job.name).await {
            self.fail(&job, e.to_string()).await;
            return;
        }
        if self.advance(&job, StackEvent::Running).await {
            info!("Stack {} version {} is running", job.id, job.version);
            self.shared.report(job.id, EdgeStackStatus::Ok, "").await;
        }
    }

    async fn fail(&self, job: &Job, message: String) {
        error!("Deployment of stack {} failed: {}", job.id, message);
        if self.advance(job, StackEvent::Failed(message.clone())).await {
            self.shared
                .report(job.id, EdgeStackStatus::Error, &message)
                .await;
        }
    }

    async fn remove(&self, job: Job) -> Reconciled {
        info!("Removing stack {} ({})", job.id, job.name);

        if let Err(e) = self.deployer.remove(&job.name, &job.files, &job.options).await {
            warn!("Removal of stack {} failed, will retry: {}", job.id, e);
            let mut registry = self.shared.registry.lock().await;
            if let Some(stack) = registry.stacks.get_mut(&job.id) {
                if stack.process(StackEvent::RemoveFailed(e.to_string())).is_ok() {
                    registry.enqueue(job.id);
                }
            }
            return Reconciled::Retry;
        }

        {
            let mut registry = self.shared.registry.lock().await;
            let still_removing = registry
                .stacks
                .get(&job.id)
                .is_some_and(|s| s.action == StackAction::Delete && s.version == job.version);
            if !still_removing {
                debug!("Stack {} was redeployed during removal", job.id);
                return Reconciled::Processed;
            }
            registry.stacks.remove(&job.id);
        }

        if let Err(e) = Dir::new(&job.dir).delete().await {
            warn!("Unable to delete manifest of stack {}: {}", job.id, e);
        }
        self.shared.report(job.id, EdgeStackStatus::Remove, "").await;
        Reconciled::Processed
    }
}
