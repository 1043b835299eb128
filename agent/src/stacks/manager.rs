//! Stack manager
//!
//! Owns the map of known stacks and the FIFO queue of stacks waiting for the
//! reconciliation worker. Both live behind a single async mutex; the worker is
//! a single task, so at most one deployer call is ever in flight.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use edge_api::{EdgeStackConfig, EdgeStackPayload, EdgeStackStatus, StackStatusSnapshot};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::deploy::fsm::StackEvent;
use crate::deploy::Deployer;
use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::http::edge::ControlPlaneClient;
use crate::models::stack::{EngineType, Stack, StackAction, StackId};
use crate::stacks::reconciler::Reconciler;
use crate::workers::deployer;
use crate::workers::group::WorkerGroup;

/// Builds the deployer for an engine
pub type DeployerFactory = Box<dyn Fn(EngineType) -> Arc<dyn Deployer> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct StackManagerOptions {
    /// Root of `{stacks_dir}/{stack id}/{manifest}`
    pub stacks_dir: Dir,
    pub worker: deployer::Options,
}

/// Stacks plus the order in which pending ones are picked up
#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) stacks: HashMap<StackId, Stack>,
    queue: VecDeque<StackId>,
}

impl Registry {
    pub(crate) fn enqueue(&mut self, id: StackId) {
        if !self.queue.contains(&id) {
            self.queue.push_back(id);
        }
    }

    /// Pop the oldest queued stack that is still actionable
    pub(crate) fn next_actionable(&mut self) -> Option<StackId> {
        while let Some(id) = self.queue.pop_front() {
            if self.stacks.get(&id).is_some_and(|s| s.status.is_actionable()) {
                return Some(id);
            }
        }
        None
    }

    fn schedule(&mut self, id: StackId, action: StackAction) {
        if let Some(stack) = self.stacks.get_mut(&id) {
            if let Err(e) = stack.process(StackEvent::Schedule(action)) {
                warn!("Unable to schedule stack {}: {}", id, e);
                return;
            }
            self.enqueue(id);
        }
    }
}

/// State shared between the manager and its reconciliation worker
pub(crate) struct Shared {
    pub(crate) client: Arc<dyn ControlPlaneClient>,
    pub(crate) registry: Mutex<Registry>,
}

impl Shared {
    pub(crate) async fn report(&self, id: StackId, status: EdgeStackStatus, error: &str) {
        if let Err(e) = self.client.set_edge_stack_status(id, status, error).await {
            warn!("Unable to report status of stack {}: {}", id, e);
        }
    }
}

struct EngineState {
    engine: EngineType,
    deployer: Arc<dyn Deployer>,
}

/// Manifest and options of one stack, from either protocol
struct StackDefinition<'a> {
    id: StackId,
    version: i64,
    name: &'a str,
    content: &'a str,
    prune: bool,
    namespace: Option<String>,
    registry_credentials: Vec<edge_api::RegistryCredential>,
}

impl<'a> StackDefinition<'a> {
    fn from_config(id: StackId, version: i64, config: &'a EdgeStackConfig) -> Self {
        Self {
            id,
            version,
            name: &config.name,
            content: &config.stack_file_content,
            prune: config.prune,
            namespace: config.namespace.clone(),
            registry_credentials: config.registry_credentials.clone(),
        }
    }

    fn from_payload(payload: &'a EdgeStackPayload) -> Self {
        Self {
            id: payload.id,
            version: payload.version,
            name: &payload.name,
            content: &payload.stack_file_content,
            prune: payload.prune,
            namespace: payload.namespace.clone(),
            registry_credentials: payload.registry_credentials.clone(),
        }
    }
}

pub struct StackManager {
    options: StackManagerOptions,
    shared: Arc<Shared>,
    engine: StdMutex<EngineState>,
    factory: DeployerFactory,
    worker: Mutex<Option<WorkerGroup>>,
}

impl StackManager {
    pub fn new(
        options: StackManagerOptions,
        client: Arc<dyn ControlPlaneClient>,
        engine: EngineType,
        factory: DeployerFactory,
    ) -> Self {
        let deployer = factory(engine);
        Self {
            options,
            shared: Arc::new(Shared {
                client,
                registry: Mutex::new(Registry::default()),
            }),
            engine: StdMutex::new(EngineState { engine, deployer }),
            factory,
            worker: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> EngineType {
        self.engine.lock().unwrap_or_else(|e| e.into_inner()).engine
    }

    fn deployer(&self) -> Arc<dyn Deployer> {
        self.engine
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .deployer
            .clone()
    }

    // ============================ DESIRED STATE ============================ //

    /// Reconcile the server's `{stack id: version}` map with the local stacks.
    ///
    /// New or changed stacks are fetched, written to disk, acknowledged and
    /// queued for deployment; stacks missing from `desired` are queued for
    /// removal. Calling twice with the same map changes nothing.
    pub async fn update_stacks_status(
        &self,
        desired: HashMap<StackId, i64>,
    ) -> Result<(), AgentError> {
        let mut registry = self.shared.registry.lock().await;

        for (&id, &version) in &desired {
            if !needs_update(&registry, id, version) {
                continue;
            }

            let config = match self.shared.client.get_edge_stack_config(id).await {
                Ok(config) => config,
                Err(e) => {
                    warn!("Unable to fetch configuration of stack {}: {}", id, e);
                    continue;
                }
            };

            let definition = StackDefinition::from_config(id, version, &config);
            if let Err(e) = self.apply_definition(&mut registry, definition).await {
                warn!("Unable to store stack {}: {}", id, e);
                continue;
            }
            self.shared.report(id, EdgeStackStatus::Acknowledged, "").await;
        }

        let removed: Vec<StackId> = registry
            .stacks
            .values()
            .filter(|s| !desired.contains_key(&s.id) && s.action != StackAction::Delete)
            .map(|s| s.id)
            .collect();
        for id in removed {
            info!("Stack {} is no longer assigned, scheduling removal", id);
            registry.schedule(id, StackAction::Delete);
        }

        Ok(())
    }

    /// Deploy a stack whose manifest came inline with an async command
    pub async fn deploy_stack(&self, payload: &EdgeStackPayload) -> Result<(), AgentError> {
        let mut registry = self.shared.registry.lock().await;
        if !needs_update(&registry, payload.id, payload.version) {
            debug!("Stack {} version {} already known", payload.id, payload.version);
            return Ok(());
        }

        self.apply_definition(&mut registry, StackDefinition::from_payload(payload))
            .await?;
        drop(registry);

        self.shared
            .report(payload.id, EdgeStackStatus::Acknowledged, "")
            .await;
        Ok(())
    }

    /// Schedule removal of a stack
    pub async fn delete_stack(&self, id: StackId) -> Result<(), AgentError> {
        let mut registry = self.shared.registry.lock().await;
        match registry.stacks.get(&id) {
            None => {
                debug!("Stack {} is not deployed here, nothing to remove", id);
            }
            Some(stack) if stack.action == StackAction::Delete => {}
            Some(_) => {
                info!("Scheduling removal of stack {}", id);
                registry.schedule(id, StackAction::Delete);
            }
        }
        Ok(())
    }

    async fn apply_definition(
        &self,
        registry: &mut Registry,
        definition: StackDefinition<'_>,
    ) -> Result<(), AgentError> {
        let engine = self.engine();
        let id = definition.id;
        let stack_dir = self.options.stacks_dir.subdir(&id.to_string());
        let file_name = engine.manifest_file_name(definition.name);

        stack_dir
            .file(&file_name)
            .write_string(definition.content)
            .await?;

        let action = if registry.stacks.contains_key(&id) {
            StackAction::Update
        } else {
            StackAction::Deploy
        };
        let stack = registry
            .stacks
            .entry(id)
            .or_insert_with(|| Stack::new(id, definition.version, stack_dir.path().to_path_buf()));
        stack.version = definition.version;
        stack.name = definition.name.to_string();
        stack.file_name = file_name;
        stack.prune = definition.prune;
        stack.namespace = definition.namespace;
        stack.registry_credentials = definition.registry_credentials;

        info!(
            "Stack {} ({}) version {} queued for {:?}",
            id, stack.name, stack.version, action
        );
        registry.schedule(id, action);
        Ok(())
    }

    // ============================== LIFECYCLE ============================== //

    /// Start the reconciliation worker; a no-op when already running
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|w| w.is_running()) {
            return;
        }

        info!("Starting stack manager ({})", self.engine());
        let mut group = WorkerGroup::new("stack reconciliation");
        let reconciler = Reconciler::new(self.shared.clone(), self.deployer());
        let options = self.options.worker.clone();
        let shutdown_signal = group.shutdown_signal();
        group.spawn(async move {
            deployer::run(
                &options,
                &reconciler,
                |wait| tokio::time::sleep(wait),
                shutdown_signal,
            )
            .await;
        });
        *worker = Some(group);
    }

    /// Stop the worker, letting an in-flight deployment finish; idempotent
    pub async fn stop(&self) {
        let group = self.worker.lock().await.take();
        if let Some(group) = group {
            info!("Stopping stack manager");
            group.stop().await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| w.is_running())
    }

    /// Switch engines; stops the manager when the engine actually changes
    pub async fn set_engine_status(&self, engine: EngineType) -> Result<(), AgentError> {
        if self.engine() == engine {
            return Ok(());
        }

        info!("Engine changed to {}, switching deployer", engine);
        self.stop().await;

        let deployer = (self.factory)(engine);
        let mut state = self.engine.lock().unwrap_or_else(|e| e.into_inner());
        state.engine = engine;
        state.deployer = deployer;
        Ok(())
    }

    // =============================== QUERIES =============================== //

    pub async fn stack_statuses(&self) -> HashMap<StackId, StackStatusSnapshot> {
        self.shared
            .registry
            .lock()
            .await
            .stacks
            .values()
            .map(|s| {
                (
                    s.id,
                    StackStatusSnapshot {
                        status: s.status.as_str().to_string(),
                        version: s.version,
                        error: s.error.clone(),
                    },
                )
            })
            .collect()
    }

    pub async fn stack(&self, id: StackId) -> Option<Stack> {
        self.shared.registry.lock().await.stacks.get(&id).cloned()
    }
}

/// Whether `(id, version)` differs from what is stored, or revives a stack
/// scheduled for removal
fn needs_update(registry: &Registry, id: StackId, version: i64) -> bool {
    match registry.stacks.get(&id) {
        None => true,
        Some(stack) => stack.version != version || stack.action == StackAction::Delete,
    }
}
