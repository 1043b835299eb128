//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::new_deployer;
use crate::engine::{new_engine, ContainerEngine};
use crate::errors::AgentError;
use crate::http::client::HttpClient;
use crate::http::edge::{ControlPlaneClient, EdgeClient};
use crate::models::stack::EngineType;
use crate::poll::{PollContext, PollOptions, PollService};
use crate::scheduler::{ScheduleRegistry, Scheduler};
use crate::stacks::{StackManager, StackManagerOptions};
use crate::storage::cursor::load_cursor;
use crate::storage::settings::EngineSelection;
use crate::tunnel::client::ReverseTunnelClient;
use crate::tunnel::transport::WsTransport;
use crate::tunnel::TunnelClient;
use crate::workers::activity::ActivityTracker;
use crate::workers::log_collector::{self, LogCollector, LogReceiver};

/// Engine assumed until the leadership gate inspects the node
pub fn initial_engine(selection: EngineSelection) -> EngineType {
    match selection {
        EngineSelection::Auto | EngineSelection::Docker => EngineType::Standalone,
        EngineSelection::Kubernetes => EngineType::Kubernetes,
        EngineSelection::Nomad => EngineType::Nomad,
    }
}

/// Main application state
pub struct AppState {
    /// Control-plane client
    pub client: Arc<dyn ControlPlaneClient>,

    pub tunnel: Arc<dyn TunnelClient>,

    /// Local container engine
    pub engine: Arc<dyn ContainerEngine>,

    pub scheduler: Arc<dyn Scheduler>,

    pub stack_manager: Arc<StackManager>,

    pub poll_service: Arc<PollService>,

    pub log_collector: Arc<LogCollector>,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<(Self, LogReceiver), AgentError> {
        info!("Initializing application state...");

        let layout = &options.storage.layout;
        layout.setup().await?;

        // Control-plane client, resuming the command stream where it stopped
        let cursor_file = layout.cursor_file();
        let cursor = load_cursor(&cursor_file).await;
        let http = HttpClient::new(
            &options.edge_key.server_url,
            &options.edge_id,
            options.poll_interval,
            options.insecure_poll,
        )?;
        let client: Arc<dyn ControlPlaneClient> = Arc::new(EdgeClient::new(
            http,
            options.edge_key.endpoint_id,
            cursor,
            Some(cursor_file),
        ));

        let tunnel: Arc<dyn TunnelClient> =
            Arc::new(ReverseTunnelClient::new(Box::new(WsTransport::new())));
        let engine = new_engine(options.engine);
        let scheduler: Arc<dyn Scheduler> = Arc::new(ScheduleRegistry::new(layout.jobs_dir()));

        let stack_manager = Arc::new(StackManager::new(
            StackManagerOptions {
                stacks_dir: layout.stacks_dir(),
                worker: options.deployer.clone(),
            },
            client.clone(),
            initial_engine(options.engine),
            Box::new(new_deployer),
        ));

        let (log_queue, log_receiver) = log_collector::channel();
        let log_collector = Arc::new(LogCollector {
            client: client.clone(),
            engine: engine.clone(),
            scheduler: scheduler.clone(),
            jobs_dir: layout.jobs_dir(),
        });

        let poll_service = Arc::new(PollService::new(
            PollOptions {
                edge_id: options.edge_id.clone(),
                edge_async: options.edge_async,
                poll_interval: options.poll_interval,
                agent_addr: options.agent_addr.clone(),
                tunnel_server_addr: options.edge_key.tunnel_server_addr.clone(),
                tunnel_server_fingerprint: options.edge_key.tunnel_server_fingerprint.clone(),
                activity: options.activity.clone(),
            },
            PollContext {
                client: client.clone(),
                tunnel: tunnel.clone(),
                stacks: stack_manager.clone(),
                scheduler: scheduler.clone(),
                engine: engine.clone(),
                logs: log_queue,
                activity: Arc::new(ActivityTracker::new()),
            },
        ));

        let state = Self {
            client,
            tunnel,
            engine,
            scheduler,
            stack_manager,
            poll_service,
            log_collector,
        };

        Ok((state, log_receiver))
    }

    /// Stop the poll service and stack manager
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        info!("Shutting down application state...");
        self.poll_service.stop().await;
        self.stack_manager.stop().await;
        Ok(())
    }
}
