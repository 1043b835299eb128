//! Application configuration options

use std::time::Duration;

use crate::edge::key::EdgeKey;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{EngineSelection, Settings};
use crate::workers::{activity, deployer, runtime_check};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Decoded edge key
    pub edge_key: EdgeKey,

    /// Edge identifier sent with every request
    pub edge_id: String,

    pub engine: EngineSelection,

    /// Use the async command protocol
    pub edge_async: bool,

    pub poll_interval: Duration,

    /// Skip TLS verification towards the control plane
    pub insecure_poll: bool,

    /// Local agent API address exposed through the tunnel
    pub agent_addr: String,

    /// Tunnel inactivity monitor options
    pub activity: activity::Options,

    /// Leadership gate options
    pub runtime_check: runtime_check::Options,

    /// Stack reconciliation worker options
    pub deployer: deployer::Options,
}

impl AppOptions {
    pub fn new(settings: &Settings, edge_key: EdgeKey, layout: StorageLayout) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageOptions { layout },
            edge_key,
            edge_id: settings.edge_id.clone(),
            engine: settings.engine,
            edge_async: settings.edge_async,
            poll_interval: settings.poll_interval,
            insecure_poll: settings.insecure_poll,
            agent_addr: settings.agent_addr.clone(),
            activity: activity::Options {
                inactivity_timeout: settings.inactivity_timeout,
                ..Default::default()
            },
            runtime_check: runtime_check::Options {
                check_interval: settings.runtime_check_interval,
            },
            deployer: deployer::Options {
                interval: settings.deploy_interval,
            },
        }
    }
}

/// Lifecycle options for the agent
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,
}
