//! Settings file management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;
use crate::utils::duration_str;

/// Which orchestration engine the agent drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineSelection {
    /// Docker, standalone or swarm depending on what the daemon reports
    #[default]
    Auto,
    Docker,
    Kubernetes,
    Nomad,
}

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit stdout logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Also write a daily rolling log file under the storage layout
    #[serde(default)]
    pub log_to_file: bool,

    /// Base64 edge key issued by the server
    #[serde(default)]
    pub edge_key: String,

    /// Edge identifier; also the key material for tunnel credentials
    #[serde(default)]
    pub edge_id: String,

    #[serde(default)]
    pub engine: EngineSelection,

    /// Use the asynchronous command protocol instead of status polling
    #[serde(default)]
    pub edge_async: bool,

    /// Sync poll interval, and initial async interval
    #[serde(default = "default_poll_interval", with = "duration_str")]
    pub poll_interval: Duration,

    /// Idle time after which an open tunnel is closed
    #[serde(default = "default_inactivity_timeout", with = "duration_str")]
    pub inactivity_timeout: Duration,

    /// Leadership gate cadence
    #[serde(default = "default_runtime_check_interval", with = "duration_str")]
    pub runtime_check_interval: Duration,

    /// Idle sleep of the stack reconciliation worker
    #[serde(default = "default_deploy_interval", with = "duration_str")]
    pub deploy_interval: Duration,

    /// Local agent API address exposed through the tunnel
    #[serde(default = "default_agent_addr")]
    pub agent_addr: String,

    /// Skip TLS verification towards the control plane
    #[serde(default)]
    pub insecure_poll: bool,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_inactivity_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_runtime_check_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_deploy_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_agent_addr() -> String {
    "127.0.0.1:9001".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            edge_key: String::new(),
            edge_id: String::new(),
            engine: EngineSelection::Auto,
            edge_async: false,
            poll_interval: default_poll_interval(),
            inactivity_timeout: default_inactivity_timeout(),
            runtime_check_interval: default_runtime_check_interval(),
            deploy_interval: default_deploy_interval(),
            agent_addr: default_agent_addr(),
            insecure_poll: false,
        }
    }
}
