//! Reverse tunnel to the control plane

pub mod client;
pub mod transport;

use async_trait::async_trait;

use crate::edge::credentials::TunnelCredentials;
use crate::errors::AgentError;

/// Parameters for one tunnel-open request; never persisted
#[derive(Debug)]
pub struct TunnelConfig {
    /// Local agent API address the tunnel forwards to
    pub local_addr: String,
    pub server_addr: String,
    pub server_fingerprint: String,
    pub credentials: TunnelCredentials,
    /// Port opened on the server side
    pub remote_port: u16,
}

/// Opens and closes the single reverse tunnel
#[async_trait]
pub trait TunnelClient: Send + Sync {
    /// Open the tunnel; a no-op when one is already open
    async fn create_tunnel(&self, config: TunnelConfig) -> Result<(), AgentError>;

    async fn close_tunnel(&self) -> Result<(), AgentError>;

    fn is_tunnel_open(&self) -> bool;
}
