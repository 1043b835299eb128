//! Tunnel client

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::AgentError;
use crate::tunnel::transport::{TunnelSession, TunnelTransport};
use crate::tunnel::{TunnelClient, TunnelConfig};

/// [`TunnelClient`] over a pluggable transport
pub struct ReverseTunnelClient {
    transport: Box<dyn TunnelTransport>,
    session: Mutex<Option<TunnelSession>>,
    open: AtomicBool,
}

impl ReverseTunnelClient {
    pub fn new(transport: Box<dyn TunnelTransport>) -> Self {
        Self {
            transport,
            session: Mutex::new(None),
            open: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TunnelClient for ReverseTunnelClient {
    async fn create_tunnel(&self, config: TunnelConfig) -> Result<(), AgentError> {
        let mut session = self.session.lock().await;

        if let Some(current) = session.as_ref() {
            if !current.is_finished() {
                debug!("Tunnel already open, skipping creation");
                return Ok(());
            }
            info!("Previous tunnel session ended, reopening");
        }

        info!(
            "Opening tunnel to {} (remote port {} -> {})",
            config.server_addr, config.remote_port, config.local_addr
        );
        let new_session = self.transport.connect(&config).await?;
        if let Some(stale) = session.replace(new_session) {
            stale.close().await;
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close_tunnel(&self) -> Result<(), AgentError> {
        let mut session = self.session.lock().await;
        if let Some(current) = session.take() {
            info!("Closing tunnel");
            current.close().await;
        }
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// False once the session task has ended, even without `close_tunnel`
    fn is_tunnel_open(&self) -> bool {
        if !self.open.load(Ordering::SeqCst) {
            return false;
        }
        match self.session.try_lock() {
            Ok(session) => session.as_ref().is_some_and(|s| !s.is_finished()),
            // Held by create or close; the flag is current
            Err(_) => true,
        }
    }
}
