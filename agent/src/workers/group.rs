//! Start/stop handle for a set of background workers

use std::future::Future;
use std::pin::Pin;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::error;

pub type ShutdownSignal = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Workers sharing one broadcast shutdown channel
pub struct WorkerGroup {
    name: &'static str,
    shutdown_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    pub fn new(name: &'static str) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            name,
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// A future resolving once [`WorkerGroup::stop`] is called
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        Box::pin(async move {
            let _ = shutdown_rx.recv().await;
        })
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.push(tokio::spawn(task));
    }

    /// True while at least one worker is still running
    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// Signal shutdown and wait for every worker to return
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("{} worker failed during shutdown: {}", self.name, e);
            }
        }
    }
}
