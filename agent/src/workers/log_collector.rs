//! Edge log collection queue and worker

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::ContainerEngine;
use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::http::edge::ControlPlaneClient;
use crate::models::command::LogRequest;
use crate::models::stack::composed_name;
use crate::scheduler::{Scheduler, LOG_FILE};
use crate::workers::group::ShutdownSignal;

const QUEUE_CAPACITY: usize = 32;

/// Producer side of the log collection queue.
///
/// A request already waiting in the queue is not queued twice.
#[derive(Clone)]
pub struct LogQueue {
    tx: mpsc::Sender<LogRequest>,
    pending: Arc<Mutex<HashSet<LogRequest>>>,
}

/// Consumer side, owned by the worker
pub struct LogReceiver {
    rx: mpsc::Receiver<LogRequest>,
    pending: Arc<Mutex<HashSet<LogRequest>>>,
}

pub fn channel() -> (LogQueue, LogReceiver) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    let pending = Arc::new(Mutex::new(HashSet::new()));
    (
        LogQueue {
            tx,
            pending: pending.clone(),
        },
        LogReceiver { rx, pending },
    )
}

impl LogQueue {
    pub fn enqueue(&self, request: LogRequest) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.contains(&request) {
            debug!("Log request {:?} already queued", request);
            return;
        }
        match self.tx.try_send(request.clone()) {
            Ok(()) => {
                pending.insert(request);
            }
            Err(e) => warn!("Dropping log request: {}", e),
        }
    }
}

impl LogReceiver {
    pub async fn recv(&mut self) -> Option<LogRequest> {
        let request = self.rx.recv().await?;
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&request);
        Some(request)
    }
}

/// Collaborators the worker uploads through
pub struct LogCollector {
    pub client: Arc<dyn ControlPlaneClient>,
    pub engine: Arc<dyn ContainerEngine>,
    pub scheduler: Arc<dyn Scheduler>,
    pub jobs_dir: Dir,
}

impl LogCollector {
    pub async fn collect(&self, request: &LogRequest) -> Result<(), AgentError> {
        match request {
            LogRequest::Job { id } => {
                let file = self.jobs_dir.subdir(&id.to_string()).file(LOG_FILE);
                let content = file.read_string().await?;
                self.client.send_job_log_file(*id, &content).await?;
                self.scheduler.mark_logs_collected(*id).await;
            }
            LogRequest::Stack { id, name } => {
                let logs = self.engine.stack_logs(&composed_name(name)).await?;
                self.client.send_stack_logs(*id, &logs).await?;
            }
        }
        Ok(())
    }
}

/// Run the log collection worker
pub async fn run(
    collector: &LogCollector,
    mut receiver: LogReceiver,
    mut shutdown_signal: ShutdownSignal,
) {
    info!("Log collector worker starting...");

    loop {
        let request = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Log collector worker shutting down...");
                return;
            }
            request = receiver.recv() => match request {
                Some(request) => request,
                None => return,
            },
        };

        debug!("Collecting logs for {:?}", request);
        if let Err(e) = collector.collect(&request).await {
            error!("Log collection for {:?} failed: {}", request, e);
        }
    }
}
