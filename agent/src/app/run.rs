//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::AgentError;
use crate::workers::group::ShutdownSignal;
use crate::workers::log_collector::{self, LogReceiver};
use crate::workers::runtime_check;

/// Run the edge agent
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AgentError> {
    info!("Initializing edge agent...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, &shutdown_tx, &mut shutdown_manager).await {
        error!("Failed to start agent: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

fn subscribe(shutdown_tx: &broadcast::Sender<()>) -> ShutdownSignal {
    let mut shutdown_rx = shutdown_tx.subscribe();
    Box::pin(async move {
        let _ = shutdown_rx.recv().await;
    })
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), AgentError> {
    let (app_state, log_receiver) = AppState::init(options).await?;
    let app_state = Arc::new(app_state);
    shutdown_manager.with_app_state(app_state.clone())?;

    init_log_collector_worker(app_state.clone(), log_receiver, shutdown_tx, shutdown_manager)?;
    init_runtime_check_worker(
        options.runtime_check.clone(),
        app_state,
        shutdown_tx,
        shutdown_manager,
    )?;

    Ok(())
}

fn init_log_collector_worker(
    app_state: Arc<AppState>,
    log_receiver: LogReceiver,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), AgentError> {
    info!("Initializing log collector worker...");

    let shutdown_signal = subscribe(shutdown_tx);
    let handle = tokio::spawn(async move {
        log_collector::run(app_state.log_collector.as_ref(), log_receiver, shutdown_signal).await;
    });

    shutdown_manager.with_log_collector_worker_handle(handle)
}

fn init_runtime_check_worker(
    options: runtime_check::Options,
    app_state: Arc<AppState>,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), AgentError> {
    info!("Initializing leadership gate...");

    let shutdown_signal = subscribe(shutdown_tx);
    let handle = tokio::spawn(async move {
        runtime_check::run(
            &options,
            app_state.engine.as_ref(),
            app_state.poll_service.as_ref(),
            app_state.stack_manager.as_ref(),
            tokio::time::sleep,
            shutdown_signal,
        )
        .await;
    });

    shutdown_manager.with_runtime_check_worker_handle(handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    runtime_check_worker_handle: Option<JoinHandle<()>>,
    log_collector_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            runtime_check_worker_handle: None,
            log_collector_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), AgentError> {
        if self.app_state.is_some() {
            return Err(AgentError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_runtime_check_worker_handle(
        &mut self,
        handle: JoinHandle<()>,
    ) -> Result<(), AgentError> {
        if self.runtime_check_worker_handle.is_some() {
            return Err(AgentError::ShutdownError("runtime_check_handle already set".to_string()));
        }
        self.runtime_check_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_log_collector_worker_handle(
        &mut self,
        handle: JoinHandle<()>,
    ) -> Result<(), AgentError> {
        if self.log_collector_worker_handle.is_some() {
            return Err(AgentError::ShutdownError("log_collector_handle already set".to_string()));
        }
        self.log_collector_worker_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), AgentError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), AgentError> {
        info!("Shutting down edge agent...");

        // 1. Leadership gate, so it cannot restart anything
        if let Some(handle) = self.runtime_check_worker_handle.take() {
            handle.await.map_err(|e| AgentError::ShutdownError(e.to_string()))?;
        }

        // 2. Poll service and stack manager
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        // 3. Log collector
        if let Some(handle) = self.log_collector_worker_handle.take() {
            handle.await.map_err(|e| AgentError::ShutdownError(e.to_string()))?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
