//! Error types for the edge agent

use thiserror::Error;

/// Main error type for the edge agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Control plane error: {0}")]
    ControlPlaneError(String),

    #[error("Edge key error: {0}")]
    EdgeKeyError(String),

    #[error("Credentials error: {0}")]
    CredentialsError(String),

    #[error("Tunnel error: {0}")]
    TunnelError(String),

    #[error("Deployment error: {0}")]
    DeployError(String),

    #[error("Command error: {0}")]
    CommandError(String),

    #[error("Engine error: {0}")]
    EngineError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
