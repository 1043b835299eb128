//! Edge Agent - Entry Point
//!
//! Polls the control plane for desired state, opens a reverse tunnel on
//! demand and reconciles the stacks assigned to this node.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use edge_agent::app::options::AppOptions;
use edge_agent::app::run::run;
use edge_agent::edge::key::EdgeKey;
use edge_agent::errors::AgentError;
use edge_agent::logs::{init_logging, LogOptions};
use edge_agent::storage::layout::StorageLayout;
use edge_agent::storage::settings::Settings;
use edge_agent::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    // Retrieve the settings file
    let layout = match cli_args.get("data-dir") {
        Some(dir) => StorageLayout::new(dir),
        None => StorageLayout::default(),
    };
    let settings_file = match cli_args.get("settings") {
        Some(path) => edge_agent::filesys::file::File::new(PathBuf::from(path)),
        None => layout.settings_file(),
    };
    let mut settings = if settings_file.exists().await {
        match settings_file.read_json::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file: {e}");
                return;
            }
        }
    } else {
        Settings::default()
    };
    if let Some(key) = cli_args.get("edge-key") {
        settings.edge_key = key.clone();
    }
    if let Some(id) = cli_args.get("edge-id") {
        settings.edge_id = id.clone();
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        log_dir: settings.log_to_file.then(|| layout.logs_dir().path().to_path_buf()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = match build_options(&settings, layout) {
        Ok(options) => options,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return;
        }
    };

    info!(
        "Running edge agent {} (endpoint {}, {} mode)",
        version.version,
        options.edge_key.endpoint_id,
        if options.edge_async { "async" } else { "sync" }
    );
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the agent: {e}");
    }
}

fn build_options(settings: &Settings, layout: StorageLayout) -> Result<AppOptions, AgentError> {
    if settings.edge_id.trim().is_empty() {
        return Err(AgentError::ConfigError("edge_id is required".to_string()));
    }
    let edge_key = EdgeKey::decode(&settings.edge_key)?;
    Ok(AppOptions::new(settings, edge_key, layout))
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Unable to install signal handlers, waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
        info!("Ctrl+C received, shutting down...");
    }
}
