//! Container CLI helpers shared by the deployers and the engine

use std::process::Stdio;

use edge_api::RegistryCredential;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Why a CLI invocation failed
#[derive(Debug)]
pub enum CliFailure {
    /// The program could not be started at all
    Spawn(std::io::Error),
    /// The program ran and exited non-zero; carries trimmed stderr
    Exit(String),
}

impl std::fmt::Display for CliFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliFailure::Spawn(e) => write!(f, "failed to start: {}", e),
            CliFailure::Exit(stderr) => f.write_str(stderr),
        }
    }
}

/// Run `program args...`, optionally feeding `stdin`, and return stdout
pub async fn run_cli(program: &str, args: &[String], stdin: Option<&str>) -> Result<String, CliFailure> {
    debug!("Running: {} {}", program, args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(CliFailure::Spawn)?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes()).await.map_err(CliFailure::Spawn)?;
    }

    let output = child.wait_with_output().await.map_err(CliFailure::Spawn)?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(CliFailure::Exit(if stderr.is_empty() {
            format!("{} exited with {}", program, output.status)
        } else {
            stderr
        }))
    }
}

pub(crate) fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// Log in to every registry the stack pulls from.
///
/// A failed login is not fatal: the pull may still succeed for public images.
pub async fn registry_login(credentials: &[RegistryCredential]) {
    for credential in credentials {
        let args = to_args(&[
            "login",
            credential.server_url.as_str(),
            "-u",
            credential.username.as_str(),
            "--password-stdin",
        ]);
        match run_cli("docker", &args, Some(&credential.secret)).await {
            Ok(_) => debug!("Authenticated with registry {}", credential.server_url),
            Err(e) => warn!(
                "Registry login to {} failed, attempting unauthenticated pull: {}",
                credential.server_url, e
            ),
        }
    }
}
