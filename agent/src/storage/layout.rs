//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Storage layout for the agent
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Last processed async command timestamp
    pub fn cursor_file(&self) -> File {
        File::new(self.base_dir.join("command_cursor.json"))
    }

    /// Root of persisted stack manifests, one subdirectory per stack ID
    pub fn stacks_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("stacks"))
    }

    /// Edge job output written by the local scheduler
    pub fn jobs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("jobs"))
    }

    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Create the directories the agent writes into
    pub async fn setup(&self) -> Result<(), AgentError> {
        self.stacks_dir().create().await?;
        self.jobs_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("/var/lib/edge-agent")
    }
}
