//! Persisted async command cursor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AgentError;
use crate::filesys::file::File;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CursorRecord {
    last_command_timestamp: DateTime<Utc>,
}

/// Load the last persisted cursor.
///
/// A missing or unreadable file yields `None`: the stream restarts from the
/// server's point of view rather than blocking startup.
pub async fn load_cursor(file: &File) -> Option<DateTime<Utc>> {
    if !file.exists().await {
        return None;
    }
    match file.read_json::<CursorRecord>().await {
        Ok(record) => Some(record.last_command_timestamp),
        Err(e) => {
            warn!("Ignoring unreadable command cursor {:?}: {}", file.path(), e);
            None
        }
    }
}

pub async fn save_cursor(file: &File, timestamp: DateTime<Utc>) -> Result<(), AgentError> {
    file.write_json(&CursorRecord {
        last_command_timestamp: timestamp,
    })
    .await
}
