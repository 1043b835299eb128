//! Edge job schedules
//!
//! The agent does not run cron itself; it keeps the registry of schedules the
//! server assigned, writes each job script under the jobs directory for the
//! host cron runner, and reports per-job status in the async snapshot.

use std::collections::HashMap;

use async_trait::async_trait;
use edge_api::{EdgeJobSchedule, JobStatusSnapshot};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::edge::decode_base64;
use crate::errors::AgentError;
use crate::filesys::dir::Dir;

pub const SCRIPT_FILE: &str = "job.sh";
pub const LOG_FILE: &str = "job.log";

/// Scheduler collaborator the poll service forwards edge jobs to
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Replace the full schedule set (sync protocol)
    async fn schedule(&self, schedules: Vec<EdgeJobSchedule>) -> Result<(), AgentError>;

    /// Add or update one schedule (async protocol)
    async fn add_schedule(&self, schedule: EdgeJobSchedule) -> Result<(), AgentError>;

    async fn remove_schedule(&self, id: i64) -> Result<(), AgentError>;

    async fn mark_logs_collected(&self, id: i64);

    async fn jobs_status(&self) -> HashMap<i64, JobStatusSnapshot>;
}

struct Entry {
    schedule: EdgeJobSchedule,
    log_collected: bool,
}

/// In-memory schedule registry backed by the jobs directory
pub struct ScheduleRegistry {
    jobs_dir: Dir,
    entries: Mutex<HashMap<i64, Entry>>,
}

impl ScheduleRegistry {
    pub fn new(jobs_dir: Dir) -> Self {
        Self {
            jobs_dir,
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn write_script(&self, schedule: &EdgeJobSchedule) -> Result<(), AgentError> {
        let script = decode_base64(&schedule.script)
            .map_err(|e| AgentError::CommandError(format!("job {} script: {}", schedule.id, e)))?;
        let script = String::from_utf8_lossy(&script);
        self.jobs_dir
            .subdir(&schedule.id.to_string())
            .file(SCRIPT_FILE)
            .write_string(&script)
            .await
    }

    async fn upsert(
        &self,
        entries: &mut HashMap<i64, Entry>,
        schedule: EdgeJobSchedule,
    ) -> Result<(), AgentError> {
        if let Some(existing) = entries.get(&schedule.id) {
            if existing.schedule.version == schedule.version {
                return Ok(());
            }
        }
        self.write_script(&schedule).await?;
        info!("Scheduled edge job {} ({})", schedule.id, schedule.cron_expression);
        entries.insert(
            schedule.id,
            Entry {
                schedule,
                log_collected: false,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl Scheduler for ScheduleRegistry {
    async fn schedule(&self, schedules: Vec<EdgeJobSchedule>) -> Result<(), AgentError> {
        let mut entries = self.entries.lock().await;

        let wanted: Vec<i64> = schedules.iter().map(|s| s.id).collect();
        let stale: Vec<i64> = entries.keys().filter(|id| !wanted.contains(id)).copied().collect();
        for id in stale {
            debug!("Edge job {} no longer scheduled", id);
            entries.remove(&id);
            self.jobs_dir.subdir(&id.to_string()).delete().await?;
        }

        for schedule in schedules {
            self.upsert(&mut entries, schedule).await?;
        }
        Ok(())
    }

    async fn add_schedule(&self, schedule: EdgeJobSchedule) -> Result<(), AgentError> {
        let mut entries = self.entries.lock().await;
        self.upsert(&mut entries, schedule).await
    }

    async fn remove_schedule(&self, id: i64) -> Result<(), AgentError> {
        let mut entries = self.entries.lock().await;
        if entries.remove(&id).is_some() {
            info!("Removed edge job {}", id);
        }
        self.jobs_dir.subdir(&id.to_string()).delete().await
    }

    async fn mark_logs_collected(&self, id: i64) {
        if let Some(entry) = self.entries.lock().await.get_mut(&id) {
            entry.log_collected = true;
        }
    }

    async fn jobs_status(&self) -> HashMap<i64, JobStatusSnapshot> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(id, entry)| {
                (
                    *id,
                    JobStatusSnapshot {
                        version: entry.schedule.version,
                        log_collected: entry.log_collected,
                    },
                )
            })
            .collect()
    }
}
