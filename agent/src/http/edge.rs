//! Edge control-plane API

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edge_api::{
    AsyncPollRequest, AsyncPollResponse, EdgeStackConfig, EdgeStackStatus, EdgeStackStatusUpdate,
    EdgeStatusResponse, JobLogPayload, StackLogsPayload,
};
use tracing::debug;

use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::http::client::HttpClient;
use crate::models::stack::StackId;
use crate::storage::cursor::save_cursor;

/// Wire protocol operations the agent core depends on
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    /// Sync protocol: tunnel directive, schedules and stack versions
    async fn get_environment_status(&self) -> Result<EdgeStatusResponse, AgentError>;

    /// Async protocol: one combined request/response round trip
    async fn exchange_async(
        &self,
        request: AsyncPollRequest,
    ) -> Result<AsyncPollResponse, AgentError>;

    async fn get_edge_stack_config(&self, stack_id: StackId)
        -> Result<EdgeStackConfig, AgentError>;

    async fn set_edge_stack_status(
        &self,
        stack_id: StackId,
        status: EdgeStackStatus,
        error: &str,
    ) -> Result<(), AgentError>;

    async fn send_job_log_file(&self, job_id: i64, content: &str) -> Result<(), AgentError>;

    async fn send_stack_logs(&self, stack_id: StackId, logs: &str) -> Result<(), AgentError>;

    /// Advance and persist the async command cursor
    async fn set_last_command_timestamp(&self, timestamp: DateTime<Utc>) -> Result<(), AgentError>;

    fn last_command_timestamp(&self) -> Option<DateTime<Utc>>;

    /// Align the request timeout with the current poll cadence
    fn set_timeout(&self, timeout: Duration);
}

/// HTTP implementation of [`ControlPlaneClient`]
pub struct EdgeClient {
    http: HttpClient,
    endpoint_id: i64,
    cursor: Mutex<Option<DateTime<Utc>>>,
    cursor_file: Option<File>,
}

impl EdgeClient {
    pub fn new(
        http: HttpClient,
        endpoint_id: i64,
        initial_cursor: Option<DateTime<Utc>>,
        cursor_file: Option<File>,
    ) -> Self {
        Self {
            http,
            endpoint_id,
            cursor: Mutex::new(initial_cursor),
            cursor_file,
        }
    }

    pub fn endpoint_id(&self) -> i64 {
        self.endpoint_id
    }
}

#[async_trait]
impl ControlPlaneClient for EdgeClient {
    async fn get_environment_status(&self) -> Result<EdgeStatusResponse, AgentError> {
        let path = format!("/api/endpoints/{}/edge/status", self.endpoint_id);
        self.http.get(&path).await
    }

    async fn exchange_async(
        &self,
        request: AsyncPollRequest,
    ) -> Result<AsyncPollResponse, AgentError> {
        self.http.post("/api/endpoints/edge/async", &request).await
    }

    async fn get_edge_stack_config(
        &self,
        stack_id: StackId,
    ) -> Result<EdgeStackConfig, AgentError> {
        let path = format!("/api/endpoints/{}/edge/stacks/{}", self.endpoint_id, stack_id);
        self.http.get(&path).await
    }

    async fn set_edge_stack_status(
        &self,
        stack_id: StackId,
        status: EdgeStackStatus,
        error: &str,
    ) -> Result<(), AgentError> {
        let path = format!("/api/edge_stacks/{}/status", stack_id);
        let body = EdgeStackStatusUpdate {
            status,
            error: error.to_string(),
            endpoint_id: self.endpoint_id,
        };
        self.http.put_unit(&path, &body).await
    }

    async fn send_job_log_file(&self, job_id: i64, content: &str) -> Result<(), AgentError> {
        let path = format!("/api/endpoints/{}/edge/jobs/{}/logs", self.endpoint_id, job_id);
        let body = JobLogPayload {
            file_content: content.to_string(),
        };
        self.http.post_unit(&path, &body).await
    }

    async fn send_stack_logs(&self, stack_id: StackId, logs: &str) -> Result<(), AgentError> {
        let path = format!("/api/endpoints/{}/edge/stacks/{}/logs", self.endpoint_id, stack_id);
        let body = StackLogsPayload {
            logs: logs.to_string(),
        };
        self.http.put_unit(&path, &body).await
    }

    async fn set_last_command_timestamp(&self, timestamp: DateTime<Utc>) -> Result<(), AgentError> {
        {
            let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(*cursor, Some(current) if current >= timestamp) {
                return Ok(());
            }
            *cursor = Some(timestamp);
        }
        debug!("Command cursor advanced to {}", timestamp);

        if let Some(file) = &self.cursor_file {
            save_cursor(file, timestamp).await?;
        }
        Ok(())
    }

    fn last_command_timestamp(&self) -> Option<DateTime<Utc>> {
        *self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_timeout(&self, timeout: Duration) {
        self.http.set_timeout(timeout);
    }
}
