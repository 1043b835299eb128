//! API models

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commands::RawCommand;

/// Tunnel directive returned by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunnelStatus {
    #[serde(rename = "IDLE", alias = "Idle", alias = "idle")]
    Idle,
    #[serde(rename = "REQUIRED", alias = "Required", alias = "required")]
    Required,
    #[serde(rename = "ACTIVE", alias = "Active", alias = "active")]
    Active,
}

/// Stack id/version pair advertised by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackVersion {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Version")]
    pub version: i64,
}

/// Edge job schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeJobSchedule {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "CronExpression")]
    pub cron_expression: String,
    #[serde(rename = "Script")]
    pub script: String,
    #[serde(rename = "Version", default)]
    pub version: i64,
    #[serde(rename = "CollectLogs", default)]
    pub collect_logs: bool,
}

/// `GET /api/endpoints/{id}/edge/status` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeStatusResponse {
    pub status: TunnelStatus,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub schedules: Vec<EdgeJobSchedule>,
    /// Checkin interval advertised by the server, in seconds
    #[serde(default)]
    pub checkin: f64,
    /// Encrypted tunnel credentials, base64
    #[serde(default)]
    pub credentials: String,
    #[serde(default)]
    pub stacks: Vec<StackVersion>,
}

/// Registry credentials attached to a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredential {
    #[serde(rename = "ServerURL")]
    pub server_url: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Secret")]
    pub secret: String,
}

/// `GET /api/endpoints/{id}/edge/stacks/{stackId}` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeStackConfig {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "StackFileContent")]
    pub stack_file_content: String,
    #[serde(rename = "Prune", default)]
    pub prune: bool,
    #[serde(rename = "Namespace", default)]
    pub namespace: Option<String>,
    #[serde(rename = "RegistryCredentials", default)]
    pub registry_credentials: Vec<RegistryCredential>,
}

/// Status reported for an edge stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeStackStatus {
    Ok,
    Error,
    Acknowledged,
    Remove,
}

impl EdgeStackStatus {
    pub fn code(&self) -> u8 {
        match self {
            EdgeStackStatus::Ok => 1,
            EdgeStackStatus::Error => 2,
            EdgeStackStatus::Acknowledged => 3,
            EdgeStackStatus::Remove => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(EdgeStackStatus::Ok),
            2 => Some(EdgeStackStatus::Error),
            3 => Some(EdgeStackStatus::Acknowledged),
            4 => Some(EdgeStackStatus::Remove),
            _ => None,
        }
    }
}

impl Serialize for EdgeStackStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for EdgeStackStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = u8::deserialize(deserializer)?;
        EdgeStackStatus::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid edge stack status: {}", code)))
    }
}

/// `PUT /api/edge_stacks/{stackId}/status` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeStackStatusUpdate {
    #[serde(rename = "Status")]
    pub status: EdgeStackStatus,
    #[serde(rename = "Error")]
    pub error: String,
    #[serde(rename = "EndpointID")]
    pub endpoint_id: i64,
}

/// `POST /api/endpoints/{id}/edge/jobs/{jobId}/logs` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogPayload {
    #[serde(rename = "FileContent")]
    pub file_content: String,
}

/// `PUT /api/endpoints/{id}/edge/stacks/{stackId}/logs` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackLogsPayload {
    #[serde(rename = "Logs")]
    pub logs: String,
}

/// Per-stack entry of the async snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackStatusSnapshot {
    pub status: String,
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-job entry of the async snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusSnapshot {
    pub version: i64,
    pub log_collected: bool,
}

/// Environment snapshot attached to an async request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<serde_json::Value>,
    #[serde(default)]
    pub stack_status: HashMap<i64, StackStatusSnapshot>,
    #[serde(default)]
    pub jobs_status: HashMap<i64, JobStatusSnapshot>,
}

/// `POST /api/endpoints/edge/async` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncPollRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<EnvironmentSnapshot>,
}

/// `POST /api/endpoints/edge/async` response
///
/// Intervals are expressed in seconds; zero disables the channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncPollResponse {
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub snapshot_interval: u64,
    #[serde(default)]
    pub command_interval: u64,
    #[serde(rename = "endpointID", default)]
    pub endpoint_id: i64,
    #[serde(default)]
    pub commands: Vec<RawCommand>,
}
