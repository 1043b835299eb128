//! Async command envelopes and payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::RegistryCredential;

/// Command as received from the server, before decoding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCommand {
    pub id: i64,
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(rename = "endpointID", default)]
    pub endpoint_id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// `edgeStack` command value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeStackPayload {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Version", default)]
    pub version: i64,
    #[serde(rename = "StackFileContent", default)]
    pub stack_file_content: String,
    #[serde(rename = "Prune", default)]
    pub prune: bool,
    #[serde(rename = "Namespace", default)]
    pub namespace: Option<String>,
    #[serde(rename = "RegistryCredentials", default)]
    pub registry_credentials: Vec<RegistryCredential>,
}

/// `edgeLog` command value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeLogPayload {
    #[serde(rename = "EdgeStackID", default)]
    pub edge_stack_id: Option<i64>,
    #[serde(rename = "EdgeStackName", default)]
    pub edge_stack_name: Option<String>,
    #[serde(rename = "EdgeJobID", default)]
    pub edge_job_id: Option<i64>,
}

/// `container` command value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerPayload {
    #[serde(rename = "ContainerName")]
    pub container_name: String,
    #[serde(rename = "ContainerOperation")]
    pub container_operation: String,
    #[serde(rename = "Force", default)]
    pub force: bool,
}

/// `image` command value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePayload {
    #[serde(rename = "ImageName")]
    pub image_name: String,
    #[serde(rename = "ImageOperation")]
    pub image_operation: String,
}

/// `volume` command value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumePayload {
    #[serde(rename = "VolumeName")]
    pub volume_name: String,
    #[serde(rename = "VolumeOperation")]
    pub volume_operation: String,
}
