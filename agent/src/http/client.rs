//! HTTP client implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::AgentError;

/// Header identifying the agent to the control plane
pub const EDGE_ID_HEADER: &str = "X-PortainerAgent-EdgeID";

/// HTTP client for control-plane communication
pub struct HttpClient {
    client: Client,
    base_url: String,
    edge_id: String,
    timeout_ms: AtomicU64,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(
        base_url: &str,
        edge_id: &str,
        timeout: Duration,
        insecure: bool,
    ) -> Result<Self, AgentError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            edge_id: edge_id.to_string(),
            timeout_ms: AtomicU64::new(timeout.as_millis() as u64),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-request timeout, kept aligned with the poll interval
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::SeqCst))
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_ms
            .store(timeout.as_millis() as u64, Ordering::SeqCst);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, method: &str, url: &str, request: RequestBuilder) -> Result<Response, AgentError> {
        debug!("{} {}", method, url);

        let response = request
            .header(EDGE_ID_HEADER, &self.edge_id)
            .timeout(self.timeout())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP {} {} failed: {} - {}", method, url, status, body);
            return Err(AgentError::ControlPlaneError(format!("{}: {}", status, body)));
        }

        Ok(response)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AgentError> {
        let url = self.url(path);
        let response = self.execute("GET", &url, self.client.get(&url)).await?;
        Ok(response.json().await?)
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AgentError> {
        let url = self.url(path);
        let response = self
            .execute("POST", &url, self.client.post(&url).json(body))
            .await?;
        Ok(response.json().await?)
    }

    /// Make a POST request, ignoring the response body
    pub async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), AgentError> {
        let url = self.url(path);
        self.execute("POST", &url, self.client.post(&url).json(body))
            .await?;
        Ok(())
    }

    /// Make a PUT request, ignoring the response body
    pub async fn put_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), AgentError> {
        let url = self.url(path);
        self.execute("PUT", &url, self.client.put(&url).json(body))
            .await?;
        Ok(())
    }
}
