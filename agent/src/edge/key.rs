//! Edge key decoding

use url::Url;

use crate::edge::decode_base64;
use crate::errors::AgentError;

/// Control-plane association decoded from the edge key.
///
/// The key is `base64("<server url>|<tunnel addr>|<tunnel fingerprint>|<endpoint id>")`
/// and is fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeKey {
    pub server_url: String,
    pub tunnel_server_addr: String,
    pub tunnel_server_fingerprint: String,
    pub endpoint_id: i64,
}

impl EdgeKey {
    pub fn decode(encoded: &str) -> Result<Self, AgentError> {
        if encoded.trim().is_empty() {
            return Err(AgentError::EdgeKeyError("edge key is empty".to_string()));
        }

        let raw = decode_base64(encoded)
            .map_err(|e| AgentError::EdgeKeyError(format!("invalid base64: {}", e)))?;
        let raw = String::from_utf8(raw)
            .map_err(|_| AgentError::EdgeKeyError("edge key is not UTF-8".to_string()))?;

        let parts: Vec<&str> = raw.split('|').collect();
        let [server_url, tunnel_addr, fingerprint, endpoint_id] = parts.as_slice() else {
            return Err(AgentError::EdgeKeyError(format!(
                "expected 4 fields, found {}",
                parts.len()
            )));
        };

        let server_url = Url::parse(server_url)
            .map_err(|e| AgentError::EdgeKeyError(format!("invalid server URL: {}", e)))?;
        if tunnel_addr.is_empty() {
            return Err(AgentError::EdgeKeyError("tunnel server address is empty".to_string()));
        }
        let endpoint_id = endpoint_id
            .trim()
            .parse::<i64>()
            .map_err(|_| AgentError::EdgeKeyError(format!("invalid endpoint ID: {:?}", endpoint_id)))?;

        Ok(Self {
            server_url: server_url.as_str().trim_end_matches('/').to_string(),
            tunnel_server_addr: tunnel_addr.to_string(),
            tunnel_server_fingerprint: fingerprint.to_string(),
            endpoint_id,
        })
    }
}
