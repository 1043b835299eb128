//! Tunnel credential decryption
//!
//! Credentials arrive as `base64(nonce || AES-256-GCM ciphertext)` with the
//! key derived as `SHA-256(edge_id)`. The plaintext is `user:password`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};

use crate::edge::decode_base64;
use crate::errors::AgentError;
use crate::utils::sha256;

const NONCE_LEN: usize = 12;

/// Basic credentials for the reverse tunnel
#[derive(Debug)]
pub struct TunnelCredentials {
    pub username: String,
    pub password: SecretString,
}

impl TunnelCredentials {
    /// `user:password`, as sent in the basic-auth header
    pub fn basic(&self) -> SecretString {
        SecretString::from(format!("{}:{}", self.username, self.password.expose_secret()))
    }
}

fn cipher(edge_id: &str) -> Result<Aes256Gcm, AgentError> {
    Aes256Gcm::new_from_slice(&sha256(edge_id.as_bytes()))
        .map_err(|e| AgentError::CredentialsError(e.to_string()))
}

/// Decrypt credentials from a poll response using the edge ID as key material
pub fn decrypt_credentials(encoded: &str, edge_id: &str) -> Result<TunnelCredentials, AgentError> {
    let data = decode_base64(encoded)
        .map_err(|e| AgentError::CredentialsError(format!("invalid base64: {}", e)))?;
    if data.len() <= NONCE_LEN {
        return Err(AgentError::CredentialsError("ciphertext too short".to_string()));
    }

    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    let plaintext = cipher(edge_id)?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| AgentError::CredentialsError("unable to decrypt credentials".to_string()))?;
    let plaintext = String::from_utf8(plaintext)
        .map_err(|_| AgentError::CredentialsError("credentials are not UTF-8".to_string()))?;

    let (username, password) = plaintext
        .split_once(':')
        .ok_or_else(|| AgentError::CredentialsError("expected user:password".to_string()))?;

    Ok(TunnelCredentials {
        username: username.to_string(),
        password: SecretString::from(password.to_string()),
    })
}

/// Encrypt `user:password` the way the server does. Used by tests and tooling.
pub fn encrypt_credentials(plaintext: &str, edge_id: &str) -> Result<String, AgentError> {
    let nonce_source = uuid::Uuid::new_v4();
    let nonce = &nonce_source.as_bytes()[..NONCE_LEN];

    let ciphertext = cipher(edge_id)?
        .encrypt(Nonce::from_slice(nonce), plaintext.as_bytes())
        .map_err(|_| AgentError::CredentialsError("unable to encrypt credentials".to_string()))?;

    let mut data = nonce.to_vec();
    data.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(data))
}
