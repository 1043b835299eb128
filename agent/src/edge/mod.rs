//! Edge identity: key decoding and tunnel credential decryption

pub mod credentials;
pub mod key;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;

/// Decode base64 with or without trailing padding
pub(crate) fn decode_base64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD_NO_PAD.decode(input.trim().trim_end_matches('='))
}
