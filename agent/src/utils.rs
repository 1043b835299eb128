//! Utility functions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Version information for the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Parse a duration string like "500ms", "5s", "5m", "1h".
///
/// A bare number is read as seconds. "0" and "0s" are valid and mean zero.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<f64>().ok().and_then(secs_f64)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<f64>().ok().and_then(|m| secs_f64(m * 60.0))
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.trim().parse::<f64>().ok().and_then(|h| secs_f64(h * 3600.0))
    } else {
        s.parse::<f64>().ok().and_then(secs_f64)
    }
}

fn secs_f64(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

/// Longest period any poll timer runs with
pub const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Cap a timer period at [`MAX_INTERVAL`]
pub fn bounded_interval(period: Duration) -> Duration {
    period.min(MAX_INTERVAL)
}

/// Interval advertised by the control plane in (fractional) seconds.
///
/// Zero, negative and unrepresentable values are ignored.
pub fn advertised_interval(secs: f64) -> Option<Duration> {
    secs_f64(secs)
        .filter(|d| !d.is_zero())
        .map(bounded_interval)
}

/// Format a duration the way [`parse_duration`] reads it back
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 != 0 {
        format!("{}ms", millis)
    } else {
        format!("{}s", duration.as_secs())
    }
}

/// Serde helper for durations written as human strings
pub mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: {:?}", s)))
    }
}

/// Calculate SHA256 digest of data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
