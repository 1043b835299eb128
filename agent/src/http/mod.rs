//! Control-plane HTTP client

pub mod client;
pub mod edge;
