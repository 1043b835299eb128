//! Edge Agent Library
//!
//! Control-plane polling, reverse tunnel and stack reconciliation for an
//! edge node.

pub mod app;
pub mod deploy;
pub mod edge;
pub mod engine;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod poll;
pub mod scheduler;
pub mod stacks;
pub mod storage;
pub mod telemetry;
pub mod tunnel;
pub mod utils;
pub mod workers;
