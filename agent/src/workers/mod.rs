//! Background workers

pub mod activity;
pub mod deployer;
pub mod group;
pub mod log_collector;
pub mod runtime_check;
