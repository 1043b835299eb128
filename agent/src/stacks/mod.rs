//! Stack reconciliation

pub mod manager;
pub mod reconciler;

pub use manager::{DeployerFactory, StackManager, StackManagerOptions};
pub use reconciler::{Reconciled, Reconciler};
