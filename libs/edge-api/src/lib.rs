//! Edge control-plane wire types
//!
//! Request and response bodies exchanged with the orchestration server, for
//! both the synchronous status protocol and the asynchronous command protocol.

pub mod commands;
pub mod models;

pub use commands::*;
pub use models::*;
