//! Async file-system wrappers used for manifests, settings and the command cursor

pub mod dir;
pub mod file;
