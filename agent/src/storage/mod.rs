//! On-disk state: layout, settings and the command cursor

pub mod cursor;
pub mod layout;
pub mod settings;
