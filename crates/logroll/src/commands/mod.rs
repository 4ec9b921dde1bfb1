//! Command implementations

pub mod list;
pub mod prune;
pub mod write;
