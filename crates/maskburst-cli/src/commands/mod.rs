//! CLI command implementations

pub mod pattern;
pub mod play;
pub mod render;
