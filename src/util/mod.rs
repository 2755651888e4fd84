//! Small helpers shared across layers.

pub mod paths;
pub mod tex;
