//! Default in-process adapters for the gateway's outbound ports.

pub mod directory;
pub mod exception_sink;
pub mod feature_cache;
pub mod limiter;
pub mod subscription;
