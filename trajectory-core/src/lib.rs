//! # trajectory-core
//!
//! Foundation crate for the trajectory analytics engine.
//! Defines all types, traits, errors, config, and numerics shared by
//! every other crate in the workspace.

#![allow(dead_code)]

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod numerics;
pub mod tracing_init;
pub mod traits;
pub mod types;

// Re-export the most commonly used types at the crate root.
pub use cancellation::CancellationToken;
pub use config::EngineConfig;
pub use errors::error_code::ErrorCode;
pub use types::collections::{FxHashMap, FxHashSet};
