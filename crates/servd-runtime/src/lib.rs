//! servd-runtime: Background daemons and the serving runtime launcher
//!
//! This crate provides:
//! - The model-tree sync daemon started for non-caching deployments
//! - Process-based launching of the HTTP serving runtime

pub mod daemon;
pub mod process;
pub mod traits;

pub use daemon::{DaemonHandle, DaemonSpec, ModelSyncStarter};
pub use process::{LaunchParams, ProcessServingRuntime};
pub use traits::{DaemonStarter, ServingRuntime};
