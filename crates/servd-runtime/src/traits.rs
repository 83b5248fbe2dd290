//! Runtime trait definitions

use async_trait::async_trait;
use servd_core::ServdResult;

use crate::daemon::{DaemonHandle, DaemonSpec};
use crate::process::LaunchParams;

/// Starts background model sync daemons
#[async_trait]
pub trait DaemonStarter: Send + Sync {
    /// Start a daemon without waiting for its first pass
    async fn start(&self, spec: DaemonSpec) -> ServdResult<DaemonHandle>;
}

/// Hosts the HTTP serving runtime
#[async_trait]
pub trait ServingRuntime: Send + Sync {
    /// Run the serving runtime; returns only once it has stopped
    async fn launch(&self, params: &LaunchParams) -> ServdResult<()>;

    /// Get the runtime name
    fn name(&self) -> &'static str;
}
