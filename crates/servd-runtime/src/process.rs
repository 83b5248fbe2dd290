//! Process-based serving runtime
//!
//! The HTTP serving runtime runs as a child process. The launcher awaits it,
//! so the bootstrap process lives exactly as long as the runtime does.

use async_trait::async_trait;
use servd_core::{RuntimeConfig, ServdError, ServdResult, ServingConfig};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info};

use crate::traits::ServingRuntime;

/// Bind address of the serving runtime
pub const LISTEN_ALL: &str = "0.0.0.0";

/// Final parameters handed to the serving runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    /// Binary hosting the runtime
    pub entrypoint: PathBuf,
    /// Application the runtime loads
    pub app: String,
    pub host: String,
    pub port: u16,
    /// Worker processes
    pub workers: u32,
    /// Per-process concurrency limit
    pub limit_concurrency: u32,
    /// Listen backlog depth
    pub backlog: u32,
    pub log_config: Option<PathBuf>,
    pub log_level: String,
}

impl LaunchParams {
    pub fn from_config(runtime: &RuntimeConfig, serving: &ServingConfig) -> Self {
        Self {
            entrypoint: serving.entrypoint.clone(),
            app: serving.app.clone(),
            host: LISTEN_ALL.to_string(),
            port: runtime.serving_port,
            workers: runtime.processes_per_replica,
            limit_concurrency: runtime.max_process_concurrency,
            backlog: runtime.so_max_conn,
            log_config: serving.log_config.clone(),
            log_level: "info".to_string(),
        }
    }

    /// Command-line arguments for the entrypoint
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.app.clone(),
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
            "--workers".to_string(),
            self.workers.to_string(),
            "--limit-concurrency".to_string(),
            self.limit_concurrency.to_string(),
            "--backlog".to_string(),
            self.backlog.to_string(),
            "--log-level".to_string(),
            self.log_level.clone(),
        ];
        if let Some(log_config) = &self.log_config {
            args.push("--log-config".to_string());
            args.push(log_config.display().to_string());
        }
        args
    }
}

/// Runs the serving runtime as a child process
#[derive(Debug, Default)]
pub struct ProcessServingRuntime;

impl ProcessServingRuntime {
    pub fn new() -> Self {
        Self
    }

    fn build_command(&self, params: &LaunchParams) -> Command {
        let mut cmd = Command::new(&params.entrypoint);
        cmd.args(params.args());
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ServingRuntime for ProcessServingRuntime {
    async fn launch(&self, params: &LaunchParams) -> ServdResult<()> {
        info!(
            entrypoint = %params.entrypoint.display(),
            host = %params.host,
            port = params.port,
            workers = params.workers,
            limit_concurrency = params.limit_concurrency,
            backlog = params.backlog,
            "Launching serving runtime"
        );

        let mut child = self.build_command(params).spawn().map_err(|e| {
            error!(
                entrypoint = %params.entrypoint.display(),
                error = %e,
                "Failed to spawn serving runtime"
            );
            ServdError::Runtime(format!(
                "Failed to spawn {}: {}",
                params.entrypoint.display(),
                e
            ))
        })?;

        let status = child.wait().await?;
        if status.success() {
            info!("Serving runtime exited");
            Ok(())
        } else {
            Err(ServdError::Runtime(format!(
                "Serving runtime exited with {}",
                status
            )))
        }
    }

    fn name(&self) -> &'static str {
        "process"
    }
}
