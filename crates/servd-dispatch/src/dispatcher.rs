//! Startup strategy dispatch

use servd_core::{ApiSpec, RuntimeConfig, ServdError, ServdResult, StartupStrategy};
use servd_network::BackingServerConnector;
use servd_runtime::{DaemonHandle, DaemonSpec, DaemonStarter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Performs the single action a startup strategy calls for
pub struct Dispatcher {
    daemons: Arc<dyn DaemonStarter>,
    backing: Arc<dyn BackingServerConnector>,
    /// Polling interval of the sync daemons
    sync_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        daemons: Arc<dyn DaemonStarter>,
        backing: Arc<dyn BackingServerConnector>,
        sync_interval: Duration,
    ) -> Self {
        Self {
            daemons,
            backing,
            sync_interval,
        }
    }

    /// Dispatch `strategy`, returning the handle of the daemon it started, if any
    ///
    /// Daemons are started without waiting for their first pass.
    pub async fn dispatch(
        &self,
        strategy: StartupStrategy,
        config: &RuntimeConfig,
        spec: &ApiSpec,
    ) -> ServdResult<Option<DaemonHandle>> {
        info!(strategy = %strategy, api = %spec.name, "Dispatching startup strategy");

        match strategy {
            StartupStrategy::FileSync => {
                let handle = self.start_daemon(config, spec, None).await?;
                Ok(Some(handle))
            }
            StartupStrategy::BackingServerSync => {
                let address = config.backing_address(0)?;
                let handle = self.start_daemon(config, spec, Some(address)).await?;
                Ok(Some(handle))
            }
            StartupStrategy::BackingServerDirectLoad => {
                self.direct_load(config, spec).await?;
                Ok(None)
            }
            StartupStrategy::None => {
                debug!("Model caching enabled, models load on demand");
                Ok(None)
            }
        }
    }

    async fn start_daemon(
        &self,
        config: &RuntimeConfig,
        spec: &ApiSpec,
        backing_address: Option<String>,
    ) -> ServdResult<DaemonHandle> {
        let handle = self
            .daemons
            .start(DaemonSpec {
                interval: self.sync_interval,
                api_spec: spec.clone(),
                download_dir: config.model_dir.clone(),
                backing_address,
            })
            .await?;

        // TODO: block until the daemon reports its first pass once the daemon exposes a readiness signal
        debug!("Sync daemon started, not waiting for its first pass");

        Ok(handle)
    }

    /// Configure every model on every backing server, stopping at the first failure
    ///
    /// Servers configured before a failure keep their configuration.
    async fn direct_load(&self, config: &RuntimeConfig, spec: &ApiSpec) -> ServdResult<()> {
        let names = spec.model_names();
        let paths = spec.model_paths(&config.model_dir);
        let servers = config.backing_server_count();

        info!(
            servers = servers,
            models = names.len(),
            "Loading models into backing servers"
        );

        for index in 0..servers {
            let address = config.backing_address(index)?;
            let result = match self.backing.connect(&address).await {
                Ok(server) => server.add_models(&names, &paths, false).await,
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                warn!(address = %address, index = index, error = %e, "Backing server configuration failed");
                return Err(match e {
                    err @ ServdError::BackingServerConfig { .. } => err,
                    other => ServdError::BackingServerConfig {
                        address,
                        message: other.to_string(),
                    },
                });
            }

            debug!(address = %address, "Backing server configured");
        }

        Ok(())
    }
}
