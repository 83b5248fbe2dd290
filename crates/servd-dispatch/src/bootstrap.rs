//! Bootstrap sequencing
//!
//! Startup runs strictly in order: resolve the runtime configuration, wait
//! for the hardware sidecar, persist the port table, fetch the api spec,
//! classify, create scratch directories, dispatch, and finally launch the
//! serving runtime. Any error aborts the sequence before the launch.

use servd_core::{
    ApiSpec, BootstrapConfig, CachingMode, PredictorKind, RuntimeConfig, ServdResult,
    StartupStrategy,
};
use servd_network::{PortAllocationTable, SidecarProbe};
use servd_runtime::{DaemonHandle, LaunchParams, ServingRuntime};
use servd_store::SpecSource;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dispatcher::Dispatcher;

/// State reached once everything before the launch has succeeded
#[derive(Debug)]
pub struct Prepared {
    pub api_spec: ApiSpec,
    pub kind: PredictorKind,
    pub strategy: StartupStrategy,
    /// Sync daemon started by the dispatcher, kept alive while serving
    pub daemon: Option<DaemonHandle>,
    pub params: LaunchParams,
}

/// Orchestrates the serving process startup
pub struct Bootstrap {
    settings: BootstrapConfig,
    specs: Arc<dyn SpecSource>,
    sidecar: Arc<dyn SidecarProbe>,
    dispatcher: Dispatcher,
    runtime: Arc<dyn ServingRuntime>,
}

impl Bootstrap {
    pub fn new(
        settings: BootstrapConfig,
        specs: Arc<dyn SpecSource>,
        sidecar: Arc<dyn SidecarProbe>,
        dispatcher: Dispatcher,
        runtime: Arc<dyn ServingRuntime>,
    ) -> Self {
        Self {
            settings,
            specs,
            sidecar,
            dispatcher,
            runtime,
        }
    }

    /// Resolve configuration from `lookup`, prepare, and run the serving runtime
    pub async fn run<F>(&self, lookup: F) -> ServdResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = RuntimeConfig::from_lookup(lookup)?;
        self.run_with_config(&config).await
    }

    pub async fn run_with_config(&self, config: &RuntimeConfig) -> ServdResult<()> {
        let prepared = self.prepare(config).await?;
        let _daemon = prepared.daemon;

        info!(runtime = self.runtime.name(), "Handing over to serving runtime");
        self.runtime.launch(&prepared.params).await
    }

    /// Run every startup step that precedes the launch
    pub async fn prepare(&self, config: &RuntimeConfig) -> ServdResult<Prepared> {
        if config.active_neuron {
            self.sidecar.wait_ready().await?;
        }

        if config.multiple_backing_servers {
            PortAllocationTable::plan(config.backing_base_port, config.processes_per_replica)?
                .persist(&self.settings.ports.path)?;
        }

        let api_spec = self.specs.fetch(&config.spec_location).await?;
        let kind = PredictorKind::from_spec(&api_spec)?;
        let caching = CachingMode::from(api_spec.caching_enabled());
        let strategy = StartupStrategy::classify(kind, caching);

        info!(
            api = %api_spec.name,
            predictor = %kind,
            caching = ?caching,
            strategy = %strategy,
            "Selected startup strategy"
        );

        if caching == CachingMode::Disabled {
            for dir in &self.settings.sync.scratch_dirs {
                tokio::fs::create_dir_all(dir).await?;
                debug!(path = %dir.display(), "Scratch directory ready");
            }
        }

        let daemon = self.dispatcher.dispatch(strategy, config, &api_spec).await?;
        let params = LaunchParams::from_config(config, &self.settings.serving);

        Ok(Prepared {
            api_spec,
            kind,
            strategy,
            daemon,
            params,
        })
    }
}
