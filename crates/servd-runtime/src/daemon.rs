//! Model-tree sync daemon
//!
//! The daemon runs on its own tokio task and polls on a fixed interval. Each
//! pass stages the spec's local models into the download directory and, when
//! a backing server address is configured, registers every model that server
//! has not accepted yet. Failures are logged and retried on the next tick.

use async_trait::async_trait;
use servd_core::{ApiSpec, ServdResult};
use servd_network::BackingServerConnector;
use servd_store::ModelTree;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::traits::DaemonStarter;

/// Parameters of a sync daemon
#[derive(Debug, Clone)]
pub struct DaemonSpec {
    /// Polling interval
    pub interval: Duration,
    pub api_spec: ApiSpec,
    /// Directory models are staged into
    pub download_dir: PathBuf,
    /// Backing server to register staged models with
    pub backing_address: Option<String>,
}

/// Handle to a running daemon
///
/// Dropping the handle leaves the daemon running.
#[derive(Debug)]
pub struct DaemonHandle {
    task: JoinHandle<()>,
}

impl DaemonHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Stop the daemon
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Starts model-tree sync daemons on the current tokio runtime
pub struct ModelSyncStarter {
    connector: Arc<dyn BackingServerConnector>,
}

impl ModelSyncStarter {
    pub fn new(connector: Arc<dyn BackingServerConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl DaemonStarter for ModelSyncStarter {
    async fn start(&self, spec: DaemonSpec) -> ServdResult<DaemonHandle> {
        info!(
            interval_secs = spec.interval.as_secs(),
            download_dir = %spec.download_dir.display(),
            backing_address = spec.backing_address.as_deref().unwrap_or("-"),
            "Starting model sync daemon"
        );

        let connector = self.connector.clone();
        let task = tokio::spawn(async move {
            let mut sync = ModelSync {
                tree: ModelTree::new(spec.download_dir.clone()),
                connector,
                registered: HashSet::new(),
            };
            let mut ticker = tokio::time::interval(spec.interval);
            loop {
                ticker.tick().await;
                sync.pass(&spec).await;
            }
        });

        Ok(DaemonHandle::new(task))
    }
}

struct ModelSync {
    tree: ModelTree,
    connector: Arc<dyn BackingServerConnector>,
    /// Models the backing server has accepted
    registered: HashSet<String>,
}

impl ModelSync {
    async fn pass(&mut self, spec: &DaemonSpec) {
        let report = match self.tree.stage(spec.api_spec.models()).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Model sync pass failed");
                return;
            }
        };

        debug!(
            staged = report.staged.len(),
            present = report.present.len(),
            failed = report.failed.len(),
            "Model sync pass complete"
        );

        let Some(address) = &spec.backing_address else {
            return;
        };

        let names: Vec<String> = report
            .staged
            .iter()
            .chain(report.present.iter())
            .filter(|name| !self.registered.contains(*name))
            .cloned()
            .collect();
        if names.is_empty() {
            return;
        }
        let paths: Vec<PathBuf> = names.iter().map(|n| self.tree.model_path(n)).collect();

        let result = match self.connector.connect(address).await {
            Ok(server) => server.add_models(&names, &paths, false).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => self.registered.extend(names),
            Err(e) => warn!(address = %address, error = %e, "Failed to register models"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use servd_core::{ModelResource, ModelsSpec, PredictorSpec, ServdError};
    use servd_network::BackingServer;
    use std::sync::Mutex;

    type Calls = Arc<Mutex<Vec<(String, Vec<String>)>>>;

    struct RecordingServer {
        address: String,
        calls: Calls,
        fail: bool,
    }

    #[async_trait]
    impl BackingServer for RecordingServer {
        async fn add_models(
            &self,
            names: &[String],
            _paths: &[PathBuf],
            _replace: bool,
        ) -> ServdResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push((self.address.clone(), names.to_vec()));
            if self.fail {
                return Err(ServdError::BackingServerConfig {
                    address: self.address.clone(),
                    message: "unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    struct RecordingConnector {
        calls: Calls,
        fail: bool,
    }

    #[async_trait]
    impl BackingServerConnector for RecordingConnector {
        async fn connect(&self, address: &str) -> ServdResult<Arc<dyn BackingServer>> {
            Ok(Arc::new(RecordingServer {
                address: address.to_string(),
                calls: self.calls.clone(),
                fail: self.fail,
            }))
        }
    }

    fn daemon_spec(source: &std::path::Path, download_dir: PathBuf, address: Option<&str>) -> DaemonSpec {
        DaemonSpec {
            interval: Duration::from_secs(10),
            api_spec: ApiSpec {
                name: "iris".to_string(),
                predictor: PredictorSpec {
                    predictor_type: "tensorflow".to_string(),
                    processes_per_replica: 1,
                    models: Some(ModelsSpec {
                        cache_size: None,
                        disk_cache_size: None,
                        paths: vec![ModelResource {
                            name: "iris".to_string(),
                            model_path: source.display().to_string(),
                        }],
                    }),
                },
                compute: Default::default(),
            },
            download_dir,
            backing_address: address.map(str::to_string),
        }
    }

    fn new_sync(download_dir: PathBuf, calls: &Calls, fail: bool) -> ModelSync {
        ModelSync {
            tree: ModelTree::new(download_dir),
            connector: Arc::new(RecordingConnector {
                calls: calls.clone(),
                fail,
            }),
            registered: HashSet::new(),
        }
    }

    #[tokio::test]
    async fn test_pass_registers_once() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("saved_model.pb"), b"graph").unwrap();
        let dst = tempfile::tempdir().unwrap();
        let spec = daemon_spec(src.path(), dst.path().to_path_buf(), Some("localhost:9000"));

        let calls = Calls::default();
        let mut sync = new_sync(dst.path().to_path_buf(), &calls, false);
        sync.pass(&spec).await;
        sync.pass(&spec).await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("localhost:9000".to_string(), vec!["iris".to_string()]));
        assert!(dst.path().join("iris/saved_model.pb").exists());
    }

    #[tokio::test]
    async fn test_pass_retries_failed_registration() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let spec = daemon_spec(src.path(), dst.path().to_path_buf(), Some("localhost:9000"));

        let calls = Calls::default();
        let mut sync = new_sync(dst.path().to_path_buf(), &calls, true);
        sync.pass(&spec).await;
        sync.pass(&spec).await;

        assert_eq!(calls.lock().unwrap().len(), 2);
        assert!(sync.registered.is_empty());
    }

    #[tokio::test]
    async fn test_file_sync_skips_backing_server() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let spec = daemon_spec(src.path(), dst.path().to_path_buf(), None);

        let calls = Calls::default();
        let mut sync = new_sync(dst.path().to_path_buf(), &calls, false);
        sync.pass(&spec).await;

        assert!(calls.lock().unwrap().is_empty());
        assert!(dst.path().join("iris").is_dir());
    }

    #[tokio::test]
    async fn test_start_returns_without_waiting() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let calls = Calls::default();
        let starter = ModelSyncStarter::new(Arc::new(RecordingConnector {
            calls: calls.clone(),
            fail: false,
        }));

        let handle = starter
            .start(daemon_spec(src.path(), dst.path().to_path_buf(), None))
            .await
            .unwrap();
        assert!(!handle.is_finished());
        handle.abort();
    }
}
