//! Backing tensor-serving server clients

use async_trait::async_trait;
use serde::Serialize;
use servd_core::{ServdError, ServdResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A backing server that hosts tensor-serving models
#[async_trait]
pub trait BackingServer: Send + Sync {
    /// Add model configurations; existing ones are kept unless `replace` is set
    async fn add_models(
        &self,
        names: &[String],
        paths: &[PathBuf],
        replace: bool,
    ) -> ServdResult<()>;
}

/// Opens clients for backing servers
#[async_trait]
pub trait BackingServerConnector: Send + Sync {
    async fn connect(&self, address: &str) -> ServdResult<Arc<dyn BackingServer>>;
}

#[derive(Serialize)]
struct ModelConfigEntry<'a> {
    name: &'a str,
    base_path: String,
}

#[derive(Serialize)]
struct AddModelsRequest<'a> {
    models: Vec<ModelConfigEntry<'a>>,
    replace_models: bool,
}

/// JSON-over-HTTP client for a backing server's model config endpoint
pub struct HttpBackingServer {
    client: reqwest::Client,
    address: String,
}

impl HttpBackingServer {
    pub fn new(client: reqwest::Client, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
        }
    }

    fn url(&self) -> String {
        format!("http://{}/v1/config/models", self.address)
    }

    fn config_error(&self, message: impl Into<String>) -> ServdError {
        ServdError::BackingServerConfig {
            address: self.address.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl BackingServer for HttpBackingServer {
    async fn add_models(
        &self,
        names: &[String],
        paths: &[PathBuf],
        replace: bool,
    ) -> ServdResult<()> {
        if names.len() != paths.len() {
            return Err(self.config_error(format!(
                "{} model names but {} model paths",
                names.len(),
                paths.len()
            )));
        }

        let request = AddModelsRequest {
            models: names
                .iter()
                .zip(paths)
                .map(|(name, path)| ModelConfigEntry {
                    name,
                    base_path: path.display().to_string(),
                })
                .collect(),
            replace_models: replace,
        };

        debug!(address = %self.address, models = names.len(), "Adding model configs");

        let response = self
            .client
            .post(self.url())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.config_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                address = %self.address,
                status = %status,
                "Backing server rejected model configs"
            );
            return Err(self.config_error(format!("{}: {}", status, body)));
        }

        info!(address = %self.address, models = names.len(), "Model configs added");
        Ok(())
    }
}

/// Connector producing [`HttpBackingServer`] clients that share one HTTP pool
pub struct HttpBackingConnector {
    client: reqwest::Client,
}

impl HttpBackingConnector {
    pub fn new(timeout_secs: u64) -> ServdResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ServdError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BackingServerConnector for HttpBackingConnector {
    async fn connect(&self, address: &str) -> ServdResult<Arc<dyn BackingServer>> {
        Ok(Arc::new(HttpBackingServer::new(self.client.clone(), address)))
    }
}
