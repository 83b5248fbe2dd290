//! API spec retrieval

use async_trait::async_trait;
use servd_core::{ApiSpec, ServdError, ServdResult, SpecLocation, StorageProvider};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retrieves the API spec document
#[async_trait]
pub trait SpecSource: Send + Sync {
    async fn fetch(&self, location: &SpecLocation) -> ServdResult<ApiSpec>;
}

/// Reads specs from the local cache directory or downloads them from S3
pub struct StorageSpecSource {
    client: reqwest::Client,
    /// Overrides the S3 endpoint, e.g. for a local object store
    endpoint: Option<String>,
}

impl StorageSpecSource {
    pub fn new(timeout_secs: u64) -> ServdResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ServdError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: None,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    fn object_url(&self, bucket: &str, region: &str, key: &str) -> String {
        let key = key.trim_start_matches('/');
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint, bucket, key),
            None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
        }
    }

    async fn fetch_local(&self, location: &SpecLocation) -> ServdResult<ApiSpec> {
        let cache_dir = location.cache_dir.as_deref().ok_or_else(|| {
            ServdError::MissingConfiguration(
                "a cache directory is required for the local provider".to_string(),
            )
        })?;
        let path = cache_path(cache_dir, &location.spec_path);

        debug!(path = %path.display(), "Reading api spec");
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            ServdError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        ApiSpec::from_json(&bytes)
    }

    async fn fetch_remote(&self, location: &SpecLocation) -> ServdResult<ApiSpec> {
        let (bucket, region) = match (&location.bucket, &location.region) {
            (Some(bucket), Some(region)) => (bucket, region),
            _ => {
                return Err(ServdError::MissingConfiguration(
                    "bucket and region are required for the aws provider".to_string(),
                ))
            }
        };
        let url = self.object_url(bucket, region, &location.spec_path);

        debug!(url = %url, "Downloading api spec");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServdError::Storage(format!("Failed to fetch {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(ServdError::Storage(format!(
                "Failed to fetch {}: {}",
                url,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServdError::Storage(format!("Failed to read {}: {}", url, e)))?;

        let spec = ApiSpec::from_json(&bytes)?;

        if let Some(cache_dir) = &location.cache_dir {
            let cached = cache_path(cache_dir, &location.spec_path);
            if let Err(e) = write_cache(&cached, &bytes).await {
                warn!(path = %cached.display(), error = %e, "Failed to cache api spec");
            }
        }

        Ok(spec)
    }
}

fn cache_path(cache_dir: &Path, spec_path: &str) -> PathBuf {
    cache_dir.join(spec_path.trim_start_matches('/'))
}

async fn write_cache(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}

#[async_trait]
impl SpecSource for StorageSpecSource {
    async fn fetch(&self, location: &SpecLocation) -> ServdResult<ApiSpec> {
        let spec = match location.provider {
            StorageProvider::Local => self.fetch_local(location).await?,
            StorageProvider::Aws => self.fetch_remote(location).await?,
        };

        info!(
            api = %spec.name,
            provider = %location.provider,
            spec_path = %location.spec_path,
            "Retrieved api spec"
        );

        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"{
        "name": "iris",
        "predictor": { "type": "onnx", "processes_per_replica": 1, "models": null }
    }"#;

    fn location(provider: StorageProvider, cache_dir: Option<PathBuf>) -> SpecLocation {
        SpecLocation {
            provider,
            spec_path: "apis/iris.json".to_string(),
            cache_dir,
            bucket: None,
            region: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_local() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("apis")).unwrap();
        std::fs::write(dir.path().join("apis/iris.json"), SPEC).unwrap();

        let source = StorageSpecSource::new(5).unwrap();
        let spec = source
            .fetch(&location(StorageProvider::Local, Some(dir.path().to_path_buf())))
            .await
            .unwrap();
        assert_eq!(spec.name, "iris");
    }

    #[tokio::test]
    async fn test_local_requires_cache_dir() {
        let source = StorageSpecSource::new(5).unwrap();
        let err = source
            .fetch(&location(StorageProvider::Local, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServdError::MissingConfiguration(_)));
    }

    #[tokio::test]
    async fn test_local_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = StorageSpecSource::new(5).unwrap();
        let err = source
            .fetch(&location(StorageProvider::Local, Some(dir.path().to_path_buf())))
            .await
            .unwrap_err();
        assert!(matches!(err, ServdError::Storage(_)));
    }

    #[tokio::test]
    async fn test_aws_requires_bucket() {
        let source = StorageSpecSource::new(5).unwrap();
        let err = source
            .fetch(&location(StorageProvider::Aws, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServdError::MissingConfiguration(_)));
    }

    #[test]
    fn test_object_url() {
        let source = StorageSpecSource::new(5).unwrap();
        assert_eq!(
            source.object_url("models", "us-west-2", "/apis/iris.json"),
            "https://models.s3.us-west-2.amazonaws.com/apis/iris.json"
        );

        let source = source.with_endpoint("http://localhost:4566/");
        assert_eq!(
            source.object_url("models", "us-west-2", "apis/iris.json"),
            "http://localhost:4566/models/apis/iris.json"
        );
    }
}
