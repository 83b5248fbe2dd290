//! Configuration types for servd
//!
//! Two layers feed the orchestrator: [`RuntimeConfig`] is resolved once from
//! the process environment, and [`BootstrapConfig`] carries operational
//! defaults that can be overridden from a TOML file.

use crate::{ServdError, ServdResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_MODEL_DIR: &str = "SERVD_MODEL_DIR";
pub const ENV_BACKING_HOST: &str = "SERVD_BACKING_HOST";
pub const ENV_BACKING_BASE_PORT: &str = "SERVD_BACKING_BASE_PORT";
pub const ENV_PROCESSES_PER_REPLICA: &str = "SERVD_PROCESSES_PER_REPLICA";
pub const ENV_MULTIPLE_BACKING_SERVERS: &str = "SERVD_MULTIPLE_BACKING_SERVERS";
pub const ENV_SERVING_PORT: &str = "SERVD_SERVING_PORT";
pub const ENV_MAX_PROCESS_CONCURRENCY: &str = "SERVD_MAX_PROCESS_CONCURRENCY";
pub const ENV_SO_MAX_CONN: &str = "SERVD_SO_MAX_CONN";
pub const ENV_PROVIDER: &str = "SERVD_PROVIDER";
pub const ENV_API_SPEC: &str = "SERVD_API_SPEC";
pub const ENV_CACHE_DIR: &str = "SERVD_CACHE_DIR";
pub const ENV_BUCKET: &str = "SERVD_BUCKET";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_ACTIVE_NEURON: &str = "SERVD_ACTIVE_NEURON";

const DEFAULT_BACKING_HOST: &str = "localhost";
const DEFAULT_BACKING_BASE_PORT: u16 = 9000;

/// Storage provider hosting the API spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    /// Spec lives in a local cache directory
    Local,
    /// Spec lives in an S3 bucket
    Aws,
}

impl FromStr for StorageProvider {
    type Err = ServdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(StorageProvider::Local),
            "aws" => Ok(StorageProvider::Aws),
            other => Err(ServdError::MissingConfiguration(format!(
                "{} has unsupported provider '{}'",
                ENV_PROVIDER, other
            ))),
        }
    }
}

impl std::fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageProvider::Local => write!(f, "local"),
            StorageProvider::Aws => write!(f, "aws"),
        }
    }
}

/// Where the API spec document can be retrieved from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLocation {
    pub provider: StorageProvider,
    /// Key or relative path of the spec document
    pub spec_path: String,
    /// Local cache directory (local deployments)
    pub cache_dir: Option<PathBuf>,
    /// Remote bucket (cloud deployments)
    pub bucket: Option<String>,
    /// Remote region (cloud deployments)
    pub region: Option<String>,
}

/// Immutable snapshot of the environment-derived runtime parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Directory models are staged into
    pub model_dir: PathBuf,
    /// Host of the backing tensor-serving server(s)
    pub backing_host: String,
    /// Port of the first backing server
    pub backing_base_port: u16,
    /// Serving worker processes per replica
    pub processes_per_replica: u32,
    /// One backing server per worker process
    pub multiple_backing_servers: bool,
    /// Per-process concurrency limit
    pub max_process_concurrency: u32,
    /// Listen backlog depth
    pub so_max_conn: u32,
    /// Port the serving runtime binds
    pub serving_port: u16,
    pub spec_location: SpecLocation,
    /// Hardware sidecar must be ready before startup continues
    pub active_neuron: bool,
}

impl RuntimeConfig {
    /// Resolve from the process environment
    pub fn from_env() -> ServdResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ServdResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let processes_per_replica: u32 = env.parse_required(ENV_PROCESSES_PER_REPLICA)?;
        if processes_per_replica == 0 {
            return Err(ServdError::MissingConfiguration(format!(
                "{} must be at least 1",
                ENV_PROCESSES_PER_REPLICA
            )));
        }

        let provider: StorageProvider = env.required(ENV_PROVIDER)?.parse()?;

        Ok(Self {
            model_dir: PathBuf::from(env.required(ENV_MODEL_DIR)?),
            backing_host: env
                .optional(ENV_BACKING_HOST)
                .unwrap_or_else(|| DEFAULT_BACKING_HOST.to_string()),
            backing_base_port: env.parse_or(ENV_BACKING_BASE_PORT, DEFAULT_BACKING_BASE_PORT)?,
            processes_per_replica,
            multiple_backing_servers: env.flag(ENV_MULTIPLE_BACKING_SERVERS),
            max_process_concurrency: env.parse_required(ENV_MAX_PROCESS_CONCURRENCY)?,
            so_max_conn: env.parse_required(ENV_SO_MAX_CONN)?,
            serving_port: env.parse_required(ENV_SERVING_PORT)?,
            spec_location: SpecLocation {
                provider,
                spec_path: env.required(ENV_API_SPEC)?,
                cache_dir: env.optional(ENV_CACHE_DIR).map(PathBuf::from),
                bucket: env.optional(ENV_BUCKET),
                region: env.optional(ENV_REGION),
            },
            active_neuron: env.flag(ENV_ACTIVE_NEURON),
        })
    }

    /// Number of backing server processes to configure
    pub fn backing_server_count(&self) -> u32 {
        if self.multiple_backing_servers {
            self.processes_per_replica
        } else {
            1
        }
    }

    /// Address of the backing server at `index`
    pub fn backing_address(&self, index: u32) -> ServdResult<String> {
        let port = u16::try_from(index)
            .ok()
            .and_then(|i| self.backing_base_port.checked_add(i))
            .ok_or_else(|| {
                ServdError::MissingConfiguration(format!(
                    "backing server index {} overflows base port {}",
                    index, self.backing_base_port
                ))
            })?;
        Ok(format!("{}:{}", self.backing_host, port))
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> ServdResult<String> {
        self.optional(key)
            .ok_or_else(|| ServdError::MissingConfiguration(format!("{} is not set", key)))
    }

    fn flag(&self, key: &str) -> bool {
        self.optional(key).is_some()
    }

    fn parse_required<T: FromStr>(&self, key: &str) -> ServdResult<T> {
        let raw = self.required(key)?;
        parse_value(key, &raw)
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> ServdResult<T> {
        match self.optional(key) {
            Some(raw) => parse_value(key, &raw),
            None => Ok(default),
        }
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> ServdResult<T> {
    raw.trim().parse().map_err(|_| {
        ServdError::MissingConfiguration(format!("{} has malformed value '{}'", key, raw))
    })
}

/// Operational defaults, optionally loaded from a TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Port table configuration
    pub ports: PortTableConfig,
    /// Model sync configuration
    pub sync: SyncConfig,
    /// Hardware sidecar configuration
    pub sidecar: SidecarConfig,
    /// Serving runtime configuration
    pub serving: ServingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl BootstrapConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> ServdResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServdError::Config(format!("Failed to read config file: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| ServdError::Config(format!("Failed to parse config: {}", e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortTableConfig {
    /// Where the port allocation table is persisted
    pub path: PathBuf,
}

impl Default for PortTableConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/run/used_ports.json"),
        }
    }
}

/// Model sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Polling interval of the sync daemon in seconds
    pub interval_secs: u64,
    /// Scratch directories the sync daemons rely on
    pub scratch_dirs: Vec<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            scratch_dirs: vec![PathBuf::from("/run/cron"), PathBuf::from("/tmp/cron")],
        }
    }
}

/// Hardware sidecar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarConfig {
    /// `host:port` or `unix:/path/to/socket`
    pub address: String,
    /// Give up after this many seconds
    pub timeout_secs: u64,
    /// Delay between probes in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            address: "unix:/sock/neuron.sock".to_string(),
            timeout_secs: 300,
            poll_interval_ms: 1000,
        }
    }
}

/// Serving runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    /// Binary that hosts the HTTP serving runtime
    pub entrypoint: PathBuf,
    /// Application the runtime should load
    pub app: String,
    /// Logging configuration handed to the runtime
    pub log_config: Option<PathBuf>,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            entrypoint: PathBuf::from("serving-runtime"),
            app: "serve.wsgi:app".to_string(),
            log_config: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Compact,
    Json,
}
