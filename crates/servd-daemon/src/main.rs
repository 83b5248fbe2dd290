//! servd
//!
//! Bootstrap process that prepares model availability and then hands over to
//! the serving runtime.

use anyhow::Context;
use clap::Parser;
use servd_core::{BootstrapConfig, LogFormat, LoggingConfig};
use servd_dispatch::{Bootstrap, Dispatcher};
use servd_network::{HttpBackingConnector, SocketProbe};
use servd_runtime::{ModelSyncStarter, ProcessServingRuntime};
use servd_store::StorageSpecSource;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

const HTTP_TIMEOUT_SECS: u64 = 30;

/// servd - bootstrap orchestrator for model serving processes
#[derive(Parser, Debug)]
#[command(name = "servd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Bootstrap configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level, overrides the configuration file
    #[arg(long)]
    log_level: Option<String>,

    /// Serving runtime entrypoint, overrides the configuration file
    #[arg(long)]
    entrypoint: Option<PathBuf>,

    /// Logging configuration handed to the serving runtime
    #[arg(long)]
    log_config: Option<PathBuf>,
}

fn init_logging(logging: &LoggingConfig) {
    let log_level = match logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false);
    let result = match logging.format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Compact => tracing::subscriber::set_global_default(builder.compact().finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    if let Err(e) = result {
        eprintln!("Failed to set subscriber: {}", e);
    }
}

fn load_settings(args: &Args) -> anyhow::Result<BootstrapConfig> {
    let mut settings = match &args.config {
        Some(path) => BootstrapConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BootstrapConfig::default(),
    };
    if let Some(level) = &args.log_level {
        settings.logging.level = level.clone();
    }
    if let Some(entrypoint) = &args.entrypoint {
        settings.serving.entrypoint = entrypoint.clone();
    }
    if let Some(log_config) = &args.log_config {
        settings.serving.log_config = Some(log_config.clone());
    }
    Ok(settings)
}

/// Logging settings, falling back to the defaults and `--log-level` when the
/// configuration file could not be loaded
fn logging_config(args: &Args, settings: Option<&BootstrapConfig>) -> LoggingConfig {
    match settings {
        Some(settings) => settings.logging.clone(),
        None => LoggingConfig {
            level: args.log_level.clone().unwrap_or_else(|| "info".to_string()),
            ..LoggingConfig::default()
        },
    }
}

async fn run(settings: BootstrapConfig) -> anyhow::Result<()> {
    let backing = Arc::new(HttpBackingConnector::new(HTTP_TIMEOUT_SECS)?);
    let dispatcher = Dispatcher::new(
        Arc::new(ModelSyncStarter::new(backing.clone())),
        backing,
        Duration::from_secs(settings.sync.interval_secs),
    );

    let bootstrap = Bootstrap::new(
        settings.clone(),
        Arc::new(StorageSpecSource::new(HTTP_TIMEOUT_SECS)?),
        Arc::new(SocketProbe::from_config(&settings.sidecar)),
        dispatcher,
        Arc::new(ProcessServingRuntime::new()),
    );

    bootstrap.run(|key| std::env::var(key).ok()).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let settings = load_settings(&args);
    init_logging(&logging_config(&args, settings.as_ref().ok()));

    info!("Starting servd v{}", env!("CARGO_PKG_VERSION"));

    let result = match settings {
        Ok(settings) => run(settings).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        let message = format!("{:#}", e);
        error!(error = %message, "Startup failed");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_flag_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servd.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\nformat = \"json\"\n").unwrap();

        let args = Args::parse_from([
            "servd",
            "--config",
            path.to_str().unwrap(),
            "--log-level",
            "debug",
        ]);
        let settings = load_settings(&args).unwrap();
        let logging = logging_config(&args, Some(&settings));
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, LogFormat::Json);
    }

    #[test]
    fn test_log_level_flag_without_settings() {
        let args = Args::parse_from([
            "servd",
            "--config",
            "/does/not/exist.toml",
            "--log-level",
            "trace",
        ]);
        assert!(load_settings(&args).is_err());

        let logging = logging_config(&args, None);
        assert_eq!(logging.level, "trace");
        assert_eq!(logging.format, LogFormat::Text);

        let args = Args::parse_from(["servd"]);
        assert_eq!(logging_config(&args, None).level, "info");
    }
}
