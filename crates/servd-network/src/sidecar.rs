//! Hardware sidecar readiness

use async_trait::async_trait;
use servd_core::{ServdError, ServdResult, SidecarConfig};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Blocks startup until the hardware sidecar is ready
#[async_trait]
pub trait SidecarProbe: Send + Sync {
    async fn wait_ready(&self) -> ServdResult<()>;
}

/// Polls a TCP (`host:port`) or Unix (`unix:/path`) socket until it accepts
pub struct SocketProbe {
    address: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl SocketProbe {
    pub fn new(address: String, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            address,
            timeout,
            poll_interval,
        }
    }

    pub fn from_config(config: &SidecarConfig) -> Self {
        Self::new(
            config.address.clone(),
            Duration::from_secs(config.timeout_secs),
            Duration::from_millis(config.poll_interval_ms),
        )
    }

    async fn probe(&self) -> std::io::Result<()> {
        match self.address.strip_prefix("unix:") {
            #[cfg(unix)]
            Some(path) => tokio::net::UnixStream::connect(path).await.map(|_| ()),
            #[cfg(not(unix))]
            Some(_) => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            )),
            None => tokio::net::TcpStream::connect(&self.address)
                .await
                .map(|_| ()),
        }
    }
}

#[async_trait]
impl SidecarProbe for SocketProbe {
    async fn wait_ready(&self) -> ServdResult<()> {
        info!(address = %self.address, "Waiting for hardware sidecar");
        let deadline = Instant::now() + self.timeout;

        loop {
            // A single connect can block far longer than the readiness timeout
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.probe()).await {
                Ok(Ok(())) => {
                    info!(address = %self.address, "Hardware sidecar is ready");
                    return Ok(());
                }
                Ok(Err(e)) => debug!(address = %self.address, error = %e, "Sidecar not ready yet"),
                Err(_) => debug!(address = %self.address, "Sidecar connect attempt timed out"),
            }

            if Instant::now() + self.poll_interval > deadline {
                warn!(
                    address = %self.address,
                    timeout_secs = self.timeout.as_secs(),
                    "Hardware sidecar did not become ready"
                );
                return Err(ServdError::SidecarNotReady(format!(
                    "{} not reachable after {:?}",
                    self.address, self.timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_ready_when_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let probe = SocketProbe::new(address, Duration::from_secs(1), Duration::from_millis(10));
        probe.wait_ready().await.unwrap();
    }

    #[tokio::test]
    async fn test_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let probe = SocketProbe::new(
            address,
            Duration::from_millis(50),
            Duration::from_millis(10),
        );
        assert!(matches!(
            probe.wait_ready().await,
            Err(ServdError::SidecarNotReady(_))
        ));
    }

    #[tokio::test]
    async fn test_times_out_when_connect_stalls() {
        // Backlog of zero, never accepted: once the queue holds a connection
        // further handshakes are left pending instead of refused
        let socket = tokio::net::TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(0).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut queued = Vec::new();
        for _ in 0..4 {
            if let Ok(Ok(stream)) =
                tokio::time::timeout(Duration::from_millis(100), tokio::net::TcpStream::connect(addr))
                    .await
            {
                queued.push(stream);
            }
        }

        let probe = SocketProbe::new(
            addr.to_string(),
            Duration::from_millis(300),
            Duration::from_millis(50),
        );
        let outcome = tokio::time::timeout(Duration::from_secs(5), probe.wait_ready())
            .await
            .expect("wait_ready ignored its own timeout");
        assert!(matches!(outcome, Err(ServdError::SidecarNotReady(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sidecar.sock");
        let _listener = tokio::net::UnixListener::bind(&path).unwrap();

        let probe = SocketProbe::new(
            format!("unix:{}", path.display()),
            Duration::from_secs(1),
            Duration::from_millis(10),
        );
        probe.wait_ready().await.unwrap();
    }
}
