//! TCP connectivity probe.

use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time;

use crate::probe::{BoxFuture, Probe, ProbeError, ProbeResult};
use crate::service::spec::Target;

/// Healthy iff a TCP connection completes before the timeout.
#[derive(Debug, Default, Clone)]
pub struct TcpProbe;

impl TcpProbe {
    pub fn new() -> Self {
        Self
    }

    async fn connect(target: &Target, timeout: Duration) -> Result<Option<String>, ProbeError> {
        let addr = target.authority();
        match time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or(addr);
                Ok(Some(format!("connected to {}", peer)))
            }
            Ok(Err(e)) => Err(ProbeError::Connect(e)),
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}

impl Probe for TcpProbe {
    fn check<'a>(&'a self, target: &'a Target, timeout: Duration) -> BoxFuture<'a, ProbeResult> {
        Box::pin(async move {
            let start = Instant::now();
            let outcome = Self::connect(target, timeout).await;
            if let Err(e) = &outcome {
                tracing::debug!(endpoint = %target, error = %e, "TCP probe failed");
            }
            ProbeResult::from_outcome(start.elapsed(), outcome)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let target = Target::socket("127.0.0.1", addr.port());
        let result = TcpProbe::new().check(&target, Duration::from_secs(1)).await;
        assert!(result.is_success(), "{:?}", result.error());
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_result() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let target = Target::socket("127.0.0.1", port);
        let result = TcpProbe::new().check(&target, Duration::from_secs(1)).await;
        assert!(!result.is_success());
        assert!(result.error().unwrap().starts_with("connection failed"));
    }
}
