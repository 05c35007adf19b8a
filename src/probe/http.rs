//! HTTP health probe.

use std::time::{Duration, Instant};

use crate::probe::{BoxFuture, Probe, ProbeError, ProbeResult};
use crate::service::spec::Target;

/// Healthy iff a GET to the target URL returns 2xx before the timeout.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("telecom-monitor/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, target: &Target, timeout: Duration) -> Result<Option<String>, ProbeError> {
        let url = match target {
            Target::Url(url) => url.clone(),
            Target::Socket { .. } => {
                return Err(ProbeError::InvalidTarget(format!("{} is not a URL", target)));
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProbeError::Timeout } else { ProbeError::Http(e) })?;

        let status = response.status();
        if status.is_success() {
            Ok(Some(status.to_string()))
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}

impl Probe for HttpProbe {
    fn check<'a>(&'a self, target: &'a Target, timeout: Duration) -> BoxFuture<'a, ProbeResult> {
        Box::pin(async move {
            let start = Instant::now();
            let outcome = self.get(target, timeout).await;
            if let Err(e) = &outcome {
                tracing::debug!(endpoint = %target, error = %e, "HTTP probe failed");
            }
            ProbeResult::from_outcome(start.elapsed(), outcome)
        })
    }
}
