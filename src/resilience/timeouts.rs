//! Deadline enforcement for probes.
//!
//! Every probe invocation runs under a deadline owned by the caller, so a
//! transport that ignores its own timeout can never stall a service loop.

use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant};

use crate::probe::ProbeResult;

/// Run `probe` and convert an expired deadline into a `timeout` failure.
pub async fn with_deadline<F>(timeout: Duration, probe: F) -> ProbeResult
where
    F: Future<Output = ProbeResult>,
{
    let start = Instant::now();
    match time::timeout(timeout, probe).await {
        Ok(result) => result,
        Err(_) => ProbeResult::timeout(start.elapsed()),
    }
}
