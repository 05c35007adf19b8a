//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::time::Instant;

use telecom_monitor::probe::{BoxFuture, Probe, ProbeResult};
use telecom_monitor::recovery::{ActionError, ActionExecutor};
use telecom_monitor::service::spec::{RecoveryAction, Target};

/// Start a programmable HTTP backend on an ephemeral loopback port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            204 => "204 No Content",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a TCP backend that accepts and immediately closes connections.
pub async fn start_tcp_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    addr
}

/// A loopback address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start a UDP responder answering every datagram with `reply`.
///
/// Returns the address and a counter of requests received.
pub async fn start_sip_responder(reply: &'static str) -> (SocketAddr, Arc<AtomicU32>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let received = Arc::new(AtomicU32::new(0));
    let counter = received.clone();

    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            if buf[..len].starts_with(b"OPTIONS ") {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = socket.send_to(reply.as_bytes(), from).await;
            }
        }
    });

    (addr, received)
}

fn outcome(ok: bool) -> ProbeResult {
    if ok {
        ProbeResult::success(Duration::from_millis(2), Some("ok".into()))
    } else {
        ProbeResult::failure(Duration::from_millis(2), "connection refused")
    }
}

/// Probe returning scripted outcomes, then `fallback` once the script runs out.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn new(script: &[bool], fallback: bool) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
            calls: AtomicU32::new(0),
        })
    }

    pub fn always(ok: bool) -> Arc<Self> {
        Self::new(&[], ok)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Probe for ScriptedProbe {
    fn check<'a>(&'a self, _target: &'a Target, _timeout: Duration) -> BoxFuture<'a, ProbeResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ok = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        Box::pin(async move { outcome(ok) })
    }
}

/// Probe that succeeds only against the listed targets.
pub struct TargetProbe {
    healthy: Vec<Target>,
}

impl TargetProbe {
    pub fn healthy(targets: &[Target]) -> Arc<Self> {
        Arc::new(Self {
            healthy: targets.to_vec(),
        })
    }
}

impl Probe for TargetProbe {
    fn check<'a>(&'a self, target: &'a Target, _timeout: Duration) -> BoxFuture<'a, ProbeResult> {
        let ok = self.healthy.contains(target);
        Box::pin(async move { outcome(ok) })
    }
}

/// Healthy probe that records the virtual time of every call.
#[derive(Default)]
pub struct TimestampProbe {
    calls: Mutex<Vec<Instant>>,
}

impl TimestampProbe {
    pub fn timestamps(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

impl Probe for TimestampProbe {
    fn check<'a>(&'a self, _target: &'a Target, _timeout: Duration) -> BoxFuture<'a, ProbeResult> {
        self.calls.lock().unwrap().push(Instant::now());
        Box::pin(async move { outcome(true) })
    }
}

/// Probe that never completes on its own.
pub struct HangingProbe;

impl Probe for HangingProbe {
    fn check<'a>(&'a self, _target: &'a Target, _timeout: Duration) -> BoxFuture<'a, ProbeResult> {
        Box::pin(std::future::pending())
    }
}

/// Executor that records every invocation.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    /// `(service, action kind)` per invocation, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ActionExecutor for RecordingExecutor {
    fn execute<'a>(
        &'a self,
        service: &'a str,
        action: &'a RecoveryAction,
    ) -> BoxFuture<'a, Result<Option<String>, ActionError>> {
        self.calls
            .lock()
            .unwrap()
            .push((service.to_string(), action.kind().to_string()));
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                Err(ActionError::Rejected("injected failure".into()))
            } else {
                Ok(None)
            }
        })
    }
}
