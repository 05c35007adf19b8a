//! SIP OPTIONS probe over UDP.
//!
//! Sends a single OPTIONS request and waits for a response from the target.
//! Any well-formed status line (`SIP/2.0 <3-digit code>`) counts as alive,
//! provisional or final: the endpoint's SIP stack answered. Datagrams whose
//! Call-ID belongs to another request are skipped; a response without a
//! Call-ID is accepted.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time;

use crate::probe::{BoxFuture, Probe, ProbeError, ProbeResult};
use crate::service::spec::Target;

const MAX_DATAGRAM: usize = 4096;

#[derive(Debug, Default, Clone)]
pub struct SipProbe;

impl SipProbe {
    pub fn new() -> Self {
        Self
    }

    async fn options(target: &Target, timeout: Duration) -> Result<Option<String>, ProbeError> {
        let (host, port) = match target {
            Target::Socket { host, port } => (host.as_str(), *port),
            Target::Url(_) => {
                return Err(ProbeError::InvalidTarget(format!("{} is not host:port", target)));
            }
        };
        let deadline = time::Instant::now() + timeout;

        let remote = time::timeout_at(deadline, tokio::net::lookup_host(target.authority()))
            .await
            .map_err(|_| ProbeError::Timeout)?
            .map_err(ProbeError::Connect)?
            .next()
            .ok_or_else(|| ProbeError::InvalidTarget(format!("{} did not resolve", host)))?;

        let bind_addr = if remote.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind_addr).await.map_err(ProbeError::Io)?;
        socket.connect(remote).await.map_err(ProbeError::Connect)?;
        let local = socket.local_addr().map_err(ProbeError::Io)?;

        let (request, expected) = build_options_request(host, port, local);
        socket.send(request.as_bytes()).await.map_err(ProbeError::Io)?;

        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            let len = time::timeout_at(deadline, socket.recv(&mut buf))
                .await
                .map_err(|_| ProbeError::Timeout)?
                .map_err(ProbeError::Io)?;

            let datagram = &buf[..len];
            match call_id(datagram) {
                Some(id) if id != expected => {
                    tracing::debug!(endpoint = %target, call_id = %id, "Ignoring stray SIP response");
                }
                _ => return parse_status_line(datagram).map(Some),
            }
        }
    }
}

impl Probe for SipProbe {
    fn check<'a>(&'a self, target: &'a Target, timeout: Duration) -> BoxFuture<'a, ProbeResult> {
        Box::pin(async move {
            let start = Instant::now();
            let outcome = Self::options(target, timeout).await;
            if let Err(e) = &outcome {
                tracing::debug!(endpoint = %target, error = %e, "SIP probe failed");
            }
            ProbeResult::from_outcome(start.elapsed(), outcome)
        })
    }
}

/// Build an OPTIONS request addressed to `host:port` from `local`.
///
/// Returns the request text and its Call-ID.
pub fn build_options_request(host: &str, port: u16, local: SocketAddr) -> (String, String) {
    let branch = format!("z9hG4bK{:016x}", fastrand::u64(..));
    let tag = format!("{:08x}", fastrand::u32(..));
    let local_ip = local.ip();
    let call_id = format!("{}@{}", uuid::Uuid::new_v4(), local_ip);

    let request = format!(
        "OPTIONS sip:{host}:{port} SIP/2.0\r\n\
         Via: SIP/2.0/UDP {local};branch={branch};rport\r\n\
         Max-Forwards: 70\r\n\
         From: <sip:monitor@{local_ip}>;tag={tag}\r\n\
         To: <sip:{host}:{port}>\r\n\
         Call-ID: {call_id}\r\n\
         CSeq: 1 OPTIONS\r\n\
         Accept: application/sdp\r\n\
         User-Agent: telecom-monitor\r\n\
         Content-Length: 0\r\n\r\n"
    );
    (request, call_id)
}

/// Value of the Call-ID header (or its compact form `i`), if present.
pub fn call_id(message: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(message);
    text.lines()
        .skip(1)
        .take_while(|line| !line.is_empty())
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            let name = name.trim();
            (name.eq_ignore_ascii_case("call-id") || name.eq_ignore_ascii_case("i"))
                .then(|| value.trim().to_string())
        })
}

/// Validate the first line of a SIP response and return it.
pub fn parse_status_line(datagram: &[u8]) -> Result<String, ProbeError> {
    let text = String::from_utf8_lossy(datagram);
    let line = text.lines().next().unwrap_or_default().trim_end();

    let rest = line
        .strip_prefix("SIP/2.0 ")
        .ok_or_else(|| ProbeError::Protocol(format!("not a SIP response: {:.40}", line)))?;
    let code = rest.get(..3).unwrap_or_default();
    let well_formed = code.len() == 3
        && code.bytes().all(|b| b.is_ascii_digit())
        && matches!(rest.as_bytes().get(3), None | Some(b' '));
    if !well_formed {
        return Err(ProbeError::Protocol(format!("malformed status line: {:.40}", line)));
    }

    let code: u16 = code.parse().map_err(|_| ProbeError::Protocol(line.to_string()))?;
    if !(100..700).contains(&code) {
        return Err(ProbeError::Protocol(format!("status code {} out of range", code)));
    }
    Ok(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_request_headers() {
        let local: SocketAddr = "192.0.2.10:40000".parse().unwrap();
        let (request, id) = build_options_request("sip.example.net", 5060, local);

        assert!(request.starts_with("OPTIONS sip:sip.example.net:5060 SIP/2.0\r\n"));
        assert!(request.contains("Via: SIP/2.0/UDP 192.0.2.10:40000;branch=z9hG4bK"));
        assert!(request.contains("CSeq: 1 OPTIONS\r\n"));
        assert!(request.ends_with("Content-Length: 0\r\n\r\n"));
        assert!(id.ends_with("@192.0.2.10"));
        assert_eq!(call_id(request.as_bytes()).as_deref(), Some(id.as_str()));
    }

    #[test]
    fn test_call_id_header_forms() {
        assert_eq!(
            call_id(b"SIP/2.0 200 OK\r\ni: abc@host\r\n\r\n").as_deref(),
            Some("abc@host")
        );
        assert_eq!(
            call_id(b"SIP/2.0 200 OK\r\nCALL-ID:  xyz \r\n\r\n").as_deref(),
            Some("xyz")
        );
        assert!(call_id(b"SIP/2.0 200 OK\r\n\r\nCall-ID: body").is_none());
    }

    #[tokio::test]
    async fn test_stray_response_is_skipped() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; MAX_DATAGRAM];
            if let Ok((len, from)) = server.recv_from(&mut buf).await {
                let id = call_id(&buf[..len]).unwrap();
                let stale = "SIP/2.0 503 Service Unavailable\r\nCall-ID: old@10.0.0.1\r\n\r\n";
                let _ = server.send_to(stale.as_bytes(), from).await;
                let reply = format!("SIP/2.0 200 OK\r\nCall-ID: {}\r\n\r\n", id);
                let _ = server.send_to(reply.as_bytes(), from).await;
            }
        });

        let target = Target::socket("127.0.0.1", port);
        let result = SipProbe::new().check(&target, Duration::from_secs(1)).await;
        assert_eq!(result.detail(), Some("SIP/2.0 200 OK"));
    }

    #[test]
    fn test_status_line_parsing() {
        assert_eq!(
            parse_status_line(b"SIP/2.0 200 OK\r\nVia: x\r\n\r\n").unwrap(),
            "SIP/2.0 200 OK"
        );
        assert!(parse_status_line(b"SIP/2.0 100 Trying\r\n").is_ok());
        assert!(parse_status_line(b"SIP/2.0 503 Service Unavailable\r\n").is_ok());

        assert!(parse_status_line(b"HTTP/1.1 200 OK\r\n").is_err());
        assert!(parse_status_line(b"SIP/2.0 20 OK\r\n").is_err());
        assert!(parse_status_line(b"SIP/2.0 2000 OK\r\n").is_err());
        assert!(parse_status_line(b"").is_err());
    }

    #[tokio::test]
    async fn test_probe_against_udp_responder() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; MAX_DATAGRAM];
            if let Ok((_, from)) = server.recv_from(&mut buf).await {
                let _ = server.send_to(b"SIP/2.0 200 OK\r\n\r\n", from).await;
            }
        });

        let target = Target::socket("127.0.0.1", port);
        let result = SipProbe::new().check(&target, Duration::from_secs(1)).await;
        assert!(result.is_success(), "{:?}", result.error());
        assert_eq!(result.detail(), Some("SIP/2.0 200 OK"));
    }
}
