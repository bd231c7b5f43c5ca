//! SSDP-based UPnP `MediaRenderer` discovery.
//!
//! Adapted from the reference stack's `sonos::discovery::ssdp`: same
//! multicast M-SEARCH burst-and-collect shape, generalized from the Sonos
//! `ZonePlayer` search target to a plain `MediaRenderer`, and trimmed to a
//! single (multicast) discovery method — the reference stack's broadcast
//! fallback exists for networks that block Sonos multicast specifically,
//! which doesn't generalize cleanly to arbitrary third-party renderers.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use local_ip_address::list_afinet_netifas;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::protocol_constants::MEDIA_RENDERER_SEARCH_TARGET;

use super::{DiscoveredRenderer, DiscoveryError};

const MULTICAST_ADDR: &str = "239.255.255.250:1900";

fn build_msearch_message(mx: u64) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {mx}\r\n\
         ST: {MEDIA_RENDERER_SEARCH_TARGET}\r\n\r\n"
    )
}

fn get_interface_ips() -> Vec<Ipv4Addr> {
    list_afinet_netifas()
        .unwrap_or_else(|e| {
            log::warn!("[ssdp] failed to list network interfaces: {}", e);
            Vec::new()
        })
        .into_iter()
        .filter_map(|(_, addr)| match addr {
            IpAddr::V4(ipv4) if !ipv4.is_loopback() => Some(ipv4),
            _ => None,
        })
        .collect()
}

fn create_socket(iface_ip: Ipv4Addr) -> Result<UdpSocket, DiscoveryError> {
    let bind_addr = SocketAddr::new(IpAddr::V4(iface_ip), 0);
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::SocketBind)?;
    let _ = socket.set_reuse_address(true);
    #[cfg(unix)]
    let _ = socket.set_reuse_port(true);
    let _ = socket.set_multicast_ttl_v4(4);
    socket.set_nonblocking(true).map_err(DiscoveryError::SocketBind)?;
    socket.bind(&bind_addr.into()).map_err(DiscoveryError::SocketBind)?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(DiscoveryError::SocketBind)
}

fn starts_with_ignore_ascii_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Parses a `LOCATION: http://ip:port/...` response header into a renderer
/// entry. Any response lacking a LOCATION header is ignored — it is not a
/// device description endpoint we can issue SOAP/GENA calls against.
fn parse_ssdp_response(response: &str) -> Option<DiscoveredRenderer> {
    let location = response
        .lines()
        .find(|l| starts_with_ignore_ascii_case(l, "location:"))
        .and_then(|l| l.find(':').map(|idx| l[idx + 1..].trim().to_string()))?;

    let usn = response
        .lines()
        .find(|l| starts_with_ignore_ascii_case(l, "usn:"))
        .unwrap_or("usn: unknown")
        .to_string();

    let without_scheme = location.strip_prefix("http://")?;
    let host_port = without_scheme.split('/').next()?;
    let (ip, port) = match host_port.rsplit_once(':') {
        Some((ip, port)) => (ip.to_string(), port.parse().unwrap_or(80)),
        None => (host_port.to_string(), 80),
    };

    Some(DiscoveredRenderer { ip, port, uuid: usn })
}

async fn discover_on_interface(
    iface_ip: Ipv4Addr,
    msg: &[u8],
    send_count: u64,
    retry_delay: Duration,
    discovery_timeout: Duration,
    discovered: Arc<Mutex<Vec<DiscoveredRenderer>>>,
) {
    let socket = match create_socket(iface_ip) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            log::warn!("[ssdp] failed to create socket on {}: {}", iface_ip, e);
            return;
        }
    };

    let send_socket = Arc::clone(&socket);
    let msg = msg.to_vec();
    let sender = async move {
        for i in 0..send_count {
            if i > 0 {
                tokio::time::sleep(retry_delay).await;
            }
            if let Err(e) = send_socket.send_to(&msg, MULTICAST_ADDR).await {
                log::warn!("[ssdp] send_to failed on {}: {}", iface_ip, e);
            }
        }
    };

    let recv_socket = Arc::clone(&socket);
    let receiver = async move {
        let mut buf = [0u8; 2048];
        let start = std::time::Instant::now();
        while start.elapsed() < discovery_timeout {
            let remaining = discovery_timeout.saturating_sub(start.elapsed());
            match timeout(remaining, recv_socket.recv_from(&mut buf)).await {
                Ok(Ok((amt, _))) => {
                    let response = String::from_utf8_lossy(&buf[..amt]);
                    if let Some(renderer) = parse_ssdp_response(&response) {
                        discovered.lock().await.push(renderer);
                    }
                }
                Ok(Err(_)) | Err(_) => break,
            }
        }
    };

    tokio::join!(sender, receiver);
}

/// Discovers UPnP `MediaRenderer`s on the LAN, bounded by `discovery_timeout`.
pub async fn discover(
    discovery_timeout: Duration,
) -> Result<Vec<DiscoveredRenderer>, DiscoveryError> {
    let interfaces = get_interface_ips();
    if interfaces.is_empty() {
        return Err(DiscoveryError::NoInterfaces);
    }

    let msg = build_msearch_message(2);
    let discovered: Arc<Mutex<Vec<DiscoveredRenderer>>> = Arc::new(Mutex::new(Vec::new()));

    let futures: Vec<_> = interfaces
        .into_iter()
        .map(|iface| {
            discover_on_interface(
                iface,
                msg.as_bytes(),
                3,
                Duration::from_millis(800),
                discovery_timeout,
                Arc::clone(&discovered),
            )
        })
        .collect();

    futures::future::join_all(futures).await;

    let mut discovered = std::mem::take(&mut *discovered.lock().await);
    let mut seen = HashSet::new();
    discovered.retain(|r| seen.insert(format!("{}:{}", r.ip, r.port)));
    discovered.sort_by(|a, b| a.ip.cmp(&b.ip));

    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_msearch_message_targets_media_renderer() {
        let msg = build_msearch_message(2);
        assert!(msg.contains("M-SEARCH * HTTP/1.1"));
        assert!(msg.contains("ST: urn:schemas-upnp-org:device:MediaRenderer:1"));
    }

    #[test]
    fn parse_ssdp_response_extracts_host_and_port() {
        let response = "HTTP/1.1 200 OK\r\nLOCATION: http://192.168.1.20:8008/desc.xml\r\nUSN: uuid:abc\r\n\r\n";
        let renderer = parse_ssdp_response(response).expect("should parse");
        assert_eq!(renderer.ip, "192.168.1.20");
        assert_eq!(renderer.port, 8008);
    }

    #[test]
    fn parse_ssdp_response_defaults_port_80_without_explicit_port() {
        let response = "HTTP/1.1 200 OK\r\nLOCATION: http://192.168.1.20/desc.xml\r\nUSN: uuid:abc\r\n\r\n";
        let renderer = parse_ssdp_response(response).expect("should parse");
        assert_eq!(renderer.port, 80);
    }

    #[test]
    fn parse_ssdp_response_without_location_is_none() {
        let response = "HTTP/1.1 200 OK\r\nUSN: uuid:abc\r\n\r\n";
        assert!(parse_ssdp_response(response).is_none());
    }
}
