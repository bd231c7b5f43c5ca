//! Network configuration context for the streaming server.
//!
//! This module provides [`NetworkContext`] which bundles the listen address
//! and advertise IP used across services to build URLs embedded in `PLAY`
//! commands and GENA callback subscriptions.

use std::net::IpAddr;
#[cfg(test)]
use std::net::Ipv4Addr;
use std::sync::Arc;

use parking_lot::RwLock;

/// Network configuration shared across services.
///
/// Bundles server address and advertise-IP information that multiple
/// services need for constructing callback URLs and stream endpoints.
#[derive(Clone)]
pub struct NetworkContext {
    /// Server listen port.
    pub port: Arc<RwLock<u16>>,
    /// IP address that devices on the LAN can reach us at.
    pub advertise_ip: Arc<RwLock<String>>,
}

impl NetworkContext {
    /// Creates a `NetworkContext` with an explicit advertise IP and port,
    /// as configured in `http.listen_host` / `http.listen_port`.
    #[must_use]
    pub fn explicit(port: u16, advertise_ip: IpAddr) -> Self {
        Self {
            port: Arc::new(RwLock::new(port)),
            advertise_ip: Arc::new(RwLock::new(advertise_ip.to_string())),
        }
    }

    /// Creates a `NetworkContext` for testing with a fixed loopback IP.
    #[cfg(test)]
    pub fn for_test() -> Self {
        Self::explicit(0, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)))
    }

    /// Returns the current port value.
    #[must_use]
    pub fn get_port(&self) -> u16 {
        *self.port.read()
    }

    /// Returns the current advertise IP.
    #[must_use]
    pub fn get_advertise_ip(&self) -> String {
        self.advertise_ip.read().clone()
    }

    /// Sets the listen port (used once at bind time if the configured port
    /// was 0 for auto-assignment).
    pub fn set_port(&self, port: u16) {
        *self.port.write() = port;
    }

    /// Returns a [`UrlBuilder`] for the current network configuration.
    #[must_use]
    pub fn url_builder(&self) -> UrlBuilder {
        UrlBuilder::new(self.get_advertise_ip(), self.get_port())
    }
}

/// Builder for constructing URLs exposed by the streaming server.
pub struct UrlBuilder {
    ip: String,
    port: u16,
}

impl UrlBuilder {
    /// Creates a new `UrlBuilder` for the given server address.
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    /// Returns the base URL for the server (e.g., `http://192.168.1.100:8080`).
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }

    /// Returns the stream URL for a given message id and remote token.
    #[must_use]
    pub fn stream_url(&self, message_id: i64, remote_token: u64) -> String {
        format!("{}/stream/{}/{}", self.base_url(), message_id, remote_token)
    }

    /// Returns the UPnP GENA NOTIFY callback URL for a given local token.
    #[must_use]
    pub fn upnp_notify_url(&self, local_token: u128) -> String {
        format!("{}/upnp/notify/{}", self.base_url(), local_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn explicit_context_uses_provided_ip() {
        let ctx = NetworkContext::explicit(8080, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)));
        assert_eq!(ctx.get_advertise_ip(), "192.168.1.100");
        assert_eq!(ctx.get_port(), 8080);
    }

    #[test]
    fn url_builder_generates_correct_urls() {
        let builder = UrlBuilder::new("192.168.1.100", 8080);
        assert_eq!(builder.base_url(), "http://192.168.1.100:8080");
        assert_eq!(
            builder.stream_url(10, 1010),
            "http://192.168.1.100:8080/stream/10/1010"
        );
        assert_eq!(
            builder.upnp_notify_url(12345),
            "http://192.168.1.100:8080/upnp/notify/12345"
        );
    }
}
