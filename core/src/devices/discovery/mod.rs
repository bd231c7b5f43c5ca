//! Network discovery for UPnP renderers (SSDP) and Chromecast receivers
//! (mDNS), generalized from the reference stack's Sonos-specific
//! `sonos::discovery` module.

pub mod mdns;
pub mod ssdp;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to bind discovery socket: {0}")]
    SocketBind(std::io::Error),

    #[error("no usable network interfaces found")]
    NoInterfaces,

    #[error("mDNS daemon error: {0}")]
    MdnsDaemon(String),
}

/// A renderer discovered on the LAN, before being wrapped as a [`super::Device`].
#[derive(Debug, Clone)]
pub struct DiscoveredRenderer {
    pub ip: String,
    pub port: u16,
    pub uuid: String,
}
