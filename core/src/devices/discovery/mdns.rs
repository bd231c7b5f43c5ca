//! mDNS-based Chromecast receiver discovery.
//!
//! Adapted from the reference stack's `sonos::discovery::mdns`, generalized
//! from `_sonos._tcp.local.` to `_googlecast._tcp.local.`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mdns_sd::{ResolvedService, ScopedIp, ServiceDaemon, ServiceEvent};
use tokio::time::timeout;

use crate::protocol_constants::CHROMECAST_MDNS_SERVICE_TYPE;

use super::{DiscoveredRenderer, DiscoveryError};

/// Browses for `_googlecast._tcp.local.` services and resolves their IP and
/// port. The Chromecast mDNS `id=` TXT record is the stable identity; the
/// service instance name is used as a fallback when it is absent.
pub async fn discover(
    daemon: &Arc<ServiceDaemon>,
    browse_timeout: Duration,
) -> Result<Vec<DiscoveredRenderer>, DiscoveryError> {
    let receiver = daemon
        .browse(CHROMECAST_MDNS_SERVICE_TYPE)
        .map_err(|e| DiscoveryError::MdnsDaemon(e.to_string()))?;

    let mut discovered: HashMap<String, DiscoveredRenderer> = HashMap::new();
    let start = std::time::Instant::now();

    while start.elapsed() < browse_timeout {
        let remaining = browse_timeout.saturating_sub(start.elapsed());
        match timeout(remaining, async { receiver.recv_async().await }).await {
            Ok(Ok(ServiceEvent::ServiceResolved(info))) => {
                if let Some(renderer) = parse_service(&info) {
                    discovered.insert(renderer.uuid.clone(), renderer);
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(_)) | Err(_) => break,
        }
    }

    if let Err(e) = daemon.stop_browse(CHROMECAST_MDNS_SERVICE_TYPE) {
        log::warn!("[mdns] failed to stop browse: {:?}", e);
    }

    Ok(discovered.into_values().collect())
}

fn parse_service(info: &ResolvedService) -> Option<DiscoveredRenderer> {
    let ip = info.addresses.iter().find_map(|addr| match addr {
        ScopedIp::V4(v4) => Some(v4.addr().to_string()),
        _ => None,
    })?;

    let uuid = info
        .txt_properties()
        .iter()
        .find(|p| p.key() == "id")
        .map(|p| p.val_str().to_string())
        .unwrap_or_else(|| info.fullname.clone());

    Some(DiscoveredRenderer {
        ip,
        port: if info.port > 0 { info.port } else { 8009 },
        uuid,
    })
}

#[must_use]
pub fn create_daemon() -> Result<ServiceDaemon, DiscoveryError> {
    ServiceDaemon::new().map_err(|e| DiscoveryError::MdnsDaemon(e.to_string()))
}
