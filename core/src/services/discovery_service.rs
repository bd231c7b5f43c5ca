//! Discovery aggregation service (component F).
//!
//! Fans out to every enabled [`DeviceFinder`], each under its own scoped
//! timeout, and flattens their results. Grounded on the reference stack's
//! `DiscoveryService` facade shape, replacing its single Sonos-specific
//! `TopologyMonitor` with a generic `Vec<Arc<dyn DeviceFinder>>` fan-out
//! since this bridge has five independent device kinds instead of one.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::devices::{Device, DeviceFinder, RouterContribution};

pub struct DiscoveryService {
    finders: Vec<Arc<dyn DeviceFinder>>,
}

impl DiscoveryService {
    #[must_use]
    pub fn new(finders: Vec<Arc<dyn DeviceFinder>>) -> Self {
        Self { finders }
    }

    /// Runs every enabled finder concurrently, each bounded by
    /// `device_request_timeout + 1` seconds. A finder that times out
    /// contributes nothing; it is not treated as an error.
    pub async fn discover(&self, config: &Config) -> Vec<Device> {
        let scoped_timeout = Duration::from_secs(config.discovery.device_request_timeout + 1);

        let futures = self
            .finders
            .iter()
            .filter(|f| f.is_enabled(config))
            .map(|finder| {
                let finder = Arc::clone(finder);
                async move {
                    match tokio::time::timeout(scoped_timeout, finder.find(config)).await {
                        Ok(devices) => devices,
                        Err(_) => {
                            log::warn!("[discovery] a finder's scan timed out");
                            Vec::new()
                        }
                    }
                }
            });

        futures::future::join_all(futures).await.into_iter().flatten().collect()
    }

    /// Collects the HTTP sub-routers every finder wants mounted at startup.
    #[must_use]
    pub fn routers(&self) -> Vec<RouterContribution> {
        self.finders.iter().flat_map(|f| f.get_routers()).collect()
    }
}
