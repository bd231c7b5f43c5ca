//! UPnP/DLNA `MediaRenderer` device: SOAP control plus a GENA-driven
//! reconnect state machine.
//!
//! Grounded on the reference stack's `sonos::soap`/`sonos::gena_client`/
//! `sonos::gena_store`, generalized from the Sonos `AVTransport`/
//! `RenderingControl` service pair to a plain UPnP renderer's single
//! `AVTransport:1` service, and from the Sonos-specific SSDP search target
//! to `urn:schemas-upnp-org:device:MediaRenderer:1`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;

use crate::config::Config;
use crate::context::NetworkContext;
use crate::devices::gena::GenaSubscriptionManager;
use crate::devices::gena_parser::{parse_transport_status, TransportStatus};
use crate::devices::soap::{escape_xml, SoapError, SoapRequestBuilder};
use crate::devices::{didl, DeviceEventing, DeviceFinder, DevicePlayback, DevicePlayerFunction};
use crate::error::{BridgeError, BridgeResult};
use crate::runtime::TaskSpawner;
use crate::utils::validate_device_ip;

use super::Device;

/// Per-`local_token` reconnect state tracked while a UPnP device plays.
struct NotifyState {
    host: String,
    http: Client,
    playing: AtomicBool,
    errored: AtomicBool,
}

/// Process-wide table dispatching NOTIFY deliveries to the right device's
/// reconnect state machine, keyed by both GENA `SID` and the bridge's own
/// `local_token`.
pub struct UpnpNotifyHandler {
    by_token: DashMap<u128, Arc<NotifyState>>,
    sid_to_token: DashMap<String, u128>,
}

impl UpnpNotifyHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_token: DashMap::new(),
            sid_to_token: DashMap::new(),
        }
    }

    fn register(&self, local_token: u128, host: String, http: Client) {
        self.by_token.insert(
            local_token,
            Arc::new(NotifyState {
                host,
                http,
                playing: AtomicBool::new(false),
                errored: AtomicBool::new(false),
            }),
        );
    }

    fn bind_sid(&self, sid: String, local_token: u128) {
        self.sid_to_token.insert(sid, local_token);
    }

    pub fn unregister(&self, local_token: u128) {
        self.by_token.remove(&local_token);
        self.sid_to_token.retain(|_, token| *token != local_token);
    }

    /// Processes a GENA NOTIFY body, running the bridge's reconnect state
    /// machine:
    /// - `PLAYING` → `playing := true`.
    /// - `ERROR` while `playing` → `errored := true`.
    /// - `errored && NOTHING` → clear both flags and reissue `Play`.
    pub async fn handle_notify(&self, sid: &str, body: &str) {
        let Some(local_token) = self.sid_to_token.get(sid).map(|t| *t) else {
            log::debug!("[upnp] NOTIFY for unknown SID {}", sid);
            return;
        };
        let Some(state) = self.by_token.get(&local_token).map(|s| Arc::clone(&s)) else {
            return;
        };

        match parse_transport_status(body) {
            TransportStatus::Ok => {
                state.playing.store(true, Ordering::SeqCst);
            }
            TransportStatus::ErrorOccurred => {
                if state.playing.load(Ordering::SeqCst) {
                    state.errored.store(true, Ordering::SeqCst);
                }
            }
            TransportStatus::Nothing => {
                if state.errored.load(Ordering::SeqCst) {
                    state.errored.store(false, Ordering::SeqCst);
                    state.playing.store(false, Ordering::SeqCst);
                    if let Err(e) = reissue_play(&state.http, &state.host).await {
                        log::warn!("[upnp] reconnect Play on {} failed: {}", state.host, e);
                    }
                }
            }
            TransportStatus::Stopped => {}
        }
    }
}

impl Default for UpnpNotifyHandler {
    fn default() -> Self {
        Self::new()
    }
}

async fn reissue_play(http: &Client, host: &str) -> Result<String, SoapError> {
    SoapRequestBuilder::new(http, host)
        .action("Play")
        .instance_id()
        .arg("Speed", "1")
        .send()
        .await
}

/// A discovered UPnP `MediaRenderer`.
pub struct UpnpDevice {
    name: String,
    host: String,
    http: Client,
    gena: Arc<GenaSubscriptionManager>,
    notify: Arc<UpnpNotifyHandler>,
    network: Arc<NetworkContext>,
}

impl UpnpDevice {
    #[must_use]
    pub fn new(
        name: String,
        host: String,
        http: Client,
        gena: Arc<GenaSubscriptionManager>,
        notify: Arc<UpnpNotifyHandler>,
        network: Arc<NetworkContext>,
    ) -> Self {
        Self {
            name,
            host,
            http,
            gena,
            notify,
            network,
        }
    }
}

#[async_trait]
impl DevicePlayback for UpnpDevice {
    fn get_device_name(&self) -> &str {
        &self.name
    }

    async fn play(&self, url: &str, title: &str, local_token: u128) -> BridgeResult<()> {
        let didl = didl::format_didl_lite(url, title);

        SoapRequestBuilder::new(&self.http, &self.host)
            .action("SetAVTransportURI")
            .instance_id()
            .arg("CurrentURI", escape_xml(url))
            .arg("CurrentURIMetaData", didl)
            .send()
            .await?;

        self.notify.register(local_token, self.host.clone(), self.http.clone());

        let callback_url = self.network.url_builder().upnp_notify_url(local_token);
        match self.gena.start(&self.host, &callback_url).await {
            Ok(sid) => self.notify.bind_sid(sid, local_token),
            Err(e) => log::warn!("[upnp] subscribe to {} failed: {}", self.host, e),
        }

        SoapRequestBuilder::new(&self.http, &self.host)
            .action("Play")
            .instance_id()
            .arg("Speed", "1")
            .send()
            .await?;

        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        match SoapRequestBuilder::new(&self.http, &self.host)
            .action("Stop")
            .instance_id()
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_harmless_on_stop() => Ok(()),
            Err(e) => Err(BridgeError::DeviceError(e.to_string())),
        }
    }
}

#[async_trait]
impl DeviceEventing for UpnpDevice {
    async fn on_close(&self, local_token: u128) {
        self.gena.cancel(&self.host).await;
        self.notify.unregister(local_token);
    }

    fn get_player_functions(&self) -> Vec<Arc<dyn DevicePlayerFunction>> {
        vec![
            Arc::new(UpnpFunction {
                host: self.host.clone(),
                http: self.http.clone(),
                name: "PLAY",
                action: "Play",
            }),
            Arc::new(UpnpFunction {
                host: self.host.clone(),
                http: self.http.clone(),
                name: "PAUSE",
                action: "Pause",
            }),
            Arc::new(UpnpFunction {
                host: self.host.clone(),
                http: self.http.clone(),
                name: "STOP",
                action: "Stop",
            }),
        ]
    }
}

struct UpnpFunction {
    host: String,
    http: Client,
    name: &'static str,
    action: &'static str,
}

#[async_trait]
impl DevicePlayerFunction for UpnpFunction {
    fn get_name(&self) -> &str {
        self.name
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.discovery.upnp_enabled
    }

    async fn handle(&self) -> BridgeResult<()> {
        let mut builder = SoapRequestBuilder::new(&self.http, &self.host)
            .action(self.action)
            .instance_id();
        if self.action == "Play" {
            builder = builder.arg("Speed", "1");
        }
        builder.send().await?;
        Ok(())
    }
}

/// Discovers UPnP `MediaRenderer`s via SSDP and wraps each as a [`Device`].
pub struct UpnpFinder {
    http: Client,
    gena: Arc<GenaSubscriptionManager>,
    notify: Arc<UpnpNotifyHandler>,
    network: Arc<NetworkContext>,
}

impl UpnpFinder {
    #[must_use]
    pub fn new(http: Client, spawner: Arc<dyn TaskSpawner>, network: Arc<NetworkContext>) -> Self {
        Self {
            http: http.clone(),
            gena: Arc::new(GenaSubscriptionManager::new(http, spawner)),
            notify: Arc::new(UpnpNotifyHandler::new()),
            network,
        }
    }

    #[must_use]
    pub fn notify_handler(&self) -> Arc<UpnpNotifyHandler> {
        Arc::clone(&self.notify)
    }
}

#[async_trait]
impl DeviceFinder for UpnpFinder {
    fn is_enabled(&self, config: &Config) -> bool {
        config.discovery.upnp_enabled
    }

    async fn find(&self, config: &Config) -> Vec<Device> {
        let timeout = Duration::from_secs(config.discovery.upnp_scan_timeout);
        let speakers = match tokio::time::timeout(timeout, super::discovery::ssdp::discover(timeout)).await
        {
            Ok(Ok(speakers)) => speakers,
            Ok(Err(e)) => {
                log::warn!("[upnp] SSDP discovery failed: {}", e);
                return Vec::new();
            }
            Err(_) => {
                log::warn!("[upnp] SSDP discovery timed out");
                return Vec::new();
            }
        };

        speakers
            .into_iter()
            .filter_map(|s| {
                let ip: std::net::IpAddr = s.ip.parse().ok()?;
                validate_device_ip(&ip).ok()?;
                Some(Device::Upnp(Arc::new(UpnpDevice::new(
                    format!("upnp @{}", s.ip),
                    format!("{}:{}", s.ip, s.port),
                    self.http.clone(),
                    Arc::clone(&self.gena),
                    Arc::clone(&self.notify),
                    Arc::clone(&self.network),
                ))))
            })
            .collect()
    }
}
