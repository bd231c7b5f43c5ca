//! Chromecast device control via `rust_cast`.
//!
//! `rust_cast`'s API is synchronous, so every call is offloaded to a
//! blocking worker thread and awaited, mirroring the reference stack's
//! `TaskSpawner`-fenced background-task idiom for blocking device-library
//! calls. Grounded on a real sibling usage of this exact crate
//! (`rust_cast::channels::media::{Media, StreamType}`) for loading media on
//! a `DefaultMediaReceiver` app.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_cast::channels::media::{Media, StatusEntry, StreamType};
use rust_cast::channels::receiver::CastDeviceApp;
use rust_cast::CastDevice as RustCastDevice;

use crate::config::Config;
use crate::devices::{DeviceEventing, DeviceFinder, DevicePlayback, DevicePlayerFunction};
use crate::error::{BridgeError, BridgeResult};

use super::Device;

const CHROMECAST_PORT: u16 = 8009;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const IDLE_POLL_ATTEMPTS: u32 = 30;

/// Active media session established by a prior `play()`, needed by the
/// PLAY/PAUSE/STOP chat buttons.
#[derive(Clone)]
struct ActiveSession {
    transport_id: String,
    session_id: String,
    media_session_id: i32,
}

pub struct ChromecastDevice {
    name: String,
    host: String,
    port: u16,
    active: Arc<Mutex<Option<ActiveSession>>>,
}

impl ChromecastDevice {
    #[must_use]
    pub fn new(name: String, host: String) -> Self {
        Self {
            name,
            host,
            port: CHROMECAST_PORT,
            active: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl DevicePlayback for ChromecastDevice {
    fn get_device_name(&self) -> &str {
        &self.name
    }

    async fn play(&self, url: &str, title: &str, _local_token: u128) -> BridgeResult<()> {
        let host = self.host.clone();
        let port = self.port;
        let url = url.to_string();
        let title = title.to_string();

        let result = tokio::task::spawn_blocking(move || -> Result<ActiveSession, String> {
            let device = RustCastDevice::connect_without_host_verification(host, port)
                .map_err(|e| e.to_string())?;

            // Wait for the receiver to become idle, quitting any foreground
            // app first so the new media load doesn't collide with it.
            for attempt in 0..IDLE_POLL_ATTEMPTS {
                let status = device.receiver.get_status().map_err(|e| e.to_string())?;
                if status.applications.is_empty() {
                    break;
                }
                if attempt == 0 {
                    for app in &status.applications {
                        let _ = device.receiver.stop_app(&app.session_id);
                    }
                }
                std::thread::sleep(POLL_INTERVAL);
            }

            let app = device
                .receiver
                .launch_app(&CastDeviceApp::DefaultMediaReceiver)
                .map_err(|e| e.to_string())?;

            device
                .connection
                .connect(app.transport_id.as_str())
                .map_err(|e| e.to_string())?;

            let media = Media {
                content_id: url,
                content_type: "video/mp4".to_string(),
                stream_type: StreamType::Live,
                duration: None,
                metadata: None,
            };

            let status = device
                .media
                .load(app.transport_id.as_str(), app.session_id.as_str(), &media)
                .map_err(|e| e.to_string())?;

            let media_session_id = status
                .entries
                .first()
                .map(StatusEntry::media_session_id)
                .unwrap_or(0);

            log::info!("[chromecast] playing {:?} on {}", title, app.display_name);

            Ok(ActiveSession {
                transport_id: app.transport_id,
                session_id: app.session_id,
                media_session_id,
            })
        })
        .await
        .map_err(|e| BridgeError::DeviceError(format!("chromecast task join error: {e}")))?
        .map_err(BridgeError::DeviceError)?;

        *self.active.lock() = Some(result);
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        let active = self.active.lock().clone();
        let host = self.host.clone();
        let port = self.port;

        tokio::task::spawn_blocking(move || -> Result<(), String> {
            let device = RustCastDevice::connect_without_host_verification(host, port)
                .map_err(|e| e.to_string())?;
            if let Some(active) = active {
                device
                    .connection
                    .connect(active.transport_id.as_str())
                    .map_err(|e| e.to_string())?;
                device
                    .media
                    .stop(active.transport_id.as_str(), active.media_session_id)
                    .map_err(|e| e.to_string())?;
            }
            Ok(())
        })
        .await
        .map_err(|e| BridgeError::DeviceError(format!("chromecast task join error: {e}")))?
        .map_err(BridgeError::DeviceError)
    }
}

#[async_trait]
impl DeviceEventing for ChromecastDevice {
    async fn on_close(&self, _local_token: u128) {
        *self.active.lock() = None;
    }

    fn get_player_functions(&self) -> Vec<Arc<dyn DevicePlayerFunction>> {
        vec![
            Arc::new(ChromecastFunction {
                host: self.host.clone(),
                port: self.port,
                active: Arc::clone(&self.active),
                name: "PLAY",
                kind: FunctionKind::Play,
            }),
            Arc::new(ChromecastFunction {
                host: self.host.clone(),
                port: self.port,
                active: Arc::clone(&self.active),
                name: "PAUSE",
                kind: FunctionKind::Pause,
            }),
            Arc::new(ChromecastFunction {
                host: self.host.clone(),
                port: self.port,
                active: Arc::clone(&self.active),
                name: "STOP",
                kind: FunctionKind::Stop,
            }),
        ]
    }
}

#[derive(Clone, Copy)]
enum FunctionKind {
    Play,
    Pause,
    Stop,
}

struct ChromecastFunction {
    host: String,
    port: u16,
    active: Arc<Mutex<Option<ActiveSession>>>,
    name: &'static str,
    kind: FunctionKind,
}

#[async_trait]
impl DevicePlayerFunction for ChromecastFunction {
    fn get_name(&self) -> &str {
        self.name
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.discovery.chromecast_enabled
    }

    async fn handle(&self) -> BridgeResult<()> {
        let Some(active) = self.active.lock().clone() else {
            return Ok(());
        };
        let host = self.host.clone();
        let port = self.port;
        let kind = self.kind;

        tokio::task::spawn_blocking(move || -> Result<(), String> {
            let device = RustCastDevice::connect_without_host_verification(host, port)
                .map_err(|e| e.to_string())?;
            device
                .connection
                .connect(active.transport_id.as_str())
                .map_err(|e| e.to_string())?;
            match kind {
                FunctionKind::Play => device
                    .media
                    .play(active.transport_id.as_str(), active.media_session_id)
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                FunctionKind::Pause => device
                    .media
                    .pause(active.transport_id.as_str(), active.media_session_id)
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                FunctionKind::Stop => device
                    .media
                    .stop(active.transport_id.as_str(), active.media_session_id)
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
            }
        })
        .await
        .map_err(|e| BridgeError::DeviceError(format!("chromecast task join error: {e}")))?
        .map_err(BridgeError::DeviceError)
    }
}

/// Discovers Chromecast receivers via mDNS. The `mdns_sd::ServiceDaemon` is
/// reference-counted across every call: discovery stops spawning daemon work
/// once the last `ChromecastFinder` referencing it is dropped.
pub struct ChromecastFinder {
    daemon: Arc<mdns_sd::ServiceDaemon>,
}

impl ChromecastFinder {
    pub fn new() -> Result<Self, super::discovery::DiscoveryError> {
        Ok(Self {
            daemon: Arc::new(super::discovery::mdns::create_daemon()?),
        })
    }
}

#[async_trait]
impl DeviceFinder for ChromecastFinder {
    fn is_enabled(&self, config: &Config) -> bool {
        config.discovery.chromecast_enabled
    }

    async fn find(&self, config: &Config) -> Vec<Device> {
        let timeout = Duration::from_secs(config.discovery.chromecast_scan_timeout);
        match super::discovery::mdns::discover(&self.daemon, timeout).await {
            Ok(renderers) => renderers
                .into_iter()
                .map(|r| {
                    Device::Chromecast(Arc::new(ChromecastDevice::new(
                        format!("chromecast @{}", r.ip),
                        r.ip,
                    )))
                })
                .collect(),
            Err(e) => {
                log::warn!("[chromecast] mDNS discovery failed: {}", e);
                Vec::new()
            }
        }
    }
}
