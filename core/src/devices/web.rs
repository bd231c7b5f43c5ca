//! Browser-poll "web" device: a synthetic renderer driven by a page that
//! long-polls for the next URL to open.
//!
//! The device table is a flat `DashMap` keyed by `remote_token`, mirroring
//! the reference stack's indexed-store idiom (`services::playback_session_store`)
//! without the secondary index, since lookups only ever happen by token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::Config;
use crate::devices::{DeviceEventing, DeviceFinder, DevicePlayback, DevicePlayerFunction, RouterContribution};
use crate::error::BridgeResult;
use crate::tokens::random_remote_token;
use crate::utils::now_millis;

use super::Device;

#[derive(Clone)]
enum PendingAction {
    Play { url: String },
    Stop,
}

pub struct WebDevice {
    name: String,
    pending: Mutex<Option<PendingAction>>,
    manipulation_timestamp: AtomicU64,
}

impl WebDevice {
    fn new(name: String) -> Self {
        Self {
            name,
            pending: Mutex::new(None),
            manipulation_timestamp: AtomicU64::new(now_millis()),
        }
    }

    fn touch(&self) {
        self.manipulation_timestamp.store(now_millis(), Ordering::SeqCst);
    }

    fn is_stale(&self, request_gone_timeout_ms: u64) -> bool {
        now_millis().saturating_sub(self.manipulation_timestamp.load(Ordering::SeqCst)) > request_gone_timeout_ms
    }

    /// Takes the pending action, if any, clearing it. Used by the poll route.
    fn take_pending(&self) -> Option<PendingAction> {
        self.touch();
        self.pending.lock().take()
    }
}

#[async_trait]
impl DevicePlayback for WebDevice {
    fn get_device_name(&self) -> &str {
        &self.name
    }

    async fn play(&self, url: &str, _title: &str, _local_token: u128) -> BridgeResult<()> {
        *self.pending.lock() = Some(PendingAction::Play { url: url.to_string() });
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        *self.pending.lock() = Some(PendingAction::Stop);
        Ok(())
    }
}

#[async_trait]
impl DeviceEventing for WebDevice {
    async fn on_close(&self, _local_token: u128) {}

    fn get_player_functions(&self) -> Vec<Arc<dyn DevicePlayerFunction>> {
        Vec::new()
    }
}

/// Flat table of registered web-poll devices, keyed by `remote_token`.
struct WebDeviceStore {
    devices: DashMap<u64, Arc<WebDevice>>,
}

impl WebDeviceStore {
    fn new() -> Self {
        Self { devices: DashMap::new() }
    }

    fn register(&self, client_ip: &str) -> u64 {
        let token = random_remote_token();
        self.devices
            .insert(token, Arc::new(WebDevice::new(format!("web @({client_ip})"))));
        token
    }

    fn get(&self, token: u64) -> Option<Arc<WebDevice>> {
        self.devices.get(&token).map(|r| Arc::clone(&r))
    }

    /// Evicts entries whose last poll/manipulation is older than
    /// `now - request_gone_timeout`, returning the survivors.
    fn sweep_and_collect(&self, request_gone_timeout_ms: u64) -> Vec<Device> {
        self.devices.retain(|_, device| !device.is_stale(request_gone_timeout_ms));
        self.devices
            .iter()
            .map(|r| Device::Web(Arc::clone(&r)))
            .collect()
    }
}

#[derive(Clone)]
struct WebRouteState {
    store: Arc<WebDeviceStore>,
    config: Arc<Config>,
}

async fn register_handler(
    State(state): State<WebRouteState>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    Path(password): Path<String>,
) -> impl IntoResponse {
    if password != state.config.discovery.web_ui_password {
        return (StatusCode::FORBIDDEN, String::new());
    }
    let token = state.store.register(&addr.ip().to_string());
    (StatusCode::OK, token.to_string())
}

async fn poll_handler(State(state): State<WebRouteState>, Path(token): Path<u64>) -> impl IntoResponse {
    let Some(device) = state.store.get(token) else {
        return (StatusCode::FOUND, String::new());
    };
    match device.take_pending() {
        Some(PendingAction::Play { url }) => (StatusCode::OK, url),
        Some(PendingAction::Stop) => (StatusCode::OK, "stop".to_string()),
        None => (StatusCode::FOUND, String::new()),
    }
}

/// Discovers nothing over the network; instead exposes the register/poll
/// routes that let a browser page register itself as a renderer.
pub struct WebFinder {
    store: Arc<WebDeviceStore>,
    config: Arc<Config>,
}

impl WebFinder {
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            store: Arc::new(WebDeviceStore::new()),
            config,
        }
    }
}

#[async_trait]
impl DeviceFinder for WebFinder {
    fn is_enabled(&self, config: &Config) -> bool {
        config.discovery.web_ui_enabled
    }

    async fn find(&self, config: &Config) -> Vec<Device> {
        let request_gone_timeout_ms = config.discovery.request_gone_timeout * 1000;
        self.store.sweep_and_collect(request_gone_timeout_ms)
    }

    fn get_routers(&self) -> Vec<RouterContribution> {
        let state = WebRouteState {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        };
        vec![Router::new()
            .route("/web/api/register/{password}", get(register_handler))
            .route("/web/api/poll/{token}", get(poll_handler))
            .with_state(state)]
    }
}
