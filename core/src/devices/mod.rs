//! Device abstraction: a tagged `Device` enum plus the discovery and
//! capability traits that produce and drive it.
//!
//! The reference stack expresses shared capability as a combined marker
//! trait over a `dyn SonosClient` trait object (`SonosClient: SonosDiscovery
//! + SonosPlayback + SonosTopology + SonosVolumeControl`). Here the set of
//! concrete device kinds is small and fixed at compile time, so the same
//! "combined trait + blanket impl" idiom is kept for the capability surface
//! (`DeviceControl: DevicePlayback + DeviceEventing`) while the dispatch
//! itself is a tagged enum rather than `dyn Device` trait objects.

pub mod chromecast;
pub mod didl;
pub mod discovery;
pub mod gena;
pub mod gena_client;
pub mod gena_parser;
pub mod gena_store;
pub mod soap;
pub mod upnp;
pub mod vlc;
pub mod web;
pub mod xbmc;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::BridgeResult;

/// A single button exposed to the chat UI for a playing device (PAUSE, PLAY,
/// STOP, ...). The bot collaborator mints a random callback id per function
/// and routes button clicks back to `handle()`.
#[async_trait]
pub trait DevicePlayerFunction: Send + Sync {
    /// Display name shown on the chat keyboard button.
    fn get_name(&self) -> &str;

    /// Whether this function should be offered given the current config.
    fn is_enabled(&self, config: &Config) -> bool;

    /// Invoked when the user presses the corresponding button.
    async fn handle(&self) -> BridgeResult<()>;
}

/// Playback control surface every device kind implements.
#[async_trait]
pub trait DevicePlayback: Send + Sync {
    /// Human-readable device name, used in chat replies and logs.
    fn get_device_name(&self) -> &str;

    /// Starts playback of `url` (already pointing at the HTTP gateway),
    /// displaying `title` where the device supports it.
    async fn play(&self, url: &str, title: &str, local_token: u128) -> BridgeResult<()>;

    /// Stops playback, suppressing "already stopped" style errors.
    async fn stop(&self) -> BridgeResult<()>;
}

/// Lifecycle/eventing surface every device kind implements.
#[async_trait]
pub trait DeviceEventing: Send + Sync {
    /// Called when the owning stream session is torn down: cancels any
    /// background subscription/reconnect loop and releases resources.
    async fn on_close(&self, local_token: u128);

    /// The buttons to offer for this device while it is playing.
    fn get_player_functions(&self) -> Vec<Arc<dyn DevicePlayerFunction>>;
}

/// Combined capability trait, mirroring the reference stack's
/// `SonosClient: SonosDiscovery + SonosPlayback + ...` pattern.
pub trait DeviceControl: DevicePlayback + DeviceEventing {}
impl<T: DevicePlayback + DeviceEventing + ?Sized> DeviceControl for T {}

/// A discovered or registered renderer, tagged by transport kind.
#[derive(Clone)]
pub enum Device {
    Upnp(Arc<upnp::UpnpDevice>),
    Chromecast(Arc<chromecast::ChromecastDevice>),
    Xbmc(Arc<xbmc::XbmcDevice>),
    Vlc(Arc<vlc::VlcDevice>),
    Web(Arc<web::WebDevice>),
}

impl Device {
    #[must_use]
    pub fn get_device_name(&self) -> &str {
        match self {
            Device::Upnp(d) => d.get_device_name(),
            Device::Chromecast(d) => d.get_device_name(),
            Device::Xbmc(d) => d.get_device_name(),
            Device::Vlc(d) => d.get_device_name(),
            Device::Web(d) => d.get_device_name(),
        }
    }

    pub async fn play(&self, url: &str, title: &str, local_token: u128) -> BridgeResult<()> {
        match self {
            Device::Upnp(d) => d.play(url, title, local_token).await,
            Device::Chromecast(d) => d.play(url, title, local_token).await,
            Device::Xbmc(d) => d.play(url, title, local_token).await,
            Device::Vlc(d) => d.play(url, title, local_token).await,
            Device::Web(d) => d.play(url, title, local_token).await,
        }
    }

    pub async fn stop(&self) -> BridgeResult<()> {
        match self {
            Device::Upnp(d) => d.stop().await,
            Device::Chromecast(d) => d.stop().await,
            Device::Xbmc(d) => d.stop().await,
            Device::Vlc(d) => d.stop().await,
            Device::Web(d) => d.stop().await,
        }
    }

    pub async fn on_close(&self, local_token: u128) {
        match self {
            Device::Upnp(d) => d.on_close(local_token).await,
            Device::Chromecast(d) => d.on_close(local_token).await,
            Device::Xbmc(d) => d.on_close(local_token).await,
            Device::Vlc(d) => d.on_close(local_token).await,
            Device::Web(d) => d.on_close(local_token).await,
        }
    }

    #[must_use]
    pub fn get_player_functions(&self) -> Vec<Arc<dyn DevicePlayerFunction>> {
        match self {
            Device::Upnp(d) => d.get_player_functions(),
            Device::Chromecast(d) => d.get_player_functions(),
            Device::Xbmc(d) => d.get_player_functions(),
            Device::Vlc(d) => d.get_player_functions(),
            Device::Web(d) => d.get_player_functions(),
        }
    }
}

/// Extra HTTP routes a finder wants mounted under the gateway router (e.g.
/// the web-poll device's register/poll endpoints). Kept as a plain
/// `axum::Router<()>` so finders own their own state via closures rather
/// than depending on the gateway's `AppState` type.
pub type RouterContribution = axum::Router<()>;

/// Discovers or constructs `Device`s of one transport kind.
#[async_trait]
pub trait DeviceFinder: Send + Sync {
    /// Whether this finder is turned on in config.
    fn is_enabled(&self, config: &Config) -> bool;

    /// Performs a discovery pass (network scan, or a read of static config),
    /// bounded by the caller's scoped timeout.
    async fn find(&self, config: &Config) -> Vec<Device>;

    /// Additional HTTP routes this finder's device kind needs mounted.
    /// Most finders contribute none.
    fn get_routers(&self) -> Vec<RouterContribution> {
        Vec::new()
    }
}
